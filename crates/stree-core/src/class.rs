//! Class declarations: member registration and ancestor linking.
//!
//! A `ClassDef` is the declaration-time shape of a class: an ordered list
//! of member registrations plus an optional link to the parent's assembled
//! type. Registration is explicit per member kind; there is no marker
//! mechanism to inherit, so a freshly derived class always starts with an
//! empty member list of its own.
//!
//! The declarations registered here become the type's *raw* member table.
//! Ancestor (`super`) calls resolve against raw tables through the parent
//! link, never against the instance-bound wrappers, which is what keeps a
//! depth-d override chain resolving one exact level at a time.

use serde_json::Value;
use std::fmt;
use std::rc::Rc;

use stree_common::ModelError;

use crate::assemble::{AssembledType, ModelType};
use crate::node::Caller;

/// A query, procedure, or accessor body.
///
/// The `Caller` receiver targets the live tree-node instance; `args` are
/// positional snapshot values.
pub type MethodFn = Rc<dyn Fn(&Caller<'_>, &[Value]) -> Result<Value, ModelError>>;

/// One registered member, in declaration order.
pub enum MemberDecl {
    /// Side-effect-free derived computation (read channel).
    Query { name: String, body: MethodFn },
    /// Mutating operation (mutation channel).
    Procedure { name: String, body: MethodFn },
    /// Getter/setter pair; either side may be absent.
    Accessor {
        name: String,
        get: Option<MethodFn>,
        set: Option<MethodFn>,
    },
    /// Per-instance state outside the persisted schema.
    Volatile { name: String, initial: Value },
}

impl MemberDecl {
    pub fn name(&self) -> &str {
        match self {
            MemberDecl::Query { name, .. }
            | MemberDecl::Procedure { name, .. }
            | MemberDecl::Accessor { name, .. }
            | MemberDecl::Volatile { name, .. } => name,
        }
    }
}

impl fmt::Debug for MemberDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            MemberDecl::Query { .. } => "query",
            MemberDecl::Procedure { .. } => "procedure",
            MemberDecl::Accessor { .. } => "accessor",
            MemberDecl::Volatile { .. } => "volatile",
        };
        write!(f, "{kind} {}", self.name())
    }
}

/// A class declaration: ordered members plus the ancestor link.
pub struct ClassDef {
    parent: Option<Rc<AssembledType>>,
    members: Vec<MemberDecl>,
}

impl ClassDef {
    /// The base of a new family: no parent, empty member set.
    pub fn root() -> Self {
        Self {
            parent: None,
            members: Vec::new(),
        }
    }

    /// Derives a class from a previously bound type.
    ///
    /// Records the back-reference the polymorphic registry later walks;
    /// members are not copied, they stay resolvable through the link.
    pub fn extending(parent: &ModelType) -> Self {
        Self {
            parent: Some(parent.assembled().clone()),
            members: Vec::new(),
        }
    }

    /// Registers a query.
    pub fn query(
        mut self,
        name: &str,
        body: impl Fn(&Caller<'_>, &[Value]) -> Result<Value, ModelError> + 'static,
    ) -> Self {
        self.members.push(MemberDecl::Query {
            name: name.to_string(),
            body: Rc::new(body),
        });
        self
    }

    /// Registers a mutating procedure.
    pub fn procedure(
        mut self,
        name: &str,
        body: impl Fn(&Caller<'_>, &[Value]) -> Result<Value, ModelError> + 'static,
    ) -> Self {
        self.members.push(MemberDecl::Procedure {
            name: name.to_string(),
            body: Rc::new(body),
        });
        self
    }

    /// Registers an accessor getter. Pairs with a `setter` registration of
    /// the same name.
    pub fn getter(
        mut self,
        name: &str,
        body: impl Fn(&Caller<'_>, &[Value]) -> Result<Value, ModelError> + 'static,
    ) -> Self {
        self.members.push(MemberDecl::Accessor {
            name: name.to_string(),
            get: Some(Rc::new(body)),
            set: None,
        });
        self
    }

    /// Registers an accessor setter. A setter with no paired getter is
    /// still exposed; reads of such a property yield `null`.
    pub fn setter(
        mut self,
        name: &str,
        body: impl Fn(&Caller<'_>, &[Value]) -> Result<Value, ModelError> + 'static,
    ) -> Self {
        self.members.push(MemberDecl::Accessor {
            name: name.to_string(),
            get: None,
            set: Some(Rc::new(body)),
        });
        self
    }

    /// Declares a volatile field with its initial value.
    ///
    /// Volatile state is per-instance and never appears in snapshots.
    pub fn volatile(mut self, name: &str, initial: Value) -> Self {
        self.members.push(MemberDecl::Volatile {
            name: name.to_string(),
            initial,
        });
        self
    }

    pub(crate) fn parent(&self) -> Option<&Rc<AssembledType>> {
        self.parent.as_ref()
    }

    pub(crate) fn members(&self) -> &[MemberDecl] {
        &self.members
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("parent", &self.parent.as_ref().map(|p| p.display_name().to_string()))
            .field("members", &self.members)
            .finish()
    }
}
