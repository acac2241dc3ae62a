//! Live tree-node instances and the method receiver handle.
//!
//! A `Node` owns the decoded field slots, the per-instance volatile values,
//! and the registered change observers. Methods never see the `Node`
//! directly: they receive a `Caller`, which pins down the *defining* class
//! of the running method (for exact-level `ancestor` resolution) and
//! whether the invocation came through the mutation channel.
//!
//! Field and volatile writes are only legal through the mutation channel,
//! meaning a procedure or accessor-setter invocation. Queries attempting a
//! write fail with `MutationOutsideProcedure`.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

use stree_common::ModelError;
use stree_common::limits::MAX_NODE_DEPTH;

use crate::assemble::{self, AssembledType};
use crate::context::Context;
use crate::extract::MemberKind;

/// Mutation-notification seam for the external reactive runtime.
///
/// Observers registered on a node hear about every persisted-field write
/// performed through the mutation channel. Volatile writes are not
/// reported; volatile state is not part of the tree.
pub trait ChangeObserver {
    fn field_changed(&self, type_name: Option<&str>, field: &str, old: &Value, new: &Value);
}

/// One decoded field value.
#[derive(Clone)]
pub enum Slot {
    Value(Value),
    Child(NodeRef),
    List(Vec<Slot>),
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Value(v) => write!(f, "Value({v})"),
            Slot::Child(n) => write!(f, "Child({})", n.0.ty.display_name()),
            Slot::List(items) => write!(f, "List(len={})", items.len()),
        }
    }
}

struct Node {
    ty: Rc<AssembledType>,
    slots: RefCell<IndexMap<String, Slot>>,
    volatiles: RefCell<IndexMap<String, Value>>,
    observers: RefCell<Vec<Rc<dyn ChangeObserver>>>,
}

/// Shared handle to a live tree-node instance.
#[derive(Clone)]
pub struct NodeRef(Rc<Node>);

impl NodeRef {
    pub(crate) fn new(
        ty: Rc<AssembledType>,
        slots: IndexMap<String, Slot>,
        volatiles: IndexMap<String, Value>,
    ) -> Self {
        Self(Rc::new(Node {
            ty,
            slots: RefCell::new(slots),
            volatiles: RefCell::new(volatiles),
            observers: RefCell::new(Vec::new()),
        }))
    }

    /// The bound type's name, if it was bound with one.
    pub fn type_name(&self) -> Option<&str> {
        self.0.ty.name()
    }

    /// Reads a primitive field value.
    pub fn get(&self, field: &str) -> Result<Value, ModelError> {
        let slots = self.0.slots.borrow();
        match slots.get(field) {
            Some(Slot::Value(v)) => Ok(v.clone()),
            Some(_) => Err(ModelError::NonPrimitiveField {
                type_name: self.0.ty.display_name().to_string(),
                field: field.to_string(),
            }),
            None => Err(ModelError::UnknownField {
                type_name: self.0.ty.display_name().to_string(),
                field: field.to_string(),
            }),
        }
    }

    /// Reads a node-typed field; `None` when an optional child is absent.
    pub fn child(&self, field: &str) -> Result<Option<NodeRef>, ModelError> {
        let slots = self.0.slots.borrow();
        match slots.get(field) {
            Some(Slot::Child(n)) => Ok(Some(n.clone())),
            Some(Slot::Value(Value::Null)) => Ok(None),
            Some(Slot::Value(v)) => Err(ModelError::SnapshotShape {
                field: field.to_string(),
                expected: "node",
                found: v.clone(),
            }),
            Some(Slot::List(_)) => Err(ModelError::SnapshotShape {
                field: field.to_string(),
                expected: "node",
                found: Value::Array(Vec::new()),
            }),
            None => Err(ModelError::UnknownField {
                type_name: self.0.ty.display_name().to_string(),
                field: field.to_string(),
            }),
        }
    }

    /// Reads a list field of node children, in list order.
    pub fn children(&self, field: &str) -> Result<Vec<NodeRef>, ModelError> {
        let slots = self.0.slots.borrow();
        match slots.get(field) {
            Some(Slot::List(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Slot::Child(n) => out.push(n.clone()),
                        Slot::Value(v) => {
                            return Err(ModelError::SnapshotShape {
                                field: field.to_string(),
                                expected: "node",
                                found: v.clone(),
                            });
                        }
                        Slot::List(_) => {
                            return Err(ModelError::SnapshotShape {
                                field: field.to_string(),
                                expected: "node",
                                found: Value::Array(Vec::new()),
                            });
                        }
                    }
                }
                Ok(out)
            }
            Some(Slot::Value(v)) => Err(ModelError::SnapshotShape {
                field: field.to_string(),
                expected: "list",
                found: v.clone(),
            }),
            Some(Slot::Child(_)) => Err(ModelError::SnapshotShape {
                field: field.to_string(),
                expected: "list",
                found: Value::Null,
            }),
            None => Err(ModelError::UnknownField {
                type_name: self.0.ty.display_name().to_string(),
                field: field.to_string(),
            }),
        }
    }

    /// Reads a volatile value.
    pub fn volatile(&self, name: &str) -> Result<Value, ModelError> {
        self.0
            .volatiles
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownMember {
                type_name: self.0.ty.display_name().to_string(),
                member: name.to_string(),
            })
    }

    /// Registers a change observer for persisted-field writes.
    pub fn observe(&self, observer: Rc<dyn ChangeObserver>) {
        self.0.observers.borrow_mut().push(observer);
    }

    /// Invokes a query through the read channel.
    pub fn query(&self, ctx: &Context, name: &str, args: &[Value]) -> Result<Value, ModelError> {
        let (definer, body) = self.0.ty.find_view(name)?;
        let caller = Caller {
            ctx,
            node: self.clone(),
            definer,
            mutating: false,
        };
        body(&caller, args)
    }

    /// Invokes a procedure through the mutation channel.
    pub fn call(&self, ctx: &Context, name: &str, args: &[Value]) -> Result<Value, ModelError> {
        let (definer, body) = self.0.ty.find_action(name)?;
        trace!(
            member = name,
            ty = self.0.ty.display_name(),
            "invoking procedure"
        );
        let caller = Caller {
            ctx,
            node: self.clone(),
            definer,
            mutating: true,
        };
        body(&caller, args)
    }

    /// Reads an accessor property. Write-only accessors yield `null`.
    pub fn prop(&self, ctx: &Context, name: &str) -> Result<Value, ModelError> {
        let (definer, accessor) = self.0.ty.find_accessor(name)?;
        let caller = Caller {
            ctx,
            node: self.clone(),
            definer,
            mutating: false,
        };
        (accessor.get)(&caller, &[])
    }

    /// Writes an accessor property through the mutation channel.
    pub fn set_prop(&self, ctx: &Context, name: &str, value: Value) -> Result<Value, ModelError> {
        let (definer, accessor) = self.0.ty.find_accessor(name)?;
        let setter = accessor.set.ok_or_else(|| ModelError::UnknownMember {
            type_name: self.0.ty.display_name().to_string(),
            member: name.to_string(),
        })?;
        let caller = Caller {
            ctx,
            node: self.clone(),
            definer,
            mutating: true,
        };
        setter(&caller, &[value])
    }

    /// Encodes this node to a snapshot, stamping the discriminator for
    /// named non-root types.
    pub fn snapshot(&self, ctx: &Context) -> Result<Value, ModelError> {
        self.encode(ctx, 0)
    }

    pub(crate) fn encode(&self, ctx: &Context, depth: u32) -> Result<Value, ModelError> {
        if depth > MAX_NODE_DEPTH {
            return Err(ModelError::NodeDepthExceeded {
                depth: MAX_NODE_DEPTH,
            });
        }
        let mut map = Map::new();
        {
            let slots = self.0.slots.borrow();
            for (name, slot) in slots.iter() {
                map.insert(name.clone(), encode_slot(ctx, slot, depth)?);
            }
        }
        self.0.ty.stamp(ctx, &mut map);
        Ok(Value::Object(map))
    }

    fn notify(&self, field: &str, old: &Value, new: &Value) {
        for observer in self.0.observers.borrow().iter() {
            observer.field_changed(self.0.ty.name(), field, old, new);
        }
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("type", &self.0.ty.display_name())
            .field("fields", &self.0.slots.borrow().len())
            .finish()
    }
}

fn encode_slot(ctx: &Context, slot: &Slot, depth: u32) -> Result<Value, ModelError> {
    match slot {
        Slot::Value(v) => Ok(v.clone()),
        Slot::Child(child) => child.encode(ctx, depth + 1),
        Slot::List(items) => items
            .iter()
            .map(|item| encode_slot(ctx, item, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
    }
}

/// The receiver handle passed to every query, procedure, and accessor body.
pub struct Caller<'a> {
    ctx: &'a Context,
    node: NodeRef,
    definer: Rc<AssembledType>,
    mutating: bool,
}

impl Caller<'_> {
    pub fn ctx(&self) -> &Context {
        self.ctx
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Reads a primitive field.
    pub fn get(&self, field: &str) -> Result<Value, ModelError> {
        self.node.get(field)
    }

    /// Writes a field. Mutation channel only; the value is decoded against
    /// the declared field type (node-typed fields accept snapshots and
    /// dispatch through their family).
    pub fn set(&self, field: &str, value: Value) -> Result<(), ModelError> {
        if !self.mutating {
            return Err(ModelError::MutationOutsideProcedure {
                member: field.to_string(),
            });
        }
        let ty = self.node.0.ty.clone();
        let spec = ty
            .schema()
            .field_spec(field)
            .cloned()
            .ok_or_else(|| ModelError::UnknownField {
                type_name: ty.display_name().to_string(),
                field: field.to_string(),
            })?;
        let slot = assemble::decode_field(self.ctx, &spec.ty, &ty, field, &value, 0)?;
        let old = {
            let slots = self.node.0.slots.borrow();
            match slots.get(field) {
                Some(s) => encode_slot(self.ctx, s, 0)?,
                None => Value::Null,
            }
        };
        self.node
            .0
            .slots
            .borrow_mut()
            .insert(field.to_string(), slot);
        self.node.notify(field, &old, &value);
        Ok(())
    }

    /// Reads a volatile value.
    pub fn volatile(&self, name: &str) -> Result<Value, ModelError> {
        self.node.volatile(name)
    }

    /// Writes a declared volatile value. Mutation channel only.
    pub fn set_volatile(&self, name: &str, value: Value) -> Result<(), ModelError> {
        if !self.mutating {
            return Err(ModelError::MutationOutsideProcedure {
                member: name.to_string(),
            });
        }
        let mut volatiles = self.node.0.volatiles.borrow_mut();
        if !volatiles.contains_key(name) {
            return Err(ModelError::UnknownMember {
                type_name: self.node.0.ty.display_name().to_string(),
                member: name.to_string(),
            });
        }
        volatiles.insert(name.to_string(), value);
        Ok(())
    }

    /// Invokes a sibling query.
    pub fn query(&self, name: &str, args: &[Value]) -> Result<Value, ModelError> {
        self.node.query(self.ctx, name, args)
    }

    /// Invokes a sibling procedure. Mutation channel only.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ModelError> {
        if !self.mutating {
            return Err(ModelError::MutationOutsideProcedure {
                member: name.to_string(),
            });
        }
        self.node.call(self.ctx, name, args)
    }

    /// Reads an accessor property.
    pub fn prop(&self, name: &str) -> Result<Value, ModelError> {
        self.node.prop(self.ctx, name)
    }

    /// Writes an accessor property. Mutation channel only.
    pub fn set_prop(&self, name: &str, value: Value) -> Result<Value, ModelError> {
        if !self.mutating {
            return Err(ModelError::MutationOutsideProcedure {
                member: name.to_string(),
            });
        }
        self.node.set_prop(self.ctx, name, value)
    }

    /// Invokes the nearest ancestor implementation of `name`, starting from
    /// the parent of the class that defined the running method.
    ///
    /// Resolution is relative to the defining class, not the instance's
    /// class; an override calling its ancestor at depth d reaches exactly
    /// depth d-1, so chains terminate at every level.
    pub fn ancestor(&self, name: &str, args: &[Value]) -> Result<Value, ModelError> {
        let start = self
            .definer
            .parent()
            .cloned()
            .ok_or_else(|| ModelError::UnknownMember {
                type_name: self.definer.display_name().to_string(),
                member: name.to_string(),
            })?;
        let (definer, kind, body) = AssembledType::find_callable_from(&start, name)?;
        if kind == MemberKind::Procedure && !self.mutating {
            return Err(ModelError::MutationOutsideProcedure {
                member: name.to_string(),
            });
        }
        let caller = Caller {
            ctx: self.ctx,
            node: self.node.clone(),
            definer,
            mutating: self.mutating,
        };
        body(&caller, args)
    }
}
