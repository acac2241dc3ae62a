//! Polymorphic families: the self-extending union behind every bound type.
//!
//! A family goes through two phases:
//!
//! - **Declaration**: `register` appends candidates in registration order
//!   ([0] is always the owning base type) and records the name → type
//!   mapping for named variants. This happens eagerly, at bind time.
//! - **Sealed**: the first construction/decode (or an explicit `seal`)
//!   freezes the current lists into an immutable dispatch table.
//!   Registrations arriving after sealing still land in the declaration
//!   lists but are not reflected in the sealed table; resolution is
//!   permanently stale for them and a warning is logged, never an error.

use once_cell::unsync::OnceCell;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::assemble::AssembledType;
use crate::context::Context;

pub struct Family {
    candidates: RefCell<Vec<Rc<AssembledType>>>,
    by_name: RefCell<FxHashMap<String, Rc<AssembledType>>>,
    sealed: OnceCell<Sealed>,
}

struct Sealed {
    by_name: FxHashMap<String, Rc<AssembledType>>,
}

impl Family {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            candidates: RefCell::new(Vec::new()),
            by_name: RefCell::new(FxHashMap::default()),
            sealed: OnceCell::new(),
        })
    }

    /// Appends a variant to the declaration-phase lists.
    pub(crate) fn register(&self, ty: &Rc<AssembledType>) {
        if self.sealed.get().is_some() {
            warn!(
                variant = ty.display_name(),
                "type registered after family was sealed; existing resolution stays stale"
            );
        }
        self.candidates.borrow_mut().push(ty.clone());
        if let Some(name) = ty.name() {
            let replaced = self
                .by_name
                .borrow_mut()
                .insert(name.to_string(), ty.clone());
            if replaced.is_some() {
                warn!(name, "duplicate family name; later registration wins");
            }
        }
        debug!(
            variant = ty.display_name(),
            variants = self.candidates.borrow().len(),
            "registered family variant"
        );
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.sealed.get().is_some()
    }

    /// Freezes the candidate lists into the dispatch table. Idempotent.
    pub(crate) fn seal(&self) {
        self.sealed_table();
    }

    fn sealed_table(&self) -> &Sealed {
        self.sealed.get_or_init(|| {
            let by_name = self.by_name.borrow().clone();
            debug!(variants = self.candidates.borrow().len(), "sealed family");
            Sealed { by_name }
        })
    }

    /// Tag-based dispatch: the registered type named by the snapshot's
    /// discriminator value, if any.
    ///
    /// `None` covers every fallback case (tagging disabled, no tag in the
    /// snapshot, non-string tag value, registry miss); the caller degrades
    /// to its own base type.
    pub(crate) fn match_tag(
        &self,
        ctx: &Context,
        snapshot: &Map<String, Value>,
    ) -> Option<Rc<AssembledType>> {
        let sealed = self.sealed_table();
        let tag = ctx.type_tag()?;
        match snapshot.get(&tag) {
            Some(Value::String(name)) => match sealed.by_name.get(name.as_str()) {
                Some(ty) => Some(ty.clone()),
                None => {
                    debug!(value = %name, "unrecognized discriminator value, using base type");
                    None
                }
            },
            _ => None,
        }
    }

    /// Variant names in registration order (declaration-phase list; unnamed
    /// variants are skipped).
    pub(crate) fn variant_names(&self) -> Vec<String> {
        self.candidates
            .borrow()
            .iter()
            .filter_map(|ty| ty.name().map(str::to_string))
            .collect()
    }

    /// Declaration-phase variant count, including unnamed variants.
    pub(crate) fn variant_count(&self) -> usize {
        self.candidates.borrow().len()
    }
}

impl std::fmt::Debug for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Family")
            .field("variants", &self.variant_count())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}
