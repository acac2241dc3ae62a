//! Node assembly: combine a class declaration with a schema into a usable,
//! polymorphic node type.
//!
//! `bind` is the single entry point of the pipeline. It:
//! - applies the optional name to the schema
//! - splits the extracted members into the raw view/action/accessor/volatile
//!   tables (a class with no queries simply contributes no view table)
//! - installs the snapshot pre-processing rule (missing/`null` → `{}`) and
//!   the post-processing rule (named non-root types stamp the context's
//!   discriminator on encode)
//! - creates the type's own family and registers the type into every
//!   ancestor family, eagerly, exactly once
//!
//! Decoding lives here too: `create_from` normalizes the snapshot, lets the
//! family dispatch on the discriminator, and instantiates the chosen
//! variant field by field.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

use stree_common::ModelError;
use stree_common::common::ANONYMOUS_TYPE_NAME;
use stree_common::limits::{MAX_ANCESTOR_DEPTH, MAX_NODE_DEPTH};

use crate::class::{ClassDef, MethodFn};
use crate::context::Context;
use crate::extract::{self, MemberKind, MemberPayload, MemberSpec};
use crate::family::Family;
use crate::node::{NodeRef, Slot};
use crate::schema::{FieldType, Schema};

/// A getter with an optional setter, both raw.
#[derive(Clone)]
pub(crate) struct Accessor {
    pub(crate) get: MethodFn,
    pub(crate) set: Option<MethodFn>,
}

/// A schema type augmented with the raw member tables of one class and the
/// parent link to its ancestor's assembled type.
///
/// Instances never store members; every live node points back here, and
/// member resolution walks the parent chain from the node's own type.
pub struct AssembledType {
    name: Option<String>,
    schema: Schema,
    views: IndexMap<String, MethodFn>,
    actions: IndexMap<String, MethodFn>,
    accessors: IndexMap<String, Accessor>,
    volatiles: IndexMap<String, Value>,
    member_order: Vec<(String, MemberKind)>,
    parent: Option<Rc<AssembledType>>,
    family: Rc<Family>,
}

impl AssembledType {
    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(ANONYMOUS_TYPE_NAME)
    }

    pub(crate) fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn parent(&self) -> Option<&Rc<AssembledType>> {
        self.parent.as_ref()
    }

    pub(crate) fn family(&self) -> &Rc<Family> {
        &self.family
    }

    pub(crate) fn member_order(&self) -> &[(String, MemberKind)] {
        &self.member_order
    }

    /// Resolves a query, walking the ancestor chain.
    pub(crate) fn find_view(
        self: &Rc<Self>,
        name: &str,
    ) -> Result<(Rc<AssembledType>, MethodFn), ModelError> {
        let mut cur = self.clone();
        let mut depth = 0u32;
        loop {
            if let Some(body) = cur.views.get(name) {
                let body = body.clone();
                return Ok((cur, body));
            }
            cur = match &cur.parent {
                Some(p) => p.clone(),
                None => {
                    return Err(ModelError::UnknownMember {
                        type_name: self.display_name().to_string(),
                        member: name.to_string(),
                    });
                }
            };
            depth += 1;
            if depth > MAX_ANCESTOR_DEPTH {
                return Err(ModelError::AncestorDepthExceeded {
                    depth: MAX_ANCESTOR_DEPTH,
                });
            }
        }
    }

    /// Resolves a procedure, walking the ancestor chain.
    pub(crate) fn find_action(
        self: &Rc<Self>,
        name: &str,
    ) -> Result<(Rc<AssembledType>, MethodFn), ModelError> {
        let mut cur = self.clone();
        let mut depth = 0u32;
        loop {
            if let Some(body) = cur.actions.get(name) {
                let body = body.clone();
                return Ok((cur, body));
            }
            cur = match &cur.parent {
                Some(p) => p.clone(),
                None => {
                    return Err(ModelError::UnknownMember {
                        type_name: self.display_name().to_string(),
                        member: name.to_string(),
                    });
                }
            };
            depth += 1;
            if depth > MAX_ANCESTOR_DEPTH {
                return Err(ModelError::AncestorDepthExceeded {
                    depth: MAX_ANCESTOR_DEPTH,
                });
            }
        }
    }

    /// Resolves an accessor, walking the ancestor chain.
    pub(crate) fn find_accessor(
        self: &Rc<Self>,
        name: &str,
    ) -> Result<(Rc<AssembledType>, Accessor), ModelError> {
        let mut cur = self.clone();
        let mut depth = 0u32;
        loop {
            if let Some(accessor) = cur.accessors.get(name) {
                let accessor = accessor.clone();
                return Ok((cur, accessor));
            }
            cur = match &cur.parent {
                Some(p) => p.clone(),
                None => {
                    return Err(ModelError::UnknownMember {
                        type_name: self.display_name().to_string(),
                        member: name.to_string(),
                    });
                }
            };
            depth += 1;
            if depth > MAX_ANCESTOR_DEPTH {
                return Err(ModelError::AncestorDepthExceeded {
                    depth: MAX_ANCESTOR_DEPTH,
                });
            }
        }
    }

    /// Resolves any callable member (query, then procedure, then accessor
    /// getter) starting at `start` and walking upward. Used by `ancestor`
    /// calls, which begin at the defining class's parent.
    pub(crate) fn find_callable_from(
        start: &Rc<AssembledType>,
        name: &str,
    ) -> Result<(Rc<AssembledType>, MemberKind, MethodFn), ModelError> {
        let mut cur = start.clone();
        let mut depth = 0u32;
        loop {
            if let Some(body) = cur.views.get(name) {
                let body = body.clone();
                return Ok((cur, MemberKind::Query, body));
            }
            if let Some(body) = cur.actions.get(name) {
                let body = body.clone();
                return Ok((cur, MemberKind::Procedure, body));
            }
            if let Some(accessor) = cur.accessors.get(name) {
                let get = accessor.get.clone();
                return Ok((cur, MemberKind::Accessor, get));
            }
            cur = match &cur.parent {
                Some(p) => p.clone(),
                None => {
                    return Err(ModelError::UnknownMember {
                        type_name: start.display_name().to_string(),
                        member: name.to_string(),
                    });
                }
            };
            depth += 1;
            if depth > MAX_ANCESTOR_DEPTH {
                return Err(ModelError::AncestorDepthExceeded {
                    depth: MAX_ANCESTOR_DEPTH,
                });
            }
        }
    }

    /// The root of this type's ancestor chain (itself for root types).
    pub(crate) fn root(self: &Rc<Self>) -> Rc<AssembledType> {
        let mut cur = self.clone();
        while let Some(p) = cur.parent.clone() {
            cur = p;
        }
        cur
    }

    /// Snapshot post-processing: named non-root types stamp the context's
    /// discriminator with their name. Root and unnamed types never stamp.
    ///
    /// Stamping an already-stamped snapshot rewrites the same value, so
    /// repeated encodes are stable.
    pub(crate) fn stamp(&self, ctx: &Context, map: &mut Map<String, Value>) {
        if self.parent.is_none() {
            return;
        }
        let Some(tag) = ctx.type_tag() else { return };
        let Some(name) = self.name.as_deref() else {
            return;
        };
        if self.schema.has_field(&tag) {
            warn!(%tag, "discriminator collides with a schema field; stamping overwrites it");
        }
        map.insert(tag, Value::String(name.to_string()));
    }

    /// Volatile initial values for an instance of this type: the whole
    /// ancestor chain, root first, so nearer declarations override.
    fn collect_volatiles(self: &Rc<Self>) -> IndexMap<String, Value> {
        let mut chain: SmallVec<[Rc<AssembledType>; 4]> = SmallVec::new();
        let mut cur = Some(self.clone());
        while let Some(t) = cur {
            cur = t.parent.clone();
            chain.push(t);
        }
        let mut out = IndexMap::new();
        for ty in chain.iter().rev() {
            for (name, initial) in ty.volatiles.iter() {
                out.insert(name.clone(), initial.clone());
            }
        }
        out
    }

    /// Decodes a normalized snapshot into a live node of exactly this type.
    fn instantiate(
        self: &Rc<Self>,
        ctx: &Context,
        map: &Map<String, Value>,
        depth: u32,
    ) -> Result<NodeRef, ModelError> {
        let mut slots = IndexMap::new();
        for (fname, spec) in self.schema.fields() {
            let slot = match map.get(fname) {
                Some(value) => decode_field(ctx, &spec.ty, self, fname, value, depth)?,
                None => match &spec.default {
                    Some(default) => decode_field(ctx, &spec.ty, self, fname, default, depth)?,
                    None => match &spec.ty {
                        FieldType::Optional(_) => Slot::Value(Value::Null),
                        FieldType::List(_) => Slot::List(Vec::new()),
                        _ => {
                            return Err(ModelError::MissingField {
                                type_name: self.display_name().to_string(),
                                field: fname.clone(),
                            });
                        }
                    },
                },
            };
            slots.insert(fname.clone(), slot);
        }
        Ok(NodeRef::new(self.clone(), slots, self.collect_volatiles()))
    }
}

impl fmt::Debug for AssembledType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssembledType")
            .field("name", &self.display_name())
            .field("fields", &self.schema.len())
            .field("members", &self.member_order.len())
            .finish()
    }
}

/// The externally usable, polymorphic node type.
///
/// Structurally forwards the wrapped assembled type's operations; snapshot
/// decoding resolves through the family registry to the correct registered
/// subtype, falling back to the wrapped type itself.
#[derive(Clone)]
pub struct ModelType {
    assembled: Rc<AssembledType>,
}

impl ModelType {
    pub fn name(&self) -> Option<&str> {
        self.assembled.name()
    }

    pub fn display_name(&self) -> &str {
        self.assembled.display_name()
    }

    pub fn schema(&self) -> &Schema {
        self.assembled.schema()
    }

    /// The parent type this one was derived from, if any.
    pub fn parent(&self) -> Option<ModelType> {
        self.assembled.parent().cloned().map(|assembled| ModelType { assembled })
    }

    /// Own members in declaration order, one entry per query, procedure,
    /// accessor, and volatile field.
    pub fn members(&self) -> &[(String, MemberKind)] {
        self.assembled.member_order()
    }

    /// Freezes this type's family registry into its dispatch table.
    ///
    /// Implicit on first construction; explicit sealing makes the
    /// declare-everything-before-first-use ordering testable.
    pub fn seal(&self) {
        self.assembled.family().seal();
    }

    pub fn is_sealed(&self) -> bool {
        self.assembled.family().is_sealed()
    }

    /// Named variants registered into this type's family, in registration
    /// order (this type first).
    pub fn variant_names(&self) -> Vec<String> {
        self.assembled.family().variant_names()
    }

    /// All registered variants, named or not.
    pub fn variant_count(&self) -> usize {
        self.assembled.family().variant_count()
    }

    /// Constructs a live node from a snapshot.
    ///
    /// A missing or `null` snapshot normalizes to the empty object. When
    /// the context's discriminator names a registered subtype, that subtype
    /// is constructed; otherwise this type is (untagged snapshots and
    /// unrecognized tags both degrade here).
    pub fn create(
        &self,
        ctx: &Context,
        snapshot: Option<&Value>,
    ) -> Result<NodeRef, ModelError> {
        create_from(&self.assembled, ctx, snapshot, 0)
    }

    pub(crate) fn assembled(&self) -> &Rc<AssembledType> {
        &self.assembled
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.display_name())
            .field("variants", &self.variant_count())
            .finish()
    }
}

/// Binds a class declaration onto a schema, producing the polymorphic node
/// type and registering it with every ancestor family.
pub fn bind(class: ClassDef, schema: Schema, name: Option<&str>) -> Result<ModelType, ModelError> {
    let schema = schema.named(name);
    let specs = extract::extract(&class);

    let mut views = IndexMap::new();
    let mut actions = IndexMap::new();
    let mut accessors = IndexMap::new();
    let mut volatiles = IndexMap::new();
    let mut member_order = Vec::with_capacity(specs.len());
    for spec in specs {
        let MemberSpec { name, payload } = spec;
        member_order.push((name.clone(), payload.kind()));
        match payload {
            MemberPayload::Query(body) => {
                views.insert(name, body);
            }
            MemberPayload::Procedure(body) => {
                actions.insert(name, body);
            }
            MemberPayload::Accessor { get, set } => {
                accessors.insert(name, Accessor { get, set });
            }
            MemberPayload::Volatile(initial) => {
                volatiles.insert(name, initial);
            }
        }
    }

    let parent = class.parent().cloned();
    let mut chain: SmallVec<[Rc<AssembledType>; 4]> = SmallVec::new();
    let mut cur = parent.clone();
    let mut depth = 0u32;
    while let Some(p) = cur {
        depth += 1;
        if depth > MAX_ANCESTOR_DEPTH {
            return Err(ModelError::AncestorDepthExceeded {
                depth: MAX_ANCESTOR_DEPTH,
            });
        }
        cur = p.parent().cloned();
        chain.push(p);
    }

    let family = Family::new();
    let assembled = Rc::new(AssembledType {
        name: name.map(str::to_string),
        schema,
        views,
        actions,
        accessors,
        volatiles,
        member_order,
        parent,
        family: family.clone(),
    });
    family.register(&assembled);
    for ancestor in &chain {
        ancestor.family().register(&assembled);
    }
    debug!(
        name = assembled.display_name(),
        members = assembled.member_order.len(),
        ancestors = chain.len(),
        "bound model type"
    );
    Ok(ModelType { assembled })
}

/// `bind`, with a self-referential `children` list field injected into the
/// schema first. Returns the bound type and the resolved collection field
/// type, reusable in other schemas.
pub fn bind_with_children(
    class: ClassDef,
    schema: Schema,
    name: Option<&str>,
) -> Result<(ModelType, FieldType), ModelError> {
    let schema = schema.list("children", FieldType::SelfRef);
    let ty = bind(class, schema, name)?;
    let collection = FieldType::List(Box::new(FieldType::Model(ty.clone())));
    Ok((ty, collection))
}

/// Normalize → dispatch → instantiate. `base` is the declared type; the
/// family may choose a registered subtype instead.
pub(crate) fn create_from(
    base: &Rc<AssembledType>,
    ctx: &Context,
    snapshot: Option<&Value>,
    depth: u32,
) -> Result<NodeRef, ModelError> {
    if depth > MAX_NODE_DEPTH {
        return Err(ModelError::NodeDepthExceeded {
            depth: MAX_NODE_DEPTH,
        });
    }
    let map = normalize_snapshot(base, snapshot)?;
    let chosen = base
        .family
        .match_tag(ctx, &map)
        .unwrap_or_else(|| base.clone());
    chosen.instantiate(ctx, &map, depth)
}

/// Snapshot pre-processing: union resolution always needs some object
/// shape to inspect, so a missing/`null` snapshot becomes `{}`.
fn normalize_snapshot(
    base: &Rc<AssembledType>,
    snapshot: Option<&Value>,
) -> Result<Map<String, Value>, ModelError> {
    match snapshot {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(ModelError::SnapshotShape {
            field: base.display_name().to_string(),
            expected: "object",
            found: other.clone(),
        }),
    }
}

/// Decodes one snapshot value into a slot, recursing through composites.
pub(crate) fn decode_field(
    ctx: &Context,
    ty: &FieldType,
    owner: &Rc<AssembledType>,
    field: &str,
    value: &Value,
    depth: u32,
) -> Result<Slot, ModelError> {
    if depth > MAX_NODE_DEPTH {
        return Err(ModelError::NodeDepthExceeded {
            depth: MAX_NODE_DEPTH,
        });
    }
    match ty {
        FieldType::Boolean | FieldType::Number | FieldType::Text => {
            ty.check_primitive(field, value)?;
            Ok(Slot::Value(value.clone()))
        }
        FieldType::Optional(inner) => {
            if value.is_null() {
                Ok(Slot::Value(Value::Null))
            } else {
                decode_field(ctx, inner, owner, field, value, depth)
            }
        }
        FieldType::List(element) => {
            let items = value.as_array().ok_or_else(|| ModelError::SnapshotShape {
                field: field.to_string(),
                expected: "list",
                found: value.clone(),
            })?;
            let mut slots = Vec::with_capacity(items.len());
            for item in items {
                slots.push(decode_field(ctx, element, owner, field, item, depth + 1)?);
            }
            Ok(Slot::List(slots))
        }
        FieldType::Model(model) => Ok(Slot::Child(create_from(
            model.assembled(),
            ctx,
            Some(value),
            depth + 1,
        )?)),
        FieldType::SelfRef => {
            let root = owner.root();
            Ok(Slot::Child(create_from(&root, ctx, Some(value), depth + 1)?))
        }
    }
}
