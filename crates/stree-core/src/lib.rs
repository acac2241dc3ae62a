//! Class-modeled, snapshot-serializable, polymorphic tree-node types.
//!
//! This crate binds ordinary class-style member declarations onto
//! schema-described node types:
//!
//! - **Explicit member registration**: queries, procedures, accessors, and
//!   volatile fields registered on a `ClassDef` builder
//! - **Assembly**: `bind` combines a class with a `Schema` into a
//!   `ModelType` whose methods receive the live node instance
//! - **Polymorphism**: a field declared with a base type holds any
//!   registered subtype; snapshots carry a discriminator property so decode
//!   dispatches back to the exact subtype
//! - **Exact ancestor calls**: an override reaches its ancestor's original
//!   implementation one level at a time, through raw member tables, never
//!   through the bound wrappers
//!
//! ```
//! use serde_json::{Value, json};
//! use stree_core::{ClassDef, Context, FieldType, Schema, bind};
//!
//! let todo_class = ClassDef::root()
//!     .query("pending", |c, _| Ok(json!(!c.get("done")?.as_bool().unwrap_or(false))))
//!     .procedure("toggle", |c, _| {
//!         let done = c.get("done")?.as_bool().unwrap_or(false);
//!         c.set("done", json!(!done))?;
//!         Ok(Value::Null)
//!     });
//! let schema = Schema::object().field_with_default("done", FieldType::Boolean, json!(false));
//! let todo = bind(todo_class, schema, Some("Todo")).unwrap();
//!
//! let ctx = Context::new();
//! let node = todo.create(&ctx, None).unwrap();
//! node.call(&ctx, "toggle", &[]).unwrap();
//! assert_eq!(node.query(&ctx, "pending", &[]).unwrap(), json!(false));
//! ```

// Class declarations - member registration and ancestor linking
pub mod class;
pub use class::{ClassDef, MemberDecl, MethodFn};

// Member extraction - classification into ordered specs
pub mod extract;
pub use extract::{MemberKind, MemberPayload, MemberSpec, extract};

// Schema DSL - structural field declarations
pub mod schema;
pub use schema::{FieldSpec, FieldType, Schema};

// Node assembly - bind classes onto schemas
pub mod assemble;
pub use assemble::{AssembledType, ModelType, bind, bind_with_children};

// Polymorphic families - registration and tag dispatch
pub mod family;
pub use family::Family;

// Live node instances and the method receiver
pub mod node;
pub use node::{Caller, ChangeObserver, NodeRef, Slot};

// Encode/decode context carrying the discriminator configuration
pub mod context;
pub use context::Context;

// Re-exported foundations
pub use stree_common::{DEFAULT_TYPE_TAG, ModelError};
