//! Structural declaration of a node's persisted fields.
//!
//! A `Schema` is the tree-node side of a bound type: an ordered set of
//! named, typed, optionally-defaulted fields. The member tables a class
//! contributes live next to it on the assembled type, never inside it.
//!
//! Field order is declaration order throughout: decoded slots, encoded
//! snapshots, and iteration all follow it.

use indexmap::IndexMap;
use serde_json::Value;
use stree_common::ModelError;

use crate::assemble::ModelType;

/// The type of a single persisted field.
#[derive(Clone, Debug)]
pub enum FieldType {
    Boolean,
    Number,
    Text,
    /// Inner type or `null`.
    Optional(Box<FieldType>),
    /// Ordered collection of the element type. Defaults to empty when the
    /// snapshot omits the field.
    List(Box<FieldType>),
    /// A node-typed field. Decoding dispatches through the embedded type's
    /// family, so a field declared with a base type accepts any registered
    /// subtype.
    Model(ModelType),
    /// Late self-reference: resolves at decode/encode time to the root
    /// family of the node type whose schema declared it. This is what makes
    /// recursive tree shapes declarable before the type itself exists.
    SelfRef,
}

impl FieldType {
    /// Human-readable name used in shape diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Number => "number",
            FieldType::Text => "text",
            FieldType::Optional(_) => "optional",
            FieldType::List(_) => "list",
            FieldType::Model(_) => "node",
            FieldType::SelfRef => "node",
        }
    }

    /// Validates a primitive snapshot value against this type.
    ///
    /// Composite variants (`List`, `Model`, `SelfRef`) are decoded
    /// structurally by the assembler and accept anything here.
    pub(crate) fn check_primitive(&self, field: &str, value: &Value) -> Result<(), ModelError> {
        let ok = match self {
            FieldType::Boolean => value.is_boolean(),
            FieldType::Number => value.is_number(),
            FieldType::Text => value.is_string(),
            FieldType::Optional(inner) => {
                return if value.is_null() {
                    Ok(())
                } else {
                    inner.check_primitive(field, value)
                };
            }
            FieldType::List(_) | FieldType::Model(_) | FieldType::SelfRef => true,
        };
        if ok {
            Ok(())
        } else {
            Err(ModelError::SnapshotShape {
                field: field.to_string(),
                expected: self.describe(),
                found: value.clone(),
            })
        }
    }
}

/// One field declaration: its type and an optional default snapshot value.
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub ty: FieldType,
    pub default: Option<Value>,
}

/// Ordered, named field declarations for one node type.
///
/// The builder consumes and returns `self`, so a subclass schema is
/// declared by cloning the parent type's schema and appending fields.
#[derive(Clone, Debug)]
pub struct Schema {
    name: Option<String>,
    fields: IndexMap<String, FieldSpec>,
}

impl Schema {
    /// An empty object schema.
    pub fn object() -> Self {
        Self {
            name: None,
            fields: IndexMap::new(),
        }
    }

    /// Declares a required field. Redeclaring a name replaces the earlier
    /// spec but keeps its position.
    pub fn field(mut self, name: &str, ty: FieldType) -> Self {
        self.fields
            .insert(name.to_string(), FieldSpec { ty, default: None });
        self
    }

    /// Declares a field with a default used when a snapshot omits it.
    pub fn field_with_default(mut self, name: &str, ty: FieldType, default: Value) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldSpec {
                ty,
                default: Some(default),
            },
        );
        self
    }

    /// Declares a list field of the given element type.
    pub fn list(self, name: &str, element: FieldType) -> Self {
        self.field(name, FieldType::List(Box::new(element)))
    }

    /// Applies a type name; `None` leaves the current name untouched.
    pub fn named(mut self, name: Option<&str>) -> Self {
        if let Some(name) = name {
            self.name = Some(name.to_string());
        }
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_declaration_order_preserved() {
        let schema = Schema::object()
            .field("done", FieldType::Boolean)
            .field_with_default("title", FieldType::Text, json!(""))
            .field("count", FieldType::Number);
        let names: Vec<_> = schema.fields().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["done", "title", "count"]);
    }

    #[test]
    fn test_redeclaration_keeps_position() {
        let schema = Schema::object()
            .field("a", FieldType::Boolean)
            .field("b", FieldType::Number)
            .field_with_default("a", FieldType::Text, json!("x"));
        let names: Vec<_> = schema.fields().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(matches!(
            schema.field_spec("a").unwrap().ty,
            FieldType::Text
        ));
    }

    #[test]
    fn test_primitive_check_rejects_wrong_shape() {
        let err = FieldType::Boolean
            .check_primitive("done", &json!("yes"))
            .unwrap_err();
        assert!(matches!(err, ModelError::SnapshotShape { .. }));
    }

    #[test]
    fn test_optional_accepts_null_and_inner() {
        let ty = FieldType::Optional(Box::new(FieldType::Number));
        assert!(ty.check_primitive("n", &json!(null)).is_ok());
        assert!(ty.check_primitive("n", &json!(3)).is_ok());
        assert!(ty.check_primitive("n", &json!("3")).is_err());
    }

    #[test]
    fn test_named_none_keeps_existing_name() {
        let schema = Schema::object().named(Some("Todo")).named(None);
        assert_eq!(schema.name(), Some("Todo"));
    }
}
