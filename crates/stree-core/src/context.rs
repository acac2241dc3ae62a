//! Encode/decode context carrying the discriminator configuration.
//!
//! The discriminator name is deliberately not frozen into a family at
//! creation time: every encode and decode reads it from the `Context` at
//! that moment, so reconfiguring the tag changes behavior for every family
//! used with the context from then on.

use std::cell::RefCell;
use stree_common::DEFAULT_TYPE_TAG;

/// Shared configuration threaded through every snapshot encode/decode call.
#[derive(Debug)]
pub struct Context {
    tag: RefCell<Option<String>>,
}

impl Context {
    /// A context with the default discriminator (`"$"`) enabled.
    pub fn new() -> Self {
        Self {
            tag: RefCell::new(Some(DEFAULT_TYPE_TAG.to_string())),
        }
    }

    /// Replaces the discriminator property name, or disables tagging
    /// entirely with `None` (no discriminator is written or read).
    ///
    /// No validation is performed: a tag colliding with a schema field name
    /// overwrites that field in encoded snapshots.
    pub fn set_type_tag(&self, name: Option<&str>) {
        *self.tag.borrow_mut() = name.map(str::to_string);
    }

    /// The discriminator in effect right now.
    pub fn type_tag(&self) -> Option<String> {
        self.tag.borrow().clone()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tag() {
        let ctx = Context::new();
        assert_eq!(ctx.type_tag().as_deref(), Some("$"));
    }

    #[test]
    fn test_set_and_disable_tag() {
        let ctx = Context::new();
        ctx.set_type_tag(Some("type"));
        assert_eq!(ctx.type_tag().as_deref(), Some("type"));
        ctx.set_type_tag(None);
        assert_eq!(ctx.type_tag(), None);
    }
}
