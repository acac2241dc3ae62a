/// Default discriminator property name stamped into snapshots of non-root
/// family members.
///
/// A fresh `Context` starts with this tag. `Context::set_type_tag` replaces
/// it (or disables tagging entirely with `None`).
pub const DEFAULT_TYPE_TAG: &str = "$";

/// Placeholder shown in diagnostics for types bound without a name.
pub const ANONYMOUS_TYPE_NAME: &str = "<anonymous>";
