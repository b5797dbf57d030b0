//! Extension modes.

/// Policy governing how a store applies extensions.
///
/// The mode controls two decisions: whether the selector being extended is
/// itself kept in the output, and whether a compound must match every
/// registered target for the extension to apply at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExtendMode {
    /// `@extend` rules encountered during compilation: extensions apply
    /// wherever their target occurs and the original selector is kept.
    #[default]
    Normal,
    /// The `extend()` entry point: all targets must match, original kept.
    AllTargets,
    /// The `replace()` entry point: all targets must match and the original
    /// selector is dropped from the output.
    Replace,
}
