//! Error taxonomy for the extension engine.

use crate::span::Span;
use thiserror::Error;

/// Errors raised while registering selectors and extensions or while
/// rewriting selectors.
///
/// Failures that surface during re-extension of previously stored selectors
/// are wrapped in [`ExtendError::Wrapped`] so the outer span names the
/// selector or extender that was being reprocessed while the inner error
/// keeps its original location.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtendError {
    /// An `@extend` target was a complex selector with more than one
    /// component. Only simple and compound targets can be extended.
    #[error("can't extend complex selector `{target}` ({span})")]
    InvalidTarget { target: String, span: Span },

    /// An extension carrying a media context was asked to apply under a
    /// different context.
    #[error("selectors may not be extended across media queries ({span})")]
    MediaContextMismatch { span: Span },

    /// Two mandatory extensions of the same selector were defined under
    /// different media contexts and cannot be merged.
    #[error("the same selector may not be extended from within different media queries ({left_span}, {span})")]
    CrossMediaMerge { left_span: Span, span: Span },

    /// A failure propagated out of re-extension, annotated with the span of
    /// the enclosing selector or extender.
    #[error("from {outer_span}: {inner}")]
    Wrapped {
        outer_span: Span,
        #[source]
        inner: Box<ExtendError>,
    },

    /// Contract violation: a selector pseudo was expected to carry an inner
    /// selector list.
    #[error("expected `{name}` to have an inner selector ({span})")]
    MissingInnerSelector { name: String, span: Span },
}

impl ExtendError {
    /// Wrap `inner` with the span of the selector or extender being
    /// reprocessed when it failed.
    pub(crate) fn wrapped(outer_span: Span, inner: ExtendError) -> Self {
        ExtendError::Wrapped {
            outer_span,
            inner: Box::new(inner),
        }
    }

    /// The primary span of this error.
    pub fn span(&self) -> Span {
        match self {
            ExtendError::InvalidTarget { span, .. }
            | ExtendError::MediaContextMismatch { span }
            | ExtendError::CrossMediaMerge { span, .. }
            | ExtendError::MissingInnerSelector { span, .. } => *span,
            ExtendError::Wrapped { inner, .. } => inner.span(),
        }
    }
}
