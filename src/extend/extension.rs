//! The immutable values describing a single `@extend`.

use crate::error::ExtendError;
use crate::media::MediaContext;
use crate::selector::{ComplexSelector, SimpleSelector};
use crate::span::Span;

/// The selector that an extension injects, with the bookkeeping the
/// algorithm needs: its specificity bound, whether it came straight from a
/// written selector, and the media context it may apply under.
///
/// Equality is structural over the contained complex selector.
#[derive(Clone, Debug)]
pub struct Extender {
    selector: ComplexSelector,
    span: Span,
    specificity: i32,
    original: bool,
    media_context: Option<MediaContext>,
}

impl Extender {
    pub(crate) fn new(
        selector: ComplexSelector,
        span: Span,
        specificity: i32,
        original: bool,
        media_context: Option<MediaContext>,
    ) -> Self {
        Self {
            selector,
            span,
            specificity,
            original,
            media_context,
        }
    }

    pub fn selector(&self) -> &ComplexSelector {
        &self.selector
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn specificity(&self) -> i32 {
        self.specificity
    }

    /// Whether this extender came directly from a written selector rather
    /// than being synthesised during extension.
    pub fn is_original(&self) -> bool {
        self.original
    }

    pub(crate) fn into_selector(self) -> ComplexSelector {
        self.selector
    }

    /// Fail when this extender was defined under a media context other than
    /// `context`. An extender with no context of its own applies anywhere.
    pub fn assert_compatible_media_context(
        &self,
        context: Option<&MediaContext>,
    ) -> Result<(), ExtendError> {
        let Some(expected) = &self.media_context else {
            return Ok(());
        };
        if context == Some(expected) {
            return Ok(());
        }
        Err(ExtendError::MediaContextMismatch { span: self.span })
    }
}

impl PartialEq for Extender {
    fn eq(&self, other: &Self) -> bool {
        self.selector == other.selector
    }
}

impl Eq for Extender {}

/// One registered `@extend`: inject `extender` wherever `target` occurs.
///
/// Two extensions for the same `(target, extender)` pair collapse into a
/// merged extension that remembers both operands so mandatory ones can still
/// be reported individually.
#[derive(Clone, Debug)]
pub struct Extension {
    extender: Extender,
    target: SimpleSelector,
    target_span: Span,
    media_context: Option<MediaContext>,
    optional: bool,
    merged: Option<Box<(Extension, Extension)>>,
}

impl Extension {
    pub fn new(
        complex: ComplexSelector,
        extender_span: Span,
        target: SimpleSelector,
        target_span: Span,
        media_context: Option<MediaContext>,
        optional: bool,
    ) -> Self {
        let specificity = complex.max_specificity();
        Self {
            extender: Extender::new(
                complex,
                extender_span,
                specificity,
                false,
                media_context.clone(),
            ),
            target,
            target_span,
            media_context,
            optional,
            merged: None,
        }
    }

    pub fn extender(&self) -> &Extender {
        &self.extender
    }

    pub fn target(&self) -> &SimpleSelector {
        &self.target
    }

    pub fn target_span(&self) -> Span {
        self.target_span
    }

    pub fn media_context(&self) -> Option<&MediaContext> {
        self.media_context.as_ref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_merged(&self) -> bool {
        self.merged.is_some()
    }

    /// A copy of this extension whose extender selector is `complex`,
    /// preserving every other field. The result is always a base extension.
    pub fn with_extender(&self, complex: ComplexSelector) -> Self {
        let specificity = complex.max_specificity();
        Self {
            extender: Extender::new(
                complex,
                self.extender.span(),
                specificity,
                false,
                self.media_context.clone(),
            ),
            target: self.target.clone(),
            target_span: self.target_span,
            media_context: self.media_context.clone(),
            optional: self.optional,
            merged: None,
        }
    }

    /// Merge two extensions for the same `(target, extender)` pair.
    ///
    /// An optional operand with no media context of its own adds nothing and
    /// collapses into the other. Otherwise the merged extension is mandatory
    /// unless both operands were optional, and carries their common media
    /// context; conflicting contexts cannot merge.
    pub fn merge(left: Extension, right: Extension) -> Result<Extension, ExtendError> {
        debug_assert!(
            left.extender.selector() == right.extender.selector() && left.target == right.target,
            "only extensions of the same extender and target can merge"
        );

        if left.optional && left.media_context.is_none() {
            return Ok(right);
        }
        if right.optional && right.media_context.is_none() {
            return Ok(left);
        }

        let media_context = match (&left.media_context, &right.media_context) {
            (Some(left_context), Some(right_context)) if left_context != right_context => {
                return Err(ExtendError::CrossMediaMerge {
                    left_span: left.extender.span(),
                    span: right.extender.span(),
                });
            }
            (Some(context), _) | (None, Some(context)) => Some(context.clone()),
            (None, None) => None,
        };

        Ok(Extension {
            extender: left.extender.clone(),
            target: left.target.clone(),
            target_span: left.target_span,
            media_context,
            optional: left.optional && right.optional,
            merged: Some(Box::new((left, right))),
        })
    }

    /// The base extensions this one was merged from, in merge order; a base
    /// extension yields itself.
    pub fn unmerge(&self) -> Vec<Extension> {
        match &self.merged {
            None => vec![self.clone()],
            Some(pair) => {
                let mut unmerged = pair.0.unmerge();
                unmerged.extend(pair.1.unmerge());
                unmerged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::{ComplexSelector, CompoundSelector, SimpleSelector};

    fn extension(optional: bool, media: Option<MediaContext>) -> Extension {
        Extension::new(
            ComplexSelector::from_compound(CompoundSelector::new(vec![SimpleSelector::class("b")])),
            Span::default(),
            SimpleSelector::class("a"),
            Span::default(),
            media,
            optional,
        )
    }

    #[test]
    fn optional_operand_collapses_into_mandatory() {
        let merged = Extension::merge(extension(true, None), extension(false, None))
            .expect("merge succeeds");
        assert!(!merged.is_optional());
        assert!(!merged.is_merged());
    }

    #[test]
    fn conflicting_media_contexts_refuse_to_merge() {
        let screen = vec![crate::media::MediaQuery::media_type("screen")];
        let print = vec![crate::media::MediaQuery::media_type("print")];
        let result = Extension::merge(extension(false, Some(screen)), extension(false, Some(print)));
        assert!(matches!(result, Err(ExtendError::CrossMediaMerge { .. })));
    }

    #[test]
    fn unmerge_flattens_in_merge_order() {
        let screen = vec![crate::media::MediaQuery::media_type("screen")];
        let merged = Extension::merge(
            extension(false, Some(screen.clone())),
            extension(false, Some(screen)),
        )
        .expect("same context merges");
        assert!(merged.is_merged());
        assert_eq!(merged.unmerge().len(), 2);
        assert!(!merged.is_optional());
    }
}
