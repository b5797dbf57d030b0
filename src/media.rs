//! Media-query context for extensions defined inside `@media` rules.
//!
//! The engine does not evaluate media queries; it only needs to know whether
//! two contexts are the same so an extension defined under one query is never
//! applied under another.

/// A single parsed media query, kept as an opaque value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MediaQuery {
    /// `not` / `only`, when present.
    pub modifier: Option<String>,
    /// `screen`, `print`, `all`, ...
    pub media_type: Option<String>,
    /// Feature expressions such as `(min-width: 600px)`, unparsed.
    pub features: Vec<String>,
}

impl MediaQuery {
    /// A plain `@media <type>` query.
    pub fn media_type(name: impl Into<String>) -> Self {
        Self {
            modifier: None,
            media_type: Some(name.into()),
            features: Vec::new(),
        }
    }
}

/// The ordered sequence of media queries enclosing a style rule.
///
/// Rules at the top level of the document have no context (`None` wherever an
/// `Option<MediaContext>` appears).
pub type MediaContext = Vec<MediaQuery>;
