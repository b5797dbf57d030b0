//! Selector extension engine for a Sass-like stylesheet compiler.
//!
//! This crate implements the `@extend` core: it tracks style-rule selectors
//! and extension relationships as a stylesheet is compiled, and rewrites
//! every stored selector so that each extension's source selector applies
//! wherever its target does. The algebra it builds on (compound unification,
//! parent weaving, the superselector relation) lives in [`selector`].
//!
//! The engine is a library with no I/O: parsing, import resolution, and CSS
//! emission belong to its callers. Selector values arrive already parsed and
//! leave as rewritten [`selector::SelectorList`]s through shared
//! [`ModifiableSelector`] cells.
//!
//! ```
//! use css_extend::selector::{
//!     ComplexSelector, CompoundSelector, SelectorList, SimpleSelector,
//! };
//! use css_extend::{CssValue, ExtendRule, ExtensionStore, Span};
//!
//! let class = |name: &str| {
//!     ComplexSelector::from_compound(CompoundSelector::new(vec![SimpleSelector::class(name)]))
//! };
//!
//! let mut store = ExtensionStore::new();
//! let rule = store
//!     .add_selector(SelectorList::new(vec![class("a")]), Span::default(), None)
//!     .unwrap();
//!
//! // `.b { @extend .a }`
//! store
//!     .add_extension(
//!         &CssValue::new(SelectorList::new(vec![class("b")]), Span::default()),
//!         &SimpleSelector::class("a"),
//!         &ExtendRule { span: Span::default(), is_optional: false },
//!         None,
//!     )
//!     .unwrap();
//!
//! assert_eq!(rule.value().to_string(), ".a, .b");
//! ```

mod error;
pub mod extend;
mod media;
pub mod selector;
mod span;

pub use error::ExtendError;
pub use extend::{
    extend, replace, ExtendMode, ExtendRule, Extender, Extension, ExtensionStore,
    ModifiableSelector,
};
pub use media::{MediaContext, MediaQuery};
pub use span::{CssValue, Span};
