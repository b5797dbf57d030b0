//! Selector value types shared by the extension engine.
//!
//! The model mirrors the selector grammar: a [`SelectorList`] is a
//! comma-separated sequence of [`ComplexSelector`]s, each of which is a
//! sequence of [`CompoundSelector`]s and [`Combinator`]s, and each compound
//! is a run of [`SimpleSelector`]s. The descendant relation is implicit in
//! the adjacency of two compound components.

use std::fmt;
use std::hash::{Hash, Hasher};

mod specificity;
mod superselector;
mod unify;

pub use unify::{paths, unify_complex, unify_compound, weave};

/// A single condition on an element.
///
/// Equality and hashing are value-based; the extension store keys its
/// indices on these.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SimpleSelector {
    /// Type selector: `div`, `p`, `span`.
    Type(String),
    /// Universal selector: `*`.
    Universal,
    /// Class selector: `.highlight`.
    Class(String),
    /// ID selector: `#main`.
    Id(String),
    /// Attribute selector: `[data-kind]` or `[data-kind=primary]`.
    Attribute {
        name: String,
        value: Option<String>,
    },
    /// Placeholder selector: `%base`. Matches nothing on its own; exists to
    /// be extended. Placeholders whose name starts with `-` or `_` are
    /// private to their defining module.
    Placeholder(PlaceholderSelector),
    /// Pseudo-class or pseudo-element, possibly with an inner selector list.
    Pseudo(PseudoSelector),
}

impl SimpleSelector {
    /// Shorthand for a class selector.
    pub fn class(name: impl Into<String>) -> Self {
        SimpleSelector::Class(name.into())
    }

    /// Shorthand for a placeholder selector.
    pub fn placeholder(name: impl Into<String>) -> Self {
        SimpleSelector::Placeholder(PlaceholderSelector::new(name))
    }

    /// Whether this selector can never produce visible output.
    pub fn is_invisible(&self) -> bool {
        match self {
            SimpleSelector::Placeholder(_) => true,
            // `:not(%a)` is still visible; every other selector pseudo is
            // only as visible as its inner list.
            SimpleSelector::Pseudo(pseudo) => match &pseudo.selector {
                Some(selector) if pseudo.normalized_name() != "not" => selector.is_invisible(),
                _ => false,
            },
            _ => false,
        }
    }
}

/// A `%placeholder` selector.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlaceholderSelector {
    pub name: String,
}

impl PlaceholderSelector {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Private placeholders (leading `-` or `_`) never cross module
    /// boundaries.
    pub fn is_private(&self) -> bool {
        self.name.starts_with('-') || self.name.starts_with('_')
    }
}

/// A pseudo-class (`:hover`, `:not(...)`) or pseudo-element (`::before`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PseudoSelector {
    /// Name as written, without the leading colon(s).
    pub name: String,
    /// `true` for single-colon pseudo-classes, `false` for pseudo-elements.
    pub is_class: bool,
    /// Unparsed argument text, e.g. the `2n+1` of `:nth-child(2n+1)`.
    pub argument: Option<String>,
    /// Inner selector list for selector pseudos like `:not(...)`/`:is(...)`.
    pub selector: Option<SelectorList>,
}

impl PseudoSelector {
    /// A selector pseudo-class such as `:not(...)` or `:is(...)`.
    pub fn with_selector_list(name: impl Into<String>, selector: SelectorList) -> Self {
        Self {
            name: name.into(),
            is_class: true,
            argument: None,
            selector: Some(selector),
        }
    }

    /// A plain pseudo-class such as `:hover`.
    pub fn pseudo_class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_class: true,
            argument: None,
            selector: None,
        }
    }

    pub fn is_element(&self) -> bool {
        !self.is_class
    }

    /// The name with any vendor prefix removed: `-moz-any` normalizes to
    /// `any`.
    pub fn normalized_name(&self) -> &str {
        let name = self.name.as_str();
        if let Some(rest) = name.strip_prefix('-') {
            if let Some(idx) = rest.find('-') {
                return &rest[idx + 1..];
            }
        }
        name
    }

    /// A copy of this pseudo with its inner selector list replaced.
    pub fn with_selector(&self, selector: SelectorList) -> Self {
        Self {
            name: self.name.clone(),
            is_class: self.is_class,
            argument: self.argument.clone(),
            selector: Some(selector),
        }
    }
}

/// An ordered, non-empty run of simple selectors with no combinators.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CompoundSelector {
    pub components: Vec<SimpleSelector>,
}

impl CompoundSelector {
    pub fn new(components: Vec<SimpleSelector>) -> Self {
        Self { components }
    }

    pub fn is_invisible(&self) -> bool {
        self.components.iter().any(SimpleSelector::is_invisible)
    }

    /// Whether this compound matches everything `other` matches.
    pub fn is_superselector(&self, other: &CompoundSelector) -> bool {
        superselector::compound_is_superselector(self, other, None)
    }
}

/// Combinators between compounds. The descendant relation has no explicit
/// combinator; it is implied by two adjacent compound components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// `>`
    Child,
    /// `+`
    NextSibling,
    /// `~`
    FollowingSibling,
}

/// One element of a complex selector: a compound or a combinator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComplexSelectorComponent {
    Compound(CompoundSelector),
    Combinator(Combinator),
}

impl ComplexSelectorComponent {
    pub fn as_compound(&self) -> Option<&CompoundSelector> {
        match self {
            ComplexSelectorComponent::Compound(compound) => Some(compound),
            ComplexSelectorComponent::Combinator(_) => None,
        }
    }

    pub fn is_combinator(&self) -> bool {
        matches!(self, ComplexSelectorComponent::Combinator(_))
    }
}

impl From<CompoundSelector> for ComplexSelectorComponent {
    fn from(compound: CompoundSelector) -> Self {
        ComplexSelectorComponent::Compound(compound)
    }
}

impl From<Combinator> for ComplexSelectorComponent {
    fn from(combinator: Combinator) -> Self {
        ComplexSelectorComponent::Combinator(combinator)
    }
}

/// A sequence of compounds and combinators.
///
/// `line_break` records whether the selector was written across multiple
/// lines; it survives rewriting but takes no part in equality or hashing.
#[derive(Clone, Debug, Default)]
pub struct ComplexSelector {
    pub components: Vec<ComplexSelectorComponent>,
    pub line_break: bool,
}

impl ComplexSelector {
    pub fn new(components: Vec<ComplexSelectorComponent>, line_break: bool) -> Self {
        Self {
            components,
            line_break,
        }
    }

    /// A complex selector holding a single compound.
    pub fn from_compound(compound: CompoundSelector) -> Self {
        Self {
            components: vec![ComplexSelectorComponent::Compound(compound)],
            line_break: false,
        }
    }

    pub fn is_invisible(&self) -> bool {
        self.components
            .iter()
            .any(|component| component.as_compound().is_some_and(CompoundSelector::is_invisible))
    }

    /// Whether this selector matches everything `other` matches.
    pub fn is_superselector(&self, other: &ComplexSelector) -> bool {
        superselector::complex_is_superselector(&self.components, &other.components)
    }

    /// Lower bound on this selector's specificity.
    pub fn min_specificity(&self) -> i32 {
        specificity::complex_specificity(self, false)
    }

    /// Upper bound on this selector's specificity.
    pub fn max_specificity(&self) -> i32 {
        specificity::complex_specificity(self, true)
    }
}

impl PartialEq for ComplexSelector {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for ComplexSelector {}

impl Hash for ComplexSelector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

/// A comma-separated selector list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SelectorList {
    pub components: Vec<ComplexSelector>,
}

impl SelectorList {
    pub fn new(components: Vec<ComplexSelector>) -> Self {
        Self { components }
    }

    /// A list is invisible only if every complex selector in it is.
    pub fn is_invisible(&self) -> bool {
        !self.components.is_empty()
            && self.components.iter().all(ComplexSelector::is_invisible)
    }

    /// Whether this list matches everything `other` matches.
    pub fn is_superselector(&self, other: &SelectorList) -> bool {
        superselector::list_is_superselector(&self.components, &other.components)
    }
}

pub(crate) use superselector::complex_is_parent_superselector;

impl fmt::Display for SimpleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimpleSelector::Type(name) => write!(f, "{name}"),
            SimpleSelector::Universal => write!(f, "*"),
            SimpleSelector::Class(name) => write!(f, ".{name}"),
            SimpleSelector::Id(name) => write!(f, "#{name}"),
            SimpleSelector::Attribute { name, value: None } => write!(f, "[{name}]"),
            SimpleSelector::Attribute {
                name,
                value: Some(value),
            } => write!(f, "[{name}={value}]"),
            SimpleSelector::Placeholder(placeholder) => write!(f, "%{}", placeholder.name),
            SimpleSelector::Pseudo(pseudo) => write!(f, "{pseudo}"),
        }
    }
}

impl fmt::Display for PseudoSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.is_class { ":" } else { "::" }, self.name)?;
        if self.argument.is_none() && self.selector.is_none() {
            return Ok(());
        }
        write!(f, "(")?;
        if let Some(argument) = &self.argument {
            write!(f, "{argument}")?;
            if self.selector.is_some() {
                write!(f, " ")?;
            }
        }
        if let Some(selector) = &self.selector {
            write!(f, "{selector}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for CompoundSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for simple in &self.components {
            write!(f, "{simple}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Combinator::Child => ">",
            Combinator::NextSibling => "+",
            Combinator::FollowingSibling => "~",
        })
    }
}

impl fmt::Display for ComplexSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match component {
                ComplexSelectorComponent::Compound(compound) => write!(f, "{compound}")?,
                ComplexSelectorComponent::Combinator(combinator) => write!(f, "{combinator}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, complex) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{complex}")?;
        }
        Ok(())
    }
}
