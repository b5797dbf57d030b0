//! Scalar selector specificity bounds.
//!
//! The cascade triple is collapsed into one saturating integer with base
//! 1000: ids weigh 1000², classes/attributes/placeholders/pseudo-classes
//! 1000, type selectors and pseudo-elements 1, the universal selector 0.
//! Selector pseudos (`:not`, `:is`, ...) can match through any of their
//! inner complexes, so their bounds are taken over the inner list.

use super::{ComplexSelector, CompoundSelector, PseudoSelector, SimpleSelector};

const BASE: i32 = 1000;

impl SimpleSelector {
    /// Lower bound on this selector's specificity.
    pub fn min_specificity(&self) -> i32 {
        match self {
            SimpleSelector::Universal => 0,
            SimpleSelector::Type(_) => 1,
            SimpleSelector::Id(_) => BASE * BASE,
            SimpleSelector::Pseudo(pseudo) => pseudo_specificity(pseudo, false),
            _ => BASE,
        }
    }

    /// Upper bound on this selector's specificity.
    pub fn max_specificity(&self) -> i32 {
        match self {
            SimpleSelector::Universal => 0,
            SimpleSelector::Type(_) => 1,
            SimpleSelector::Id(_) => BASE * BASE,
            SimpleSelector::Pseudo(pseudo) => pseudo_specificity(pseudo, true),
            _ => BASE,
        }
    }
}

fn pseudo_specificity(pseudo: &PseudoSelector, max: bool) -> i32 {
    if pseudo.is_element() {
        return 1;
    }
    match &pseudo.selector {
        None => BASE,
        // The pseudo matches whenever one of its inner complexes does, so
        // its weight is bounded by the heaviest of them.
        Some(selector) => selector
            .components
            .iter()
            .map(|complex| {
                if max {
                    complex.max_specificity()
                } else {
                    complex.min_specificity()
                }
            })
            .max()
            .unwrap_or(0),
    }
}

pub(super) fn compound_specificity(compound: &CompoundSelector, max: bool) -> i32 {
    compound.components.iter().fold(0i32, |sum, simple| {
        sum.saturating_add(if max {
            simple.max_specificity()
        } else {
            simple.min_specificity()
        })
    })
}

pub(super) fn complex_specificity(complex: &ComplexSelector, max: bool) -> i32 {
    complex
        .components
        .iter()
        .filter_map(|component| component.as_compound())
        .fold(0i32, |sum, compound| {
            sum.saturating_add(compound_specificity(compound, max))
        })
}
