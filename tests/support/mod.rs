//! Shared selector builders for the integration tests.
//!
//! Tests describe selectors in a compact text form (classes, ids, types,
//! placeholders, universal, and the explicit combinators) and build pseudo
//! selectors programmatically; the shipped library never parses text.
#![allow(dead_code)]

use css_extend::selector::{
    Combinator, ComplexSelector, ComplexSelectorComponent, CompoundSelector, PseudoSelector,
    SelectorList, SimpleSelector,
};
use css_extend::{
    CssValue, ExtendRule, ExtensionStore, MediaContext, ModifiableSelector, Span,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build a selector list from text like `.a.b > .c, #d .e`.
pub fn sel(input: &str) -> SelectorList {
    let components = input
        .split(',')
        .map(|complex| parse_complex(complex.trim()))
        .collect();
    SelectorList::new(components)
}

/// The first complex selector of [`sel`].
pub fn complex(input: &str) -> ComplexSelector {
    sel(input)
        .components
        .into_iter()
        .next()
        .expect("non-empty selector")
}

/// The first simple selector of [`sel`].
pub fn simple(input: &str) -> SimpleSelector {
    match complex(input).components.into_iter().next() {
        Some(ComplexSelectorComponent::Compound(compound)) => compound
            .components
            .into_iter()
            .next()
            .expect("non-empty compound"),
        _ => panic!("expected a compound selector"),
    }
}

/// A `:not(...)`-style selector pseudo over parsed inner text.
pub fn selector_pseudo(name: &str, inner: &str) -> SimpleSelector {
    SimpleSelector::Pseudo(PseudoSelector::with_selector_list(name, sel(inner)))
}

fn parse_complex(input: &str) -> ComplexSelector {
    let components = input
        .split_whitespace()
        .map(|token| match token {
            ">" => ComplexSelectorComponent::Combinator(Combinator::Child),
            "+" => ComplexSelectorComponent::Combinator(Combinator::NextSibling),
            "~" => ComplexSelectorComponent::Combinator(Combinator::FollowingSibling),
            _ => ComplexSelectorComponent::Compound(parse_compound(token)),
        })
        .collect();
    ComplexSelector::new(components, false)
}

fn parse_compound(token: &str) -> CompoundSelector {
    let mut simples = Vec::new();
    let mut chars = token.chars().peekable();
    while let Some(&head) = chars.peek() {
        match head {
            '.' => {
                chars.next();
                simples.push(SimpleSelector::Class(ident(&mut chars)));
            }
            '#' => {
                chars.next();
                simples.push(SimpleSelector::Id(ident(&mut chars)));
            }
            '%' => {
                chars.next();
                simples.push(SimpleSelector::placeholder(ident(&mut chars)));
            }
            '*' => {
                chars.next();
                simples.push(SimpleSelector::Universal);
            }
            _ => simples.push(SimpleSelector::Type(ident(&mut chars))),
        }
    }
    CompoundSelector::new(simples)
}

fn ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(&head) = chars.peek() {
        if head.is_alphanumeric() || head == '-' || head == '_' {
            out.push(head);
            chars.next();
        } else {
            break;
        }
    }
    out
}

/// Register a style rule and return its cell.
pub fn add_rule(store: &mut ExtensionStore, selector: &str) -> ModifiableSelector {
    store
        .add_selector(sel(selector), Span::default(), None)
        .expect("selector registers")
}

/// Register a mandatory `@extend target` written in a rule whose selector is
/// `extender`.
pub fn add_extend(store: &mut ExtensionStore, extender: &str, target: &str) {
    add_extend_with(store, extender, target, false, None)
}

pub fn add_extend_with(
    store: &mut ExtensionStore,
    extender: &str,
    target: &str,
    optional: bool,
    media_context: Option<&MediaContext>,
) {
    store
        .add_extension(
            &CssValue::new(sel(extender), Span::default()),
            &simple(target),
            &ExtendRule {
                span: Span::default(),
                is_optional: optional,
            },
            media_context,
        )
        .expect("extension registers")
}

/// Whether `simple` occurs anywhere in `list`, including inside selector
/// pseudos.
pub fn list_contains(list: &SelectorList, simple: &SimpleSelector) -> bool {
    list.components.iter().any(|complex| {
        complex.components.iter().any(|component| {
            component.as_compound().is_some_and(|compound| {
                compound.components.iter().any(|candidate| {
                    if candidate == simple {
                        return true;
                    }
                    match candidate {
                        SimpleSelector::Pseudo(pseudo) => pseudo
                            .selector
                            .as_ref()
                            .is_some_and(|inner| list_contains(inner, simple)),
                        _ => false,
                    }
                })
            })
        })
    })
}

/// Normalize a selector list into a set-like form: compound order and list
/// order are both ignored.
pub fn normalized(list: &SelectorList) -> std::collections::BTreeSet<Vec<String>> {
    list.components
        .iter()
        .map(|complex| {
            complex
                .components
                .iter()
                .map(|component| match component {
                    ComplexSelectorComponent::Compound(compound) => {
                        let mut simples: Vec<String> =
                            compound.components.iter().map(ToString::to_string).collect();
                        simples.sort();
                        simples.concat()
                    }
                    ComplexSelectorComponent::Combinator(combinator) => combinator.to_string(),
                })
                .collect()
        })
        .collect()
}
