//! The superselector relation.
//!
//! `A` is a superselector of `B` when every element matched by `B` is also
//! matched by `A`. The relation drives trimming: a generated selector that is
//! covered by an equally-or-more-specific survivor can be dropped without
//! changing what the stylesheet matches.

use super::{
    Combinator, ComplexSelector, ComplexSelectorComponent, CompoundSelector, PseudoSelector,
    SelectorList, SimpleSelector,
};

/// Selector pseudos that match whatever their inner selector matches, so a
/// simple selector appearing in every inner complex is implied by them.
const SUBSELECTOR_PSEUDOS: [&str; 5] = ["is", "matches", "any", "nth-child", "nth-last-child"];

pub(crate) fn list_is_superselector(list1: &[ComplexSelector], list2: &[ComplexSelector]) -> bool {
    list2.iter().all(|complex2| {
        list1
            .iter()
            .any(|complex1| complex_is_superselector(&complex1.components, &complex2.components))
    })
}

/// Whether `complex1` matches everything `complex2` matches.
///
/// Walks both component sequences left to right, consuming the stretch of
/// `complex2` covered by each compound of `complex1` and reconciling the
/// combinators in between.
pub(crate) fn complex_is_superselector(
    complex1: &[ComplexSelectorComponent],
    complex2: &[ComplexSelectorComponent],
) -> bool {
    // Leading or trailing combinators disqualify both operands.
    if matches!(complex1.last(), Some(c) if c.is_combinator()) {
        return false;
    }
    if matches!(complex2.last(), Some(c) if c.is_combinator()) {
        return false;
    }

    let mut i1 = 0;
    let mut i2 = 0;
    loop {
        let remaining1 = complex1.len() - i1;
        let remaining2 = complex2.len() - i2;
        if remaining1 == 0 || remaining2 == 0 {
            return false;
        }

        // A more complex selector is never a superselector of a less complex
        // one.
        if remaining1 > remaining2 {
            return false;
        }

        let compound1 = match &complex1[i1] {
            ComplexSelectorComponent::Compound(compound) => compound,
            ComplexSelectorComponent::Combinator(_) => return false,
        };
        if complex2[i2].is_combinator() {
            return false;
        }

        if remaining1 == 1 {
            let last2 = match complex2.last() {
                Some(ComplexSelectorComponent::Compound(compound)) => compound,
                _ => return false,
            };
            return compound_is_superselector(
                compound1,
                last2,
                Some(&complex2[i2..complex2.len() - 1]),
            );
        }

        // Find the first position in `complex2` after which `compound1` has
        // covered a prefix. We stop before consuming all of `complex2`
        // because the rest of `complex1` still needs something to match.
        let mut after_superselector = i2 + 1;
        while after_superselector < complex2.len() {
            if let ComplexSelectorComponent::Compound(compound2) =
                &complex2[after_superselector - 1]
            {
                if compound_is_superselector(
                    compound1,
                    compound2,
                    Some(&complex2[i2..after_superselector.saturating_sub(1)]),
                ) {
                    break;
                }
            }
            after_superselector += 1;
        }
        if after_superselector == complex2.len() {
            return false;
        }

        let component1 = &complex1[i1 + 1];
        let component2 = &complex2[after_superselector];
        match (component1, component2) {
            (
                ComplexSelectorComponent::Combinator(combinator1),
                ComplexSelectorComponent::Combinator(combinator2),
            ) => {
                // `~` covers both `+` and `~`; everything else must match
                // exactly.
                if *combinator1 == Combinator::FollowingSibling {
                    if *combinator2 == Combinator::Child {
                        return false;
                    }
                } else if combinator2 != combinator1 {
                    return false;
                }

                // `.foo > .baz` is not a superselector of `.foo > .bar > .baz`
                // even though `.baz` covers `.bar > .baz`.
                if remaining1 == 3 && remaining2 > 3 {
                    return false;
                }

                i1 += 2;
                i2 = after_superselector + 1;
            }
            (_, ComplexSelectorComponent::Combinator(combinator2)) => {
                if *combinator2 != Combinator::Child {
                    return false;
                }
                i1 += 1;
                i2 = after_superselector + 1;
            }
            (ComplexSelectorComponent::Combinator(_), _) => return false,
            _ => {
                i1 += 1;
                i2 = after_superselector;
            }
        }
    }
}

/// Prepending the same parent selector to both operands preserves this
/// relation; used when weaving parent sequences.
pub(crate) fn complex_is_parent_superselector(
    complex1: &[ComplexSelectorComponent],
    complex2: &[ComplexSelectorComponent],
) -> bool {
    if matches!(complex1.first(), Some(c) if c.is_combinator()) {
        return false;
    }
    if matches!(complex2.first(), Some(c) if c.is_combinator()) {
        return false;
    }
    if complex1.len() > complex2.len() {
        return false;
    }

    // Add a bogus trailing compound so relations that only hold for parent
    // prefixes (which end in a combinator position) can be tested with the
    // ordinary walk.
    let base = ComplexSelectorComponent::Compound(CompoundSelector::new(vec![
        SimpleSelector::placeholder("<temp>"),
    ]));
    let mut with_base1 = complex1.to_vec();
    with_base1.push(base.clone());
    let mut with_base2 = complex2.to_vec();
    with_base2.push(base);
    complex_is_superselector(&with_base1, &with_base2)
}

/// Whether `compound1` matches everything `compound2` matches. `parents` are
/// the components of `compound2`'s complex that precede it, visible to
/// selector pseudos like `:is` whose inner complexes may reach above the
/// compound itself.
pub(crate) fn compound_is_superselector(
    compound1: &CompoundSelector,
    compound2: &CompoundSelector,
    parents: Option<&[ComplexSelectorComponent]>,
) -> bool {
    for simple1 in &compound1.components {
        if let SimpleSelector::Pseudo(pseudo) = simple1 {
            if pseudo.selector.is_some() {
                if !selector_pseudo_is_superselector(pseudo, compound2, parents) {
                    return false;
                }
                continue;
            }
        }
        if !simple_is_superselector_of_compound(simple1, compound2) {
            return false;
        }
    }

    // A pseudo-element in `compound2` must be mirrored in `compound1`.
    for simple2 in &compound2.components {
        if let SimpleSelector::Pseudo(pseudo) = simple2 {
            if pseudo.is_element() && !compound1.components.contains(simple2) {
                return false;
            }
        }
    }
    true
}

/// Whether `simple` is implied by some selector in `compound`, either by
/// value equality or through a subselector pseudo whose every inner complex
/// carries it.
fn simple_is_superselector_of_compound(
    simple: &SimpleSelector,
    compound: &CompoundSelector,
) -> bool {
    compound.components.iter().any(|their_simple| {
        if simple == their_simple {
            return true;
        }
        let SimpleSelector::Pseudo(pseudo) = their_simple else {
            return false;
        };
        let Some(selector) = &pseudo.selector else {
            return false;
        };
        if !SUBSELECTOR_PSEUDOS.contains(&pseudo.normalized_name()) {
            return false;
        }
        selector.components.iter().all(|complex| {
            if complex.components.len() != 1 {
                return false;
            }
            complex.components[0]
                .as_compound()
                .is_some_and(|compound| compound.components.contains(simple))
        })
    })
}

/// The superselector cases for a selector pseudo in `compound1`, keyed by
/// its normalized name.
fn selector_pseudo_is_superselector(
    pseudo1: &PseudoSelector,
    compound2: &CompoundSelector,
    parents: Option<&[ComplexSelectorComponent]>,
) -> bool {
    let Some(selector1) = &pseudo1.selector else {
        return false;
    };

    match pseudo1.normalized_name() {
        "is" | "matches" | "any" | "where" => {
            selector_pseudo_args(compound2, pseudo1, true)
                .any(|selector2| selector1.is_superselector(selector2))
                || selector1.components.iter().any(|complex1| {
                    let mut complex2 = parents.map(<[_]>::to_vec).unwrap_or_default();
                    complex2.push(ComplexSelectorComponent::Compound(compound2.clone()));
                    complex_is_superselector(&complex1.components, &complex2)
                })
        }
        "has" | "host" | "host-context" => selector_pseudo_args(compound2, pseudo1, true)
            .any(|selector2| selector1.is_superselector(selector2)),
        "slotted" => selector_pseudo_args(compound2, pseudo1, false)
            .any(|selector2| selector1.is_superselector(selector2)),
        "not" => selector1.components.iter().all(|complex| {
            compound2.components.iter().any(|simple2| match simple2 {
                SimpleSelector::Type(_) | SimpleSelector::Id(_) => {
                    complex.components.last().is_some_and(|component| {
                        component.as_compound().is_some_and(|compound| {
                            compound.components.iter().any(|simple1| {
                                std::mem::discriminant(simple1) == std::mem::discriminant(simple2)
                                    && simple1 != simple2
                            })
                        })
                    })
                }
                SimpleSelector::Pseudo(pseudo2) => {
                    pseudo2.name == pseudo1.name
                        && pseudo2.selector.as_ref().is_some_and(|selector2| {
                            list_is_superselector(
                                &selector2.components,
                                std::slice::from_ref(complex),
                            )
                        })
                }
                _ => false,
            })
        }),
        "current" => selector_pseudo_args(compound2, pseudo1, true)
            .any(|selector2| selector1 == selector2),
        "nth-child" | "nth-last-child" => compound2.components.iter().any(|simple2| {
            let SimpleSelector::Pseudo(pseudo2) = simple2 else {
                return false;
            };
            pseudo2.name == pseudo1.name
                && pseudo2.argument == pseudo1.argument
                && pseudo2
                    .selector
                    .as_ref()
                    .is_some_and(|selector2| selector1.is_superselector(selector2))
        }),
        // Unknown selector pseudos add semantics we can't see through.
        _ => false,
    }
}

/// Inner selector lists of pseudos in `compound` that share `pseudo1`'s name
/// and class-ness.
fn selector_pseudo_args<'a>(
    compound: &'a CompoundSelector,
    pseudo1: &'a PseudoSelector,
    is_class: bool,
) -> impl Iterator<Item = &'a SelectorList> {
    compound.components.iter().filter_map(move |simple| {
        let SimpleSelector::Pseudo(pseudo) = simple else {
            return None;
        };
        if pseudo.is_class != is_class || pseudo.name != pseudo1.name {
            return None;
        }
        pseudo.selector.as_ref()
    })
}
