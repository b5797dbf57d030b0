//! Set-theoretic combination of selectors: unification of compounds,
//! weaving of parent sequences, and Cartesian path expansion.
//!
//! These primitives answer "what selector matches everything that both `A`
//! and `B` match" at each level of the selector grammar. Weaving is the
//! complex-selector case: the parents of the two operands are interleaved in
//! every order consistent with their combinators, with shared ancestry
//! collapsed through a longest-common-subsequence pass.

use super::{
    complex_is_parent_superselector, Combinator, ComplexSelectorComponent, CompoundSelector,
    SimpleSelector,
};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

type Components = Vec<ComplexSelectorComponent>;

impl SimpleSelector {
    /// Add this selector's constraint to `compound`, returning the combined
    /// run of simples or `None` when the two can never match together.
    pub fn unify(&self, compound: &[SimpleSelector]) -> Option<Vec<SimpleSelector>> {
        match self {
            SimpleSelector::Type(_) | SimpleSelector::Universal => {
                unify_type_or_universal(self, compound)
            }
            SimpleSelector::Id(_) => {
                // Two different ids can never match the same element.
                if compound
                    .iter()
                    .any(|simple| matches!(simple, SimpleSelector::Id(_)) && simple != self)
                {
                    return None;
                }
                unify_default(self, compound, false)
            }
            SimpleSelector::Pseudo(pseudo) => unify_default(self, compound, pseudo.is_element()),
            _ => unify_default(self, compound, false),
        }
    }
}

/// Type and universal selectors must stay in the leading position of a
/// compound, so they unify against the head.
fn unify_type_or_universal(
    this: &SimpleSelector,
    compound: &[SimpleSelector],
) -> Option<Vec<SimpleSelector>> {
    match compound.first() {
        Some(first @ (SimpleSelector::Universal | SimpleSelector::Type(_))) => {
            let unified = unify_universal_and_type(this, first)?;
            let mut result = Vec::with_capacity(compound.len());
            result.push(unified);
            result.extend(compound[1..].iter().cloned());
            Some(result)
        }
        _ => {
            if matches!(this, SimpleSelector::Universal) {
                // A bare universal adds no constraint.
                return Some(compound.to_vec());
            }
            let mut result = Vec::with_capacity(compound.len() + 1);
            result.push(this.clone());
            result.extend(compound.iter().cloned());
            Some(result)
        }
    }
}

fn unify_universal_and_type(
    selector1: &SimpleSelector,
    selector2: &SimpleSelector,
) -> Option<SimpleSelector> {
    match (selector1, selector2) {
        (SimpleSelector::Universal, other) | (other, SimpleSelector::Universal) => {
            Some(other.clone())
        }
        (SimpleSelector::Type(name1), SimpleSelector::Type(name2)) => {
            (name1 == name2).then(|| selector1.clone())
        }
        _ => None,
    }
}

/// Insert `this` into `compound`, keeping pseudo selectors last. A compound
/// may carry at most one pseudo-element; colliding ones fail to unify.
fn unify_default(
    this: &SimpleSelector,
    compound: &[SimpleSelector],
    this_is_element: bool,
) -> Option<Vec<SimpleSelector>> {
    if compound.contains(this) {
        return Some(compound.to_vec());
    }
    let this_is_pseudo = matches!(this, SimpleSelector::Pseudo(_));
    let mut result = Vec::with_capacity(compound.len() + 1);
    let mut added_this = false;
    for simple in compound {
        if let SimpleSelector::Pseudo(pseudo) = simple {
            // Pseudo selectors come last; a pseudo itself only needs to stay
            // ahead of pseudo-elements.
            if !added_this && (!this_is_pseudo || pseudo.is_element()) {
                if this_is_element && pseudo.is_element() {
                    return None;
                }
                result.push(this.clone());
                added_this = true;
            } else if this_is_element && pseudo.is_element() {
                return None;
            }
        }
        result.push(simple.clone());
    }
    if !added_this {
        result.push(this.clone());
    }
    Some(result)
}

/// Unify two compounds, folding each simple of `compound1` into `compound2`.
pub fn unify_compound(
    compound1: &[SimpleSelector],
    compound2: &[SimpleSelector],
) -> Option<CompoundSelector> {
    let mut result = compound2.to_vec();
    for simple in compound1 {
        result = simple.unify(&result)?;
    }
    Some(CompoundSelector::new(result))
}

/// Unify a set of complex selectors: their trailing compounds are unified
/// into one base, and the remaining parent sequences are woven above it.
pub fn unify_complex(complexes: Vec<Components>) -> Option<Vec<Components>> {
    if complexes.len() == 1 {
        return Some(complexes);
    }

    let mut unified_base: Option<Vec<SimpleSelector>> = None;
    for complex in &complexes {
        let base = complex.last()?.as_compound()?;
        match &mut unified_base {
            None => unified_base = Some(base.components.clone()),
            Some(base_components) => {
                for simple in &base.components {
                    let next = simple.unify(base_components)?;
                    *base_components = next;
                }
            }
        }
    }

    let mut without_bases: Vec<Components> = complexes
        .iter()
        .map(|complex| complex[..complex.len() - 1].to_vec())
        .collect();
    without_bases
        .last_mut()?
        .push(CompoundSelector::new(unified_base?).into());
    Some(weave(without_bases))
}

/// Expand `complexes` into every complex selector that matches an element
/// matched by all of them, respecting the order and combinators of each.
pub fn weave(complexes: Vec<Components>) -> Vec<Components> {
    let mut iter = complexes.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };
    let mut prefixes: Vec<Components> = vec![first];

    for complex in iter {
        let Some(target) = complex.last().cloned() else {
            continue;
        };
        if complex.len() == 1 {
            for prefix in &mut prefixes {
                prefix.push(target.clone());
            }
            continue;
        }

        let parents = &complex[..complex.len() - 1];
        let mut new_prefixes = Vec::new();
        for prefix in &prefixes {
            let Some(parent_prefixes) = weave_parents(prefix.clone(), parents.to_vec()) else {
                continue;
            };
            for mut parent_prefix in parent_prefixes {
                parent_prefix.push(target.clone());
                new_prefixes.push(parent_prefix);
            }
        }
        prefixes = new_prefixes;
    }

    prefixes
}

/// Interleave two parent sequences in every order consistent with their
/// combinators, merging shared ancestry so `.a .b` woven with `.a .c`
/// produces `.a .b .c` and `.a .c .b` rather than four candidates.
fn weave_parents(parents1: Components, parents2: Components) -> Option<Vec<Components>> {
    let mut queue1: VecDeque<ComplexSelectorComponent> = parents1.into();
    let mut queue2: VecDeque<ComplexSelectorComponent> = parents2.into();

    let initial_combinators = merge_initial_combinators(&mut queue1, &mut queue2)?;
    let final_combinators = merge_final_combinators(&mut queue1, &mut queue2)?;

    // Make sure there's at most one `:root` in the output.
    match (first_if_root(&mut queue1), first_if_root(&mut queue2)) {
        (Some(root1), Some(root2)) => {
            let root = unify_compound(&root1.components, &root2.components)?;
            queue1.push_front(root.clone().into());
            queue2.push_front(root.into());
        }
        (Some(root1), None) => queue2.push_front(root1.into()),
        (None, Some(root2)) => queue1.push_front(root2.into()),
        (None, None) => {}
    }

    let mut groups1 = group_selectors(queue1);
    let mut groups2 = group_selectors(queue2);
    let lcs = longest_common_subsequence(
        groups2.make_contiguous(),
        groups1.make_contiguous(),
        |group1, group2| {
            if group1 == group2 {
                return Some(group1.clone());
            }
            if group1.first().map_or(true, ComplexSelectorComponent::is_combinator)
                || group2.first().map_or(true, ComplexSelectorComponent::is_combinator)
            {
                return None;
            }
            if complex_is_parent_superselector(group1, group2) {
                return Some(group2.clone());
            }
            if complex_is_parent_superselector(group2, group1) {
                return Some(group1.clone());
            }
            if !must_unify(group1, group2) {
                return None;
            }
            let unified = unify_complex(vec![group1.clone(), group2.clone()])?;
            if unified.len() > 1 {
                return None;
            }
            unified.into_iter().next()
        },
    );

    let mut choices: Vec<Vec<Components>> = vec![vec![initial_combinators
        .into_iter()
        .map(ComplexSelectorComponent::from)
        .collect()]];

    for group in lcs {
        let chunked = chunks(&mut groups1, &mut groups2, |queue| {
            queue
                .front()
                .map_or(true, |front| complex_is_parent_superselector(front, &group))
        });
        choices.push(
            chunked
                .into_iter()
                .map(|chunk| chunk.into_iter().flatten().collect())
                .collect(),
        );
        choices.push(vec![group]);
        groups1.pop_front();
        groups2.pop_front();
    }

    let chunked = chunks(&mut groups1, &mut groups2, VecDeque::is_empty);
    choices.push(
        chunked
            .into_iter()
            .map(|chunk| chunk.into_iter().flatten().collect())
            .collect(),
    );
    choices.extend(final_combinators);

    choices.retain(|choice| !choice.is_empty());
    Some(
        paths(choices)
            .into_iter()
            .map(|path| path.into_iter().flatten().collect())
            .collect(),
    )
}

/// Strip leading combinators from both queues. One run must be a
/// subsequence of the other; the longer run wins.
fn merge_initial_combinators(
    queue1: &mut VecDeque<ComplexSelectorComponent>,
    queue2: &mut VecDeque<ComplexSelectorComponent>,
) -> Option<Vec<Combinator>> {
    let mut combinators1 = Vec::new();
    while let Some(ComplexSelectorComponent::Combinator(combinator)) = queue1.front() {
        combinators1.push(*combinator);
        queue1.pop_front();
    }
    let mut combinators2 = Vec::new();
    while let Some(ComplexSelectorComponent::Combinator(combinator)) = queue2.front() {
        combinators2.push(*combinator);
        queue2.pop_front();
    }

    let lcs = longest_common_subsequence(&combinators1, &combinators2, |a, b| {
        (a == b).then_some(*a)
    });
    if lcs == combinators1 {
        Some(combinators2)
    } else if lcs == combinators2 {
        Some(combinators1)
    } else {
        None
    }
}

/// Merge trailing `<compound> <combinator>` runs of both queues into a
/// front-ordered sequence of choices. Sibling combinators admit several
/// orderings; `>` under a sibling run is deferred back onto its queue.
fn merge_final_combinators(
    queue1: &mut VecDeque<ComplexSelectorComponent>,
    queue2: &mut VecDeque<ComplexSelectorComponent>,
) -> Option<VecDeque<Vec<Components>>> {
    use Combinator::{Child, FollowingSibling, NextSibling};

    let mut result: VecDeque<Vec<Components>> = VecDeque::new();
    loop {
        let tail1 = matches!(queue1.back(), Some(c) if c.is_combinator());
        let tail2 = matches!(queue2.back(), Some(c) if c.is_combinator());
        if !tail1 && !tail2 {
            return Some(result);
        }

        let mut combinators1 = Vec::new();
        while let Some(ComplexSelectorComponent::Combinator(combinator)) = queue1.back() {
            combinators1.push(*combinator);
            queue1.pop_back();
        }
        let mut combinators2 = Vec::new();
        while let Some(ComplexSelectorComponent::Combinator(combinator)) = queue2.back() {
            combinators2.push(*combinator);
            queue2.pop_back();
        }

        if combinators1.len() > 1 || combinators2.len() > 1 {
            // Multiple trailing combinators only merge when one run is a
            // supersequence of the other; anything else gives up.
            let lcs = longest_common_subsequence(&combinators1, &combinators2, |a, b| {
                (a == b).then_some(*a)
            });
            if lcs == combinators1 {
                let mut choice: Components = queue2.iter().cloned().collect();
                choice.extend(
                    combinators2
                        .iter()
                        .rev()
                        .map(|&c| ComplexSelectorComponent::from(c)),
                );
                result.push_front(vec![choice]);
            } else if lcs == combinators2 {
                let mut choice: Components = queue1.iter().cloned().collect();
                choice.extend(
                    combinators1
                        .iter()
                        .rev()
                        .map(|&c| ComplexSelectorComponent::from(c)),
                );
                result.push_front(vec![choice]);
            } else {
                return None;
            }
            queue1.clear();
            queue2.clear();
            return Some(result);
        }

        match (combinators1.first().copied(), combinators2.first().copied()) {
            (Some(combinator1), Some(combinator2)) => {
                let compound1 = match queue1.pop_back() {
                    Some(ComplexSelectorComponent::Compound(compound)) => compound,
                    _ => return None,
                };
                let compound2 = match queue2.pop_back() {
                    Some(ComplexSelectorComponent::Compound(compound)) => compound,
                    _ => return None,
                };

                match (combinator1, combinator2) {
                    (FollowingSibling, FollowingSibling) => {
                        if compound1.is_superselector(&compound2) {
                            result.push_front(vec![vec![
                                compound2.into(),
                                FollowingSibling.into(),
                            ]]);
                        } else if compound2.is_superselector(&compound1) {
                            result.push_front(vec![vec![
                                compound1.into(),
                                FollowingSibling.into(),
                            ]]);
                        } else {
                            let mut choices = vec![
                                vec![
                                    compound1.clone().into(),
                                    FollowingSibling.into(),
                                    compound2.clone().into(),
                                    FollowingSibling.into(),
                                ],
                                vec![
                                    compound2.clone().into(),
                                    FollowingSibling.into(),
                                    compound1.clone().into(),
                                    FollowingSibling.into(),
                                ],
                            ];
                            if let Some(unified) =
                                unify_compound(&compound1.components, &compound2.components)
                            {
                                choices.push(vec![unified.into(), FollowingSibling.into()]);
                            }
                            result.push_front(choices);
                        }
                    }
                    (FollowingSibling, NextSibling) | (NextSibling, FollowingSibling) => {
                        let (following, next) = if combinator1 == FollowingSibling {
                            (compound1.clone(), compound2.clone())
                        } else {
                            (compound2.clone(), compound1.clone())
                        };
                        if following.is_superselector(&next) {
                            result.push_front(vec![vec![next.into(), NextSibling.into()]]);
                        } else {
                            let mut choices = vec![vec![
                                following.into(),
                                FollowingSibling.into(),
                                next.into(),
                                NextSibling.into(),
                            ]];
                            if let Some(unified) =
                                unify_compound(&compound1.components, &compound2.components)
                            {
                                choices.push(vec![unified.into(), NextSibling.into()]);
                            }
                            result.push_front(choices);
                        }
                    }
                    (Child, NextSibling | FollowingSibling) => {
                        result.push_front(vec![vec![compound2.into(), combinator2.into()]]);
                        queue1.push_back(compound1.into());
                        queue1.push_back(Child.into());
                    }
                    (NextSibling | FollowingSibling, Child) => {
                        result.push_front(vec![vec![compound1.into(), combinator1.into()]]);
                        queue2.push_back(compound2.into());
                        queue2.push_back(Child.into());
                    }
                    _ if combinator1 == combinator2 => {
                        let unified =
                            unify_compound(&compound1.components, &compound2.components)?;
                        result.push_front(vec![vec![unified.into(), combinator1.into()]]);
                    }
                    _ => return None,
                }
            }
            (Some(combinator1), None) => {
                if combinator1 == Child {
                    if let (
                        Some(ComplexSelectorComponent::Compound(last2)),
                        Some(ComplexSelectorComponent::Compound(last1)),
                    ) = (queue2.back(), queue1.back())
                    {
                        if last2.is_superselector(last1) {
                            queue2.pop_back();
                        }
                    }
                }
                let last1 = queue1.pop_back()?;
                result.push_front(vec![vec![last1, combinator1.into()]]);
            }
            (None, Some(combinator2)) => {
                if combinator2 == Child {
                    if let (
                        Some(ComplexSelectorComponent::Compound(last1)),
                        Some(ComplexSelectorComponent::Compound(last2)),
                    ) = (queue1.back(), queue2.back())
                    {
                        if last1.is_superselector(last2) {
                            queue1.pop_back();
                        }
                    }
                }
                let last2 = queue2.pop_back()?;
                result.push_front(vec![vec![last2, combinator2.into()]]);
            }
            (None, None) => return Some(result),
        }
    }
}

/// `:root` can only appear once in a woven selector; pop it off the front of
/// a queue when present.
fn first_if_root(queue: &mut VecDeque<ComplexSelectorComponent>) -> Option<CompoundSelector> {
    let compound = queue.front()?.as_compound()?;
    if !compound.components.iter().any(|simple| {
        matches!(simple, SimpleSelector::Pseudo(pseudo)
            if pseudo.is_class && pseudo.normalized_name() == "root")
    }) {
        return None;
    }
    let compound = compound.clone();
    queue.pop_front();
    Some(compound)
}

/// Split a component sequence into groups at descendant boundaries: each
/// group is a run of compounds joined by explicit combinators.
fn group_selectors(
    complex: impl IntoIterator<Item = ComplexSelectorComponent>,
) -> VecDeque<Components> {
    let mut groups: VecDeque<Components> = VecDeque::new();
    for component in complex {
        let start_new_group = match groups.back() {
            None => true,
            Some(group) => {
                !group.last().is_some_and(ComplexSelectorComponent::is_combinator)
                    && !component.is_combinator()
            }
        };
        if start_new_group {
            groups.push_back(vec![component]);
        } else if let Some(group) = groups.back_mut() {
            group.push(component);
        }
    }
    groups
}

/// Two groups must unify rather than interleave when they share a simple
/// selector that is unique within a compound (an id or a pseudo-element).
fn must_unify(complex1: &[ComplexSelectorComponent], complex2: &[ComplexSelectorComponent]) -> bool {
    let unique_selectors: FxHashSet<&SimpleSelector> = complex1
        .iter()
        .filter_map(ComplexSelectorComponent::as_compound)
        .flat_map(|compound| compound.components.iter())
        .filter(|simple| is_unique(simple))
        .collect();
    if unique_selectors.is_empty() {
        return false;
    }

    complex2
        .iter()
        .filter_map(ComplexSelectorComponent::as_compound)
        .any(|compound| {
            compound
                .components
                .iter()
                .any(|simple| is_unique(simple) && unique_selectors.contains(simple))
        })
}

fn is_unique(simple: &SimpleSelector) -> bool {
    matches!(simple, SimpleSelector::Id(_))
        || matches!(simple, SimpleSelector::Pseudo(pseudo) if pseudo.is_element())
}

/// Pull a chunk off the front of each queue until `done`, then emit both
/// interleavings of the two chunks.
fn chunks<T: Clone>(
    queue1: &mut VecDeque<T>,
    queue2: &mut VecDeque<T>,
    done: impl Fn(&VecDeque<T>) -> bool,
) -> Vec<Vec<T>> {
    let mut chunk1 = Vec::new();
    while !done(queue1) {
        match queue1.pop_front() {
            Some(element) => chunk1.push(element),
            None => break,
        }
    }
    let mut chunk2 = Vec::new();
    while !done(queue2) {
        match queue2.pop_front() {
            Some(element) => chunk2.push(element),
            None => break,
        }
    }

    match (chunk1.is_empty(), chunk2.is_empty()) {
        (true, true) => Vec::new(),
        (true, false) => vec![chunk2],
        (false, true) => vec![chunk1],
        (false, false) => {
            let mut order1 = chunk1.clone();
            order1.extend(chunk2.iter().cloned());
            let mut order2 = chunk2;
            order2.extend(chunk1);
            vec![order1, order2]
        }
    }
}

/// Cartesian product of a sequence of choices, preserving choice order. The
/// first path always picks the first option of every choice.
pub fn paths<T: Clone>(choices: impl IntoIterator<Item = Vec<T>>) -> Vec<Vec<T>> {
    let mut result: Vec<Vec<T>> = vec![Vec::new()];
    for choice in choices {
        let mut next = Vec::with_capacity(result.len() * choice.len().max(1));
        for option in &choice {
            for path in &result {
                let mut extended = path.clone();
                extended.push(option.clone());
                next.push(extended);
            }
        }
        result = next;
    }
    result
}

/// Longest common subsequence under a caller-supplied merge: `select`
/// returns the merged element when two elements can pair up.
pub(crate) fn longest_common_subsequence<T: Clone>(
    list1: &[T],
    list2: &[T],
    select: impl Fn(&T, &T) -> Option<T>,
) -> Vec<T> {
    let mut lengths = vec![vec![0usize; list2.len() + 1]; list1.len() + 1];
    let mut selections: Vec<Vec<Option<T>>> = vec![vec![None; list2.len()]; list1.len()];

    for i in 0..list1.len() {
        for j in 0..list2.len() {
            let selection = select(&list1[i], &list2[j]);
            lengths[i + 1][j + 1] = match &selection {
                Some(_) => lengths[i][j] + 1,
                None => lengths[i + 1][j].max(lengths[i][j + 1]),
            };
            selections[i][j] = selection;
        }
    }

    let mut backtracked = Vec::new();
    let mut i = list1.len() as isize - 1;
    let mut j = list2.len() as isize - 1;
    while i >= 0 && j >= 0 {
        if let Some(selection) = &selections[i as usize][j as usize] {
            backtracked.push(selection.clone());
            i -= 1;
            j -= 1;
        } else if lengths[(i + 1) as usize][j as usize] > lengths[i as usize][(j + 1) as usize] {
            j -= 1;
        } else {
            i -= 1;
        }
    }
    backtracked.reverse();
    backtracked
}
