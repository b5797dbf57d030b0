//! Store-level properties that must hold across arbitrary call sequences:
//! index consistency, no-op guarantees, order independence, clone isolation,
//! and module-boundary privacy.

mod support;

use css_extend::{extend, ExtensionStore, Span};
use support::{
    add_extend, add_extend_with, add_rule, init_logger, list_contains, normalized, sel, simple,
};

#[test]
fn every_indexed_simple_occurs_in_its_cells() {
    init_logger();
    let mut store = ExtensionStore::new();
    add_rule(&mut store, ".c");
    add_extend(&mut store, ".c", ".a");
    add_rule(&mut store, ".x.y.a");
    add_extend(&mut store, ".x.y.a", ".b");
    add_rule(&mut store, ".z.b");
    add_extend(&mut store, ".z.b", ".c");

    let simples: Vec<_> = store.simple_selectors().cloned().collect();
    assert!(!simples.is_empty());
    for simple in &simples {
        for cell in store.selectors_containing(simple) {
            assert!(
                list_contains(&cell.value(), simple),
                "{} missing from `{}`",
                simple,
                cell.value()
            );
        }
    }
}

#[test]
fn optional_extension_without_target_is_a_noop() {
    init_logger();
    let mut store = ExtensionStore::new();
    let rule = add_rule(&mut store, ".a");
    add_extend_with(&mut store, ".q", ".z", true, None);
    assert_eq!(rule.value().to_string(), ".a");
    // And it never surfaces as a mandatory extension either.
    assert_eq!(store.extensions_where_target(|_| true).count(), 0);
}

#[test]
fn extension_order_within_a_compound_is_immaterial() {
    init_logger();
    let mut forward = ExtensionStore::new();
    let forward_rule = add_rule(&mut forward, ".x.y");
    add_extend(&mut forward, ".a", ".x");
    add_extend(&mut forward, ".b", ".y");

    let mut reverse = ExtensionStore::new();
    let reverse_rule = add_rule(&mut reverse, ".x.y");
    add_extend(&mut reverse, ".b", ".y");
    add_extend(&mut reverse, ".a", ".x");

    assert_eq!(
        normalized(&forward_rule.value()),
        normalized(&reverse_rule.value())
    );
}

#[test]
fn stateless_extend_is_idempotent() {
    init_logger();
    let first = extend(sel(".a .b"), &sel(".x.y"), &sel(".b"), Span::default())
        .expect("extend succeeds");
    let second = extend(sel(".a .b"), &sel(".x.y"), &sel(".b"), Span::default())
        .expect("extend succeeds");
    assert_eq!(first, second);
}

#[test]
fn originals_survive_every_extension() {
    init_logger();
    let mut store = ExtensionStore::new();
    let rule = add_rule(&mut store, ".a.b");
    add_extend(&mut store, ".c", ".a");
    add_extend(&mut store, ".d", ".b");
    let value = rule.value().clone();
    assert!(
        value.components.contains(&support::complex(".a.b")),
        "original lost from `{value}`"
    );
}

#[test]
fn clone_is_independent_of_the_original() {
    init_logger();
    let mut store = ExtensionStore::new();
    let rule = add_rule(&mut store, ".a");

    let (mut forked, old_to_new) = store.clone_store();
    let twin = old_to_new.get(&rule).expect("twin exists").clone();
    add_extend(&mut forked, ".b", ".a");

    assert_eq!(twin.value().to_string(), ".a, .b");
    assert_eq!(rule.value().to_string(), ".a");
}

#[test]
fn private_placeholders_stay_behind_module_boundaries() {
    init_logger();
    let mut upstream = ExtensionStore::new();
    add_extend_with(&mut upstream, ".b", "%-private", false, None);

    let mut store = ExtensionStore::new();
    let rule = add_rule(&mut store, ".a");
    store
        .add_extensions([&upstream])
        .expect("cross-module union succeeds");

    assert_eq!(rule.value().to_string(), ".a");
    assert!(store.is_empty());
}

#[test]
fn add_extensions_applies_public_targets() {
    init_logger();
    let mut upstream = ExtensionStore::new();
    add_extend(&mut upstream, ".b", ".a");

    let mut store = ExtensionStore::new();
    let rule = add_rule(&mut store, ".a");
    store
        .add_extensions([&upstream])
        .expect("cross-module union succeeds");
    assert_eq!(rule.value().to_string(), ".a, .b");
}

#[test]
fn mandatory_extensions_are_reported_unmerged() {
    init_logger();
    let mut store = ExtensionStore::new();
    add_extend(&mut store, ".b", ".a");
    add_extend(&mut store, ".b", ".a");
    add_extend_with(&mut store, ".c", ".a", true, None);
    add_extend(&mut store, ".d", ".q");

    let target = simple(".a");
    let reported: Vec<_> = store
        .extensions_where_target(|candidate| candidate == &target)
        .collect();
    // The two mandatory `.b` extensions merged in storage but unmerge for
    // reporting; the optional `.c` never appears.
    assert_eq!(reported.len(), 2);
    for extension in &reported {
        assert_eq!(extension.target(), &target);
        assert!(!extension.is_optional());
        assert_eq!(extension.extender().selector(), &support::complex(".b"));
    }
}

#[test]
fn extension_before_and_after_selector_agree() {
    init_logger();
    let mut before = ExtensionStore::new();
    add_extend(&mut before, ".b", ".a");
    let before_rule = add_rule(&mut before, ".a");

    let mut after = ExtensionStore::new();
    let after_rule = add_rule(&mut after, ".a");
    add_extend(&mut after, ".b", ".a");

    assert_eq!(
        before_rule.value().to_string(),
        after_rule.value().to_string()
    );
}

#[test]
fn rule_added_to_store_twice_tracks_both_cells() {
    init_logger();
    let mut store = ExtensionStore::new();
    let first = add_rule(&mut store, ".a");
    let second = add_rule(&mut store, ".a");
    add_extend(&mut store, ".b", ".a");

    // Same value, distinct identities: both cells are rewritten.
    assert_eq!(first.value().to_string(), ".a, .b");
    assert_eq!(second.value().to_string(), ".a, .b");
    assert!(first != second);
}

#[test]
fn merged_optionality_requires_both_operands_optional() {
    init_logger();
    let mut store = ExtensionStore::new();
    add_extend_with(&mut store, ".b", ".a", true, None);
    add_extend(&mut store, ".b", ".a");

    let target = simple(".a");
    let reported: Vec<_> = store
        .extensions_where_target(|candidate| candidate == &target)
        .collect();
    assert_eq!(reported.len(), 1);
    assert!(!reported[0].is_optional());
}
