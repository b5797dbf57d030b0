//! End-to-end scenarios driving the extension store the way the compiler
//! does: selectors and `@extend`s arrive in document order and previously
//! stored rules are rewritten in place.

mod support;

use css_extend::selector::{PseudoSelector, SelectorList, SimpleSelector};
use css_extend::{extend, replace, CssValue, ExtendError, ExtendRule, ExtensionStore, Span};
use support::{add_extend, add_rule, init_logger, sel, selector_pseudo, simple};

#[test]
fn extension_applies_to_earlier_selector() {
    init_logger();
    let mut store = ExtensionStore::new();
    let rule = add_rule(&mut store, ".a");
    add_extend(&mut store, ".b", ".a");
    assert_eq!(rule.value().to_string(), ".a, .b");
}

#[test]
fn extension_applies_to_later_selector() {
    init_logger();
    let mut store = ExtensionStore::new();
    add_extend(&mut store, ".b", ".a");
    let rule = add_rule(&mut store, ".a");
    assert_eq!(rule.value().to_string(), ".a, .b");
}

#[test]
fn transitive_extension_chain() {
    init_logger();
    let mut store = ExtensionStore::new();

    // .c { @extend .a }  .x.y.a { @extend .b }  .z.b { @extend .c }
    let rule_c = add_rule(&mut store, ".c");
    add_extend(&mut store, ".c", ".a");
    let rule_xya = add_rule(&mut store, ".x.y.a");
    add_extend(&mut store, ".x.y.a", ".b");
    let rule_zb = add_rule(&mut store, ".z.b");
    add_extend(&mut store, ".z.b", ".c");

    // The .c rule picks up its direct extender.
    assert_eq!(rule_c.value().to_string(), ".c, .z.b");
    // The .x.y.a rule was extended by .c when registered, and the extension
    // of .c by .z.b cascades into it, unifying into .x.y.z.b.
    assert_eq!(
        rule_xya.value().to_string(),
        ".x.y.a, .x.y.c, .x.y.z.b"
    );
    // The .z.b rule picked up .b's extender at registration time.
    assert_eq!(rule_zb.value().to_string(), ".z.b, .z.x.y.a");
}

#[test]
fn not_with_single_complex_splits_per_exclusion() {
    init_logger();
    let mut store = ExtensionStore::new();
    let not_a = SelectorList::new(vec![css_extend::selector::ComplexSelector::from_compound(
        css_extend::selector::CompoundSelector::new(vec![selector_pseudo("not", ".a")]),
    )]);
    let rule = store
        .add_selector(not_a, Span::default(), None)
        .expect("selector registers");

    add_extend(&mut store, ".b", ".a");
    // Excluding .a must now exclude .b as well; a single-complex `:not`
    // splits so older browsers keep parsing it.
    assert_eq!(rule.value().to_string(), ":not(.a):not(.b)");
}

#[test]
fn not_with_selector_list_extends_in_place() {
    init_logger();
    let mut store = ExtensionStore::new();
    let not_list = SelectorList::new(vec![css_extend::selector::ComplexSelector::from_compound(
        css_extend::selector::CompoundSelector::new(vec![selector_pseudo("not", ".a, .c")]),
    )]);
    let rule = store
        .add_selector(not_list, Span::default(), None)
        .expect("selector registers");

    add_extend(&mut store, ".b", ".a");
    assert_eq!(rule.value().to_string(), ":not(.a, .b, .c)");
}

#[test]
fn trim_drops_duplicate_generated_selector() {
    init_logger();
    let mut store = ExtensionStore::new();
    add_extend(&mut store, ".b", ".a");
    add_extend(&mut store, ".b", ".c");
    // Both extensions inject `.b`; only one copy survives trimming.
    let rule = add_rule(&mut store, ".a, .c");
    assert_eq!(rule.value().to_string(), ".a, .b, .c");
}

#[test]
fn self_extension_does_not_duplicate_the_original() {
    init_logger();
    let mut store = ExtensionStore::new();
    // `.a` extends itself alongside a distinct extender, so the rewrite
    // regenerates the original compound after the distinct alternative and
    // trimming must fold the duplicate back into the leading copy.
    add_extend(&mut store, ".b", ".a");
    add_extend(&mut store, ".a", ".a");
    let rule = add_rule(&mut store, ".a");
    assert_eq!(rule.value().to_string(), ".a, .b");
}

#[test]
fn trim_keeps_less_specific_original() {
    init_logger();
    let mut store = ExtensionStore::new();
    let rule = add_rule(&mut store, ".a");
    add_extend(&mut store, ".a.b", ".a");
    // `.a` has lower specificity than the generated `.a.b`, but the second
    // law forbids dropping a selector in favor of one below its source
    // specificity, and `.a` is an original besides.
    assert_eq!(rule.value().to_string(), ".a, .a.b");
}

#[test]
fn compound_extension_unifies_into_target_rule() {
    init_logger();
    let mut store = ExtensionStore::new();
    let rule = add_rule(&mut store, ".c.a");
    add_extend(&mut store, ".b", ".a");
    assert_eq!(rule.value().to_string(), ".c.a, .c.b");
}

#[test]
fn extension_with_complex_extender_weaves_parents() {
    init_logger();
    let mut store = ExtensionStore::new();
    let rule = add_rule(&mut store, ".a .b");
    add_extend(&mut store, ".c .d", ".b");
    let rendered = rule.value().to_string();
    // `.a .b` plus `.c .d` acting as `.b`: the parents interleave both ways.
    assert!(rendered.contains(".a .b"), "got {rendered}");
    assert!(rendered.contains(".a .c .d"), "got {rendered}");
    assert!(rendered.contains(".c .a .d"), "got {rendered}");
}

#[test]
fn stateless_extend_keeps_target() {
    init_logger();
    let extended = extend(sel(".a .b"), &sel(".x"), &sel(".b"), Span::default())
        .expect("extend succeeds");
    assert_eq!(extended.to_string(), ".a .b, .a .x");
}

#[test]
fn stateless_replace_drops_target() {
    init_logger();
    let replaced = replace(sel(".a .b"), &sel(".x"), &sel(".b"), Span::default())
        .expect("replace succeeds");
    assert_eq!(replaced.to_string(), ".a .x");
}

#[test]
fn stateless_replace_multiple_targets() {
    init_logger();
    let replaced = replace(sel(".a .b"), &sel(".x"), &sel(".a, .b"), Span::default())
        .expect("replace succeeds");
    assert_eq!(replaced.to_string(), ".x .x");
}

#[test]
fn complex_target_is_rejected() {
    init_logger();
    let result = extend(sel(".a"), &sel(".x"), &sel(".b .c"), Span::default());
    match result {
        Err(ExtendError::InvalidTarget { target, .. }) => assert_eq!(target, ".b .c"),
        other => panic!("expected InvalidTarget, got {other:?}"),
    }
}

#[test]
fn pseudo_class_carries_through_unification() {
    init_logger();
    let mut store = ExtensionStore::new();
    // `.a:hover`-style rule: the pseudo must stay last after unification.
    let hover = SimpleSelector::Pseudo(PseudoSelector::pseudo_class("hover"));
    let list = SelectorList::new(vec![css_extend::selector::ComplexSelector::from_compound(
        css_extend::selector::CompoundSelector::new(vec![SimpleSelector::class("a"), hover]),
    )]);
    let rule = store
        .add_selector(list, Span::default(), None)
        .expect("selector registers");
    add_extend(&mut store, ".b", ".a");
    assert_eq!(rule.value().to_string(), ".a:hover, .b:hover");
}

#[test]
fn extension_failure_is_wrapped_with_rule_span() {
    init_logger();
    let mut store = ExtensionStore::new();
    let screen = vec![css_extend::MediaQuery::media_type("screen")];
    let print = vec![css_extend::MediaQuery::media_type("print")];

    store
        .add_selector(sel(".a"), Span::new(10, 12), Some(print))
        .expect("selector registers");
    let result = store.add_extension(
        &CssValue::new(sel(".b"), Span::new(40, 42)),
        &simple(".a"),
        &ExtendRule {
            span: Span::new(40, 50),
            is_optional: false,
        },
        Some(&screen),
    );

    match result {
        Err(ExtendError::Wrapped { outer_span, inner }) => {
            assert_eq!(outer_span, Span::new(10, 12));
            assert!(matches!(*inner, ExtendError::MediaContextMismatch { .. }));
        }
        other => panic!("expected wrapped media mismatch, got {other:?}"),
    }
}

#[test]
fn matching_media_contexts_extend_normally() {
    init_logger();
    let mut store = ExtensionStore::new();
    let screen = vec![css_extend::MediaQuery::media_type("screen")];

    let rule = store
        .add_selector(sel(".a"), Span::default(), Some(screen.clone()))
        .expect("selector registers");
    store
        .add_extension(
            &CssValue::new(sel(".b"), Span::default()),
            &simple(".a"),
            &ExtendRule {
                span: Span::default(),
                is_optional: false,
            },
            Some(&screen),
        )
        .expect("same-context extension applies");
    assert_eq!(rule.value().to_string(), ".a, .b");
}
