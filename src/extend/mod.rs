//! The extension store: a mutable graph of selectors, extensions, and the
//! reverse indices that keep them consistent under incremental updates.
//!
//! Selectors and `@extend` rules arrive in document order through
//! [`ExtensionStore::add_selector`] and [`ExtensionStore::add_extension`].
//! Each arrival can re-enter previously stored state: a new extension
//! rewrites every stored rule whose selector contains its target, and
//! re-extends every registered extension whose extender contains it, so the
//! graph converges regardless of declaration order.
//!
//! Two laws constrain the rewriting. The first: a selector written by the
//! author must keep matching everything it originally matched, so written
//! ("original") complex selectors are never trimmed away. The second: a
//! generated selector may be dropped only in favor of a survivor whose
//! specificity is at least the maximum specificity of the sources that
//! produced it.

use crate::error::ExtendError;
use crate::media::MediaContext;
use crate::selector::{
    paths, unify_complex, weave, ComplexSelector, ComplexSelectorComponent, CompoundSelector,
    PseudoSelector, SelectorList, SimpleSelector,
};
use crate::span::{CssValue, Span};
use indexmap::{IndexMap, IndexSet};
use log::debug;
use rustc_hash::{FxBuildHasher, FxHashMap};
use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

mod extension;
mod mode;

pub use extension::{Extender, Extension};
pub use mode::ExtendMode;

/// Insertion-ordered maps: the order extensions are registered in is the
/// order their results appear in rewritten selectors.
pub(crate) type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;
pub(crate) type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// Two-level extension index: target simple selector to extender complex
/// selector to the extension joining them.
type ExtensionMap = FxIndexMap<SimpleSelector, FxIndexMap<ComplexSelector, Extension>>;

/// The `@extend` rule driving an extension: where it was written and whether
/// it was marked `!optional`.
#[derive(Clone, Copy, Debug)]
pub struct ExtendRule {
    pub span: Span,
    pub is_optional: bool,
}

/// A shared, mutable cell holding a style rule's selector list.
///
/// `add_selector` returns one of these and the store keeps hold of it too;
/// later extensions rewrite the value in place so the emitter always sees
/// the final selector. Identity, not value, makes two cells "the same":
/// equality and hashing go through the cell's address.
#[derive(Clone)]
pub struct ModifiableSelector(Rc<RefCell<ModifiableSelectorInner>>);

struct ModifiableSelectorInner {
    value: SelectorList,
    span: Span,
}

impl ModifiableSelector {
    pub fn new(value: SelectorList, span: Span) -> Self {
        Self(Rc::new(RefCell::new(ModifiableSelectorInner {
            value,
            span,
        })))
    }

    /// The current selector list. The borrow must be released before the
    /// store mutates this cell again.
    pub fn value(&self) -> Ref<'_, SelectorList> {
        Ref::map(self.0.borrow(), |inner| &inner.value)
    }

    pub fn span(&self) -> Span {
        self.0.borrow().span
    }

    fn set_value(&self, value: SelectorList) {
        self.0.borrow_mut().value = value;
    }
}

impl PartialEq for ModifiableSelector {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ModifiableSelector {}

impl Hash for ModifiableSelector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for ModifiableSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        write!(f, "ModifiableSelector({} @ {})", inner.value, inner.span)
    }
}

/// Tracks selectors and extensions during compilation and rewrites stored
/// selectors as extensions for their contents arrive.
pub struct ExtensionStore {
    /// Which rule cells each simple selector currently appears in, including
    /// occurrences inside selector pseudos.
    selectors: FxHashMap<SimpleSelector, FxIndexSet<ModifiableSelector>>,
    /// Registered extensions, keyed by target then extender complex. At most
    /// one extension per pair; collisions merge.
    extensions: ExtensionMap,
    /// Extensions whose extender contains the simple selector; these must be
    /// re-extended when a new extension on that simple arrives.
    extensions_by_extender: FxHashMap<SimpleSelector, Vec<Extension>>,
    /// Media context for cells defined inside `@media` rules.
    media_contexts: FxHashMap<ModifiableSelector, MediaContext>,
    /// Maximum specificity of the written complex that introduced each
    /// simple selector. First writer wins; synthesised selectors never
    /// overwrite it.
    source_specificity: FxHashMap<SimpleSelector, i32>,
    /// Complex selectors written by the author rather than generated here.
    /// Never trimmed (first law).
    originals: FxIndexSet<ComplexSelector>,
    mode: ExtendMode,
}

impl Default for ExtensionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionStore {
    pub fn new() -> Self {
        Self::with_mode(ExtendMode::Normal)
    }

    pub fn with_mode(mode: ExtendMode) -> Self {
        Self {
            selectors: FxHashMap::default(),
            extensions: ExtensionMap::default(),
            extensions_by_extender: FxHashMap::default(),
            media_contexts: FxHashMap::default(),
            source_specificity: FxHashMap::default(),
            originals: FxIndexSet::default(),
            mode,
        }
    }

    /// Whether any extensions have been registered.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Every simple selector occurring in stored rules.
    pub fn simple_selectors(&self) -> impl Iterator<Item = &SimpleSelector> {
        self.selectors.keys()
    }

    /// The rule cells a simple selector currently appears in.
    pub fn selectors_containing(
        &self,
        simple: &SimpleSelector,
    ) -> impl Iterator<Item = &ModifiableSelector> {
        self.selectors.get(simple).into_iter().flatten()
    }

    /// Register a style rule's selector list.
    ///
    /// The list is first rewritten by the already-registered extensions, then
    /// wrapped in a fresh cell that later extensions will keep up to date.
    /// Top-level complex selectors of the written list are recorded as
    /// originals unless the whole list is invisible.
    pub fn add_selector(
        &mut self,
        selector: SelectorList,
        span: Span,
        media_context: Option<MediaContext>,
    ) -> Result<ModifiableSelector, ExtendError> {
        if !selector.is_invisible() {
            for complex in &selector.components {
                self.originals.insert(complex.clone());
            }
        }

        let selector = if self.extensions.is_empty() {
            selector
        } else {
            // The map is detached while the algorithm runs; extension never
            // touches `self.extensions` directly.
            let extensions = std::mem::take(&mut self.extensions);
            let result = self.extend_list(&selector, span, &extensions, media_context.as_ref());
            self.extensions = extensions;
            match result {
                Ok(Some(extended)) => extended,
                Ok(None) => selector,
                Err(error) => return Err(ExtendError::wrapped(span, error)),
            }
        };

        let modifiable = ModifiableSelector::new(selector.clone(), span);
        if let Some(context) = media_context {
            self.media_contexts.insert(modifiable.clone(), context);
        }
        self.register_selector(&selector, &modifiable);
        Ok(modifiable)
    }

    /// Register an `@extend` of `target` by every complex selector in
    /// `extender`, then bring previously stored extensions and selectors up
    /// to date.
    pub fn add_extension(
        &mut self,
        extender: &CssValue<SelectorList>,
        target: &SimpleSelector,
        extend_rule: &ExtendRule,
        media_context: Option<&MediaContext>,
    ) -> Result<(), ExtendError> {
        let selectors_for_target = self.selectors.get(target).cloned();
        let existing_extensions = self.extensions_by_extender.get(target).cloned();

        let mut new_sources: Option<FxIndexMap<ComplexSelector, Extension>> = None;
        for complex in &extender.value.components {
            let extension = Extension::new(
                complex.clone(),
                extender.span,
                target.clone(),
                extend_rule.span,
                media_context.cloned(),
                extend_rule.is_optional,
            );

            let sources = self.extensions.entry(target.clone()).or_default();
            if let Some(existing) = sources.get(complex) {
                // An earlier @extend already connects this pair; merge so
                // optionality and media contexts combine.
                let merged = Extension::merge(existing.clone(), extension)?;
                sources.insert(complex.clone(), merged);
                continue;
            }
            sources.insert(complex.clone(), extension.clone());

            for simple in simple_selectors_of_complex(complex) {
                self.extensions_by_extender
                    .entry(simple.clone())
                    .or_default()
                    .push(extension.clone());
                self.source_specificity
                    .entry(simple)
                    .or_insert_with(|| complex.max_specificity());
            }

            if selectors_for_target.is_some() || existing_extensions.is_some() {
                new_sources
                    .get_or_insert_with(Default::default)
                    .insert(complex.clone(), extension);
            }
        }

        let Some(new_sources) = new_sources else {
            return Ok(());
        };
        debug!(
            "new extension of {target} affects {} stored selector(s)",
            selectors_for_target.as_ref().map_or(0, |cells| cells.len())
        );

        let mut new_extensions = ExtensionMap::default();
        new_extensions.insert(target.clone(), new_sources);

        if let Some(existing) = existing_extensions {
            if let Some(additional) = self.extend_existing_extensions(&existing, &new_extensions)? {
                for (additional_target, sources) in additional {
                    new_extensions
                        .entry(additional_target)
                        .or_default()
                        .extend(sources);
                }
            }
        }

        if let Some(selectors) = selectors_for_target {
            self.extend_existing_selectors(&selectors, &new_extensions)?;
        }
        Ok(())
    }

    /// Union the extensions of `stores` into this one without re-extending
    /// the other stores. Private placeholder targets stay behind their
    /// module boundary.
    pub fn add_extensions<'a>(
        &mut self,
        stores: impl IntoIterator<Item = &'a ExtensionStore>,
    ) -> Result<(), ExtendError> {
        let mut new_extensions: Option<ExtensionMap> = None;
        let mut extensions_to_extend: Vec<Extension> = Vec::new();
        let mut selectors_to_extend: Option<FxIndexSet<ModifiableSelector>> = None;

        for store in stores {
            if store.is_empty() {
                continue;
            }
            for (simple, specificity) in &store.source_specificity {
                self.source_specificity
                    .entry(simple.clone())
                    .or_insert(*specificity);
            }

            for (target, sources) in &store.extensions {
                if let SimpleSelector::Placeholder(placeholder) = target {
                    if placeholder.is_private() {
                        continue;
                    }
                }

                let extensions_for_target = self
                    .extensions_by_extender
                    .get(target)
                    .cloned()
                    .unwrap_or_default();
                let has_extensions = !extensions_for_target.is_empty();
                extensions_to_extend.extend(extensions_for_target);

                let selectors_for_target = self.selectors.get(target).cloned();
                let has_selectors = selectors_for_target.is_some();
                if let Some(cells) = selectors_for_target {
                    selectors_to_extend
                        .get_or_insert_with(Default::default)
                        .extend(cells);
                }

                if self.extensions.contains_key(target) {
                    for (complex, extension) in sources {
                        let merged = {
                            let existing_sources = self.extensions.entry(target.clone()).or_default();
                            let merged = match existing_sources.get(complex) {
                                Some(existing) => {
                                    Extension::merge(existing.clone(), extension.clone())?
                                }
                                None => extension.clone(),
                            };
                            existing_sources.insert(complex.clone(), merged.clone());
                            merged
                        };
                        if has_extensions || has_selectors {
                            new_extensions
                                .get_or_insert_with(Default::default)
                                .entry(target.clone())
                                .or_default()
                                .insert(complex.clone(), merged);
                        }
                    }
                } else {
                    self.extensions.insert(target.clone(), sources.clone());
                    if has_extensions || has_selectors {
                        new_extensions
                            .get_or_insert_with(Default::default)
                            .insert(target.clone(), sources.clone());
                    }
                }
            }
        }

        let Some(new_extensions) = new_extensions else {
            return Ok(());
        };
        if !extensions_to_extend.is_empty() {
            // Extension loops can't cross module boundaries, so anything the
            // re-extension produces is already fully resolved.
            self.extend_existing_extensions(&extensions_to_extend, &new_extensions)?;
        }
        if let Some(selectors) = selectors_to_extend {
            self.extend_existing_selectors(&selectors, &new_extensions)?;
        }
        Ok(())
    }

    /// Fork this store into an independent copy.
    ///
    /// Rule cells are rebuilt so mutating the clone leaves the original's
    /// cells untouched; the returned map links each old cell to its twin.
    /// The clone's mode resets to [`ExtendMode::Normal`].
    pub fn clone_store(
        &self,
    ) -> (ExtensionStore, FxHashMap<ModifiableSelector, ModifiableSelector>) {
        let mut new_selectors: FxHashMap<SimpleSelector, FxIndexSet<ModifiableSelector>> =
            FxHashMap::default();
        let mut new_media_contexts: FxHashMap<ModifiableSelector, MediaContext> =
            FxHashMap::default();
        let mut old_to_new: FxHashMap<ModifiableSelector, ModifiableSelector> =
            FxHashMap::default();

        for (simple, cells) in &self.selectors {
            let mut new_set = FxIndexSet::default();
            for cell in cells {
                let new_cell = old_to_new
                    .entry(cell.clone())
                    .or_insert_with(|| ModifiableSelector::new(cell.value().clone(), cell.span()))
                    .clone();
                if let Some(context) = self.media_contexts.get(cell) {
                    new_media_contexts.insert(new_cell.clone(), context.clone());
                }
                new_set.insert(new_cell);
            }
            new_selectors.insert(simple.clone(), new_set);
        }

        (
            ExtensionStore {
                selectors: new_selectors,
                extensions: self.extensions.clone(),
                extensions_by_extender: self.extensions_by_extender.clone(),
                media_contexts: new_media_contexts,
                source_specificity: self.source_specificity.clone(),
                originals: self.originals.clone(),
                mode: ExtendMode::Normal,
            },
            old_to_new,
        )
    }

    /// Every mandatory extension whose target satisfies `predicate`, with
    /// merged extensions expanded back into their bases. Used to report
    /// `@extend`s that were required to match but never did.
    pub fn extensions_where_target<'a>(
        &'a self,
        mut predicate: impl FnMut(&SimpleSelector) -> bool + 'a,
    ) -> impl Iterator<Item = Extension> + 'a {
        self.extensions
            .iter()
            .filter(move |(target, _)| predicate(target))
            .flat_map(|(_, sources)| sources.values())
            .flat_map(Extension::unmerge)
            .filter(|extension| !extension.is_optional())
    }

    /// Record every simple selector of `list` (recursing into selector
    /// pseudos) as appearing in `modifiable`.
    fn register_selector(&mut self, list: &SelectorList, modifiable: &ModifiableSelector) {
        for complex in &list.components {
            for component in &complex.components {
                let Some(compound) = component.as_compound() else {
                    continue;
                };
                for simple in &compound.components {
                    self.selectors
                        .entry(simple.clone())
                        .or_default()
                        .insert(modifiable.clone());
                    if let SimpleSelector::Pseudo(pseudo) = simple {
                        if let Some(inner) = &pseudo.selector {
                            self.register_selector(inner, modifiable);
                        }
                    }
                }
            }
        }
    }

    /// Re-extend the extenders of already-registered extensions by
    /// `new_extensions`. Returns extensions created along the way whose
    /// targets are in `new_extensions`, so callers can cascade them into the
    /// selector pass.
    fn extend_existing_extensions(
        &mut self,
        extensions: &[Extension],
        new_extensions: &ExtensionMap,
    ) -> Result<Option<ExtensionMap>, ExtendError> {
        let mut additional: Option<ExtensionMap> = None;

        for extension in extensions {
            let complex = extension.extender().selector().clone();
            let extender_span = extension.extender().span();
            let selectors = self
                .extend_complex(&complex, extender_span, new_extensions, extension.media_context())
                .map_err(|error| ExtendError::wrapped(extender_span, error))?;
            let Some(selectors) = selectors else {
                continue;
            };

            let contains_extension = selectors.first() == Some(&complex);
            let mut first = true;
            for new_complex in selectors {
                // The output usually leads with the original extender; no
                // need to recreate it.
                if contains_extension && first {
                    first = false;
                    continue;
                }

                let with_extender = extension.with_extender(new_complex.clone());
                let is_new = {
                    let sources = self.extensions.entry(extension.target().clone()).or_default();
                    match sources.get(&new_complex) {
                        Some(existing) => {
                            let merged =
                                Extension::merge(existing.clone(), with_extender.clone())?;
                            sources.insert(new_complex.clone(), merged);
                            false
                        }
                        None => {
                            sources.insert(new_complex.clone(), with_extender.clone());
                            true
                        }
                    }
                };
                if is_new {
                    for component in &new_complex.components {
                        let Some(compound) = component.as_compound() else {
                            continue;
                        };
                        for simple in &compound.components {
                            self.extensions_by_extender
                                .entry(simple.clone())
                                .or_default()
                                .push(with_extender.clone());
                        }
                    }
                    if new_extensions.contains_key(extension.target()) {
                        additional
                            .get_or_insert_with(Default::default)
                            .entry(extension.target().clone())
                            .or_default()
                            .insert(new_complex.clone(), with_extender);
                    }
                }
            }

            // If the output no longer contains the original extender (for
            // example after `:not` expansion replaced it), drop the stale
            // entry. The sources map is keyed by complex selector, so the
            // extender's selector is the removal key.
            if !contains_extension {
                if let Some(sources) = self.extensions.get_mut(extension.target()) {
                    sources.shift_remove(&complex);
                }
            }
        }

        Ok(additional)
    }

    /// Rewrite every cell in `selectors` by `new_extensions`, re-registering
    /// the simple selectors of any value that changed.
    fn extend_existing_selectors(
        &mut self,
        selectors: &FxIndexSet<ModifiableSelector>,
        new_extensions: &ExtensionMap,
    ) -> Result<(), ExtendError> {
        for cell in selectors {
            let old_value = cell.value().clone();
            let media_context = self.media_contexts.get(cell).cloned();
            let result = self
                .extend_list(&old_value, cell.span(), new_extensions, media_context.as_ref())
                .map_err(|error| ExtendError::wrapped(cell.span(), error))?;

            // No extension applied (for example because unification failed):
            // nothing to update or re-register.
            let Some(new_value) = result else {
                continue;
            };
            cell.set_value(new_value.clone());
            self.register_selector(&new_value, cell);
        }
        Ok(())
    }

    /// Extend every complex selector of `list`. Returns `None` when no
    /// extension applied anywhere, which callers use as a change flag.
    fn extend_list(
        &mut self,
        list: &SelectorList,
        span: Span,
        extensions: &ExtensionMap,
        media_context: Option<&MediaContext>,
    ) -> Result<Option<SelectorList>, ExtendError> {
        // Allocate the output lazily; the common case is that nothing in the
        // list is affected.
        let mut extended: Option<Vec<ComplexSelector>> = None;
        for (i, complex) in list.components.iter().enumerate() {
            match self.extend_complex(complex, span, extensions, media_context)? {
                None => {
                    if let Some(extended) = &mut extended {
                        extended.push(complex.clone());
                    }
                }
                Some(result) => {
                    let extended =
                        extended.get_or_insert_with(|| list.components[..i].to_vec());
                    extended.extend(result);
                }
            }
        }

        let Some(extended) = extended else {
            return Ok(None);
        };
        let trimmed = self.trim(extended, &|complex| self.originals.contains(complex));
        Ok(Some(SelectorList::new(trimmed)))
    }

    /// Extend one complex selector: each compound expands to its
    /// alternatives, and the Cartesian paths through them are woven back
    /// into complete complex selectors.
    fn extend_complex(
        &mut self,
        complex: &ComplexSelector,
        span: Span,
        extensions: &ExtensionMap,
        media_context: Option<&MediaContext>,
    ) -> Result<Option<Vec<ComplexSelector>>, ExtendError> {
        let mut extended_not_expanded: Option<Vec<Vec<ComplexSelector>>> = None;
        let in_original = self.originals.contains(complex);

        for (i, component) in complex.components.iter().enumerate() {
            let extended = match component {
                ComplexSelectorComponent::Compound(compound) => {
                    self.extend_compound(compound, span, extensions, media_context, in_original)?
                }
                ComplexSelectorComponent::Combinator(_) => None,
            };
            match extended {
                None => {
                    if let Some(not_expanded) = &mut extended_not_expanded {
                        not_expanded
                            .push(vec![ComplexSelector::new(vec![component.clone()], false)]);
                    }
                }
                Some(extended) => {
                    if extended_not_expanded.is_none() {
                        extended_not_expanded = Some(
                            complex.components[..i]
                                .iter()
                                .map(|component| {
                                    vec![ComplexSelector::new(
                                        vec![component.clone()],
                                        complex.line_break,
                                    )]
                                })
                                .collect(),
                        );
                    }
                    if let Some(not_expanded) = &mut extended_not_expanded {
                        not_expanded.push(extended);
                    }
                }
            }
        }

        let Some(extended_not_expanded) = extended_not_expanded else {
            return Ok(None);
        };

        let mut first = true;
        let mut result = Vec::new();
        for path in paths(extended_not_expanded) {
            let woven = weave(
                path.iter()
                    .map(|path_complex| path_complex.components.clone())
                    .collect(),
            );
            for components in woven {
                let output = ComplexSelector::new(
                    components,
                    complex.line_break
                        || path.iter().any(|path_complex| path_complex.line_break),
                );

                // The first output of an original selector inherits its
                // original status (first law), including when a `:not` was
                // rewritten in place.
                if first && in_original {
                    self.originals.insert(output.clone());
                }
                first = false;
                result.push(output);
            }
        }
        Ok(Some(result))
    }

    /// Extend one compound selector into the complex selectors it can
    /// become. Each simple selector contributes its extender alternatives;
    /// paths through them are unified against the untouched rest of the
    /// compound.
    fn extend_compound(
        &mut self,
        compound: &CompoundSelector,
        span: Span,
        extensions: &ExtensionMap,
        media_context: Option<&MediaContext>,
        in_original: bool,
    ) -> Result<Option<Vec<ComplexSelector>>, ExtendError> {
        // Outside normal mode every target must be matched somewhere in the
        // compound, so track which ones were.
        let mut targets_used: Option<FxIndexSet<SimpleSelector>> =
            if self.mode == ExtendMode::Normal || extensions.len() < 2 {
                None
            } else {
                Some(FxIndexSet::default())
            };

        let mut options: Option<Vec<Vec<Extender>>> = None;
        for (i, simple) in compound.components.iter().enumerate() {
            match self.extend_simple(simple, span, extensions, media_context, targets_used.as_mut())? {
                None => {
                    if let Some(options) = &mut options {
                        options.push(vec![self.extender_for_simple(simple, span)]);
                    }
                }
                Some(extended) => {
                    if options.is_none() {
                        let mut initial = Vec::new();
                        if i != 0 {
                            initial.push(vec![
                                self.extender_for_compound(&compound.components[..i], span),
                            ]);
                        }
                        options = Some(initial);
                    }
                    if let Some(options) = &mut options {
                        options.extend(extended);
                    }
                }
            }
        }
        let Some(options) = options else {
            return Ok(None);
        };

        if let Some(targets_used) = &targets_used {
            if targets_used.len() != extensions.len() {
                return Ok(None);
            }
        }

        // A single simple selector needs no unification; its alternatives
        // are the result.
        if options.len() == 1 {
            let mut result = Vec::new();
            for extender in options.into_iter().flatten() {
                extender.assert_compatible_media_context(media_context)?;
                result.push(extender.into_selector());
            }
            return Ok(Some(result));
        }

        let mut extender_paths = paths(options).into_iter();
        let mut result: Vec<ComplexSelector> = Vec::new();
        if self.mode != ExtendMode::Replace {
            // The first path is always the original compound. Pseudo
            // selectors in it may have been rewritten, so rebuild it from
            // the extenders rather than reusing `compound`.
            if let Some(first_path) = extender_paths.next() {
                let mut simples = Vec::new();
                for extender in &first_path {
                    if let Some(ComplexSelectorComponent::Compound(last)) =
                        extender.selector().components.last()
                    {
                        simples.extend(last.components.iter().cloned());
                    }
                }
                result.push(ComplexSelector::from_compound(CompoundSelector::new(simples)));
            }
        }

        for path in extender_paths {
            if let Some(extended) = self.unify_extenders(&path, media_context)? {
                result.extend(extended);
            }
        }
        if result.is_empty() {
            return Ok(None);
        }

        // If the original is being preserved, the rebuilt first path keeps
        // its original status through trimming.
        let first_is_original = in_original && self.mode != ExtendMode::Replace;
        let first_complex = result.first().cloned();
        let trimmed = self.trim(result, &|complex| {
            first_is_original && Some(complex) == first_complex.as_ref()
        });
        Ok(Some(trimmed))
    }

    /// Unify one path of extenders into complex selectors. Original
    /// extenders collapse into a single compound that leads the
    /// unification queue.
    fn unify_extenders(
        &self,
        extenders: &[Extender],
        media_context: Option<&MediaContext>,
    ) -> Result<Option<Vec<ComplexSelector>>, ExtendError> {
        let mut to_unify: VecDeque<ComplexSelector> = VecDeque::new();
        let mut originals: Option<Vec<SimpleSelector>> = None;
        for extender in extenders {
            if extender.is_original() {
                let originals = originals.get_or_insert_with(Vec::new);
                if let Some(ComplexSelectorComponent::Compound(last)) =
                    extender.selector().components.last()
                {
                    originals.extend(last.components.iter().cloned());
                }
            } else {
                to_unify.push_back(extender.selector().clone());
            }
        }
        if let Some(originals) = originals {
            to_unify.push_front(ComplexSelector::from_compound(CompoundSelector::new(
                originals,
            )));
        }

        let Some(complexes) = unify_complex(
            to_unify
                .iter()
                .map(|complex| complex.components.clone())
                .collect(),
        ) else {
            return Ok(None);
        };

        for extender in extenders {
            extender.assert_compatible_media_context(media_context)?;
        }

        let line_break = extenders
            .iter()
            .any(|extender| extender.selector().line_break);
        Ok(Some(
            complexes
                .into_iter()
                .map(|components| ComplexSelector::new(components, line_break))
                .collect(),
        ))
    }

    /// Extend one simple selector. The result is a list of alternatives,
    /// each itself a list of extenders to be unified; `None` when no
    /// extension targets this simple.
    fn extend_simple(
        &mut self,
        simple: &SimpleSelector,
        span: Span,
        extensions: &ExtensionMap,
        media_context: Option<&MediaContext>,
        mut targets_used: Option<&mut FxIndexSet<SimpleSelector>>,
    ) -> Result<Option<Vec<Vec<Extender>>>, ExtendError> {
        if let SimpleSelector::Pseudo(pseudo) = simple {
            if pseudo.selector.is_some() {
                if let Some(extended) =
                    self.extend_pseudo(pseudo, span, extensions, media_context)?
                {
                    let mut result = Vec::with_capacity(extended.len());
                    for new_pseudo in extended {
                        let new_simple = SimpleSelector::Pseudo(new_pseudo);
                        let alternatives = self
                            .without_pseudo(&new_simple, extensions, span, targets_used.as_deref_mut())
                            .unwrap_or_else(|| vec![self.extender_for_simple(&new_simple, span)]);
                        result.push(alternatives);
                    }
                    return Ok(Some(result));
                }
            }
        }
        Ok(self
            .without_pseudo(simple, extensions, span, targets_used)
            .map(|alternatives| vec![alternatives]))
    }

    /// The extenders registered for `simple`, preceded by the self-extender
    /// unless the mode replaces the original.
    fn without_pseudo(
        &self,
        simple: &SimpleSelector,
        extensions: &ExtensionMap,
        span: Span,
        targets_used: Option<&mut FxIndexSet<SimpleSelector>>,
    ) -> Option<Vec<Extender>> {
        let sources = extensions.get(simple)?;
        if let Some(targets_used) = targets_used {
            targets_used.insert(simple.clone());
        }

        let mut result = Vec::with_capacity(sources.len() + 1);
        if self.mode != ExtendMode::Replace {
            result.push(self.extender_for_simple(simple, span));
        }
        result.extend(sources.values().map(|extension| extension.extender().clone()));
        Some(result)
    }

    /// Extend the inner selector of a selector pseudo, applying the
    /// pseudo-specific rewrites that keep the result expressible.
    fn extend_pseudo(
        &mut self,
        pseudo: &PseudoSelector,
        span: Span,
        extensions: &ExtensionMap,
        media_context: Option<&MediaContext>,
    ) -> Result<Option<Vec<PseudoSelector>>, ExtendError> {
        let Some(selector) = &pseudo.selector else {
            return Err(ExtendError::MissingInnerSelector {
                name: pseudo.name.clone(),
                span,
            });
        };

        let Some(extended) = self.extend_list(selector, span, extensions, media_context)? else {
            return Ok(None);
        };

        // `:not` can't contain a mix of simple and complex operands for
        // older browsers, so when the original held only single-component
        // complexes, keep only those.
        let mut complexes = extended.components;
        if pseudo.normalized_name() == "not"
            && !selector
                .components
                .iter()
                .any(|complex| complex.components.len() > 1)
            && complexes
                .iter()
                .any(|complex| complex.components.len() == 1)
        {
            complexes.retain(|complex| complex.components.len() <= 1);
        }

        let complexes: Vec<ComplexSelector> = complexes
            .into_iter()
            .flat_map(|complex| match inline_nested_pseudo(pseudo, &complex) {
                Some(replacement) => replacement,
                None => vec![complex],
            })
            .collect();

        // Older browsers support `:not` only with a single complex selector;
        // split the result up unless the original was written as a list.
        if pseudo.normalized_name() == "not" && selector.components.len() == 1 {
            let result: Vec<PseudoSelector> = complexes
                .into_iter()
                .map(|complex| pseudo.with_selector(SelectorList::new(vec![complex])))
                .collect();
            Ok((!result.is_empty()).then_some(result))
        } else if complexes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(vec![pseudo.with_selector(SelectorList::new(complexes))]))
        }
    }

    /// Remove from last to first every selector that is covered by another
    /// selector of equal or greater specificity, never removing originals.
    /// Above 100 selectors exact minimality is traded for linear time.
    fn trim(
        &self,
        selectors: Vec<ComplexSelector>,
        is_original: &dyn Fn(&ComplexSelector) -> bool,
    ) -> Vec<ComplexSelector> {
        if selectors.len() > 100 {
            debug!(
                "skipping trim of {} selectors to avoid quadratic work",
                selectors.len()
            );
            return selectors;
        }

        let mut result: VecDeque<ComplexSelector> = VecDeque::new();
        // Kept originals are tracked separately: generated survivors
        // interleave with them in the deque, so their positions there are
        // not contiguous.
        let mut kept_originals: Vec<ComplexSelector> = Vec::new();

        for i in (0..selectors.len()).rev() {
            let complex1 = &selectors[i];
            if is_original(complex1) {
                // Don't keep duplicate originals, which happen when a rule
                // extends a component of its own selector; rotate the kept
                // copy to the front instead.
                if kept_originals.contains(complex1) {
                    if let Some(position) = result.iter().position(|kept| kept == complex1) {
                        if let Some(duplicate) = result.remove(position) {
                            result.push_front(duplicate);
                        }
                    }
                    continue;
                }
                kept_originals.push(complex1.clone());
                result.push_front(complex1.clone());
                continue;
            }

            // The maximum specificity of the sources that generated this
            // selector; anything that covers it at or above this weight
            // makes it redundant (second law).
            let mut max_specificity = 0;
            for component in &complex1.components {
                if let Some(compound) = component.as_compound() {
                    max_specificity = max_specificity.max(self.source_specificity_for(compound));
                }
            }

            // Compare against already-kept later selectors rather than the
            // raw input so a selector never survives because of a peer that
            // was itself trimmed.
            if result.iter().any(|complex2| {
                complex2.min_specificity() >= max_specificity
                    && complex2.is_superselector(complex1)
            }) {
                continue;
            }
            if selectors[..i].iter().any(|complex2| {
                complex2.min_specificity() >= max_specificity
                    && complex2.is_superselector(complex1)
            }) {
                continue;
            }
            result.push_front(complex1.clone());
        }

        result.into()
    }

    /// A synthetic extender standing for a simple selector that stays in
    /// place.
    fn extender_for_simple(&self, simple: &SimpleSelector, span: Span) -> Extender {
        let specificity = self.source_specificity.get(simple).copied().unwrap_or(0);
        Extender::new(
            ComplexSelector::from_compound(CompoundSelector::new(vec![simple.clone()])),
            span,
            specificity,
            true,
            None,
        )
    }

    /// A synthetic extender standing for the untouched leading simples of a
    /// compound.
    fn extender_for_compound(&self, simples: &[SimpleSelector], span: Span) -> Extender {
        let compound = CompoundSelector::new(simples.to_vec());
        let specificity = self.source_specificity_for(&compound);
        Extender::new(
            ComplexSelector::from_compound(compound),
            span,
            specificity,
            true,
            None,
        )
    }

    /// The maximum recorded source specificity across a compound's simples.
    fn source_specificity_for(&self, compound: &CompoundSelector) -> i32 {
        compound
            .components
            .iter()
            .map(|simple| self.source_specificity.get(simple).copied().unwrap_or(0))
            .max()
            .unwrap_or(0)
    }
}

/// Rewrites for a selector pseudo whose extended inner complex is itself a
/// lone selector pseudo. Returns `None` to keep the complex as-is, an empty
/// list to drop it, or the inlined components.
fn inline_nested_pseudo(
    pseudo: &PseudoSelector,
    complex: &ComplexSelector,
) -> Option<Vec<ComplexSelector>> {
    if complex.components.len() != 1 {
        return None;
    }
    let compound = complex.components[0].as_compound()?;
    if compound.components.len() != 1 {
        return None;
    }
    let SimpleSelector::Pseudo(inner_pseudo) = &compound.components[0] else {
        return None;
    };
    let inner_selector = inner_pseudo.selector.as_ref()?;

    match pseudo.normalized_name() {
        "not" => {
            // An `:is` inside a `:not` flattens; any other nested selector
            // pseudo would need its complement and is dropped instead.
            if inner_pseudo.normalized_name() != "matches"
                && inner_pseudo.normalized_name() != "is"
            {
                return Some(Vec::new());
            }
            Some(inner_selector.components.clone())
        }
        "matches" | "is" | "any" | "current" | "nth-child" | "nth-last-child" => {
            // Only an identical pseudo (same name and argument) can inline;
            // unrelated ones would change which elements are counted.
            if inner_pseudo.normalized_name() != pseudo.normalized_name()
                || inner_pseudo.argument != pseudo.argument
            {
                return Some(Vec::new());
            }
            Some(inner_selector.components.clone())
        }
        // Each of these adds a layer of semantics, so the nested selector
        // stays as written.
        "has" | "host" | "host-context" | "slotted" => None,
        _ => Some(Vec::new()),
    }
}

/// Every simple selector of `complex`, recursing into selector pseudos.
fn simple_selectors_of_complex(complex: &ComplexSelector) -> Vec<SimpleSelector> {
    fn walk(complex: &ComplexSelector, out: &mut Vec<SimpleSelector>) {
        for component in &complex.components {
            let Some(compound) = component.as_compound() else {
                continue;
            };
            for simple in &compound.components {
                out.push(simple.clone());
                if let SimpleSelector::Pseudo(pseudo) = simple {
                    if let Some(inner) = &pseudo.selector {
                        for inner_complex in &inner.components {
                            walk(inner_complex, out);
                        }
                    }
                }
            }
        }
    }

    let mut out = Vec::new();
    walk(complex, &mut out);
    out
}

/// Extend `selector` so `source` also applies wherever each compound in
/// `targets` does, keeping the targets themselves in place.
///
/// Every complex selector in `targets` must consist of exactly one compound.
pub fn extend(
    selector: SelectorList,
    source: &SelectorList,
    targets: &SelectorList,
    span: Span,
) -> Result<SelectorList, ExtendError> {
    extend_or_replace(selector, source, targets, ExtendMode::AllTargets, span)
}

/// Like [`extend`], but the targets are replaced by `source` rather than
/// kept alongside it.
pub fn replace(
    selector: SelectorList,
    source: &SelectorList,
    targets: &SelectorList,
    span: Span,
) -> Result<SelectorList, ExtendError> {
    extend_or_replace(selector, source, targets, ExtendMode::Replace, span)
}

fn extend_or_replace(
    selector: SelectorList,
    source: &SelectorList,
    targets: &SelectorList,
    mode: ExtendMode,
    span: Span,
) -> Result<SelectorList, ExtendError> {
    let mut store = ExtensionStore::with_mode(mode);
    if !selector.is_invisible() {
        store
            .originals
            .extend(selector.components.iter().cloned());
    }

    let mut selector = selector;
    for complex in &targets.components {
        let compound = match &complex.components[..] {
            [ComplexSelectorComponent::Compound(compound)] => compound,
            _ => {
                return Err(ExtendError::InvalidTarget {
                    target: complex.to_string(),
                    span,
                });
            }
        };

        let mut extensions = ExtensionMap::default();
        for simple in &compound.components {
            let mut sources = FxIndexMap::default();
            for source_complex in &source.components {
                sources.insert(
                    source_complex.clone(),
                    Extension::new(
                        source_complex.clone(),
                        span,
                        simple.clone(),
                        span,
                        None,
                        true,
                    ),
                );
            }
            extensions.insert(simple.clone(), sources);
        }

        if let Some(extended) = store.extend_list(&selector, span, &extensions, None)? {
            selector = extended;
        }
    }
    Ok(selector)
}
