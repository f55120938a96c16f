//! Layered, sorted records with strict keys and lazy values.
//!
//! A record is either a single sorted binding list (`Base`) or an overlay
//! binding list stacked on top of another record (`Layer`). The update
//! operator only stacks a new layer, which makes it O(1); once a chain
//! reaches the configured depth its base is flattened first, so lookups
//! never scan more than a bounded number of layers.
//!
//! Layers are immutable and freely shared: a base may sit under any number
//! of overlays at the same time. Nothing in this module forces a value.
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{Arc, LazyLock, OnceLock},
};

use log::debug;

use crate::{
    config::DEFAULT_MAX_LAYER_DEPTH,
    error::{ValueError, ValueResult},
    session::Session,
    symbol::{Symbol, SymbolTable},
    teardown::{Debris, Rubble, Salvage, teardown},
    thunk::Thunk,
    value::{Function, Value},
};

/// A key together with its deferred value.
#[derive(Debug, Clone)]
pub struct Binding {
    pub key: Symbol,
    pub value: Thunk,
}

type Bindings = Arc<[Binding]>;

fn find(bindings: &[Binding], key: Symbol) -> Option<&Thunk> {
    bindings
        .binary_search_by_key(&key, |b| b.key)
        .ok()
        .map(|idx| &bindings[idx].value)
}

enum Node {
    Base(Bindings),
    Layer {
        overlay: Bindings,
        base: Record,
        depth: usize,
        // Flattened view, computed on first whole-record read
        flat: OnceLock<Bindings>,
    },
}

/// An immutable record.
#[derive(Clone)]
pub struct Record(Arc<Node>);

static EMPTY: LazyLock<Record> = LazyLock::new(|| Record::from_sorted(Arc::from(Vec::new())));

impl Record {
    /// The record without any binding.
    pub fn empty() -> Self {
        EMPTY.clone()
    }

    fn from_sorted(bindings: Bindings) -> Self {
        debug_assert!(bindings.windows(2).all(|w| w[0].key < w[1].key));
        Record(Arc::new(Node::Base(bindings)))
    }

    fn freeze(
        mut bindings: Vec<Binding>,
        name_of: impl Fn(Symbol) -> String,
    ) -> ValueResult<Self> {
        bindings.sort_by_key(|b| b.key);
        if let Some(dup) = bindings.windows(2).find(|w| w[0].key == w[1].key) {
            return Err(ValueError::DuplicateKey {
                key: name_of(dup[0].key),
            });
        }
        Ok(Self::from_sorted(bindings.into()))
    }

    /// Build a record from key/value pairs in any order.
    ///
    /// Faults with [`ValueError::DuplicateKey`] if a key is bound twice. Use
    /// [`RecordBuilder`] to get key names instead of raw symbols in that fault.
    pub fn from_bindings(
        bindings: impl IntoIterator<Item = (Symbol, Thunk)>,
    ) -> ValueResult<Self> {
        let bindings = bindings
            .into_iter()
            .map(|(key, value)| Binding { key, value })
            .collect();
        Self::freeze(bindings, |key| key.to_string())
    }

    /// Build a record whose bindings may refer to the record itself.
    ///
    /// `build` receives a [`SelfRef`] that resolves to the finished record.
    /// Deferred values capture the handle and resolve their siblings lazily,
    /// so mutually recursive bindings work as long as they are not forced
    /// into a genuine cycle (which faults with [`ValueError::CyclicForce`]).
    ///
    /// An unforced binding keeps the record alive through its handle; the
    /// reference is released as soon as that binding is forced.
    pub fn recursive(
        build: impl FnOnce(&SelfRef) -> ValueResult<Record>,
    ) -> ValueResult<Record> {
        let handle = SelfRef(Arc::new(OnceLock::new()));
        let record = build(&handle)?;
        let _ = handle.0.set(record.clone());
        Ok(record)
    }

    pub fn is_empty(&self) -> bool {
        match &*self.0 {
            Node::Base(bindings) => bindings.is_empty(),
            // Layers are only stacked from two non-empty sides
            Node::Layer { .. } => false,
        }
    }

    /// Number of layers between this record and its innermost base.
    pub fn depth(&self) -> usize {
        match &*self.0 {
            Node::Base(_) => 1,
            Node::Layer { depth, .. } => *depth,
        }
    }

    /// Look `key` up, scanning from the outermost layer inward.
    pub fn lookup(&self, key: Symbol) -> Option<Thunk> {
        let mut node = self;
        loop {
            match &*node.0 {
                Node::Base(bindings) => return find(bindings, key).cloned(),
                Node::Layer {
                    overlay,
                    base,
                    flat,
                    ..
                } => {
                    if let Some(flat) = flat.get() {
                        return find(flat, key).cloned();
                    }
                    if let Some(value) = find(overlay, key) {
                        return Some(value.clone());
                    }
                    node = base;
                }
            }
        }
    }

    pub fn contains(&self, key: Symbol) -> bool {
        let mut node = self;
        loop {
            match &*node.0 {
                Node::Base(bindings) => return find(bindings, key).is_some(),
                Node::Layer {
                    overlay,
                    base,
                    flat,
                    ..
                } => {
                    if let Some(flat) = flat.get() {
                        return find(flat, key).is_some();
                    }
                    if find(overlay, key).is_some() {
                        return true;
                    }
                    node = base;
                }
            }
        }
    }

    /// Look `key` up and force its value.
    ///
    /// `Ok(None)` means the key is absent; a fault of the value is local to
    /// this call and does not affect other keys.
    pub fn get(&self, key: Symbol) -> ValueResult<Option<Value>> {
        self.lookup(key).map(|value| value.force()).transpose()
    }

    /// `self // overlay`: keys of `overlay` shadow keys of `self`.
    ///
    /// Uses the default layer depth bound.
    #[doc(alias = "override")]
    pub fn update(&self, overlay: &Record) -> Record {
        self.update_bounded(overlay, DEFAULT_MAX_LAYER_DEPTH)
    }

    /// [`Record::update`] with the layer depth bound of `session`.
    pub fn update_in(&self, overlay: &Record, session: &Session) -> Record {
        self.update_bounded(overlay, session.config().max_layer_depth)
    }

    /// [`Record::update`] flattening the base once it has `max_depth` layers.
    pub fn update_bounded(&self, overlay: &Record, max_depth: usize) -> Record {
        if overlay.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return overlay.clone();
        }

        let base = if self.depth() >= max_depth {
            self.flatten()
        } else {
            self.clone()
        };
        let depth = base.depth() + 1;

        Record(Arc::new(Node::Layer {
            overlay: overlay.bindings(),
            base,
            depth,
            flat: OnceLock::new(),
        }))
    }

    fn bindings(&self) -> Bindings {
        match &*self.0 {
            Node::Base(bindings) => bindings.clone(),
            Node::Layer { flat, .. } => flat.get_or_init(|| self.merge_layers()).clone(),
        }
    }

    /// All bindings of the record, sorted by key, outer layers winning.
    pub fn entries(&self) -> &[Binding] {
        match &*self.0 {
            Node::Base(bindings) => &bindings[..],
            Node::Layer { flat, .. } => &flat.get_or_init(|| self.merge_layers())[..],
        }
    }

    fn merge_layers(&self) -> Bindings {
        // Collect layers outermost first, stopping at the first already flat view
        let mut layers: Vec<&Bindings> = Vec::with_capacity(self.depth());
        let mut node = self;
        loop {
            match &*node.0 {
                Node::Base(bindings) => {
                    layers.push(bindings);
                    break;
                }
                Node::Layer {
                    overlay, base, flat, ..
                } => match flat.get() {
                    Some(flat) => {
                        layers.push(flat);
                        break;
                    }
                    None => {
                        layers.push(overlay);
                        node = base;
                    }
                },
            }
        }

        // Seed from the innermost layer, letting outer layers overwrite
        let mut acc: BTreeMap<Symbol, &Thunk> = BTreeMap::new();
        for layer in layers.iter().rev() {
            for binding in layer.iter() {
                acc.insert(binding.key, &binding.value);
            }
        }

        debug!(
            "Flattened {} record layers into {} bindings",
            layers.len(),
            acc.len()
        );

        acc.into_iter()
            .map(|(key, value)| Binding {
                key,
                value: value.clone(),
            })
            .collect()
    }

    /// Collapse all layers into a single sorted base.
    pub fn flatten(&self) -> Record {
        match &*self.0 {
            Node::Base(_) => self.clone(),
            Node::Layer { .. } => Self::from_sorted(self.bindings()),
        }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Thunk)> + '_ {
        self.entries().iter().map(|b| (b.key, &b.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.entries().iter().map(|b| b.key)
    }

    /// A record with the same keys whose values defer `function` applied to each old value.
    pub fn map_values(&self, function: &Function) -> Record {
        let bindings: Vec<Binding> = self
            .entries()
            .iter()
            .map(|b| Binding {
                key: b.key,
                value: Thunk::apply(function.clone(), b.value.clone()),
            })
            .collect();
        Self::from_sorted(bindings.into())
    }

    /// A record without the given keys. Absent keys are ignored.
    pub fn without(&self, keys: impl IntoIterator<Item = Symbol>) -> Record {
        let removed: BTreeSet<Symbol> = keys.into_iter().collect();
        if removed.is_empty() {
            return self.clone();
        }
        let bindings: Vec<Binding> = self
            .entries()
            .iter()
            .filter(|b| !removed.contains(&b.key))
            .cloned()
            .collect();
        Self::from_sorted(bindings.into())
    }

    /// Bindings of `self` whose keys are also bound in `other`.
    pub fn intersect(&self, other: &Record) -> Record {
        let bindings: Vec<Binding> = self
            .entries()
            .iter()
            .filter(|b| other.contains(b.key))
            .cloned()
            .collect();
        Self::from_sorted(bindings.into())
    }

    /// Whether both handles designate the same record node.
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn salvage_bindings(mut bindings: Bindings, rubble: &mut Rubble) {
    if let Some(bindings) = Arc::get_mut(&mut bindings) {
        for binding in bindings.iter_mut() {
            binding.value.salvage(rubble);
        }
    }
}

impl Salvage for Record {
    fn salvage(&mut self, rubble: &mut Rubble) {
        if Arc::get_mut(&mut self.0).is_none() {
            return;
        }
        let node = std::mem::replace(&mut self.0, EMPTY.0.clone());
        match Arc::into_inner(node) {
            Some(Node::Base(bindings)) => salvage_bindings(bindings, rubble),
            Some(Node::Layer {
                overlay,
                base,
                flat,
                ..
            }) => {
                // The flat view shares its cells with the layers: release the
                // layers first so the view holds the last handles
                salvage_bindings(overlay, rubble);
                if let Some(flat) = flat.into_inner() {
                    salvage_bindings(flat, rubble);
                }
                rubble.push(Debris::Record(base));
            }
            None => {}
        }
    }
}

impl Drop for Record {
    fn drop(&mut self) {
        teardown(self);
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Handle through which the bindings of a recursive record reach the record.
#[derive(Clone)]
pub struct SelfRef(Arc<OnceLock<Record>>);

impl SelfRef {
    /// The record under construction.
    ///
    /// Faults if it is resolved before [`Record::recursive`] returned, which
    /// only happens when a binding is forced while the record is being built.
    pub fn record(&self) -> ValueResult<Record> {
        self.0.get().cloned().ok_or_else(|| {
            ValueError::thrown("recursive record referenced before its construction completed")
        })
    }

    /// Look a sibling binding up.
    pub fn lookup(&self, key: Symbol) -> ValueResult<Option<Thunk>> {
        Ok(self.record()?.lookup(key))
    }
}

/// Incremental construction of a literal record.
///
/// Keys are resolved when inserted; values are stored unforced.
pub struct RecordBuilder<'a> {
    symbols: &'a SymbolTable,
    bindings: Vec<Binding>,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            bindings: Vec::new(),
        }
    }

    pub fn with_capacity(symbols: &'a SymbolTable, capacity: usize) -> Self {
        Self {
            symbols,
            bindings: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, key: Symbol, value: Thunk) -> &mut Self {
        self.bindings.push(Binding { key, value });
        self
    }

    pub fn insert_named(&mut self, name: &str, value: Thunk) -> &mut Self {
        let key = self.symbols.intern(name);
        self.insert(key, value)
    }

    /// Bind a computed key: `key` is forced now and must produce a string.
    ///
    /// The provenance context of the key string is not retained.
    pub fn insert_dynamic(&mut self, key: &Thunk, value: Thunk) -> ValueResult<&mut Self> {
        let key = key.force()?;
        let name = key.as_string()?;
        Ok(self.insert_named(name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Sort the bindings and freeze them into a record.
    pub fn build(self) -> ValueResult<Record> {
        let symbols = self.symbols;
        Record::freeze(self.bindings, |key| symbols.fmt(key).to_string())
    }
}
