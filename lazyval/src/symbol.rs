//! Interned record keys.
//!
//! Record keys are resolved to [`Symbol`]s before a record is built. A symbol
//! is a small copyable identifier handed out by a [`SymbolTable`]; comparing
//! or ordering symbols never touches the underlying text. Records keep their
//! bindings sorted by symbol, so the key order of a record is the interning
//! order of its keys. Name-ordered views are produced at the extraction
//! boundary by resolving symbols back through the table.
use std::{collections::HashMap, fmt, sync::Arc};

use log::debug;
use parking_lot::RwLock;

/// A resolved, interned identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl Symbol {
    /// The symbol issued for the `count`-th distinct name.
    ///
    /// # Panics
    /// If the table already holds `u32::MAX + 1` names.
    fn issue(count: usize) -> Symbol {
        let index = u32::try_from(count).expect("symbol table exhausted the 32-bit symbol space");
        Symbol(index)
    }

    /// Raw index of the symbol inside its table.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Default)]
struct Interned {
    names: Vec<Arc<str>>,
    lookup: HashMap<Arc<str>, Symbol>,
}

/// Deduplicating store of symbol names.
///
/// A table is created once per evaluation session and shared by every record
/// built during that session. Symbols from different tables must not be mixed.
///
/// ```rust
/// # use lazyval::symbol::SymbolTable;
/// let table = SymbolTable::new();
/// let a = table.intern("name");
/// assert_eq!(table.intern("name"), a);
/// assert_eq!(table.resolve(a).as_deref(), Some("name"));
/// ```
///
/// # A note on concurrency
/// Lookups take a shared lock. Interning a new name upgrades to an exclusive
/// lock; names are expected to be interned far less often than looked up.
#[derive(Default)]
pub struct SymbolTable {
    inner: RwLock<Interned>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the symbol for `name`, interning it if this is its first use.
    ///
    /// Panics once more than `u32::MAX + 1` distinct names were interned.
    pub fn intern(&self, name: &str) -> Symbol {
        let guard = self.inner.upgradable_read();
        if let Some(symbol) = guard.lookup.get(name) {
            return *symbol;
        }

        let mut guard = parking_lot::RwLockUpgradableReadGuard::upgrade(guard);
        let symbol = Symbol::issue(guard.names.len());
        let name: Arc<str> = Arc::from(name);
        debug!("Interned symbol {} for `{}`", symbol, name);
        guard.names.push(name.clone());
        guard.lookup.insert(name, symbol);
        symbol
    }

    /// The symbol of `name` if it was interned before.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.inner.read().lookup.get(name).copied()
    }

    /// The name behind `symbol`, or `None` if it was not issued by this table.
    pub fn resolve(&self, symbol: Symbol) -> Option<Arc<str>> {
        self.inner.read().names.get(symbol.0 as usize).cloned()
    }

    /// Number of distinct symbols interned so far.
    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Format a symbol by name, falling back to its raw index.
    pub fn fmt(&self, symbol: Symbol) -> impl fmt::Display + '_ {
        struct Fmt<'a> {
            table: &'a SymbolTable,
            symbol: Symbol,
        }

        impl fmt::Display for Fmt<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.table.resolve(self.symbol) {
                    Some(name) => f.write_str(&name),
                    None => write!(f, "<unknown symbol {}>", self.symbol),
                }
            }
        }

        Fmt {
            table: self,
            symbol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable_and_ordered() {
        let table = SymbolTable::new();
        let b = table.intern("b");
        let a = table.intern("a");
        assert!(b < a, "symbols order by interning, not by name");
        assert_eq!(table.intern("b"), b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("a"), Some(a));
        assert_eq!(table.get("c"), None);
    }

    #[test]
    fn formats_unknown_symbols() {
        let table = SymbolTable::new();
        let other = SymbolTable::new();
        other.intern("x");
        let foreign = other.intern("y");
        assert_eq!(table.fmt(foreign).to_string(), "<unknown symbol #1>");
    }

    #[test]
    fn symbols_are_issued_up_to_the_last_index() {
        assert_eq!(Symbol::issue(u32::MAX as usize).index(), u32::MAX);
    }

    #[test]
    #[should_panic(expected = "exhausted the 32-bit symbol space")]
    fn symbol_space_exhaustion_is_not_silent() {
        Symbol::issue(u32::MAX as usize + 1);
    }

    #[test]
    fn concurrent_interning_agrees() {
        let table = SymbolTable::new();
        let symbols: Vec<Symbol> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| table.intern("shared")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(symbols.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(table.len(), 1);
    }
}
