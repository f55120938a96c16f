use std::path::Path;

use crate::{
    config::ValueConfig,
    error::ValueResult,
    symbol::{Symbol, SymbolTable},
};

/// Per-evaluation context shared by everything that builds or reads values.
///
/// A session is created once per evaluation request and is read-mostly
/// afterwards: the symbol table only grows, the configuration never changes.
/// Values built under one session must only be read back through that same
/// session, since their keys are symbols of its table.
#[derive(Default)]
pub struct Session {
    symbols: SymbolTable,
    config: ValueConfig,
}

impl Session {
    pub fn new(config: ValueConfig) -> Self {
        Self {
            symbols: SymbolTable::new(),
            config,
        }
    }

    /// Create a session configured from the file at [`ValueConfig::default_path`], if any.
    pub fn from_default_config() -> ValueResult<Self> {
        Self::from_config_file(&ValueConfig::default_path())
    }

    pub fn from_config_file(path: &Path) -> ValueResult<Self> {
        Ok(Self::new(ValueConfig::load_or_default(path)?))
    }

    pub fn config(&self) -> &ValueConfig {
        &self.config
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Shorthand for `self.symbols().intern(name)`.
    pub fn intern(&self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }
}
