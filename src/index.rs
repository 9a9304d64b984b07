//! Process-wide symbol index
//!
//! Lookups from name to symbols and from ID to symbol, with package and
//! kind secondary indices. The index is built incrementally during
//! extraction and becomes read-only once the graph freezes; after that
//! point concurrent `get_*` calls are safe because nothing mutates.
//!
//! Name lookups return symbols in insertion order, and that order is
//! stable across repeated calls.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::AdmissionError;
use crate::symbol::{Symbol, SymbolKind};

/// Snapshot counters for the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Total number of admitted symbols.
    pub total: usize,
    /// Per-kind counts in [`SymbolKind::ALL`] order, zero counts omitted.
    pub by_kind: Vec<(String, usize)>,
    /// Number of distinct packages.
    pub packages: usize,
}

/// Multi-keyed symbol lookup table.
///
/// Symbols are stored once in admission order; every secondary index
/// holds slot numbers into that store.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    symbols: Vec<Symbol>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
    by_package: HashMap<String, Vec<usize>>,
    kind_counts: HashMap<SymbolKind, usize>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a symbol.
    ///
    /// Rejects duplicates by ID and symbols violating the structural
    /// invariants (empty language, inverted line range).
    pub fn add(&mut self, symbol: Symbol) -> Result<(), AdmissionError> {
        if let Err(reason) = symbol.validate() {
            return Err(AdmissionError::InvalidSymbol {
                id: symbol.id.clone(),
                reason,
            });
        }
        if self.by_id.contains_key(&symbol.id) {
            return Err(AdmissionError::DuplicateId(symbol.id.clone()));
        }

        let slot = self.symbols.len();
        self.by_id.insert(symbol.id.clone(), slot);
        self.by_name
            .entry(symbol.name.clone())
            .or_default()
            .push(slot);
        self.by_package
            .entry(symbol.package.clone())
            .or_default()
            .push(slot);
        *self.kind_counts.entry(symbol.kind).or_insert(0) += 1;
        self.symbols.push(symbol);
        Ok(())
    }

    /// Look up one symbol by its unique ID.
    pub fn get_by_id(&self, id: &str) -> Option<&Symbol> {
        self.by_id.get(id).map(|&slot| &self.symbols[slot])
    }

    /// Iterate symbols sharing a name, in insertion order.
    ///
    /// The iterator is finite and restartable; calling this again for
    /// the same name yields the same sequence.
    pub fn get_by_name<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.by_name
            .get(name)
            .map(|slots| slots.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&slot| &self.symbols[slot])
    }

    /// Iterate symbols in a package, in insertion order.
    pub fn get_by_package<'a>(&'a self, package: &str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.by_package
            .get(package)
            .map(|slots| slots.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&slot| &self.symbols[slot])
    }

    /// Iterate all symbols in admission order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Snapshot counters: total, per-kind, package count.
    pub fn stats(&self) -> IndexStats {
        let by_kind = SymbolKind::ALL
            .iter()
            .filter_map(|kind| {
                self.kind_counts
                    .get(kind)
                    .map(|&count| (kind.as_str().to_string(), count))
            })
            .collect();
        IndexStats {
            total: self.symbols.len(),
            by_kind,
            packages: self.by_package.len(),
        }
    }
}
