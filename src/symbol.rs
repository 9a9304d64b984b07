//! Program symbol records
//!
//! A [`Symbol`] is an immutable value describing one program entity:
//! a function, method, type, interface, variable, constant, type alias
//! or package. Symbols are created by an external extractor and handed
//! to the engine; the engine never parses source.

use serde::{Deserialize, Serialize};

/// Classification of a program symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Struct,
    Interface,
    Variable,
    Constant,
    TypeAlias,
    Package,
}

impl SymbolKind {
    /// All kinds in a fixed reporting order.
    pub const ALL: [SymbolKind; 8] = [
        SymbolKind::Function,
        SymbolKind::Method,
        SymbolKind::Struct,
        SymbolKind::Interface,
        SymbolKind::Variable,
        SymbolKind::Constant,
        SymbolKind::TypeAlias,
        SymbolKind::Package,
    ];

    /// Stable lowercase name used in stats and parameter values.
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Struct => "struct",
            SymbolKind::Interface => "interface",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::TypeAlias => "type_alias",
            SymbolKind::Package => "package",
        }
    }

    /// Parse a kind from its stable name.
    pub fn parse(s: &str) -> Option<SymbolKind> {
        SymbolKind::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

/// One program symbol.
///
/// The ID is opaque to the engine; the canonical form produced by
/// [`Symbol::canonical_id`] is `file:line:name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub package: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub exported: bool,
    pub language: String,
}

impl Symbol {
    /// Build the canonical `file:line:name` ID form.
    pub fn canonical_id(file_path: &str, start_line: u32, name: &str) -> String {
        format!("{}:{}:{}", file_path, start_line, name)
    }

    /// Check the structural invariants required for index admission.
    ///
    /// Returns the reason string on failure so callers can surface it
    /// verbatim.
    pub fn validate(&self) -> Result<(), String> {
        if self.language.is_empty() {
            return Err("empty language".to_string());
        }
        if self.start_line < 1 {
            return Err("start line must be >= 1".to_string());
        }
        if self.end_line < self.start_line {
            return Err(format!(
                "end line {} precedes start line {}",
                self.end_line, self.start_line
            ));
        }
        Ok(())
    }

    /// Whether this symbol is a recognized program entry point.
    ///
    /// Entry points are `main`, `init`, and test functions (`Test`
    /// prefix). They are exempt from dead-code reporting.
    pub fn is_entry_point(&self) -> bool {
        self.name == "main" || self.name == "init" || self.name.starts_with("Test")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str, start: u32, end: u32) -> Symbol {
        Symbol {
            id: Symbol::canonical_id("pkg/a.go", start, name),
            name: name.to_string(),
            kind: SymbolKind::Function,
            file_path: "pkg/a.go".to_string(),
            start_line: start,
            end_line: end,
            package: "pkg".to_string(),
            signature: None,
            exported: false,
            language: "go".to_string(),
        }
    }

    #[test]
    fn test_canonical_id() {
        assert_eq!(
            Symbol::canonical_id("pkg/a.go", 10, "parseConfig"),
            "pkg/a.go:10:parseConfig"
        );
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(function("f", 1, 1).validate().is_ok());
        assert!(function("f", 3, 10).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_lines() {
        let sym = function("f", 10, 3);
        assert!(sym.validate().unwrap_err().contains("precedes"));
    }

    #[test]
    fn test_validate_rejects_empty_language() {
        let mut sym = function("f", 1, 2);
        sym.language = String::new();
        assert_eq!(sym.validate().unwrap_err(), "empty language");
    }

    #[test]
    fn test_entry_point_recognition() {
        assert!(function("main", 1, 2).is_entry_point());
        assert!(function("init", 1, 2).is_entry_point());
        assert!(function("TestParse", 1, 2).is_entry_point());
        assert!(!function("parseConfig", 1, 2).is_entry_point());
        assert!(!function("testing", 1, 2).is_entry_point());
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in SymbolKind::ALL {
            assert_eq!(SymbolKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SymbolKind::parse("gadget"), None);
    }
}
