//! Global declarations summary
//!
//! The compiler collaborator reports the top-level bindings a script would
//! create so the context can run `GlobalDeclarationInstantiation` checks
//! before any code executes (cross-script redeclaration, clashes with
//! non-configurable global properties).

use serde::{Deserialize, Serialize};

/// Top-level declarations of a compiled script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Declarations {
    /// `var` names declared at the top level.
    pub var_names: Vec<String>,
    /// Top-level function declaration names (a subset of var-scoped names,
    /// listed separately because functions initialize eagerly).
    pub function_names: Vec<String>,
    /// `let`/`const`/`class` names declared at the top level.
    pub lex_names: Vec<String>,
}

impl Declarations {
    /// Create an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `var` declaration.
    pub fn var_name(mut self, name: impl Into<String>) -> Self {
        self.var_names.push(name.into());
        self
    }

    /// Record a function declaration.
    pub fn function_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.function_names.push(name.clone());
        self.var_names.push(name);
        self
    }

    /// Record a lexical (`let`/`const`) declaration.
    pub fn lex_name(mut self, name: impl Into<String>) -> Self {
        self.lex_names.push(name.into());
        self
    }

    /// Whether the script declares nothing at the top level.
    pub fn is_empty(&self) -> bool {
        self.var_names.is_empty() && self.lex_names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_names_are_var_scoped() {
        let decls = Declarations::new().function_name("f").var_name("x");
        assert_eq!(decls.var_names, vec!["f", "x"]);
        assert_eq!(decls.function_names, vec!["f"]);
        assert!(decls.lex_names.is_empty());
    }
}
