//! RegExp internal slots
//!
//! The pattern engine itself is an external collaborator (the `regress`
//! crate); this module fixes the slots the core consumes: source, flags,
//! the compiled program, and the mutable `lastIndex` cursor.

use std::cell::Cell;

use crate::error::{VmError, VmResult};

/// Internal slots of a `RegExp` object.
pub struct RegExpData {
    /// Pattern source text
    pub source: String,
    /// Flag string in canonical order
    pub flags: String,
    /// Compiled program
    pub regex: regress::Regex,
    /// `lastIndex`, used by sticky/global matching
    pub last_index: Cell<u64>,
}

impl RegExpData {
    /// Compile `source` with `flags`. Compilation failures surface as
    /// `SyntaxError`.
    pub fn compile(source: &str, flags: &str) -> VmResult<Self> {
        let regex = regress::Regex::with_flags(source, flags).map_err(|e| {
            VmError::syntax_error(format!(
                "Invalid regular expression: /{source}/{flags}: {e}"
            ))
        })?;
        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
            last_index: Cell::new(0),
        })
    }

    /// Whether the `g` flag is set.
    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }

    /// Whether the `y` flag is set.
    pub fn is_sticky(&self) -> bool {
        self.flags.contains('y')
    }

    /// `/source/flags` display form.
    pub fn to_pattern_string(&self) -> String {
        let source = if self.source.is_empty() {
            "(?:)"
        } else {
            &self.source
        };
        format!("/{}/{}", source, self.flags)
    }
}

impl std::fmt::Debug for RegExpData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegExpData({})", self.to_pattern_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_and_flags() {
        let re = RegExpData::compile("a+b", "gi").unwrap();
        assert!(re.is_global());
        assert!(!re.is_sticky());
        assert_eq!(re.to_pattern_string(), "/a+b/gi");
    }

    #[test]
    fn test_bad_pattern_is_syntax_error() {
        let err = RegExpData::compile("(", "").unwrap_err();
        assert!(matches!(err, VmError::SyntaxError(_)));
    }

    #[test]
    fn test_empty_source_display() {
        let re = RegExpData::compile("", "").unwrap();
        assert_eq!(re.to_pattern_string(), "/(?:)/");
    }
}
