//! Per-parse configuration.
//!
//! Every relaxation is off by default, so an unconfigured parser is a
//! strict, non-validating XML 1.0 processor. Options deserialize from any
//! serde format; missing fields take their defaults.

use serde::{Deserialize, Serialize};

/// Default bound on element nesting.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Switches controlling checking, entity loading and SGML compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ParserOptions {
    /// Check validity constraints against the DTD.
    pub check_validity: bool,
    /// Also check "for compatibility" constraints. Implies
    /// `check_validity`.
    pub check_compatibility: bool,
    /// Also report processing errors. Implies `check_compatibility`.
    pub check_all_errors: bool,
    /// Abort on the first validity error instead of recording it.
    pub raise_validity_errors: bool,
    /// Read the external subset and external parsed entities.
    pub open_external_entities: bool,
    /// Allow external entities at non-local (e.g. `http`) locations.
    pub open_remote_entities: bool,
    /// Recover from common well-formedness errors instead of failing.
    pub dont_check_wellformedness: bool,
    /// Treat U+2028 as a line feed and U+2029 as a space.
    pub unicode_compatibility: bool,
    /// Match keywords case-insensitively and fold element and attribute
    /// names to lower case.
    pub sgml_namecase_general: bool,
    /// Infer omitted start and end tags by asking the builder.
    pub sgml_omittag: bool,
    /// Accept attributes given as a bare value, `<td nowrap>`.
    pub sgml_shorttag: bool,
    /// Honour builder-declared EMPTY and CDATA element classes.
    pub sgml_content: bool,
    /// Keep character references to non-characters instead of failing.
    pub allow_non_char_references: bool,
    /// Maximum element nesting depth.
    pub max_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            check_validity: false,
            check_compatibility: false,
            check_all_errors: false,
            raise_validity_errors: false,
            open_external_entities: false,
            open_remote_entities: false,
            dont_check_wellformedness: false,
            unicode_compatibility: false,
            sgml_namecase_general: false,
            sgml_omittag: false,
            sgml_shorttag: false,
            sgml_content: false,
            allow_non_char_references: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParserOptions {
    /// Settings for HTML-like tag soup: all SGML options plus loose
    /// well-formedness checking.
    #[must_use]
    pub fn sgml() -> Self {
        Self {
            dont_check_wellformedness: true,
            sgml_namecase_general: true,
            sgml_omittag: true,
            sgml_shorttag: true,
            sgml_content: true,
            ..Self::default()
        }
    }

    /// Enable validity checking.
    #[must_use]
    pub const fn with_validity(mut self, on: bool) -> Self {
        self.check_validity = on;
        self
    }

    /// Enable compatibility checking.
    #[must_use]
    pub const fn with_compatibility(mut self, on: bool) -> Self {
        self.check_compatibility = on;
        self
    }

    /// Enable reporting of every error class.
    #[must_use]
    pub const fn with_all_errors(mut self, on: bool) -> Self {
        self.check_all_errors = on;
        self
    }

    /// Raise validity errors instead of recording them.
    #[must_use]
    pub const fn with_raise_validity_errors(mut self, on: bool) -> Self {
        self.raise_validity_errors = on;
        self
    }

    /// Read external entities.
    #[must_use]
    pub const fn with_external_entities(mut self, on: bool) -> Self {
        self.open_external_entities = on;
        self
    }

    /// Read external entities from remote locations.
    #[must_use]
    pub const fn with_remote_entities(mut self, on: bool) -> Self {
        self.open_remote_entities = on;
        self
    }

    /// Loose well-formedness checking.
    #[must_use]
    pub const fn with_loose_parsing(mut self, on: bool) -> Self {
        self.dont_check_wellformedness = on;
        self
    }

    /// Unicode line and paragraph separators as white space.
    #[must_use]
    pub const fn with_unicode_compatibility(mut self, on: bool) -> Self {
        self.unicode_compatibility = on;
        self
    }

    /// SGML tag omission.
    #[must_use]
    pub const fn with_omittag(mut self, on: bool) -> Self {
        self.sgml_omittag = on;
        self
    }

    /// Keep non-Char character references.
    #[must_use]
    pub const fn with_non_char_references(mut self, on: bool) -> Self {
        self.allow_non_char_references = on;
        self
    }

    /// Set the element nesting bound.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The options with implied checks switched on.
    #[must_use]
    pub const fn normalized(mut self) -> Self {
        if self.check_all_errors {
            self.check_compatibility = true;
        }
        if self.check_compatibility {
            self.check_validity = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_implies_lower_levels() {
        let options = ParserOptions::default().with_all_errors(true).normalized();
        assert!(options.check_compatibility);
        assert!(options.check_validity);
        assert!(!ParserOptions::default().normalized().check_validity);
    }

    #[test]
    fn test_sgml_preset() {
        let options = ParserOptions::sgml();
        assert!(options.sgml_omittag && options.dont_check_wellformedness);
        assert!(!options.check_validity);
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
    }
}
