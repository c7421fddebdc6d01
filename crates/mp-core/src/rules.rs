//! Page-Rule Matcher
//!
//! A page rule is a glob: `*` matches any substring, every other character
//! matches itself. Rules are anchored at both ends and compared
//! case-insensitively against the request path and the full URL of the
//! current page. An empty rule set matches every page.

use regex::{Regex, RegexBuilder};

use crate::url::Location;

/// Error type for page rule compilation.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Blank page rule")]
    Blank,
    #[error("Failed to compile page rule '{rule}': {source}")]
    Compile {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

// =============================================================================
// Glob Conversion
// =============================================================================

/// Convert a trimmed glob rule into an anchored regex source.
///
/// `*` becomes `.*`; every other character is escaped so it matches
/// literally. `/` is not a regex metacharacter and passes through as is.
pub fn glob_to_regex(rule: &str) -> String {
    let body = rule
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{}$", body)
}

// =============================================================================
// Single Rule
// =============================================================================

/// One compiled page rule.
#[derive(Debug, Clone)]
pub struct PageRule {
    raw: String,
    /// `None` when the pattern could not be compiled; only the exact
    /// comparison is left in that case.
    pattern: Option<Regex>,
}

impl PageRule {
    /// Compile a rule, failing on blank input or an unbuildable pattern.
    pub fn try_compile(rule: &str) -> Result<Self, RuleError> {
        let raw = rule.trim();
        if raw.is_empty() {
            return Err(RuleError::Blank);
        }

        let pattern = RegexBuilder::new(&glob_to_regex(raw))
            .case_insensitive(true)
            .build()
            .map_err(|source| RuleError::Compile {
                rule: raw.to_string(),
                source,
            })?;

        Ok(Self {
            raw: raw.to_string(),
            pattern: Some(pattern),
        })
    }

    /// Compile a rule, keeping only the exact comparison if the pattern
    /// cannot be built. Returns `None` for blank rules.
    pub fn compile(rule: &str) -> Option<Self> {
        match Self::try_compile(rule) {
            Ok(rule) => Some(rule),
            Err(RuleError::Blank) => None,
            Err(e) => {
                log::warn!("{}; falling back to exact comparison", e);
                Some(Self {
                    raw: rule.trim().to_string(),
                    pattern: None,
                })
            }
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Check the rule against the path form and the full URL form.
    pub fn matches(&self, path: &str, full_url: &str) -> bool {
        if let Some(pattern) = &self.pattern {
            if pattern.is_match(path) || pattern.is_match(full_url) {
                return true;
            }
        }

        // Exact comparison covers rules the glob conversion cannot express
        self.raw == path || self.raw == full_url
    }
}

// =============================================================================
// Rule Set
// =============================================================================

/// An ordered set of compiled page rules for one popup.
#[derive(Debug, Clone, Default)]
pub struct PageRules {
    rules: Vec<PageRule>,
}

impl PageRules {
    /// Compile every non-blank rule, keeping configured order.
    pub fn compile<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rules: rules
                .into_iter()
                .filter_map(|rule| PageRule::compile(rule.as_ref()))
                .collect(),
        }
    }

    /// True when there are no non-blank rules, which matches every page.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageRule> {
        self.rules.iter()
    }

    /// First rule that matches, if any.
    pub fn find_match(&self, path: &str, full_url: &str) -> Option<&PageRule> {
        self.rules.iter().find(|rule| rule.matches(path, full_url))
    }

    pub fn matches(&self, path: &str, full_url: &str) -> bool {
        self.is_empty() || self.find_match(path, full_url).is_some()
    }

    pub fn matches_location(&self, location: &Location) -> bool {
        self.matches(&location.path, &location.full_url)
    }
}

/// Decide whether a popup with `rules` may appear on the current page.
///
/// Compiles the rules on every call; use [`PageRules`] to evaluate the same
/// rules repeatedly.
pub fn matches<S: AsRef<str>>(rules: &[S], current_path: &str, current_full_url: &str) -> bool {
    PageRules::compile(rules).matches(current_path, current_full_url)
}
