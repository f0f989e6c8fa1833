//! Keyword heuristics for pattern category and severity.
//!
//! Both classifiers are ordered rule lists: each rule is a label plus a set of
//! keywords, matched as case-insensitive substrings of the description. The
//! first rule with any hit wins; a description matching no rule gets the
//! list's fallback label.

use pm_common::{Category, Severity};

/// One `(keywords, label)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordRule<L> {
    pub label: L,
    pub keywords: &'static [&'static str],
}

impl<L> KeywordRule<L> {
    /// First keyword found in an already lower-cased description.
    fn hit(&self, lowered: &str) -> Option<&'static str> {
        self.keywords.iter().copied().find(|k| lowered.contains(k))
    }
}

/// Category rules in priority order.
pub static CATEGORY_RULES: &[KeywordRule<Category>] = &[
    KeywordRule {
        label: Category::Database,
        keywords: &["schema", "database", "table"],
    },
    KeywordRule {
        label: Category::Testing,
        keywords: &["test", "spec", "playwright"],
    },
    KeywordRule {
        label: Category::Build,
        keywords: &["build", "compile", "vite"],
    },
    KeywordRule {
        label: Category::Deployment,
        keywords: &["ci", "cd", "pipeline", "deploy"],
    },
    KeywordRule {
        label: Category::CodeStructure,
        keywords: &["component", "import", "path"],
    },
    KeywordRule {
        label: Category::Security,
        keywords: &["auth", "rls", "permission"],
    },
    KeywordRule {
        label: Category::Protocol,
        keywords: &["sub-agent", "subagent"],
    },
];

/// Severity rules in priority order.
pub static SEVERITY_RULES: &[KeywordRule<Severity>] = &[
    KeywordRule {
        label: Severity::Critical,
        keywords: &["critical", "blocker", "security"],
    },
    KeywordRule {
        label: Severity::High,
        keywords: &["error", "fail", "broke"],
    },
    KeywordRule {
        label: Severity::Medium,
        keywords: &["slow", "warning", "confusing"],
    },
];

/// An ordered, extensible rule list with a fallback label.
#[derive(Debug, Clone)]
pub struct RuleSet<L: Copy> {
    rules: Vec<KeywordRule<L>>,
    fallback: L,
}

impl<L: Copy> RuleSet<L> {
    pub fn new(rules: &[KeywordRule<L>], fallback: L) -> Self {
        Self {
            rules: rules.to_vec(),
            fallback,
        }
    }

    /// Append a rule with the lowest priority so far.
    pub fn with_rule(mut self, label: L, keywords: &'static [&'static str]) -> Self {
        self.rules.push(KeywordRule { label, keywords });
        self
    }

    pub fn rules(&self) -> &[KeywordRule<L>] {
        &self.rules
    }

    pub fn fallback(&self) -> L {
        self.fallback
    }

    pub fn classify(&self, description: &str) -> L {
        self.explain(description).0
    }

    /// Winning label and the keyword that triggered it (`None` for fallback).
    pub fn explain(&self, description: &str) -> (L, Option<&'static str>) {
        let lowered = description.to_lowercase();
        self.rules
            .iter()
            .find_map(|rule| rule.hit(&lowered).map(|k| (rule.label, Some(k))))
            .unwrap_or((self.fallback, None))
    }
}

/// Category and severity rule lists used together.
#[derive(Debug, Clone)]
pub struct Classifier {
    pub categories: RuleSet<Category>,
    pub severities: RuleSet<Severity>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            categories: RuleSet::new(CATEGORY_RULES, Category::General),
            severities: RuleSet::new(SEVERITY_RULES, Severity::Low),
        }
    }
}

impl Classifier {
    pub fn categorize(&self, description: &str) -> Category {
        self.categories.classify(description)
    }

    pub fn assess_severity(&self, description: &str) -> Severity {
        self.severities.classify(description)
    }
}

/// Category under the built-in rules.
pub fn categorize(description: &str) -> Category {
    RuleSet::new(CATEGORY_RULES, Category::General).classify(description)
}

/// Severity under the built-in rules.
pub fn assess_severity(description: &str) -> Severity {
    RuleSet::new(SEVERITY_RULES, Severity::Low).classify(description)
}
