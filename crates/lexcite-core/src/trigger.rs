//! Citation trigger detection for editor text.
//!
//! Looks at the text immediately before the cursor and decides whether the
//! author has typed one of the legal shorthands that should open citation
//! suggestions ("IRC 162", "§ 274", "@cite hobby loss", ...).
//!
//! # Rules
//!
//! Rules form an ordered table; the first rule whose pattern ends exactly at
//! the cursor wins:
//!
//! | name           | shape                              |
//! |----------------|------------------------------------|
//! | `irc_section`  | `IRC [section] [162a]`             |
//! | `section`      | `section 162` / `§ 162`            |
//! | `cite`         | `@cite <free text>`                |
//! | `treas_reg`    | `Treas. Reg. [section] <text>`     |
//! | `cfr`          | `C.F.R. [§] <text>`                |
//! | `commissioner` | `<Name> v. Commissioner`           |
//!
//! Nothing after the cursor is ever inspected.

use std::sync::LazyLock;

use regex::Regex;

/// Matches shorter than this are detected but not searched.
pub const DEFAULT_MIN_QUERY_LEN: usize = 3;

/// (name, pattern) in priority order. Patterns are anchored at the cursor
/// when compiled.
const DEFAULT_RULES: &[(&str, &str)] = &[
    ("irc_section", r"(?i)\bIRC\s+(?:section\s+)?(?:\d+[a-z]?)?"),
    ("section", r"(?i)(?:\bsection|§)\s*(?:\d+[a-z]?)?"),
    ("cite", r"(?i)@cite\s+.*"),
    ("treas_reg", r"(?i)\bTreas\.?\s*Reg\.?\s*(?:section\s+)?.*"),
    ("cfr", r"(?i)\bC\.?F\.?R\.?\s*(?:§\s*)?.*"),
    ("commissioner", r"(?i)\b[a-z][\w.'&-]*\s+v\.\s+commissioner"),
];

static DEFAULT_DETECTOR: LazyLock<TriggerDetector> = LazyLock::new(TriggerDetector::default);

/// One entry of the trigger table.
#[derive(Debug, Clone)]
pub struct TriggerRule {
    pub name: &'static str,
    pattern: Regex,
    pub min_query_len: usize,
}

impl TriggerRule {
    /// Compile a rule. `pattern` is anchored to the end of the inspected text,
    /// so it should not carry its own `$`.
    pub fn new(
        name: &'static str,
        pattern: &str,
        min_query_len: usize,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(&format!("(?:{pattern})$"))?,
            min_query_len,
        })
    }
}

/// A trigger found immediately before the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    /// Name of the rule that fired.
    pub rule: &'static str,
    /// The exact matched text, used verbatim as the search query.
    pub query: String,
    /// Byte offset of the start of `query` in the source text.
    pub start: usize,
    pub min_query_len: usize,
}

/// Result of replacing a trigger span with an accepted citation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub text: String,
    /// Byte offset just past the inserted citation.
    pub cursor: usize,
}

impl TriggerMatch {
    /// Whether the match is long enough to be worth a search.
    pub fn is_searchable(&self) -> bool {
        self.query.chars().count() >= self.min_query_len
    }

    /// Byte offset where the match ends (the cursor it was detected at).
    pub fn end(&self) -> usize {
        self.start + self.query.len()
    }

    /// Replace `text[start..cursor]` with `citation`.
    ///
    /// Text after the cursor is preserved; the returned cursor sits right
    /// after the citation.
    pub fn splice(&self, text: &str, cursor: usize, citation: &str) -> Splice {
        let cursor = floor_char_boundary(text, cursor);
        let start = floor_char_boundary(text, self.start.min(cursor));

        let mut out = String::with_capacity(text.len() - (cursor - start) + citation.len());
        out.push_str(&text[..start]);
        out.push_str(citation);
        out.push_str(&text[cursor..]);

        Splice {
            text: out,
            cursor: start + citation.len(),
        }
    }
}

/// Ordered trigger table plus the matching logic.
#[derive(Debug, Clone)]
pub struct TriggerDetector {
    rules: Vec<TriggerRule>,
}

impl Default for TriggerDetector {
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(name, pattern)| {
                TriggerRule::new(name, pattern, DEFAULT_MIN_QUERY_LEN)
                    .expect("built-in trigger pattern compiles")
            })
            .collect();
        Self { rules }
    }
}

impl TriggerDetector {
    pub fn new(rules: Vec<TriggerRule>) -> Self {
        Self { rules }
    }

    /// Override the search threshold for every rule.
    pub fn with_min_query_len(mut self, min_query_len: usize) -> Self {
        for rule in &mut self.rules {
            rule.min_query_len = min_query_len;
        }
        self
    }

    /// Append a rule with the lowest priority.
    pub fn push_rule(&mut self, rule: TriggerRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }

    /// Find the highest-priority trigger ending at `cursor`.
    ///
    /// `cursor` is a byte offset; values past the end are clamped and values
    /// inside a multi-byte character are moved back to its start.
    pub fn detect(&self, text: &str, cursor: usize) -> Option<TriggerMatch> {
        let cursor = floor_char_boundary(text, cursor);
        let before = &text[..cursor];

        self.rules.iter().find_map(|rule| {
            rule.pattern.find(before).map(|m| TriggerMatch {
                rule: rule.name,
                query: m.as_str().to_string(),
                start: m.start(),
                min_query_len: rule.min_query_len,
            })
        })
    }
}

/// [`TriggerDetector::detect`] with the built-in table.
pub fn detect_trigger(text: &str, cursor: usize) -> Option<TriggerMatch> {
    DEFAULT_DETECTOR.detect(text, cursor)
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}
