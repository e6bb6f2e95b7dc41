use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ChartError;

/// Whole-word marker matched case-insensitively, compiled once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WordMarker {
    text: String,
    regex: Regex,
}

impl WordMarker {
    pub fn new(text: impl Into<String>) -> Result<Self, ChartError> {
        let text = text.into();
        if text.is_empty() {
            return Err(ChartError::InvalidRules("empty word marker".to_string()));
        }
        let regex = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(&text)))
            .case_insensitive(true)
            .build()
            .map_err(|e| ChartError::InvalidRules(e.to_string()))?;
        Ok(Self { text, regex })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl PartialEq for WordMarker {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for WordMarker {}

impl TryFrom<String> for WordMarker {
    type Error = ChartError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::new(text)
    }
}

impl From<WordMarker> for String {
    fn from(marker: WordMarker) -> Self {
        marker.text
    }
}

/// Name predicate used by the colour and ordering rule tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Pattern {
    /// Whole name equals the text.
    Exact(String),
    /// Text occurs anywhere in the name (case-sensitive).
    Contains(String),
    /// Text occurs as a whole word, ignoring case: `BEV` matches `OL-BEV`
    /// but not `BEVx`.
    Word(WordMarker),
}

impl Pattern {
    pub fn exact(text: impl Into<String>) -> Self {
        Pattern::Exact(text.into())
    }

    pub fn contains(text: impl Into<String>) -> Self {
        Pattern::Contains(text.into())
    }

    pub fn word(text: impl Into<String>) -> Result<Self, ChartError> {
        WordMarker::new(text).map(Pattern::Word)
    }

    pub fn text(&self) -> &str {
        match self {
            Pattern::Exact(t) | Pattern::Contains(t) => t,
            Pattern::Word(w) => w.text(),
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Pattern::Exact(_))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Pattern::Exact(t) => name == t,
            Pattern::Contains(t) => name.contains(t.as_str()),
            Pattern::Word(w) => w.is_match(name),
        }
    }

    /// Smallest name this pattern is written to catch.
    pub fn sample(&self) -> &str {
        self.text()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Exact(t) => write!(f, "exact \"{t}\""),
            Pattern::Contains(t) => write!(f, "contains \"{t}\""),
            Pattern::Word(w) => write!(f, "word \"{}\"", w.text()),
        }
    }
}

/// Reject rule lists where an earlier rule captures a later rule's own sample
/// with a different outcome, which would make the later rule dead for that
/// name. Earlier exact rules only conflict with an identical exact rule.
pub(crate) fn check_shadowing<'a, T, I>(rules: I) -> Result<(), ChartError>
where
    T: PartialEq + 'a,
    I: IntoIterator<Item = (&'a Pattern, &'a T)>,
{
    let rules: Vec<(&Pattern, &T)> = rules.into_iter().collect();
    for (j, (later, later_out)) in rules.iter().enumerate() {
        for (earlier, earlier_out) in &rules[..j] {
            if earlier_out == later_out {
                continue;
            }
            let conflicts = if earlier.is_exact() {
                earlier == later
            } else {
                earlier.matches(later.sample())
            };
            if conflicts {
                return Err(ChartError::ShadowedRule {
                    earlier: earlier.to_string(),
                    later: later.to_string(),
                });
            }
        }
    }
    Ok(())
}
