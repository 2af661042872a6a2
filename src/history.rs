//! Append-only log of the statements evaluated successfully in a session.

use crate::interpreter::SourceForm;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history index {index} is out of range (history has {len} entries)")]
    OutOfRange { index: usize, len: usize },
}

/// One index or an inclusive range of indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSelector {
    Single(usize),
    Range { start: usize, end: usize },
}

impl FromStr for IndexSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid history index '{s}' (expected N or N-M)"))
        };

        match s.split_once('-') {
            None => parse(s).map(IndexSelector::Single),
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if end < start {
                    return Err(format!("invalid range '{s}': end is before start"));
                }
                Ok(IndexSelector::Range { start, end })
            }
        }
    }
}

impl fmt::Display for IndexSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexSelector::Single(index) => write!(f, "{index}"),
            IndexSelector::Range { start, end } => write!(f, "{start}-{end}"),
        }
    }
}

/// Which history entries to take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Indices(Vec<IndexSelector>),
}

/// One statement as typed, plus how it was run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    source: String,
    form: SourceForm,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(source: impl Into<String>, form: SourceForm) -> Self {
        Self {
            source: source.into(),
            form,
        }
    }

    /// The text exactly as entered.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn form(&self) -> SourceForm {
        self.form
    }

    /// Lua that reproduces the entry as a standalone statement.
    ///
    /// A bare expression is not a valid chunk, so it is wrapped to print a
    /// non-nil value the way the REPL echoed it.
    #[must_use]
    pub fn as_statement(&self) -> Cow<'_, str> {
        match self.form {
            SourceForm::Statement => Cow::Borrowed(&self.source),
            SourceForm::Expression => Cow::Owned(format!(
                "do\n    local __value = ({})\n    if __value ~= nil then print(__value) end\nend",
                self.source
            )),
        }
    }
}

impl From<&str> for HistoryEntry {
    fn from(source: &str) -> Self {
        Self::new(source, SourceForm::Statement)
    }
}

impl From<String> for HistoryEntry {
    fn from(source: String) -> Self {
        Self::new(source, SourceForm::Statement)
    }
}

/// Statements evaluated without error, in evaluation order.
#[derive(Debug, Default)]
pub struct SessionHistory {
    entries: Vec<HistoryEntry>,
}

impl SessionHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its index.
    pub fn append(&mut self, entry: impl Into<HistoryEntry>) -> usize {
        self.entries.push(entry.into());
        let index = self.entries.len() - 1;
        log::debug!("history[{index}] recorded");
        index
    }

    /// # Errors
    ///
    /// Returns `OutOfRange` if nothing was appended at `index`.
    pub fn get(&self, index: usize) -> Result<&HistoryEntry, HistoryError> {
        self.entries.get(index).ok_or(HistoryError::OutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    #[must_use]
    pub fn all(&self) -> &[HistoryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a selection in the order given. Overlapping selectors yield
    /// duplicates; any missing index fails the whole selection.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for the first index that does not exist.
    pub fn select(&self, selection: &Selection) -> Result<Vec<&HistoryEntry>, HistoryError> {
        let selectors = match selection {
            Selection::All => return Ok(self.entries.iter().collect()),
            Selection::Indices(selectors) => selectors,
        };

        let mut out = Vec::new();
        for selector in selectors {
            match *selector {
                IndexSelector::Single(index) => out.push(self.get(index)?),
                IndexSelector::Range { start, end } => {
                    for index in start..=end {
                        out.push(self.get(index)?);
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sources(entries: Vec<&HistoryEntry>) -> Vec<&str> {
        entries.into_iter().map(HistoryEntry::source).collect()
    }

    fn history(n: usize) -> SessionHistory {
        let mut history = SessionHistory::new();
        for i in 0..n {
            history.append(format!("s{i}"));
        }
        history
    }

    #[test]
    fn test_append_indices_start_at_zero() {
        let mut history = SessionHistory::new();
        assert_eq!(history.append("a = 1"), 0);
        assert_eq!(history.append("b = 2"), 1);
        assert_eq!(history.get(0).unwrap().source(), "a = 1");
        assert_eq!(history.all().len(), 2);
        assert_eq!(history.all()[1].form(), SourceForm::Statement);
    }

    #[test]
    fn test_get_out_of_range() {
        let history = history(2);
        assert_eq!(
            history.get(2).unwrap_err(),
            HistoryError::OutOfRange { index: 2, len: 2 }
        );
    }

    #[test]
    fn test_select_single_and_inclusive_range() {
        let history = history(5);
        let selection = Selection::Indices(vec!["0".parse().unwrap(), "2-3".parse().unwrap()]);
        assert_eq!(sources(history.select(&selection).unwrap()), vec!["s0", "s2", "s3"]);
    }

    #[test]
    fn test_select_keeps_duplicates_and_order() {
        let history = history(4);
        let selection = Selection::Indices(vec![
            IndexSelector::Single(3),
            IndexSelector::Range { start: 2, end: 3 },
        ]);
        assert_eq!(sources(history.select(&selection).unwrap()), vec!["s3", "s2", "s3"]);
    }

    #[test]
    fn test_select_all() {
        let history = history(3);
        assert_eq!(
            sources(history.select(&Selection::All).unwrap()),
            vec!["s0", "s1", "s2"]
        );
    }

    #[test]
    fn test_select_fails_on_any_missing_index() {
        let history = history(3);
        let selection = Selection::Indices(vec![
            IndexSelector::Single(0),
            IndexSelector::Range { start: 1, end: 3 },
        ]);
        assert_eq!(
            history.select(&selection).unwrap_err(),
            HistoryError::OutOfRange { index: 3, len: 3 }
        );
    }

    #[test]
    fn test_parse_selector() {
        assert_eq!("7".parse::<IndexSelector>(), Ok(IndexSelector::Single(7)));
        assert_eq!(
            "2-5".parse::<IndexSelector>(),
            Ok(IndexSelector::Range { start: 2, end: 5 })
        );
        assert_eq!(
            "4-4".parse::<IndexSelector>(),
            Ok(IndexSelector::Range { start: 4, end: 4 })
        );
        assert!("5-2".parse::<IndexSelector>().is_err());
        assert!("x".parse::<IndexSelector>().is_err());
        assert!("-".parse::<IndexSelector>().is_err());
        assert!("1-2-3".parse::<IndexSelector>().is_err());
    }

    #[test]
    fn test_selector_display_round_trips_text() {
        assert_eq!(IndexSelector::Range { start: 1, end: 9 }.to_string(), "1-9");
    }

    #[test]
    fn test_as_statement() {
        let statement = HistoryEntry::from("x = 1");
        assert_eq!(statement.as_statement(), "x = 1");

        let expression = HistoryEntry::new("x + 1", SourceForm::Expression);
        let rendered = expression.as_statement();
        assert!(rendered.contains("local __value = (x + 1)"));
        assert!(rendered.starts_with("do\n") && rendered.ends_with("\nend"));
    }
}
