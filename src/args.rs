//! Order-preserving collection of the code-producing command-line flags.
//!
//! clap groups values by flag, which loses the interleaving the user typed
//! (`-p a -c b -p c`). Fragments may depend on names bound by earlier ones, so
//! the order is rebuilt from clap's value indices and replayed through an
//! [`ArgumentTracker`].

use clap::ArgMatches;
use std::collections::HashMap;

/// A flag that contributes code fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagKind {
    /// `-p/--print`: print the value of an expression.
    Print,
    /// `-f/--fprint`: print an interpolated template.
    Interpolate,
    /// `-c/--code`: a block of code, or a `/dev/fd/N` path holding one.
    Code,
    /// `-l/--lambda`: a one-argument function applied to every input line.
    Lambda,
}

impl FlagKind {
    pub const ALL: [FlagKind; 4] = [
        FlagKind::Print,
        FlagKind::Interpolate,
        FlagKind::Code,
        FlagKind::Lambda,
    ];

    /// The clap argument id.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            FlagKind::Print => "print",
            FlagKind::Interpolate => "fprint",
            FlagKind::Code => "code",
            FlagKind::Lambda => "lambda",
        }
    }

    /// Multi-value flags may be repeated and every value is its own occurrence.
    #[must_use]
    pub fn is_multi(self) -> bool {
        matches!(self, FlagKind::Print | FlagKind::Interpolate)
    }
}

/// One flag occurrence, in command-line order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedAssignment {
    pub flag: FlagKind,
    /// Position within the flag's value list; only set for multi-value flags.
    pub occurrence: Option<usize>,
}

/// Records assignments in the order they were parsed.
///
/// A tracker describes one parse pass. Build a new one per pass, or call
/// [`ArgumentTracker::clear`] before reusing it.
#[derive(Debug, Default)]
pub struct ArgumentTracker {
    order: Vec<OrderedAssignment>,
    seen: HashMap<FlagKind, usize>,
}

impl ArgumentTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `flag`.
    ///
    /// A repeated scalar flag replaces its earlier assignment, matching the
    /// value map where the last value wins.
    pub fn record(&mut self, flag: FlagKind) {
        let occurrence = if flag.is_multi() {
            let seen = self.seen.entry(flag).or_insert(0);
            let occurrence = *seen;
            *seen += 1;
            Some(occurrence)
        } else {
            self.order.retain(|assignment| assignment.flag != flag);
            None
        };
        self.order.push(OrderedAssignment { flag, occurrence });
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }

    #[must_use]
    pub fn assignments(&self) -> &[OrderedAssignment] {
        &self.order
    }
}

/// The parsed value of a flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    One(String),
    Many(Vec<String>),
}

impl FlagValue {
    /// All values, scalar or not.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            FlagValue::One(value) => std::slice::from_ref(value),
            FlagValue::Many(values) => values,
        };
        values.iter().map(String::as_str)
    }

    fn at(&self, occurrence: Option<usize>) -> Option<&str> {
        match (self, occurrence) {
            (FlagValue::One(value), None) => Some(value.as_str()),
            (FlagValue::Many(values), Some(i)) => values.get(i).map(String::as_str),
            _ => None,
        }
    }
}

/// Flag values plus the order in which they were supplied.
#[derive(Debug, Default)]
pub struct ParsedArguments {
    values: HashMap<FlagKind, FlagValue>,
    tracker: ArgumentTracker,
}

impl ParsedArguments {
    /// Build from `(flag, value)` events in command-line order.
    pub fn from_events<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = (FlagKind, S)>,
        S: Into<String>,
    {
        let mut parsed = Self::default();
        for (flag, value) in events {
            let value = value.into();
            parsed.tracker.record(flag);
            if flag.is_multi() {
                match parsed
                    .values
                    .entry(flag)
                    .or_insert_with(|| FlagValue::Many(Vec::new()))
                {
                    FlagValue::Many(values) => values.push(value),
                    FlagValue::One(_) => {}
                }
            } else {
                parsed.values.insert(flag, FlagValue::One(value));
            }
        }
        parsed
    }

    /// Rebuild the command-line order from clap's per-value indices.
    #[must_use]
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let mut events: Vec<(usize, FlagKind, String)> = Vec::new();
        for flag in FlagKind::ALL {
            let (Some(indices), Some(values)) = (
                matches.indices_of(flag.id()),
                matches.get_many::<String>(flag.id()),
            ) else {
                continue;
            };
            events.extend(
                indices
                    .zip(values)
                    .map(|(index, value)| (index, flag, value.clone())),
            );
        }
        events.sort_by_key(|(index, _, _)| *index);

        let parsed = Self::from_events(events.into_iter().map(|(_, flag, value)| (flag, value)));
        log::debug!("flag order: {:?}", parsed.assignments());
        parsed
    }

    #[must_use]
    pub fn get(&self, flag: FlagKind) -> Option<&FlagValue> {
        self.values.get(&flag)
    }

    #[must_use]
    pub fn assignments(&self) -> &[OrderedAssignment] {
        self.tracker.assignments()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracker.assignments().is_empty()
    }

    /// `(flag, value)` pairs in the order they were supplied.
    ///
    /// Each call returns a fresh iterator over the same assignments.
    pub fn ordered(&self) -> impl Iterator<Item = (FlagKind, &str)> + '_ {
        self.tracker.assignments().iter().filter_map(|assignment| {
            self.values
                .get(&assignment.flag)?
                .at(assignment.occurrence)
                .map(|value| (assignment.flag, value))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> ParsedArguments {
        let matches = crate::cli::command().try_get_matches_from(argv).unwrap();
        ParsedArguments::from_matches(&matches)
    }

    #[test]
    fn test_interleaved_repeats_keep_command_line_order() {
        let parsed = parse(&["lpipe", "-p", "1+1", "-c", "x = 1", "-p", "2+2", "3+3"]);
        let ordered: Vec<_> = parsed.ordered().collect();
        assert_eq!(
            ordered,
            vec![
                (FlagKind::Print, "1+1"),
                (FlagKind::Code, "x = 1"),
                (FlagKind::Print, "2+2"),
                (FlagKind::Print, "3+3"),
            ]
        );
    }

    #[test]
    fn test_occurrence_indices_are_contiguous_per_flag() {
        let parsed = parse(&["lpipe", "-f", "a", "-p", "1", "-f", "b", "c", "-p", "2"]);

        for flag in [FlagKind::Print, FlagKind::Interpolate] {
            let occurrences: Vec<_> = parsed
                .assignments()
                .iter()
                .filter(|a| a.flag == flag)
                .map(|a| a.occurrence.unwrap())
                .collect();
            let count = parsed.get(flag).unwrap().iter().count();
            assert_eq!(occurrences, (0..count).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_scalar_flags_have_no_occurrence() {
        let parsed = parse(&["lpipe", "-l", "function(l) return l end", "-c", "y = 2"]);
        assert!(parsed.assignments().iter().all(|a| a.occurrence.is_none()));
        assert_eq!(
            parsed.get(FlagKind::Code),
            Some(&FlagValue::One("y = 2".to_string()))
        );
    }

    #[test]
    fn test_ordered_is_restartable() {
        let parsed = ParsedArguments::from_events([
            (FlagKind::Print, "a"),
            (FlagKind::Print, "b"),
            (FlagKind::Code, "c"),
        ]);
        let first: Vec<_> = parsed.ordered().collect();
        let second: Vec<_> = parsed.ordered().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_repeated_scalar_keeps_last_value_once() {
        let parsed = ParsedArguments::from_events([
            (FlagKind::Code, "first"),
            (FlagKind::Print, "p"),
            (FlagKind::Code, "second"),
        ]);
        let ordered: Vec<_> = parsed.ordered().collect();
        assert_eq!(
            ordered,
            vec![(FlagKind::Print, "p"), (FlagKind::Code, "second")]
        );
    }

    #[test]
    fn test_tracker_clear_starts_a_new_pass() {
        let mut tracker = ArgumentTracker::new();
        tracker.record(FlagKind::Print);
        tracker.record(FlagKind::Print);
        tracker.clear();
        tracker.record(FlagKind::Print);
        assert_eq!(
            tracker.assignments(),
            &[OrderedAssignment {
                flag: FlagKind::Print,
                occurrence: Some(0)
            }]
        );
    }

    #[test]
    fn test_no_flags_is_empty() {
        assert!(parse(&["lpipe"]).is_empty());
        assert!(parse(&["lpipe", "--debug"]).is_empty());
    }
}
