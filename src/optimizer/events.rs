//! Event logging for optimization runs.
//!
//! Every fold, skipped match and per-method outcome is recorded here, so a caller can see
//! what the optimizer did without scraping log output. Events can be inspected for
//! debugging or ignored entirely.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event (fold, skip, method outcome, warning)
//! - [`EventLog`] - Append-only collection of events with query capabilities
//! - [`EventBuilder`] - Fluent API for creating events
//! - [`DerivedStats`] - Counters computed from a log
//!
//! # Example
//!
//! ```rust
//! use classfold::optimizer::{DerivedStats, EventKind, EventLog};
//!
//! let log = EventLog::new();
//!
//! log.record(EventKind::ConstantFolded)
//!     .at("compute()I", 4)
//!     .message("iadd 2 3 -> 5");
//!
//! assert_eq!(log.count_kind(EventKind::ConstantFolded), 1);
//! assert_eq!(DerivedStats::from_log(&log).to_string(), "1 constants folded");
//! ```

use std::{fmt, time::Duration};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An arithmetic sequence was replaced by a constant load.
    ConstantFolded,
    /// A comparison sequence was replaced by its boolean result.
    ComparisonFolded,
    /// A match was found but could not be folded.
    FoldSkipped,

    /// A method was rewritten.
    MethodOptimized,
    /// Optimization of a method failed; it was kept as parsed.
    MethodAborted,
    /// A method had nothing to fold.
    MethodUnchanged,

    /// Something unexpected but recoverable, such as hitting the iteration bound.
    Warning,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Transformations
            Self::ConstantFolded => "constant folded",
            Self::ComparisonFolded => "comparison folded",
            // Matching
            Self::FoldSkipped => "fold skipped",
            // Method outcomes
            Self::MethodOptimized => "method optimized",
            Self::MethodAborted => "method aborted",
            Self::MethodUnchanged => "method unchanged",
            Self::Warning => "warning",
        }
    }

    /// Returns true if this event represents a code transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(self, Self::ConstantFolded | Self::ComparisonFolded)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// Name and descriptor of the method the event belongs to (if applicable).
    pub method: Option<String>,
    /// Bytecode offset in the original code array.
    pub location: Option<u32>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(method) = &self.method {
            write!(f, " {method}")?;
        }
        if let Some(location) = self.location {
            write!(f, "@{location}")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is automatically added
/// to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    method: Option<String>,
    location: Option<u32>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            method: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the method and location where the event occurred.
    pub fn at(mut self, method: impl Into<String>, location: u32) -> Self {
        self.method = Some(method.into());
        self.location = Some(location);
        self
    }

    /// Sets only the method (for method-level events without specific location).
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the location if one is known.
    pub fn location(mut self, location: Option<u32>) -> Self {
        self.location = location;
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        let event = Event {
            kind: self.kind,
            method: self.method.take(),
            location: self.location.take(),
            message,
            pass: self.pass.take(),
        };

        self.log.events.push(event);
    }
}

/// Collection of events from an optimization run.
///
/// Provides methods for recording and querying events. Statistics are derived from the
/// events rather than tracked separately, see [`DerivedStats`].
///
/// Events are appended through shared references (`&self`), so one log can be handed to
/// several optimizers.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is automatically added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Returns true if at least one event of `kind` was logged.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Number of events of `kind`.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.iter().filter(|e| e.kind == kind).count()
    }

    /// Iterates over all events in insertion order.
    pub fn iter(&self) -> EventLogIter<'_> {
        EventLogIter {
            inner: self.events.iter(),
        }
    }

    /// Iterates over the events of `kind`.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> {
        self.iter().filter(move |e| e.kind == kind)
    }
}

/// Iterator over the events of an [`EventLog`].
pub struct EventLogIter<'a> {
    inner: boxcar::Iter<'a, Event>,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}

/// Counters derived from an [`EventLog`].
#[derive(Debug, Clone, Default)]
pub struct DerivedStats {
    /// Methods rewritten with at least one fold.
    pub methods_optimized: usize,
    /// Methods with nothing to fold.
    pub methods_unchanged: usize,
    /// Methods kept as parsed after a failure.
    pub methods_aborted: usize,
    /// Arithmetic folds.
    pub constants_folded: usize,
    /// Comparison folds.
    pub comparisons_folded: usize,
    /// Matches that could not be folded.
    pub folds_skipped: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Wall clock time of the run, if measured.
    pub total_time: Duration,
}

impl DerivedStats {
    /// Computes the counters from the events in `log`.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let get = |kind: EventKind| log.count_kind(kind);

        Self {
            methods_optimized: get(EventKind::MethodOptimized),
            methods_unchanged: get(EventKind::MethodUnchanged),
            methods_aborted: get(EventKind::MethodAborted),
            constants_folded: get(EventKind::ConstantFolded),
            comparisons_folded: get(EventKind::ComparisonFolded),
            folds_skipped: get(EventKind::FoldSkipped),
            warnings: get(EventKind::Warning),
            total_time: Duration::ZERO,
        }
    }

    /// Attaches the measured run time.
    #[must_use]
    pub fn with_time(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// Total number of folds of either kind.
    #[must_use]
    pub fn folds(&self) -> usize {
        self.constants_folded + self.comparisons_folded
    }

    /// One-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.methods_optimized > 0 {
            parts.push(format!("{} methods", self.methods_optimized));
        }

        if self.constants_folded > 0 {
            parts.push(format!("{} constants folded", self.constants_folded));
        }
        if self.comparisons_folded > 0 {
            parts.push(format!("{} comparisons folded", self.comparisons_folded));
        }
        if self.folds_skipped > 0 {
            parts.push(format!("{} skipped", self.folds_skipped));
        }
        if self.methods_aborted > 0 {
            parts.push(format!("{} aborted", self.methods_aborted));
        }

        if self.warnings > 0 {
            parts.push(format!("{} warnings", self.warnings));
        }

        let stats = if parts.is_empty() {
            "no transformations".to_string()
        } else {
            parts.join(", ")
        };

        if self.total_time.as_millis() > 0 {
            format!("{} in {:?}", stats, self.total_time)
        } else {
            stats
        }
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(!log.has(EventKind::ConstantFolded));
        assert_eq!(log.iter().count(), 0);
    }

    #[test]
    fn test_record_event() {
        let log = EventLog::new();

        log.record(EventKind::ConstantFolded)
            .at("sum()I", 0x10)
            .pass("arithmetic")
            .message("iadd 2 3 -> 5");

        assert!(!log.is_empty());
        assert_eq!(log.len(), 1);
        assert!(log.has(EventKind::ConstantFolded));

        let event = log.iter().next().unwrap();
        assert_eq!(event.method.as_deref(), Some("sum()I"));
        assert_eq!(event.location, Some(0x10));
        assert_eq!(event.pass.as_deref(), Some("arithmetic"));
        assert_eq!(event.message, "iadd 2 3 -> 5");
        assert_eq!(event.to_string(), "[constant folded] sum()I@16 iadd 2 3 -> 5");
    }

    #[test]
    fn test_default_message() {
        let log = EventLog::new();
        log.record(EventKind::MethodUnchanged).method("run()V");

        let event = log.iter().next().unwrap();
        assert_eq!(event.message, "method unchanged");
        assert_eq!(event.location, None);
    }

    #[test]
    fn test_filters() {
        let log = EventLog::new();
        log.record(EventKind::ConstantFolded).at("a()I", 0);
        log.record(EventKind::ConstantFolded).at("a()I", 4);
        log.record(EventKind::FoldSkipped).at("b()I", 1);
        log.record(EventKind::ComparisonFolded).at("c()Z", 7);

        assert_eq!(log.filter_kind(EventKind::FoldSkipped).count(), 1);
        assert_eq!(log.count_kind(EventKind::ConstantFolded), 2);
        assert_eq!(
            log.iter().filter(|event| event.kind.is_transformation()).count(),
            3
        );
    }

    #[test]
    fn test_from_iterator() {
        let source = EventLog::new();
        source.record(EventKind::MethodUnchanged).method("a()V");
        source.record(EventKind::Warning).method("b()V").message("iteration bound");

        let copy: EventLog = source.iter().skip(1).cloned().collect();

        assert_eq!(copy.len(), 1);
        assert_eq!((&copy).into_iter().next().unwrap().message, "iteration bound");
        assert_eq!(DerivedStats::from_log(&copy).warnings, 1);
    }

    #[test]
    fn test_derived_stats() {
        let log = EventLog::new();
        log.record(EventKind::ConstantFolded).at("a()I", 0);
        log.record(EventKind::ComparisonFolded).at("a()I", 5);
        log.record(EventKind::FoldSkipped).at("a()I", 9);
        log.record(EventKind::MethodOptimized).method("a()I");
        log.record(EventKind::MethodAborted).method("b()V");

        let stats = DerivedStats::from_log(&log);
        assert_eq!(stats.folds(), 2);
        assert_eq!(stats.methods_aborted, 1);
        assert_eq!(
            stats.summary(),
            "1 methods, 1 constants folded, 1 comparisons folded, 1 skipped, 1 aborted"
        );
        assert_eq!(DerivedStats::default().to_string(), "no transformations");
    }
}
