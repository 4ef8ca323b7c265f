//! Raw process events and log filtering

use chrono::{DateTime, Utc};

/// A raw event from a process
#[derive(Debug, Clone)]
pub struct ProcessEvent {
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The type of event
    pub event_type: ProcessEventType,
    /// Optional data associated with the event
    pub data: Option<String>,
}

impl ProcessEvent {
    /// An output line captured now
    pub fn line(event_type: ProcessEventType, line: String) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            data: Some(line),
        }
    }
}

/// Which stream an event came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEventType {
    /// Log line from stdout
    Stdout,
    /// Log line from stderr
    Stderr,
    /// A stream failed mid-read; `data` holds the reason
    ReadFailed(LogSource),
}

/// Filter for process log output
pub trait LogFilter: Send + Sync {
    /// Filter a log line, returning None to drop it
    ///
    /// The returned &str can be the same as the input (pass-through)
    /// or a substring of it (partial filtering).
    fn filter<'a>(&self, line: &'a str, source: LogSource) -> Option<&'a str>;
}

/// Source of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Drops lines that contain only whitespace
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankLineFilter;

impl LogFilter for BlankLineFilter {
    fn filter<'a>(&self, line: &'a str, _source: LogSource) -> Option<&'a str> {
        if line.trim().is_empty() {
            None
        } else {
            Some(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line_filter() {
        let filter = BlankLineFilter;
        assert_eq!(filter.filter("  \t", LogSource::Stdout), None);
        assert_eq!(filter.filter(" Ok.", LogSource::Stderr), Some(" Ok."));
    }
}
