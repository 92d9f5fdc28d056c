//! In-memory reporter
//!
//! Keeps every event, group and summary it receives. Used by tests and by
//! callers embedding the run loop that want to inspect output afterwards.

use crate::domain::{DiagnosticEvent, Level, RunSummary};
use crate::output::Reporter;
use std::sync::Mutex;

/// One entry in the order it was reported
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    GroupStart(String),
    GroupEnd,
    Event(DiagnosticEvent),
    Summary(RunSummary),
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    records: Mutex<Vec<Record>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, record: Record) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }

    /// Everything reported so far, in order
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                Record::Event(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Names of the groups opened, in order
    pub fn groups(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                Record::GroupStart(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn group_ends(&self) -> usize {
        self.records()
            .iter()
            .filter(|r| matches!(r, Record::GroupEnd))
            .count()
    }

    /// Messages at the given level
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }

    /// Returns true if any event message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.events().iter().any(|e| e.message.contains(needle))
    }

    /// The last summary written, if any
    pub fn summary(&self) -> Option<RunSummary> {
        self.records().into_iter().rev().find_map(|r| match r {
            Record::Summary(summary) => Some(summary),
            _ => None,
        })
    }
}

impl Reporter for RecordingReporter {
    fn start_group(&self, name: &str) {
        self.push(Record::GroupStart(name.to_string()));
    }

    fn end_group(&self) {
        self.push(Record::GroupEnd);
    }

    fn event(&self, event: &DiagnosticEvent) {
        self.push(Record::Event(event.clone()));
    }

    fn write_summary(&self, summary: &RunSummary) -> std::io::Result<()> {
        self.push(Record::Summary(summary.clone()));
        Ok(())
    }
}
