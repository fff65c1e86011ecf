use std::fmt;
use std::sync::{Mutex, PoisonError};

/// A user-facing line emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    MissingTable { table: String },
    MissingColumn { table: String, column: String },
    KeyColumnSkipped { table: String, column: String },
    TableStarted { table: String },
    TableFinished { table: String, rows: u64 },
    Completed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::MissingTable { table } => write!(f, "Table {} does not exist.", table),
            Notice::MissingColumn { table, column } => write!(
                f,
                "Column {} in table {} does not exist; skip it.",
                column, table
            ),
            Notice::KeyColumnSkipped { table, column } => write!(
                f,
                "Column {} is the primary key of {}; skip it.",
                column, table
            ),
            Notice::TableStarted { table } => write!(f, "Updating {}", table),
            Notice::TableFinished { table, rows } => write!(f, "Updated {} rows in {}", rows, table),
            Notice::Completed => write!(f, "Database has been anonymized"),
        }
    }
}

/// Where notices go.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Prints notices to stderr, one per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: &Notice) {
        if matches!(notice, Notice::TableStarted { .. }) {
            eprintln!();
        }
        eprintln!("{}", notice);
    }
}

/// Keeps every notice for later inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rendered lines, in order.
    pub fn lines(&self) -> Vec<String> {
        self.notices().iter().map(|n| n.to_string()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
    }
}
