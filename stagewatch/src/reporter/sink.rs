//! Reporter trait and implementations.

use parking_lot::RwLock;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

/// Where a problem was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// File, relative to the project root.
    pub file: PathBuf,
    /// 1-based line.
    pub line: Option<u32>,
    /// 1-based column.
    pub column: Option<u32>,
}

impl Location {
    /// Creates a location for a whole file.
    #[must_use]
    pub fn file(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    /// Sets the line.
    #[must_use]
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Sets the column.
    #[must_use]
    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

/// Trait for sinks of user-facing output.
///
/// Implementations must never fail: reporting is best-effort.
pub trait Reporter: Send + Sync {
    /// A progress or summary line.
    fn status(&self, message: &str);

    /// A problem found by a collaborator.
    fn error(&self, message: &str, location: Option<&Location>);

    /// A collaborator broke in an unexpected way.
    fn fatal(&self, message: &str, detail: &str, location: Option<&Location>);

    /// The end of one pass's output.
    fn done(&self) {}
}

/// A reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl Reporter for NoOpReporter {
    fn status(&self, _message: &str) {}
    fn error(&self, _message: &str, _location: Option<&Location>) {}
    fn fatal(&self, _message: &str, _detail: &str, _location: Option<&Location>) {}
}

/// A reporter writing to the terminal.
///
/// Status goes to stdout, problems to stderr, as `file:line:col - message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn status(&self, message: &str) {
        let _ = writeln!(std::io::stdout().lock(), "{message}");
    }

    fn error(&self, message: &str, location: Option<&Location>) {
        let mut err = std::io::stderr().lock();
        let _ = match location {
            Some(location) => writeln!(err, "{location} - {message}"),
            None => writeln!(err, "{message}"),
        };
    }

    fn fatal(&self, message: &str, detail: &str, location: Option<&Location>) {
        let mut err = std::io::stderr().lock();
        let _ = match location {
            Some(location) => writeln!(err, "{} - {message}", location.file.display()),
            None => writeln!(err, "{message}"),
        };
        if !detail.is_empty() {
            let _ = writeln!(err, "{detail}");
        }
    }

    fn done(&self) {
        let _ = writeln!(std::io::stdout().lock());
    }
}

/// One collected report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// A status line.
    Status(String),
    /// A problem.
    Error {
        /// The message.
        message: String,
        /// Where it was found.
        location: Option<Location>,
    },
    /// A collaborator breakage.
    Fatal {
        /// The message.
        message: String,
        /// Extra detail.
        detail: String,
    },
    /// End of a pass.
    Done,
}

/// A collecting reporter for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: RwLock<Vec<Report>>,
}

impl CollectingReporter {
    /// Creates a new collecting reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected reports.
    #[must_use]
    pub fn reports(&self) -> Vec<Report> {
        self.reports.read().clone()
    }

    /// Returns the collected status lines.
    #[must_use]
    pub fn statuses(&self) -> Vec<String> {
        self.reports
            .read()
            .iter()
            .filter_map(|r| match r {
                Report::Status(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of collected reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    /// Returns true if nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }
}

impl Reporter for CollectingReporter {
    fn status(&self, message: &str) {
        self.reports.write().push(Report::Status(message.to_string()));
    }

    fn error(&self, message: &str, location: Option<&Location>) {
        self.reports.write().push(Report::Error {
            message: message.to_string(),
            location: location.cloned(),
        });
    }

    fn fatal(&self, message: &str, detail: &str, _location: Option<&Location>) {
        self.reports.write().push(Report::Fatal {
            message: message.to_string(),
            detail: detail.to_string(),
        });
    }

    fn done(&self) {
        self.reports.write().push(Report::Done);
    }
}
