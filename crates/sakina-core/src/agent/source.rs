//! Foreground-change event sources.
//!
//! The host-specific observer (accessibility service, window-manager hook,
//! polling script) is outside this crate. It feeds the agent one package id
//! per line; [`LineSource`] turns that stream into events.

use std::io::BufRead;

use chrono::{DateTime, Utc};
use tracing::warn;

/// A package reached the foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundEvent {
    pub package: String,
    pub observed_at: DateTime<Utc>,
}

impl ForegroundEvent {
    pub fn new(package: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            package: package.into(),
            observed_at,
        }
    }
}

/// Stream of foreground changes. `None` ends the agent's run.
pub trait ForegroundSource {
    fn next_event(&mut self) -> Option<ForegroundEvent>;
}

impl<T: Iterator<Item = ForegroundEvent>> ForegroundSource for T {
    fn next_event(&mut self) -> Option<ForegroundEvent> {
        self.next()
    }
}

/// Reads package ids line by line, stamping each with the time it was read.
///
/// Blank lines and `#` comments are skipped. A read error ends the stream.
pub struct LineSource<R> {
    reader: R,
    line: String,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = ForegroundEvent;

    fn next(&mut self) -> Option<ForegroundEvent> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    let package = self.line.trim();
                    if package.is_empty() || package.starts_with('#') {
                        continue;
                    }
                    return Some(ForegroundEvent::new(package, Utc::now()));
                }
                Err(e) => {
                    warn!(error = %e, "foreground event stream failed");
                    return None;
                }
            }
        }
    }
}
