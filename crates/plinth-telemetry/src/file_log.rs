//! Tracing layer that mirrors records into the log directory.
//!
//! # Design
//! - `ERROR` records are always written; other levels only while the shared
//!   [`DebugSwitch`] is on.
//! - Lines follow `[YYYY-MM-DD HH:MM:SS] [LEVEL]: message key=value`.
//! - Write failures never reach the caller. They are counted, and the first
//!   one is reported on stderr.

use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Local};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::log_dir::LogDirectory;

/// Shared on/off flag for debug-level file logging.
#[derive(Debug, Clone, Default)]
pub struct DebugSwitch {
    enabled: Arc<AtomicBool>,
}

impl DebugSwitch {
    /// Switch starting in the given state.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    /// Turn debug file logging on or off.
    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Current state.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Whether a record at `level` should be written.
    #[must_use]
    pub fn allows(&self, level: Level) -> bool {
        level == Level::ERROR || self.is_enabled()
    }
}

/// [`Layer`] appending formatted records to a [`LogDirectory`].
#[derive(Debug, Clone)]
pub struct FileLogLayer {
    directory: LogDirectory,
    switch: DebugSwitch,
    failures: Arc<AtomicU64>,
}

impl FileLogLayer {
    /// Layer writing into `directory`, gated by `switch`.
    #[must_use]
    pub fn new(directory: LogDirectory, switch: DebugSwitch) -> Self {
        Self {
            directory,
            switch,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of records that could not be written to disk.
    #[must_use]
    pub fn write_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn write(&self, level: Level, now: DateTime<Local>, visitor: &LineVisitor) {
        let line = format_line(level, now, visitor);
        if let Err(err) = self.directory.append(now.date_naive(), &line)
            && self.failures.fetch_add(1, Ordering::Relaxed) == 0
        {
            eprintln!("plinth: file logging failed: {err}");
        }
    }
}

impl<S> Layer<S> for FileLogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if !self.switch.allows(level) {
            return;
        }
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.write(level, Local::now(), &visitor);
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

fn format_line(level: Level, now: DateTime<Local>, visitor: &LineVisitor) -> String {
    format!(
        "[{}] [{}]: {}{}\n",
        now.format("%Y-%m-%d %H:%M:%S"),
        level.as_str().to_ascii_uppercase(),
        visitor.message,
        visitor.fields,
    )
}
