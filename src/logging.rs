// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

//! Run log sink.  Every record lands in the session log file (which is later
//! packed into the output archive); records at `Console` or above are also
//! echoed to stdout unless the run is quiet.
//!
//! Records go through the `log` facade into two `env_logger` loggers, one
//! per sink.  `log` has no level between info and warn, so `Console`
//! records are info records on their own target and the loggers' module
//! filters place them above plain info.

use chrono::Local;
use env_logger::fmt::Formatter;
use env_logger::{Builder, Logger, Target, WriteStyle};
use log::{LevelFilter, Log, Record};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

const LOGGER_NAME: &str = "bundlescrub";
const CONSOLE_TARGET: &str = "bundlescrub::console";
const TIMESTAMP_FORMAT: &str = "%m-%d %H:%M:%S";

/// Severity of a log record.  `Console` sits between `Info` and `Warning`
/// and marks progress messages the operator should see on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Console,
    Warning,
    Error,
}

impl Level {
    /// The `log` level and target a record of this severity travels with.
    fn as_log(self) -> (log::Level, &'static str) {
        match self {
            Level::Debug => (log::Level::Debug, LOGGER_NAME),
            Level::Info => (log::Level::Info, LOGGER_NAME),
            Level::Console => (log::Level::Info, CONSOLE_TARGET),
            Level::Warning => (log::Level::Warn, LOGGER_NAME),
            Level::Error => (log::Level::Error, LOGGER_NAME),
        }
    }

    fn of_record(record: &Record<'_>) -> Self {
        match record.level() {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warning,
            log::Level::Info if record.target() == CONSOLE_TARGET => Level::Console,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Console => "CONSOLE",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "console" => Ok(Level::Console),
            "warn" | "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

pub struct RunLog {
    file: Logger,
    stdout: Option<Logger>,
    handle: File,
}

impl RunLog {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: &Path, threshold: Level, quiet: bool) -> io::Result<Self> {
        let handle = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let file = sink(threshold, Target::Pipe(Box::new(handle.try_clone()?)));
        let stdout = (!quiet).then(|| sink(Level::Console, Target::Stdout));
        Ok(Self {
            file,
            stdout,
            handle,
        })
    }

    pub fn log(&self, level: Level, message: &str) {
        let (severity, target) = level.as_log();
        for logger in std::iter::once(&self.file).chain(self.stdout.as_ref()) {
            logger.log(
                &Record::builder()
                    .args(format_args!("{message}"))
                    .level(severity)
                    .target(target)
                    .build(),
            );
        }
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::Debug, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message.as_ref());
    }

    pub fn console(&self, message: impl AsRef<str>) {
        self.log(Level::Console, message.as_ref());
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(Level::Warning, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message.as_ref());
    }

    /// Push written records to disk; called before the log is archived.
    pub fn flush(&self) -> io::Result<()> {
        self.file.flush();
        self.handle.sync_data()
    }
}

/// An `env_logger` writing formatted records to `target`, passing records
/// at or above `threshold`.
fn sink(threshold: Level, target: Target) -> Logger {
    let mut builder = Builder::new();
    builder
        .format(format_record)
        .write_style(WriteStyle::Never)
        .target(target);
    match threshold {
        Level::Console => builder
            .filter_level(LevelFilter::Warn)
            .filter_module(CONSOLE_TARGET, LevelFilter::Info),
        other => builder.filter_level(other.as_log().0.to_level_filter()),
    };
    builder.build()
}

fn format_record(buf: &mut Formatter, record: &Record<'_>) -> io::Result<()> {
    writeln!(
        buf,
        "{} {LOGGER_NAME} {}: {}",
        Local::now().format(TIMESTAMP_FORMAT),
        Level::of_record(record),
        record.args()
    )
}
