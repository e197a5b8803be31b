// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures that abort a scrub run.  Non-fatal conditions (missing
/// hostname source, unreadable extra files) never surface as one of these;
/// they are logged as warnings and the run carries on.
#[derive(Error, Debug)]
pub enum ScrubError {
    #[error("PrivilegeError: {0}")]
    Privilege(String),

    #[error("ConfigError: {0}")]
    Config(String),

    #[error("ExtractionError: {message}")]
    Extraction {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("DestinationSetupError: cannot populate {}", path.display())]
    DestinationSetup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("SubstitutionError: {0}")]
    Substitution(String),

    #[error("FileIOError: {action} {}", path.display())]
    FileIo {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ReportError: cannot write {}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("ArchiveCreationError: cannot build {}", path.display())]
    ArchiveCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScrubError {
    pub fn extraction(message: impl Into<String>) -> Self {
        ScrubError::Extraction {
            message: message.into(),
            source: None,
        }
    }

    pub fn extraction_io(message: impl Into<String>, source: io::Error) -> Self {
        ScrubError::Extraction {
            message: message.into(),
            source: Some(source),
        }
    }
}

pub type ScrubResult<T> = Result<T, ScrubError>;
