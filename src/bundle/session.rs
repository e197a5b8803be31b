// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use crate::logging::RunLog;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SESSION_PREFIX: &str = "bundlescrub";

/// Ephemeral layout for one run.  Everything lives directly under the output
/// directory and carries the session id, so concurrent runs never collide.
#[derive(Debug, Clone)]
pub struct Session {
    /// `bundlescrub-<id>`; also the top-level directory inside the archive.
    pub name: String,
    pub base: PathBuf,
    /// Where archives are unpacked, or standalone files gathered.
    pub staging: PathBuf,
    /// The scrubbed copy.
    pub working: PathBuf,
    pub log_path: PathBuf,
}

impl Session {
    pub fn new(base: &Path) -> Self {
        Self::with_id(base, &random_id())
    }

    pub fn with_id(base: &Path, id: &str) -> Self {
        let name = format!("{SESSION_PREFIX}-{id}");
        Self {
            staging: base.join(format!("{SESSION_PREFIX}-origin-{id}")),
            working: base.join(&name),
            log_path: base.join(format!("{name}.log")),
            base: base.to_path_buf(),
            name,
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.base.join(format!("{}.tar.gz", self.name))
    }

    /// Delete the staging and working directories.  Failures are logged and
    /// otherwise ignored; the archive has already been written by now.
    pub fn teardown(&self, log: &RunLog) {
        log.info("Beginning Clean Up Process");
        for (label, dir) in [("Origin", &self.staging), ("Working", &self.working)] {
            if !dir.exists() {
                continue;
            }
            log.info(format!("Removing {label} Directory - {}", dir.display()));
            if let Err(err) = fs::remove_dir_all(dir) {
                log.warning(format!("Unable to remove {}: {err}", dir.display()));
            }
        }
        log.info("Clean Up Process Complete");
    }
}

/// 16 decimal digits taken from a v4 UUID.
fn random_id() -> String {
    let digits = format!("{:016}", Uuid::new_v4().as_u128());
    digits[..16].to_string()
}
