// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use crate::error::{ScrubError, ScrubResult};
use crate::logging::Level;
use crate::obfuscate::RootDomain;
use std::fs::{self, File};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ROOT_DOMAIN: &str = "example.com";
pub const DEFAULT_START_IP: Ipv4Addr = Ipv4Addr::new(10, 230, 230, 1);
pub const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 300;

/// Everything a scrub run needs to know up front.
#[derive(Debug, Clone)]
pub struct ScrubOptions {
    pub report: Option<PathBuf>,
    pub files: Vec<PathBuf>,
    pub domains: Vec<String>,
    pub quiet: bool,
    pub log_level: Level,
    pub root_domain: RootDomain,
    pub start_ip: Ipv4Addr,
    pub output_dir: PathBuf,
    pub extract_timeout: Duration,
}

impl ScrubOptions {
    /// Options with defaults for everything but the inputs.
    pub fn new(report: Option<PathBuf>, files: Vec<PathBuf>) -> ScrubResult<Self> {
        Ok(Self {
            report,
            files,
            domains: Vec::new(),
            quiet: false,
            log_level: Level::Info,
            root_domain: RootDomain::parse(DEFAULT_ROOT_DOMAIN)?,
            start_ip: DEFAULT_START_IP,
            output_dir: std::env::temp_dir(),
            extract_timeout: Duration::from_secs(DEFAULT_EXTRACT_TIMEOUT_SECS),
        })
    }

    /// Extra domains, trimmed and de-duplicated in first-seen order.
    pub fn normalised_domains(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for raw in &self.domains {
            let domain = raw.trim().trim_matches('.').to_string();
            if !domain.is_empty() && !out.contains(&domain) {
                out.push(domain);
            }
        }
        out
    }

    pub fn validate(&self) -> ScrubResult<()> {
        if self.report.is_none() && self.files.is_empty() {
            return Err(ScrubError::Config(
                "nothing to do: give a report path and/or --file".to_string(),
            ));
        }
        Ok(())
    }

    /// Verify the run can read its input and write its output before any
    /// work starts.
    pub fn check_privileges(&self) -> ScrubResult<()> {
        if let Some(report) = &self.report {
            check_readable(report)?;
        }
        check_writable_dir(&self.output_dir)
    }
}

fn check_readable(path: &Path) -> ScrubResult<()> {
    let denied = |reason: String| {
        ScrubError::Privilege(format!("cannot read {}: {reason}", path.display()))
    };
    let meta = fs::metadata(path).map_err(|e| denied(e.to_string()))?;
    if meta.is_dir() {
        fs::read_dir(path).map_err(|e| denied(e.to_string()))?;
    } else {
        File::open(path).map_err(|e| denied(e.to_string()))?;
    }
    Ok(())
}

fn check_writable_dir(dir: &Path) -> ScrubResult<()> {
    if !dir.is_dir() {
        return Err(ScrubError::Privilege(format!(
            "output directory {} does not exist",
            dir.display()
        )));
    }
    tempfile::tempfile_in(dir).map_err(|e| {
        ScrubError::Privilege(format!("cannot write to {}: {e}", dir.display()))
    })?;
    Ok(())
}
