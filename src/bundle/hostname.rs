// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use crate::logging::RunLog;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Placeholder used wherever the system hostname could not be determined.
pub const UNKNOWN_HOSTNAME: &str = "unknown";

/// File at the root of a report that holds the system's hostname.
pub const HOSTNAME_FILE: &str = "hostname";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostnameResolution {
    Resolved {
        hostname: String,
        domain: Option<String>,
    },
    Unavailable,
}

impl HostnameResolution {
    /// Parse the first line of a hostname file: first label is the host,
    /// anything after the first dot is its domain.
    pub fn from_line(line: &str) -> Self {
        let name = line.trim().trim_end_matches('.');
        if name.is_empty() {
            return HostnameResolution::Unavailable;
        }
        match name.split_once('.') {
            Some((host, domain)) if !host.is_empty() && !domain.is_empty() => {
                HostnameResolution::Resolved {
                    hostname: host.to_string(),
                    domain: Some(domain.to_string()),
                }
            }
            Some(_) => HostnameResolution::Unavailable,
            None => HostnameResolution::Resolved {
                hostname: name.to_string(),
                domain: None,
            },
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, HostnameResolution::Resolved { .. })
    }

    /// The bare system hostname, or `None` when hostname handling is off.
    pub fn system_hostname(&self) -> Option<&str> {
        match self {
            HostnameResolution::Resolved { hostname, .. } => Some(hostname),
            HostnameResolution::Unavailable => None,
        }
    }

    pub fn domain(&self) -> Option<&str> {
        match self {
            HostnameResolution::Resolved { domain, .. } => domain.as_deref(),
            HostnameResolution::Unavailable => None,
        }
    }

    /// Hostname for display; `unknown` when unresolved.
    pub fn display_name(&self) -> &str {
        self.system_hostname().unwrap_or(UNKNOWN_HOSTNAME)
    }
}

/// Read the hostname file at the root of `tree`.  A missing, unreadable or
/// empty file is not fatal: the run continues without hostname obfuscation.
pub fn resolve(tree: &Path, log: &RunLog) -> HostnameResolution {
    let path = tree.join(HOSTNAME_FILE);
    let mut line = String::new();
    let read = File::open(&path).and_then(|file| BufReader::new(file).read_line(&mut line));

    let resolution = match read {
        Ok(_) => HostnameResolution::from_line(&line),
        Err(err) => {
            log.debug(format!("cannot read {}: {err}", path.display()));
            HostnameResolution::Unavailable
        }
    };

    if resolution.is_resolved() {
        log.info(format!(
            "System hostname - {} (domain: {})",
            resolution.display_name(),
            resolution.domain().unwrap_or("none")
        ));
    } else {
        log.warning("Unable to determine system hostname!!!");
        log.warning("Hostname Data Obfuscation Will Not Occur!!!");
        log.warning(
            "To Remedy This Situation please make sure the 'hostname' file exists in the root directory of the report",
        );
    }
    resolution
}
