// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use crate::error::{ScrubError, ScrubResult};
use crate::logging::RunLog;
use crate::obfuscate::engine::ObfuscationEngine;
use std::path::{Path, PathBuf};

pub const IP_HEADER: [&str; 2] = ["Obfuscated IP", "Original IP"];
pub const HOSTNAME_HEADER: [&str; 2] = ["Obfuscated Hostname", "Original Hostname"];
pub const DOMAIN_HEADER: [&str; 2] = ["Obfuscated Domain", "Original Domain"];

/// Paths of the mapping reports produced for a run.
#[derive(Debug, Default)]
pub struct MappingReports {
    pub ip: PathBuf,
    pub hostname: Option<PathBuf>,
    pub domain: Option<PathBuf>,
}

/// Writes the engine's final mapping state as CSV files next to the session
/// log.  Files are named `<session>-ip.csv`, `<session>-hostname.csv` and
/// `<session>-dn.csv`.
pub struct ReportWriter<'a> {
    dir: &'a Path,
    session: &'a str,
    log: &'a RunLog,
}

impl<'a> ReportWriter<'a> {
    pub fn new(dir: &'a Path, session: &'a str, log: &'a RunLog) -> Self {
        Self { dir, session, log }
    }

    /// Write all reports that apply.  The hostname report needs a resolved
    /// hostname and the domain report at least one registered domain.
    pub fn write_all(
        &self,
        engine: &ObfuscationEngine,
        hostnames_resolved: bool,
    ) -> ScrubResult<MappingReports> {
        let ip = self.write_ip_report(engine)?;

        let hostname = if hostnames_resolved {
            Some(self.write_hostname_report(engine)?)
        } else {
            self.log
                .warning("Hostname Report Not Generated - Unable to determine hostname");
            None
        };

        let domain = if engine.has_domains() {
            Some(self.write_domain_report(engine)?)
        } else {
            None
        };

        Ok(MappingReports {
            ip,
            hostname,
            domain,
        })
    }

    pub fn write_ip_report(&self, engine: &ObfuscationEngine) -> ScrubResult<PathBuf> {
        let rows = engine
            .ip_pairs()
            .map(|(synthetic, original)| [synthetic.to_string(), original.to_string()]);
        self.write_report("ip", "IP", IP_HEADER, rows)
    }

    pub fn write_hostname_report(&self, engine: &ObfuscationEngine) -> ScrubResult<PathBuf> {
        let rows = engine
            .hostname_pairs()
            .map(|(synthetic, original)| [synthetic.to_string(), original.to_string()]);
        self.write_report("hostname", "Hostname", HOSTNAME_HEADER, rows)
    }

    pub fn write_domain_report(&self, engine: &ObfuscationEngine) -> ScrubResult<PathBuf> {
        let rows = engine
            .domain_pairs()
            .map(|(synthetic, original)| [synthetic.to_string(), original.to_string()]);
        self.write_report("dn", "Domainname", DOMAIN_HEADER, rows)
    }

    fn write_report(
        &self,
        suffix: &str,
        title: &str,
        header: [&str; 2],
        rows: impl Iterator<Item = [String; 2]>,
    ) -> ScrubResult<PathBuf> {
        let path = self.dir.join(format!("{}-{suffix}.csv", self.session));
        self.log
            .console(format!("Creating {title} Report - {}", path.display()));

        let wrap = |source: csv::Error| ScrubError::Report {
            path: path.clone(),
            source,
        };
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(&path)
            .map_err(wrap)?;
        writer.write_record(header).map_err(wrap)?;
        for row in rows {
            writer.write_record(&row).map_err(wrap)?;
        }
        writer.flush().map_err(|e| wrap(e.into()))?;

        self.log.info(format!("Completed {title} Report"));
        Ok(path)
    }
}
