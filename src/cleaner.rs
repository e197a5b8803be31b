// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

//! Drives one scrub run from input report to output archive.  The steps are
//! kept in the order the operator sees them in the log: extract, copy,
//! resolve hostname, register domains, scrub, report, archive.

use crate::bundle::{
    ArchiveBuilder, ArchiveExtractor, FileRecord, HostnameResolution, Session, TreeProcessor,
    hostname,
};
use crate::config::ScrubOptions;
use crate::error::{ScrubError, ScrubResult};
use crate::logging::RunLog;
use crate::obfuscate::{LineScrubber, ObfuscationEngine, ReportWriter};
use std::fs;
use std::path::{Path, PathBuf};

/// Files handed back to the caller after a successful run.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub archive: PathBuf,
    pub log: PathBuf,
    pub ip_report: PathBuf,
    pub hostname_report: Option<PathBuf>,
    pub domain_report: Option<PathBuf>,
}

impl Artifacts {
    /// Archive, log, IP report, then the optional hostname and domain reports.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut out = vec![self.archive.clone(), self.log.clone(), self.ip_report.clone()];
        out.extend(self.hostname_report.iter().cloned());
        out.extend(self.domain_report.iter().cloned());
        out
    }
}

pub struct Cleaner {
    options: ScrubOptions,
    session: Session,
    log: RunLog,
    engine: ObfuscationEngine,
}

impl Cleaner {
    /// Lay out a fresh session under the output directory and open its log.
    pub fn new(options: ScrubOptions) -> ScrubResult<Self> {
        let session = Session::new(&options.output_dir);
        let log = RunLog::create(&session.log_path, options.log_level, options.quiet).map_err(
            |source| ScrubError::DestinationSetup {
                path: session.log_path.clone(),
                source,
            },
        )?;
        log.console(format!("Log File Created at {}", session.log_path.display()));

        let engine = ObfuscationEngine::new(options.start_ip, options.root_domain.clone());
        Ok(Self {
            options,
            session,
            log,
            engine,
        })
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Print the tool banner and the review reminder.
    pub fn disclaimer(&self, version: &str) {
        self.log.console(version);
        self.log.warning(
            "bundlescrub is a tool to help obfuscate sensitive information from an existing support bundle.",
        );
        self.log
            .warning("Please review the content before passing it along to any third party.");
    }

    /// Run the whole pipeline.  Fatal errors are written to the run log
    /// before being returned.
    pub fn run(mut self) -> ScrubResult<Artifacts> {
        let result = self.clean_report();
        if let Err(err) = &result {
            self.log.error(err.to_string());
            let _ = self.log.flush();
        }
        result
    }

    fn clean_report(&mut self) -> ScrubResult<Artifacts> {
        let log = &self.log;
        let session = &self.session;
        let options = &self.options;
        let engine = &mut self.engine;
        let tree = TreeProcessor::new(log);

        let source = match &options.report {
            Some(report) => {
                ArchiveExtractor::new(&session.staging, options.extract_timeout, log)
                    .extract(report)?
            }
            None => stage_files_only(&tree, &options.files, &session.staging)?,
        };

        let mut records = tree.copy_tree(&source, &session.working)?;
        let resolution = hostname::resolve(&session.working, log);
        register_domains(engine, log, &resolution, &options.normalised_domains());

        if options.report.is_some() {
            records.extend(
                options
                    .files
                    .iter()
                    .filter_map(|f| tree.add_extra_file(f, &session.working)),
            );
        }

        let scrubber = LineScrubber::new(engine, resolution.system_hostname())?;
        log.console(format!(
            "IP Obfuscation Start Address - {}",
            engine.start_ip()
        ));
        log.console("*** Processing ***");
        log.info(format!("Working Directory - {}", session.working.display()));
        tree.scrub_files(&records, &scrubber, engine)?;

        log_statistics(log, engine, &records);

        log.console("*** Artifacts ***");
        let reports = ReportWriter::new(&session.base, &session.name, log)
            .write_all(engine, resolution.is_resolved())?;
        let archive = ArchiveBuilder::new(log).build(session)?;

        Ok(Artifacts {
            archive,
            log: session.log_path.clone(),
            ip_report: reports.ip,
            hostname_report: reports.hostname,
            domain_report: reports.domain,
        })
    }
}

/// Standalone files with no report: gather them into the staging directory
/// so the rest of the pipeline can treat them as a tree.
fn stage_files_only(
    tree: &TreeProcessor<'_>,
    files: &[PathBuf],
    staging: &Path,
) -> ScrubResult<PathBuf> {
    fs::create_dir_all(staging).map_err(|source| ScrubError::DestinationSetup {
        path: staging.to_path_buf(),
        source,
    })?;
    for file in files {
        tree.add_extra_file(file, staging);
    }
    Ok(staging.to_path_buf())
}

/// The report's own domain goes first so it claims the bare root domain,
/// then the operator's extra domains in the order given.  The system host is
/// reserved last so it resolves against the finished domain table.
fn register_domains(
    engine: &mut ObfuscationEngine,
    log: &RunLog,
    resolution: &HostnameResolution,
    extra: &[String],
) {
    engine.set_own_domain(resolution.domain());
    let own = resolution.domain().map(str::to_string);

    for domain in own.iter().chain(extra.iter()) {
        let synthetic = engine.register_domain(domain);
        log.console(format!("Obfuscated Domain Created - {synthetic}"));
    }

    if let Some(hostname) = resolution.system_hostname() {
        let synthetic = engine.reserve_system_host(hostname, resolution.domain());
        log.info(format!("System Hostname Obfuscated - {synthetic}"));
    }
}

fn log_statistics(log: &RunLog, engine: &ObfuscationEngine, records: &[FileRecord]) {
    log.console("*** Statistics ***");
    log.console(format!("IP Addresses Obfuscated - {}", engine.ip_count()));
    log.console(format!("Hostnames Obfuscated - {}", engine.hostname_count()));
    log.console(format!("Domains Obfuscated - {}", engine.domain_count()));
    log.console(format!("Total Files Analyzed - {}", records.len()));
}
