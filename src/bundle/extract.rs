// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use crate::bundle::probe::{self, Classification, Codec};
use crate::error::{ScrubError, ScrubResult};
use crate::logging::RunLog;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Maximum stderr kept from a failed external decompressor.
const STDERR_LIMIT: usize = 4096;

/// One way of unpacking an archive into a directory.
pub trait ExtractStrategy {
    fn extract(&self, archive: &Path, dest: &Path) -> ScrubResult<()>;
}

/// Tar streams the `tar` crate can read directly, optionally wrapped in
/// gzip or bzip2.
pub struct TarExtractor {
    codec: Codec,
}

impl TarExtractor {
    pub fn new(codec: Codec) -> Self {
        Self { codec }
    }
}

impl ExtractStrategy for TarExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> ScrubResult<()> {
        let file = File::open(archive).map_err(|e| {
            ScrubError::extraction_io(format!("cannot open {}", archive.display()), e)
        })?;

        let result = match self.codec {
            Codec::Tar => unpack(file, dest),
            Codec::Gzip => unpack(GzDecoder::new(file), dest),
            Codec::Bzip2 => unpack(BzDecoder::new(file), dest),
            Codec::Xz => {
                return Err(ScrubError::extraction(
                    "xz archives need the external decompressor strategy",
                ));
            }
        };

        result.map_err(|e| {
            ScrubError::extraction_io(
                format!(
                    "unable to decompress {} into {}",
                    archive.display(),
                    dest.display()
                ),
                e,
            )
        })
    }
}

fn unpack<R: Read>(reader: R, dest: &Path) -> io::Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.unpack(dest)
}

/// Runs an external program with a fixed argument list,
/// `<program> <flag> <archive> -C <dest>`, and kills it when the timeout
/// expires.  Used for xz, which the archive stack does not decode natively.
pub struct ExternalExtractor {
    program: String,
    flag: String,
    timeout: Duration,
}

impl ExternalExtractor {
    pub fn new(program: impl Into<String>, flag: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            flag: flag.into(),
            timeout,
        }
    }

    pub fn xz(timeout: Duration) -> Self {
        Self::new("tar", "-xJf", timeout)
    }
}

impl ExtractStrategy for ExternalExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> ScrubResult<()> {
        let mut child = Command::new(&self.program)
            .arg(&self.flag)
            .arg(archive)
            .arg("-C")
            .arg(dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ScrubError::extraction_io(format!("cannot start {}", self.program), e))?;

        // Drain stderr while waiting; a chatty decompressor would otherwise
        // block on a full pipe until the timeout fires.
        let drain = child
            .stderr
            .take()
            .map(|pipe| thread::spawn(move || drain_capped(pipe)));

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ScrubError::extraction(format!(
                    "{} timed out after {}s extracting {}",
                    self.program,
                    self.timeout.as_secs(),
                    archive.display()
                )));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ScrubError::extraction_io(
                    format!("waiting for {}", self.program),
                    e,
                ));
            }
        };

        if status.success() {
            return Ok(());
        }

        let stderr = drain
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        Err(ScrubError::extraction(format!(
            "{} exited with {status} for {}: {}",
            self.program,
            archive.display(),
            stderr.trim()
        )))
    }
}

/// Read `pipe` to the end, keeping at most `STDERR_LIMIT` bytes.
fn drain_capped(mut pipe: impl Read) -> String {
    let mut kept = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match pipe.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let room = STDERR_LIMIT.saturating_sub(kept.len());
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&kept).into_owned()
}

/// Turns the input report path into a directory tree ready for copying.
pub struct ArchiveExtractor<'a> {
    staging: &'a Path,
    timeout: Duration,
    log: &'a RunLog,
}

impl<'a> ArchiveExtractor<'a> {
    pub fn new(staging: &'a Path, timeout: Duration, log: &'a RunLog) -> Self {
        Self {
            staging,
            timeout,
            log,
        }
    }

    /// Directories are used in place.  Archives are unpacked into the staging
    /// directory and the root of the unpacked tree is returned.
    pub fn extract(&self, report: &Path) -> ScrubResult<PathBuf> {
        self.log.console("Beginning Report Extraction");
        let report = resolve_input(report)?;
        let report = report.as_path();
        let classification = probe::classify(report);

        let codec = match classification {
            Classification::Directory => {
                self.log.info(format!(
                    "{} appears to be a {classification} - continuing",
                    report.display()
                ));
                return Ok(report.to_path_buf());
            }
            Classification::Archive(codec) => codec,
            other => {
                return Err(ScrubError::extraction(format!(
                    "unable to determine compression type of {} ({other})",
                    report.display()
                )));
            }
        };

        self.log.info(format!(
            "Data Source Appears To Be {codec} - decompressing into {}",
            self.staging.display()
        ));
        fs::create_dir_all(self.staging).map_err(|e| {
            ScrubError::extraction_io(format!("cannot create {}", self.staging.display()), e)
        })?;

        self.strategy_for(codec).extract(report, self.staging)?;
        extracted_root(self.staging)
    }

    fn strategy_for(&self, codec: Codec) -> Box<dyn ExtractStrategy> {
        match codec {
            Codec::Xz => Box::new(ExternalExtractor::xz(self.timeout)),
            other => Box::new(TarExtractor::new(other)),
        }
    }
}

/// A report path that is itself a symbolic link is followed.  Links inside
/// the report are never followed.
fn resolve_input(report: &Path) -> ScrubResult<PathBuf> {
    let is_link = fs::symlink_metadata(report)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false);
    if !is_link {
        return Ok(report.to_path_buf());
    }
    fs::canonicalize(report).map_err(|e| {
        ScrubError::extraction_io(format!("cannot follow link {}", report.display()), e)
    })
}

/// The single top-level directory of an unpacked archive, or the staging
/// directory itself when the archive has several top-level entries.
fn extracted_root(staging: &Path) -> ScrubResult<PathBuf> {
    let entries = fs::read_dir(staging)
        .and_then(|iter| iter.collect::<io::Result<Vec<_>>>())
        .map_err(|e| ScrubError::extraction_io(format!("cannot list {}", staging.display()), e))?;

    if let [only] = entries.as_slice()
        && only.file_type().map(|t| t.is_dir()).unwrap_or(false)
    {
        return Ok(only.path());
    }
    if entries.is_empty() {
        return Err(ScrubError::extraction(format!(
            "archive unpacked nothing into {}",
            staging.display()
        )));
    }
    Ok(staging.to_path_buf())
}
