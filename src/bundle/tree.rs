// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use crate::bundle::probe::{self, Classification};
use crate::error::{ScrubError, ScrubResult};
use crate::logging::RunLog;
use crate::obfuscate::{LineScrubber, ObfuscationEngine};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// A regular file in the working copy and how the probe classified it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub class: Classification,
}

impl FileRecord {
    pub fn is_text(&self) -> bool {
        self.class.is_text()
    }
}

/// Builds the working copy of a report and rewrites its text files.
pub struct TreeProcessor<'a> {
    log: &'a RunLog,
}

impl<'a> TreeProcessor<'a> {
    pub fn new(log: &'a RunLog) -> Self {
        Self { log }
    }

    /// Copy `source` into `dest`.  Symbolic links are recreated as links,
    /// regular files are copied byte for byte and special or unreadable files
    /// are left behind.  Returns a record for every copied regular file.
    pub fn copy_tree(&self, source: &Path, dest: &Path) -> ScrubResult<Vec<FileRecord>> {
        let setup = |path: &Path, source: io::Error| ScrubError::DestinationSetup {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(dest).map_err(|e| setup(dest, e))?;

        let mut records = Vec::new();
        let walker = WalkDir::new(source)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| setup(dest, e.into()))?;
            let rel = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| setup(entry.path(), io::Error::other(e)))?;
            let target = dest.join(rel);

            match probe::classify(entry.path()) {
                Classification::Directory => {
                    fs::create_dir_all(&target).map_err(|e| setup(&target, e))?;
                }
                Classification::Symlink => {
                    copy_symlink(entry.path(), &target).map_err(|e| setup(&target, e))?;
                }
                class @ (Classification::Special | Classification::Unknown) => {
                    self.log.debug(format!(
                        "Skipping {} ({class})",
                        entry.path().display()
                    ));
                }
                class => {
                    fs::copy(entry.path(), &target).map_err(|e| setup(&target, e))?;
                    records.push(FileRecord {
                        path: target,
                        class,
                    });
                }
            }
        }
        Ok(records)
    }

    /// Copy a user supplied file into `dest_dir`.  Unreadable or missing
    /// files are reported and skipped rather than failing the run.  A name
    /// already taken in `dest_dir` gets a numeric suffix so report files are
    /// never overwritten.
    pub fn add_extra_file(&self, source: &Path, dest_dir: &Path) -> Option<FileRecord> {
        self.log.console(format!(
            "adding additional file for analysis: {}",
            source.display()
        ));

        let Some(name) = source.file_name() else {
            self.log.warning(format!(
                "ExtraFileError: {} has no file name. Skipping File",
                source.display()
            ));
            return None;
        };
        let target = free_name(dest_dir, name);
        if target.file_name() != Some(name) {
            self.log.warning(format!(
                "{} already exists in the report, adding {} as {}",
                name.to_string_lossy(),
                source.display(),
                target.display()
            ));
        }

        if let Err(err) = fs::copy(source, &target) {
            self.log.console(format!(
                "ExtraFileError: {} is not readable or does not exist. Skipping File",
                source.display()
            ));
            self.log.warning(format!("{}: {err}", source.display()));
            return None;
        }

        Some(FileRecord {
            class: probe::classify(&target),
            path: target,
        })
    }

    /// Scrub every text record once.  Returns the number of files rewritten.
    pub fn scrub_files(
        &self,
        records: &[FileRecord],
        scrubber: &LineScrubber,
        engine: &mut ObfuscationEngine,
    ) -> ScrubResult<usize> {
        let mut seen = HashSet::new();
        let mut rewritten = 0;
        for record in records.iter().filter(|r| r.is_text()) {
            if !seen.insert(record.path.as_path()) {
                continue;
            }
            self.log
                .debug(format!("Cleaning {}", record.path.display()));
            if self.scrub_file(&record.path, scrubber, engine)? {
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    /// Scrub one file in place.  The new content is written to a temporary
    /// file in the same directory and renamed over the original, so a failed
    /// write leaves the original untouched.  Returns `true` if the file
    /// changed.
    pub fn scrub_file(
        &self,
        path: &Path,
        scrubber: &LineScrubber,
        engine: &mut ObfuscationEngine,
    ) -> ScrubResult<bool> {
        let io_err = |action: &'static str, source: io::Error| ScrubError::FileIo {
            action,
            path: path.to_path_buf(),
            source,
        };

        let content = fs::read(path).map_err(|e| io_err("cannot read", e))?;
        if content.is_empty() {
            return Ok(false);
        }

        let mut scrubbed = Vec::with_capacity(content.len());
        for line in content.split_inclusive(|&b| b == b'\n') {
            scrubbed.extend_from_slice(&scrubber.scrub_line(engine, line)?);
        }
        if scrubbed == content {
            return Ok(false);
        }

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_err("cannot write", e))?;
        tmp.write_all(&scrubbed)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| io_err("cannot write", e))?;
        if let Ok(meta) = fs::metadata(path) {
            let _ = fs::set_permissions(tmp.path(), meta.permissions());
        }
        tmp.persist(path)
            .map_err(|e| io_err("cannot replace", e.error))?;
        Ok(true)
    }
}

/// `dir/name`, or `dir/name.N` for the first N that is not taken.
fn free_name(dir: &Path, name: &OsStr) -> PathBuf {
    let candidate = dir.join(name);
    if fs::symlink_metadata(&candidate).is_err() {
        return candidate;
    }
    (1..)
        .map(|n| {
            let mut numbered = name.to_os_string();
            numbered.push(format!(".{n}"));
            dir.join(numbered)
        })
        .find(|path| fs::symlink_metadata(path).is_err())
        .unwrap_or(candidate)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let points_to = fs::read_link(link)?;
    std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot recreate symbolic link {}", link.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Level;
    use crate::obfuscate::RootDomain;
    use std::net::Ipv4Addr;
    use tempfile::TempDir;

    const PNG_BYTES: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, b'I', b'H', b'D',
        b'R', 0x00, b'1', b'0', b'.', b'0', b'.', b'0', b'.', b'1',
    ];

    fn engine() -> ObfuscationEngine {
        ObfuscationEngine::new(
            Ipv4Addr::new(10, 230, 230, 1),
            RootDomain::parse("example.com").unwrap(),
        )
    }

    fn sample_report(root: &Path) {
        fs::create_dir_all(root.join("etc")).unwrap();
        fs::write(root.join("etc/hosts"), "192.168.1.10 db\n192.168.1.11 web\n").unwrap();
        fs::write(root.join("etc/resolv.conf"), "nameserver 192.168.1.1\n").unwrap();
        fs::write(root.join("uptime"), "up 3 days\n").unwrap();
        fs::write(root.join("logo.png"), PNG_BYTES).unwrap();
    }

    #[test]
    fn copy_keeps_binaries_and_marks_text() {
        let work = TempDir::new().unwrap();
        let log = RunLog::create(&work.path().join("t.log"), Level::Debug, true).unwrap();
        let source = work.path().join("report");
        let dest = work.path().join("working");
        sample_report(&source);

        let records = TreeProcessor::new(&log).copy_tree(&source, &dest).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records.iter().filter(|r| r.is_text()).count(), 3);
        assert_eq!(fs::read(dest.join("logo.png")).unwrap(), PNG_BYTES);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_stay_links() {
        let work = TempDir::new().unwrap();
        let log = RunLog::create(&work.path().join("t.log"), Level::Debug, true).unwrap();
        let source = work.path().join("report");
        sample_report(&source);
        std::os::unix::fs::symlink("etc/hosts", source.join("hosts")).unwrap();

        let dest = work.path().join("working");
        let records = TreeProcessor::new(&log).copy_tree(&source, &dest).unwrap();
        assert!(records.iter().all(|r| !r.path.ends_with("hosts") || r.path.ends_with("etc/hosts")));
        let meta = fs::symlink_metadata(dest.join("hosts")).unwrap();
        assert!(meta.file_type().is_symlink());
        assert_eq!(fs::read_link(dest.join("hosts")).unwrap(), Path::new("etc/hosts"));
    }

    #[test]
    fn scrubbing_rewrites_text_and_leaves_binaries_alone() {
        let work = TempDir::new().unwrap();
        let log = RunLog::create(&work.path().join("t.log"), Level::Debug, true).unwrap();
        let source = work.path().join("report");
        let dest = work.path().join("working");
        sample_report(&source);

        let tree = TreeProcessor::new(&log);
        let records = tree.copy_tree(&source, &dest).unwrap();
        let mut engine = engine();
        let scrubber = LineScrubber::new(&engine, None).unwrap();
        let rewritten = tree.scrub_files(&records, &scrubber, &mut engine).unwrap();

        assert_eq!(rewritten, 2);
        assert_eq!(
            fs::read_to_string(dest.join("etc/hosts")).unwrap(),
            "10.230.230.1 db\n10.230.230.2 web\n"
        );
        assert_eq!(
            fs::read_to_string(dest.join("etc/resolv.conf")).unwrap(),
            "nameserver 10.230.230.3\n"
        );
        assert_eq!(fs::read(dest.join("logo.png")).unwrap(), PNG_BYTES);
        assert_eq!(fs::read(source.join("etc/hosts")).unwrap(), b"192.168.1.10 db\n192.168.1.11 web\n");
    }

    #[test]
    fn missing_line_terminator_is_preserved() {
        let work = TempDir::new().unwrap();
        let log = RunLog::create(&work.path().join("t.log"), Level::Debug, true).unwrap();
        let file = work.path().join("motd");
        fs::write(&file, "gw 172.16.0.1\r\nlast 172.16.0.2").unwrap();

        let mut engine = engine();
        let scrubber = LineScrubber::new(&engine, None).unwrap();
        assert!(TreeProcessor::new(&log).scrub_file(&file, &scrubber, &mut engine).unwrap());
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "gw 10.230.230.1\r\nlast 10.230.230.2"
        );
    }

    #[test]
    fn unreadable_file_is_fatal() {
        let work = TempDir::new().unwrap();
        let log = RunLog::create(&work.path().join("t.log"), Level::Debug, true).unwrap();
        let mut engine = engine();
        let scrubber = LineScrubber::new(&engine, None).unwrap();
        let err = TreeProcessor::new(&log)
            .scrub_file(&work.path().join("vanished"), &scrubber, &mut engine)
            .unwrap_err();
        assert!(matches!(err, ScrubError::FileIo { .. }));
    }

    #[test]
    fn missing_extra_file_is_skipped() {
        let work = TempDir::new().unwrap();
        let log = RunLog::create(&work.path().join("t.log"), Level::Debug, true).unwrap();
        let tree = TreeProcessor::new(&log);
        assert!(tree
            .add_extra_file(&work.path().join("nope.txt"), work.path())
            .is_none());

        let extra = work.path().join("extra.log");
        fs::write(&extra, "peer 8.8.8.8\n").unwrap();
        let dest = work.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        let record = tree.add_extra_file(&extra, &dest).expect("copied");
        assert_eq!(record.path, dest.join("extra.log"));
        assert!(record.is_text());
    }

    #[test]
    fn latin1_text_is_scrubbed_not_shipped() {
        let work = TempDir::new().unwrap();
        let log = RunLog::create(&work.path().join("t.log"), Level::Debug, true).unwrap();
        let source = work.path().join("report");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("latin1.log"), b"caf\xe9 peer 192.168.7.7\n").unwrap();
        let mut late = vec![b'a'; 9000];
        late.extend_from_slice(b"\n\xe9 peer 192.168.8.8\n");
        fs::write(source.join("late.log"), &late).unwrap();

        let dest = work.path().join("working");
        let tree = TreeProcessor::new(&log);
        let records = tree.copy_tree(&source, &dest).unwrap();
        assert!(records.iter().all(FileRecord::is_text));

        let mut engine = engine();
        let scrubber = LineScrubber::new(&engine, None).unwrap();
        assert_eq!(tree.scrub_files(&records, &scrubber, &mut engine).unwrap(), 2);

        let late_out = fs::read(dest.join("late.log")).unwrap();
        assert!(late_out.ends_with(b"\n\xe9 peer 10.230.230.1\n"));
        assert_eq!(
            fs::read(dest.join("latin1.log")).unwrap(),
            b"caf\xe9 peer 10.230.230.2\n"
        );
    }

    #[test]
    fn colliding_extra_file_is_renamed_and_scrubbed_once() {
        let work = TempDir::new().unwrap();
        let log = RunLog::create(&work.path().join("t.log"), Level::Debug, true).unwrap();
        let source = work.path().join("report");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("messages"), "boot from 192.168.1.10\n").unwrap();
        let other = work.path().join("other");
        fs::create_dir_all(&other).unwrap();
        fs::write(other.join("messages"), "peer 192.168.1.10\n").unwrap();

        let dest = work.path().join("working");
        let tree = TreeProcessor::new(&log);
        let mut records = tree.copy_tree(&source, &dest).unwrap();
        let extra = tree.add_extra_file(&other.join("messages"), &dest).unwrap();
        assert_eq!(extra.path, dest.join("messages.1"));
        records.push(extra.clone());
        records.push(extra);

        let mut engine = engine();
        let scrubber = LineScrubber::new(&engine, None).unwrap();
        tree.scrub_files(&records, &scrubber, &mut engine).unwrap();

        assert_eq!(
            fs::read_to_string(dest.join("messages")).unwrap(),
            "boot from 10.230.230.1\n"
        );
        assert_eq!(
            fs::read_to_string(dest.join("messages.1")).unwrap(),
            "peer 10.230.230.1\n"
        );
        let pairs: Vec<_> = engine.ip_pairs().collect();
        assert_eq!(
            pairs,
            vec![(Ipv4Addr::new(10, 230, 230, 1), Ipv4Addr::new(192, 168, 1, 10))]
        );
    }

    #[cfg(unix)]
    #[test]
    fn fifos_are_left_behind() {
        let work = TempDir::new().unwrap();
        let log = RunLog::create(&work.path().join("t.log"), Level::Debug, true).unwrap();
        let source = work.path().join("report");
        sample_report(&source);
        let status = std::process::Command::new("mkfifo")
            .arg(source.join("initctl"))
            .status()
            .unwrap();
        assert!(status.success());

        let dest = work.path().join("working");
        let records = TreeProcessor::new(&log).copy_tree(&source, &dest).unwrap();
        assert_eq!(records.len(), 4);
        assert!(fs::symlink_metadata(dest.join("initctl")).is_err());
    }
}
