// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use crate::bundle::session::Session;
use crate::error::{ScrubError, ScrubResult};
use crate::logging::RunLog;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tar::Builder;
use walkdir::WalkDir;

/// Packs the scrubbed working copy and the run log into
/// `<session>.tar.gz`.  The session directories are torn down only once the
/// archive is complete on disk.
pub struct ArchiveBuilder<'a> {
    log: &'a RunLog,
}

impl<'a> ArchiveBuilder<'a> {
    pub fn new(log: &'a RunLog) -> Self {
        Self { log }
    }

    pub fn build(&self, session: &Session) -> ScrubResult<PathBuf> {
        let archive_path = session.archive_path();
        self.log.console(format!(
            "Creating Archive - {}",
            archive_path.display()
        ));

        self.write_archive(session, &archive_path)
            .map_err(|source| ScrubError::ArchiveCreation {
                path: archive_path.clone(),
                source,
            })?;

        session.teardown(self.log);
        self.log.console("Scrub Complete");
        Ok(archive_path)
    }

    fn write_archive(&self, session: &Session, archive_path: &Path) -> io::Result<()> {
        let file = File::create(archive_path)?;
        let mut tar = Builder::new(GzEncoder::new(file, Compression::default()));
        tar.follow_symlinks(false);

        let root = Path::new(&session.name);
        for entry in WalkDir::new(&session.working)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            let file_type = entry.file_type();
            if !(file_type.is_file() || file_type.is_symlink()) {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&session.working)
                .map_err(io::Error::other)?;
            let name = root.join(rel);
            self.log.debug(format!(
                "adding {} to {}",
                name.display(),
                archive_path.display()
            ));
            tar.append_path_with_name(entry.path(), &name)?;
        }

        self.log.info("Archiving Complete");

        // The log goes in last so it records the whole run.
        self.log.flush()?;
        tar.append_path_with_name(&session.log_path, format!("{}.log", session.name))?;
        tar.into_inner()?.finish()?;
        Ok(())
    }
}
