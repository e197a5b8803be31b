// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

//! Content-type probe used both to classify the input report and to decide
//! which files in the tree are safe to rewrite.

use infer::MatcherType;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

/// Bytes sniffed from the head of a file.
const SAMPLE_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Tar,
    Gzip,
    Bzip2,
    Xz,
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Codec::Tar => "tar archive",
            Codec::Gzip => "gzip compressed data",
            Codec::Bzip2 => "bzip2 compressed data",
            Codec::Xz => "xz compressed data",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Directory,
    Symlink,
    Text,
    Binary,
    Archive(Codec),
    /// Device nodes, FIFOs, sockets.
    Special,
    /// Could not be read, e.g. write-only pseudo files.
    Unknown,
}

impl Classification {
    pub fn is_text(self) -> bool {
        self == Classification::Text
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Directory => f.write_str("directory"),
            Classification::Symlink => f.write_str("symbolic link"),
            Classification::Text => f.write_str("text"),
            Classification::Binary => f.write_str("binary data"),
            Classification::Archive(codec) => write!(f, "{codec}"),
            Classification::Special => f.write_str("special file"),
            Classification::Unknown => f.write_str("unknown"),
        }
    }
}

/// Classify `path` without following symbolic links.
pub fn classify(path: &Path) -> Classification {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Classification::Unknown;
    };
    let file_type = meta.file_type();
    if file_type.is_symlink() {
        return Classification::Symlink;
    }
    if file_type.is_dir() {
        return Classification::Directory;
    }
    if !file_type.is_file() {
        return Classification::Special;
    }

    match read_sample(path) {
        Ok(sample) => classify_bytes(&sample),
        Err(_) => Classification::Unknown,
    }
}

/// Classify a sample taken from the start of a regular file.
pub fn classify_bytes(sample: &[u8]) -> Classification {
    if let Some(kind) = infer::get(sample) {
        match kind.mime_type() {
            "application/gzip" => return Classification::Archive(Codec::Gzip),
            "application/x-bzip2" => return Classification::Archive(Codec::Bzip2),
            "application/x-xz" => return Classification::Archive(Codec::Xz),
            "application/x-tar" => return Classification::Archive(Codec::Tar),
            _ if kind.matcher_type() != MatcherType::Text => return Classification::Binary,
            _ => {}
        }
    }

    if looks_like_text(sample) {
        Classification::Text
    } else {
        Classification::Binary
    }
}

fn read_sample(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    file.take(SAMPLE_SIZE as u64).read_to_end(&mut sample)?;
    Ok(sample)
}

/// No NUL bytes and only a sprinkling of control characters.  Bytes above
/// 0x7f are accepted whatever the encoding, so Latin-1 and other legacy
/// single-byte text counts as text.
fn looks_like_text(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return true;
    }
    let mut control = 0usize;
    for &byte in sample {
        match byte {
            0 => return false,
            b'\n' | b'\r' | b'\t' | 0x0c | 0x1b => {}
            b if b < 0x20 || b == 0x7f => control += 1,
            _ => {}
        }
    }
    control * 10 < sample.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn plain_config_is_text() {
        let sample = b"127.0.0.1 localhost\n10.0.0.4 db.corp.local db\n";
        assert_eq!(classify_bytes(sample), Classification::Text);
        assert_eq!(classify_bytes(b""), Classification::Text);
    }

    #[test]
    fn nul_bytes_make_binary() {
        assert_eq!(classify_bytes(b"abc\0def"), Classification::Binary);
    }

    #[test]
    fn latin1_text_is_text() {
        assert_eq!(
            classify_bytes(b"caf\xe9 peer 192.168.7.7\n"),
            Classification::Text
        );
    }

    #[test]
    fn dense_control_bytes_make_binary() {
        assert_eq!(
            classify_bytes(&[0x01, 0x02, b'a', 0x03, 0x04, b'b', 0x05]),
            Classification::Binary
        );
    }

    #[test]
    fn truncated_multibyte_char_is_still_text() {
        let mut sample = "café".as_bytes().to_vec();
        sample.pop();
        assert_eq!(classify_bytes(&sample), Classification::Text);
    }

    #[test]
    fn compressed_signatures_are_recognised() {
        assert_eq!(
            classify_bytes(&[0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00]),
            Classification::Archive(Codec::Gzip)
        );
        assert_eq!(
            classify_bytes(b"BZh91AY&SY"),
            Classification::Archive(Codec::Bzip2)
        );
        assert_eq!(
            classify_bytes(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00]),
            Classification::Archive(Codec::Xz)
        );
    }

    #[test]
    fn filesystem_kinds_are_reported() {
        let dir = TempDir::new().unwrap();
        assert_eq!(classify(dir.path()), Classification::Directory);

        let text = dir.path().join("hosts");
        let mut file = File::create(&text).unwrap();
        writeln!(file, "10.1.1.1 gateway").unwrap();
        assert_eq!(classify(&text), Classification::Text);

        #[cfg(unix)]
        {
            let link = dir.path().join("hosts.link");
            std::os::unix::fs::symlink(&text, &link).unwrap();
            assert_eq!(classify(&link), Classification::Symlink);
        }

        assert_eq!(classify(&dir.path().join("missing")), Classification::Unknown);
    }
}
