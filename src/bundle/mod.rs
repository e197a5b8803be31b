// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

pub mod archive;
pub mod extract;
pub mod hostname;
pub mod probe;
pub mod session;
pub mod tree;

pub use archive::ArchiveBuilder;
pub use extract::ArchiveExtractor;
pub use hostname::HostnameResolution;
pub use session::Session;
pub use tree::{FileRecord, TreeProcessor};
