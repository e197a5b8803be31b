// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

pub mod engine;
pub mod report;
pub mod scrubber;
pub mod table;

pub use engine::{ObfuscationEngine, RootDomain};
pub use report::ReportWriter;
pub use scrubber::LineScrubber;
