// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use std::path::Path;
use std::process::Command;

// Suffix for the run-log banner: the commit (or `git describe` output) and
// the rustc that built the binary.
fn main() {
    let commit = std::env::var("BUNDLESCRUB_COMMIT")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(git_describe)
        .unwrap_or_else(|| "unreleased".to_string());
    let rustc = rustc_version::version()
        .map(|v| v.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=BUNDLESCRUB_BUILD=commit:{commit} rustc:{rustc}");
    println!("cargo:rerun-if-env-changed=BUNDLESCRUB_COMMIT");
    if Path::new(".git/HEAD").exists() {
        println!("cargo:rerun-if-changed=.git/HEAD");
    }
}

/// `git describe --always --dirty`, so locally modified builds say so.
fn git_describe() -> Option<String> {
    let out = Command::new("git")
        .args(["describe", "--always", "--dirty"])
        .output()
        .ok()?;
    let described = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (out.status.success() && !described.is_empty()).then_some(described)
}
