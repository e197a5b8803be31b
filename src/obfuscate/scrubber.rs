// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

//! Line substitution.  Lines are handled as raw bytes so text in legacy
//! encodings (Latin-1 logs, mixed-encoding dmesg captures) is scrubbed like
//! any other; bytes outside a match are passed through untouched.

use crate::error::{ScrubError, ScrubResult};
use crate::obfuscate::engine::ObfuscationEngine;
use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// Dotted quad with every octet in 0-255 and no leading zero on the first.
/// ASCII word boundaries, as the haystack need not be UTF-8.
static IPV4_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?-u:\b)(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9][0-9]|[1-9])(?:\.(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9][0-9]|[0-9])){3}(?-u:\b)",
    )
    .expect("valid regex")
});

/// Applies the engine's substitutions to single lines of text.  Built once
/// the domain table is final so the per-domain patterns are compiled only
/// once per run.
pub struct LineScrubber {
    domain_patterns: Vec<Regex>,
    system_hostname: Option<String>,
}

impl LineScrubber {
    /// `system_hostname` is `None` when the report's hostname could not be
    /// resolved; the hostname pass is then skipped entirely.
    pub fn new(engine: &ObfuscationEngine, system_hostname: Option<&str>) -> ScrubResult<Self> {
        let Some(hostname) = system_hostname else {
            return Ok(Self {
                domain_patterns: Vec::new(),
                system_hostname: None,
            });
        };

        let domain_patterns = engine
            .registered_domains()
            .map(domain_pattern)
            .collect::<ScrubResult<Vec<_>>>()?;

        Ok(Self {
            domain_patterns,
            system_hostname: Some(hostname.to_string()),
        })
    }

    /// IP pass followed by the hostname pass.
    pub fn scrub_line(&self, engine: &mut ObfuscationEngine, line: &[u8]) -> ScrubResult<Vec<u8>> {
        let line = self.substitute_ips(engine, line)?;
        Ok(self.substitute_hostnames(engine, &line))
    }

    pub fn substitute_ips(&self, engine: &mut ObfuscationEngine, line: &[u8]) -> ScrubResult<Vec<u8>> {
        let mut out = line.to_vec();
        for ip in distinct_matches(&IPV4_REGEX, line) {
            let synthetic = engine.allocate_or_lookup_ip(&ip)?;
            out = replace_all(&out, ip.as_bytes(), synthetic.as_bytes());
        }
        Ok(out)
    }

    pub fn substitute_hostnames(&self, engine: &mut ObfuscationEngine, line: &[u8]) -> Vec<u8> {
        let Some(hostname) = self.system_hostname.as_deref() else {
            return line.to_vec();
        };

        let mut out = line.to_vec();
        for pattern in &self.domain_patterns {
            for fqdn in distinct_matches(pattern, &out) {
                let synthetic = engine.allocate_or_lookup_hostname(&fqdn);
                out = replace_all(&out, fqdn.as_bytes(), synthetic.as_bytes());
            }
        }

        // Catch non-qualified mentions of the system's own name.
        if !hostname.is_empty() && find(&out, hostname.as_bytes()).is_some() {
            let synthetic = engine.allocate_or_lookup_hostname(hostname);
            out = replace_all(&out, hostname.as_bytes(), synthetic.as_bytes());
        }
        out
    }
}

/// Tokens of letters, digits, `-`, `_` and `.` ending in `.<domain>` and
/// starting on a word character.
fn domain_pattern(domain: &str) -> ScrubResult<Regex> {
    let pattern = format!(r"[a-zA-Z0-9_][a-zA-Z0-9_.\-]*\.{}", regex::escape(domain));
    Regex::new(&pattern)
        .map_err(|e| ScrubError::Substitution(format!("bad pattern for domain {domain}: {e}")))
}

/// Unique matches in first-seen order.  Both patterns only match ASCII plus
/// the literal domain, so every match is valid UTF-8.
fn distinct_matches(regex: &Regex, line: &[u8]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in regex.find_iter(line) {
        let text = String::from_utf8_lossy(m.as_bytes());
        if !found.iter().any(|seen| *seen == text) {
            found.push(text.into_owned());
        }
    }
    found
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Byte-wise counterpart of `str::replace`.
fn replace_all(haystack: &[u8], needle: &[u8], with: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(at) = find(rest, needle) {
        out.extend_from_slice(&rest[..at]);
        out.extend_from_slice(with);
        rest = &rest[at + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obfuscate::engine::RootDomain;
    use std::net::Ipv4Addr;

    fn engine() -> ObfuscationEngine {
        ObfuscationEngine::new(
            Ipv4Addr::new(10, 230, 230, 1),
            RootDomain::parse("example.com").expect("root domain"),
        )
    }

    /// Engine primed the way a run with `myhost.example.com` is primed.
    fn primed_engine() -> ObfuscationEngine {
        let mut engine = engine();
        engine.set_own_domain(Some("example.com"));
        engine.register_domain("example.com");
        engine.reserve_system_host("myhost", Some("example.com"));
        engine
    }

    fn scrub(scrubber: &LineScrubber, engine: &mut ObfuscationEngine, line: &str) -> String {
        String::from_utf8(scrubber.scrub_line(engine, line.as_bytes()).unwrap()).unwrap()
    }

    fn ips(scrubber: &LineScrubber, engine: &mut ObfuscationEngine, line: &str) -> String {
        String::from_utf8(scrubber.substitute_ips(engine, line.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn two_new_ips_get_consecutive_synthetic_addresses() {
        let mut engine = engine();
        let scrubber = LineScrubber::new(&engine, None).unwrap();
        let out = scrub(
            &scrubber,
            &mut engine,
            "Server at 192.168.1.10 failed, backup at 192.168.1.11",
        );
        assert_eq!(out, "Server at 10.230.230.1 failed, backup at 10.230.230.2");
    }

    #[test]
    fn repeated_ip_in_one_line_is_replaced_everywhere() {
        let mut engine = engine();
        let scrubber = LineScrubber::new(&engine, None).unwrap();
        let out = ips(&scrubber, &mut engine, "from 172.16.4.2 to 8.8.4.4 via 172.16.4.2");
        assert_eq!(out, "from 10.230.230.1 to 10.230.230.2 via 10.230.230.1");
    }

    #[test]
    fn ip_mappings_hold_across_lines() {
        let mut engine = engine();
        let scrubber = LineScrubber::new(&engine, None).unwrap();
        ips(&scrubber, &mut engine, "a 1.2.3.4");
        let out = ips(&scrubber, &mut engine, "b 5.6.7.8 c 1.2.3.4");
        assert_eq!(out, "b 10.230.230.2 c 10.230.230.1");
    }

    #[test]
    fn non_addresses_are_left_alone() {
        let mut engine = engine();
        let scrubber = LineScrubber::new(&engine, None).unwrap();
        for line in [
            "kernel 5.14.0 booted",
            "octet 256.1.1.1 is invalid",
            "leading zero 0.1.2.3 first octet",
            "ratio 1.2.3.4567",
        ] {
            assert_eq!(ips(&scrubber, &mut engine, line), line);
        }
        assert_eq!(engine.ip_count(), 0);
    }

    #[test]
    fn latin1_bytes_survive_around_substitutions() {
        let mut engine = primed_engine();
        let scrubber = LineScrubber::new(&engine, Some("myhost")).unwrap();
        let line = b"caf\xe9 peer 192.168.7.7 via myhost.example.com \xff\n";
        let out = scrubber.scrub_line(&mut engine, line).unwrap();
        assert_eq!(
            out,
            b"caf\xe9 peer 10.230.230.1 via host1.example.com \xff\n".to_vec()
        );
    }

    #[test]
    fn system_fqdn_becomes_host1() {
        let mut engine = primed_engine();
        let scrubber = LineScrubber::new(&engine, Some("myhost")).unwrap();
        assert_eq!(
            scrub(&scrubber, &mut engine, "ssh myhost.example.com"),
            "ssh host1.example.com"
        );
    }

    #[test]
    fn bare_system_hostname_is_replaced() {
        let mut engine = primed_engine();
        let scrubber = LineScrubber::new(&engine, Some("myhost")).unwrap();
        assert_eq!(
            scrub(&scrubber, &mut engine, "Welcome to myhost (kernel)"),
            "Welcome to host1 (kernel)"
        );
    }

    #[test]
    fn extra_domain_hosts_get_indexed_domains() {
        let mut engine = primed_engine();
        engine.register_domain("corp.local");
        let scrubber = LineScrubber::new(&engine, Some("myhost")).unwrap();
        assert_eq!(
            scrub(&scrubber, &mut engine, "mount db.corp.local:/srv on 10.0.0.9"),
            "mount host2.example1.com:/srv on 10.230.230.1"
        );
    }

    #[test]
    fn hostname_pass_is_disabled_without_a_system_hostname() {
        let mut engine = engine();
        engine.register_domain("corp.local");
        let scrubber = LineScrubber::new(&engine, None).unwrap();
        let line = "unknown talks to db.corp.local";
        assert_eq!(scrub(&scrubber, &mut engine, line), line);
        assert_eq!(engine.hostname_count(), 0);
    }

    #[test]
    fn domain_dots_are_literal() {
        let mut engine = primed_engine();
        let scrubber = LineScrubber::new(&engine, Some("myhost")).unwrap();
        let line = b"lookalike web.exampleXcom stays";
        assert_eq!(scrubber.substitute_hostnames(&mut engine, line), line.to_vec());
    }

    #[test]
    fn byte_replace_handles_overlaps_and_edges() {
        assert_eq!(replace_all(b"aaa", b"aa", b"b"), b"ba".to_vec());
        assert_eq!(replace_all(b"xyz", b"", b"b"), b"xyz".to_vec());
        assert_eq!(replace_all(b"1.1.1.1", b"1.1.1.1", b"10.0.0.1"), b"10.0.0.1".to_vec());
    }
}
