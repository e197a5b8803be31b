// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

//! Mapping engine for IP addresses, hostnames and domains.
//! Replacements remain stable for the lifetime of the engine so every file in
//! a bundle agrees on which synthetic host stands for which real one.

use crate::error::{ScrubError, ScrubResult};
use crate::obfuscate::table::MappingTable;
use std::net::Ipv4Addr;

/// Synthetic base domain, e.g. `example.com`.  Indexed synthetic domains are
/// built from its first label and the remainder (`example1.com`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDomain {
    domain: String,
    label: String,
    tld: String,
}

impl RootDomain {
    pub fn parse(raw: &str) -> ScrubResult<Self> {
        let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
        match domain.split_once('.') {
            Some((label, tld)) if !label.is_empty() && !tld.is_empty() => Ok(Self {
                label: label.to_string(),
                tld: tld.to_string(),
                domain,
            }),
            _ => Err(ScrubError::Config(format!(
                "root domain must look like label.tld, got {raw:?}"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.domain
    }

    fn indexed(&self, index: usize) -> String {
        format!("{}{index}.{}", self.label, self.tld)
    }
}

/// Owns the three mapping tables for one run.  Every operation is a
/// check-then-insert on `&mut self`, so the borrow checker already enforces
/// the single writer the tables need.
pub struct ObfuscationEngine {
    start_ip: u32,
    root: RootDomain,
    own_domain: Option<String>,
    ips: MappingTable<u32>,
    hostnames: MappingTable<String>,
    domains: MappingTable<String>,
    hostname_count: u32,
}

impl ObfuscationEngine {
    pub fn new(start_ip: Ipv4Addr, root: RootDomain) -> Self {
        Self {
            start_ip: u32::from(start_ip),
            root,
            own_domain: None,
            ips: MappingTable::default(),
            hostnames: MappingTable::default(),
            domains: MappingTable::default(),
            hostname_count: 0,
        }
    }

    pub fn start_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.start_ip)
    }

    /// Return the synthetic address for `original`, allocating the next one
    /// in sequence the first time an address is seen.
    pub fn allocate_or_lookup_ip(&mut self, original: &str) -> ScrubResult<String> {
        let addr: Ipv4Addr = original
            .parse()
            .map_err(|_| ScrubError::Substitution(format!("not an IPv4 address: {original}")))?;
        let value = u32::from(addr);

        if let Some(&synthetic) = self.ips.synthetic_for(&value) {
            return Ok(Ipv4Addr::from(synthetic).to_string());
        }

        let synthetic = match self.ips.last() {
            Some(&(max, _)) => max.checked_add(1).ok_or_else(|| {
                ScrubError::Substitution(format!(
                    "synthetic address space exhausted while mapping {original}"
                ))
            })?,
            None => self.start_ip,
        };
        self.ips.insert(synthetic, value);

        Ok(Ipv4Addr::from(synthetic).to_string())
    }

    /// Return the synthetic hostname for `original`, creating
    /// `host<N>.<domain>` the first time it is seen.
    pub fn allocate_or_lookup_hostname(&mut self, original: &str) -> String {
        if let Some(synthetic) = self.hostnames.synthetic_for(&original.to_string()) {
            return synthetic.clone();
        }

        self.hostname_count += 1;
        let suffix = self.synthetic_domain_for(original);
        let synthetic = format!("host{}.{suffix}", self.hostname_count);
        self.hostnames.insert(synthetic.clone(), original.to_string());
        synthetic
    }

    /// Set the report's own domain.  Must happen before it is registered so
    /// it lands on the bare root domain.
    pub fn set_own_domain(&mut self, domain: Option<&str>) {
        self.own_domain = domain.map(str::to_string);
    }

    /// Register a domain whose hostnames should be obfuscated and return its
    /// synthetic suffix.  Registering the same domain twice is a no-op.
    pub fn register_domain(&mut self, original: &str) -> String {
        if let Some(synthetic) = self.domains.synthetic_for(&original.to_string()) {
            return synthetic.clone();
        }

        let synthetic = if self.own_domain.as_deref() == Some(original) {
            self.root.as_str().to_string()
        } else {
            self.root.indexed(self.domains.len())
        };
        self.domains.insert(synthetic.clone(), original.to_string());
        synthetic
    }

    /// Reserve the first hostname slot for the system the report came from.
    /// The fully qualified name becomes `host1.<root>`; when it has a domain
    /// the bare hostname is pinned to the short form `host1` so both spellings
    /// point at the same synthetic machine.
    pub fn reserve_system_host(&mut self, hostname: &str, domain: Option<&str>) -> String {
        let Some(domain) = domain else {
            return self.allocate_or_lookup_hostname(hostname);
        };

        let fqdn = format!("{hostname}.{domain}");
        let synthetic = self.allocate_or_lookup_hostname(&fqdn);
        let short = synthetic
            .split_once('.')
            .map(|(label, _)| label.to_string())
            .unwrap_or_else(|| synthetic.clone());
        if !self.hostnames.contains_synthetic(&short) {
            self.hostnames.insert(short, hostname.to_string());
        }
        synthetic
    }

    /// Original domains in registration order.
    pub fn registered_domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(|(_, original)| original.as_str())
    }

    pub fn ip_pairs(&self) -> impl Iterator<Item = (Ipv4Addr, Ipv4Addr)> + '_ {
        self.ips
            .iter()
            .map(|&(synthetic, original)| (Ipv4Addr::from(synthetic), Ipv4Addr::from(original)))
    }

    pub fn hostname_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.hostnames
            .iter()
            .map(|(synthetic, original)| (synthetic.as_str(), original.as_str()))
    }

    pub fn domain_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.domains
            .iter()
            .map(|(synthetic, original)| (synthetic.as_str(), original.as_str()))
    }

    pub fn ip_count(&self) -> usize {
        self.ips.len()
    }

    pub fn hostname_count(&self) -> usize {
        self.hostnames.len()
    }

    pub fn has_domains(&self) -> bool {
        !self.domains.is_empty()
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    /// Pick the synthetic suffix of the registered domain `hostname` belongs
    /// to.  The longest matching original wins so `db.lab.corp.local` prefers
    /// `lab.corp.local` over `corp.local` when both are registered.
    fn synthetic_domain_for(&self, hostname: &str) -> String {
        self.domains
            .iter()
            .filter(|(_, original)| {
                hostname
                    .strip_suffix(original.as_str())
                    .is_some_and(|head| head.ends_with('.'))
            })
            .max_by_key(|(_, original)| original.len())
            .map(|(synthetic, _)| synthetic.clone())
            .unwrap_or_else(|| self.root.as_str().to_string())
    }
}
