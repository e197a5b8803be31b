// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

/// bundlescrub command-line entry point.
///
/// The binary takes a support report (a directory or a compressed archive),
/// rewrites every IPv4 address, hostname and domain in its text files to
/// stable synthetic values and packages the result alongside CSV mapping
/// reports.  This file only turns user input into `ScrubOptions` and hands
/// over to the pipeline in `cleaner`.
mod bundle;
mod cleaner;
mod config;
mod error;
mod logging;
mod obfuscate;

use anyhow::{Context, Result, anyhow};
use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use cleaner::Cleaner;
use config::{DEFAULT_EXTRACT_TIMEOUT_SECS, DEFAULT_ROOT_DOMAIN, DEFAULT_START_IP, ScrubOptions};
use logging::Level;
use obfuscate::RootDomain;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

/// Release builds get their tag through `BUNDLESCRUB_VERSION`; local builds
/// report the Cargo package version.
const VERSION: &str = match option_env!("BUNDLESCRUB_VERSION") {
    Some(tag) => tag,
    None => env!("CARGO_PKG_VERSION"),
};

/// Commit and rustc version assembled by `build.rs`.
fn build_info() -> &'static str {
    option_env!("BUNDLESCRUB_BUILD").unwrap_or("commit:unreleased rustc:unknown")
}

/// Banner written at the top of every run log.
fn version_string() -> String {
    format!("bundlescrub {VERSION} ({})", build_info())
}

/// Cached version string with a 'static lifetime for clap metadata.
fn version_str() -> &'static str {
    static VERSION_STR: OnceLock<String> = OnceLock::new();
    VERSION_STR.get_or_init(version_string).as_str()
}

fn main() {
    std::process::exit(match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            1
        }
    });
}

/// Parse arguments, check the run can read and write what it needs, then
/// drive the scrub pipeline and print the artifact paths one per line.
fn run() -> Result<i32> {
    let matches = match build_cli().try_get_matches() {
        Ok(m) => m,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                return Ok(0);
            }
            _ => err.exit(),
        },
    };

    let cli = CliOptions::from_matches(&matches)?;
    if cli.show_version {
        println!("{}", version_string());
        return Ok(0);
    }

    let options = cli.into_scrub_options()?;
    options.validate()?;
    options.check_privileges()?;

    let cleaner = Cleaner::new(options).context("unable to start scrub session")?;
    cleaner.disclaimer(version_str());
    let artifacts = cleaner.run()?;

    for path in artifacts.paths() {
        println!("{}", path.display());
    }
    Ok(0)
}

/// Construct the `clap` command.  Inputs first, then output placement, then
/// the synthetic value knobs.
fn build_cli() -> Command {
    Command::new("bundlescrub")
        .about("Obfuscate IP addresses, hostnames and domains in a support report")
        .disable_version_flag(true)
        .version(version_str())
        .arg(
            Arg::new("report")
                .value_name("REPORT")
                .help("Report directory or archive (tar, tar.gz, tar.bz2, tar.xz)"),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .action(ArgAction::Append)
                .help("Additional file to scrub (repeatable)"),
        )
        .arg(
            Arg::new("domain")
                .short('d')
                .long("domain")
                .value_name("DOMAIN")
                .action(ArgAction::Append)
                .help("Additional domain to obfuscate (repeatable)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Do not echo progress to stdout"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .default_value("info")
                .help("Run log threshold: debug, info, console, warning or error"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Where session directories and artifacts are created (default: temp dir)"),
        )
        .arg(
            Arg::new("root-domain")
                .long("root-domain")
                .value_name("DOMAIN")
                .default_value(DEFAULT_ROOT_DOMAIN)
                .help("Synthetic root domain"),
        )
        .arg(
            Arg::new("start-ip")
                .long("start-ip")
                .value_name("ADDR")
                .help("First synthetic IPv4 address (default: 10.230.230.1)"),
        )
        .arg(
            Arg::new("extract-timeout")
                .long("extract-timeout")
                .value_name("SECS")
                .help("Time limit for external decompressors (default: 300)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print version information and exit"),
        )
}

/// Typed view of the command line before it becomes `ScrubOptions`.
struct CliOptions {
    report: Option<PathBuf>,
    files: Vec<PathBuf>,
    domains: Vec<String>,
    quiet: bool,
    log_level: Level,
    output_dir: Option<PathBuf>,
    root_domain: RootDomain,
    start_ip: Ipv4Addr,
    extract_timeout: Duration,
    show_version: bool,
}

impl CliOptions {
    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let strings = |name: &str| -> Vec<String> {
            matches
                .get_many::<String>(name)
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default()
        };

        let log_level = matches
            .get_one::<String>("log-level")
            .map(|raw| raw.parse::<Level>().map_err(|e| anyhow!(e)))
            .transpose()?
            .unwrap_or(Level::Info);

        let root_domain = RootDomain::parse(
            matches
                .get_one::<String>("root-domain")
                .map(String::as_str)
                .unwrap_or(DEFAULT_ROOT_DOMAIN),
        )?;

        Ok(Self {
            report: matches.get_one::<String>("report").map(PathBuf::from),
            files: strings("file").into_iter().map(PathBuf::from).collect(),
            domains: strings("domain"),
            quiet: matches.get_flag("quiet"),
            log_level,
            output_dir: matches.get_one::<String>("output-dir").map(PathBuf::from),
            root_domain,
            start_ip: parse_start_ip(matches.get_one::<String>("start-ip"))?,
            extract_timeout: parse_timeout(matches.get_one::<String>("extract-timeout"))?,
            show_version: matches.get_flag("version"),
        })
    }

    fn into_scrub_options(self) -> Result<ScrubOptions> {
        let mut options = ScrubOptions::new(self.report, self.files)?;
        options.domains = self.domains;
        options.quiet = self.quiet;
        options.log_level = self.log_level;
        options.root_domain = self.root_domain;
        options.start_ip = self.start_ip;
        options.extract_timeout = self.extract_timeout;
        if let Some(dir) = self.output_dir {
            options.output_dir = dir;
        }
        Ok(options)
    }
}

fn parse_start_ip(value: Option<&String>) -> Result<Ipv4Addr> {
    match value {
        None => Ok(DEFAULT_START_IP),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid value for --start-ip: {v} is not a dotted quad")),
    }
}

fn parse_timeout(value: Option<&String>) -> Result<Duration> {
    let secs = match value {
        None => DEFAULT_EXTRACT_TIMEOUT_SECS,
        Some(v) => match v.trim().parse::<u64>() {
            Ok(0) | Err(_) => {
                return Err(anyhow!(
                    "invalid value for --extract-timeout: {v} (expected whole seconds > 0)"
                ));
            }
            Ok(n) => n,
        },
    };
    Ok(Duration::from_secs(secs))
}
