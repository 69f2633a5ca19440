//! Fixture runner
//!
//! Drives each fixture through its phases against a [`Chain`]:
//! reset storage, deploy the test's programs, send the fixture's
//! messages, then check every expectation step by step. Tests and
//! fixtures run strictly in input order.

pub mod check;
pub mod deploy;
pub mod poll;
pub mod reset;
pub mod send;

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::chain::{AccountId, Chain};
use crate::common::config::Config;
use crate::common::Result;
use crate::fixture::{load_test, Fixture, Test};

pub use check::{CheckError, CheckSettings};
pub use poll::{PollPolicy, Poller};

/// Run-wide switches
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Stop at the first failing fixture
    pub fail_fast: bool,
    /// Print each phase
    pub verbose: bool,
}

impl RunOptions {
    pub fn from_config(config: &Config, keep_going: bool, verbose: bool) -> Self {
        Self {
            fail_fast: config.runner.fail_fast && !keep_going,
            verbose,
        }
    }
}

/// Outcome of one fixture
#[derive(Debug, Clone)]
pub struct FixtureReport {
    pub title: String,
    pub errors: Vec<CheckError>,
}

impl FixtureReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Totals over a whole run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub files: usize,
    pub parse_failures: usize,
    pub fixtures_passed: usize,
    pub fixtures_failed: usize,
    /// A failure stopped the run before every fixture was attempted
    pub stopped_early: bool,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.parse_failures == 0 && self.fixtures_failed == 0
    }
}

/// Runs fixture files against one chain
pub struct Runner<C> {
    chain: C,
    config: Config,
    options: RunOptions,
    sudo: Option<AccountId>,
}

impl<C: Chain> Runner<C> {
    pub fn new(chain: C, config: Config, options: RunOptions) -> Self {
        Self {
            chain,
            config,
            options,
            sudo: None,
        }
    }

    pub fn into_chain(self) -> C {
        self.chain
    }

    /// The privileged account, resolved from chain state on first use
    async fn sudo(&mut self) -> Result<AccountId> {
        if let Some(sudo) = self.sudo {
            return Ok(sudo);
        }
        let sudo = self.chain.sudo_account().await?;
        tracing::info!(%sudo, "Resolved sudo account");
        self.sudo = Some(sudo);
        Ok(sudo)
    }

    fn check_settings(&self) -> CheckSettings {
        CheckSettings {
            poll: PollPolicy::from(&self.config.polling),
            max_queue_len: self.config.queue.max_len,
        }
    }

    fn phase(&self, name: &str) {
        if self.options.verbose {
            println!("    {}", name.dimmed());
        }
    }

    /// Run one fixture through all its phases
    ///
    /// Expectation findings are returned in the report; chain failures
    /// are returned as `Err`.
    pub async fn run_fixture(&mut self, test: &Test, fixture: &Fixture) -> Result<FixtureReport> {
        let sudo = self.sudo().await?;
        let settings = self.check_settings();
        tracing::info!(fixture = %fixture.title, "Running fixture");

        self.phase("reset storage");
        reset::reset_storage(&mut self.chain, &sudo, settings.poll).await?;

        self.phase("deploy programs");
        let deployment = deploy::deploy_programs(&mut self.chain, &sudo, test, &self.config.gas).await?;

        self.phase("send messages");
        send::send_messages(
            &mut self.chain,
            &sudo,
            fixture,
            &deployment.programs,
            &self.config.gas,
        )
        .await?;

        self.phase("check expectations");
        let errors =
            check::check_expectations(&mut self.chain, &sudo, fixture, &deployment.programs, settings).await?;

        Ok(FixtureReport {
            title: fixture.title.clone(),
            errors,
        })
    }

    /// Run every fixture of `test`, printing each result
    ///
    /// Returns `false` when fail-fast stopped the test at a failure.
    pub async fn run_test(&mut self, test: &Test, summary: &mut RunSummary) -> Result<bool> {
        println!(
            "\n{} {}",
            "Running Test:".blue().bold(),
            test.source.display().to_string().white().bold()
        );

        for fixture in &test.fixtures {
            let report = self.run_fixture(test, fixture).await?;
            if report.passed() {
                println!("  {} Fixture ok: {}", "✓".green(), report.title);
                summary.fixtures_passed += 1;
                continue;
            }

            println!("  {} {}", "✗".red(), report.title.red().bold());
            for error in &report.errors {
                println!("      {}", error);
            }
            summary.fixtures_failed += 1;

            if self.options.fail_fast {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Load and run every file in order
    ///
    /// A file that fails to load is reported and skipped.
    pub async fn run_files(&mut self, paths: &[PathBuf]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for path in paths {
            summary.files += 1;
            let test = match load_test(path) {
                Ok(test) => test,
                Err(e) if e.is_parse_error() => {
                    report_parse_failure(path, &e);
                    summary.parse_failures += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !self.run_test(&test, &mut summary).await? {
                summary.stopped_early = true;
                break;
            }
        }

        print_summary(&summary);
        Ok(summary)
    }
}

fn report_parse_failure(path: &Path, error: &crate::Error) {
    tracing::error!(path = %path.display(), %error, "Skipping unparsable fixture file");
    println!("\n{} {}: {}", "✗".red(), path.display(), error);
}

fn print_summary(summary: &RunSummary) {
    let line = format!(
        "{} passed, {} failed, {} unparsable",
        summary.fixtures_passed, summary.fixtures_failed, summary.parse_failures
    );
    if summary.success() {
        println!("\n{} {}\n", "✓".green().bold(), line.green().bold());
    } else {
        println!("\n{} {}\n", "✗".red().bold(), line.red().bold());
    }
}
