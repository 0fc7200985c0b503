#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing shared by the line risk binaries.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge`, so log lines are printed above live progress
//! bars instead of tearing them. [`StageProgress`] renders the scoring
//! engine's per-stage batch progress.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use line_risk_scoring::progress::ProgressCallback;
use log::LevelFilter;

pub use indicatif::MultiProgress;

/// A single progress line reused by every batched stage of a run.
///
/// Each stage announces itself through `set_message` and resets the bar
/// through `set_total`, so one bar walks through buffer, canopy and
/// proximity in turn.
pub struct StageProgress {
    bar: ProgressBar,
    bar_style: ProgressStyle,
}

impl StageProgress {
    /// Adds a spinner to `multi` that becomes a bar once a stage reports
    /// its item count.
    #[must_use]
    pub fn stage_bar(multi: &MultiProgress) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Preparing");

        let bar_style = ProgressStyle::with_template(
            "  {msg:<28} {wide_bar:.green/dim} {pos}/{len} segments [{elapsed_precise}<{eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for StageProgress {
    fn set_total(&self, total: u64) {
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        // Leave the bar running for the next stage; only the message
        // records what finished.
        log::debug!("{msg}");
        self.bar.set_message(msg);
    }
}

impl Drop for StageProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Installs the global logger and returns the [`MultiProgress`] every
/// progress bar must be attached to.
///
/// Defaults to `info` for all targets; `RUST_LOG` overrides it.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // A logger may already be installed when running under a test harness.
    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}
