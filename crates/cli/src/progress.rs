//! Terminal progress bar for the engine's long-running stages.

use indicatif::{ProgressBar, ProgressStyle};
use shipledger_recon::Progress;

pub struct BarProgress {
    enabled: bool,
    bar: Option<ProgressBar>,
}

impl BarProgress {
    /// A disabled bar draws nothing; used for `--quiet` and `--json` runs.
    pub fn new(enabled: bool) -> Self {
        Self { enabled, bar: None }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("  {spinner:.cyan} [{elapsed_precise}] {bar:30.green/blue} {pos}/{len} {msg}")
            .map(|style| style.progress_chars("█▉▊▋▌▍▎▏  "))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl Progress for BarProgress {
    fn begin(&mut self, stage: &str, total: u64) {
        self.finish();
        let bar = if self.enabled {
            ProgressBar::new(total)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(Self::style());
        bar.set_message(stage.to_string());
        self.bar = Some(bar);
    }

    fn advance(&mut self, n: u64) {
        if let Some(ref bar) = self.bar {
            bar.inc(n);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
