//! Progress bar for batch runs.

use dossier_core::{RunProgress, RunProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

/// Progress bar fed by [`RunProgress`] events.
pub struct RunProgressBar {
    pb: ProgressBar,
}

impl RunProgressBar {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓▒░ "));
        }
        Self { pb }
    }

    /// Callback to hand to the run controller.
    pub fn callback(&self) -> RunProgressCallback {
        let pb = self.pb.clone();
        Arc::new(move |event| match event {
            RunProgress::Started { total } => pb.set_length(total as u64),
            RunProgress::CaseStarted { case_file, .. } => pb.set_message(case_file),
            RunProgress::CaseFinished { .. } => pb.inc(1),
        })
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
