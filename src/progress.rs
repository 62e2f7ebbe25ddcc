//! Progress reporting infrastructure

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::borrow::Cow;

/// CLI progress report of ongoing operations
///
/// To avoid corrupted terminal output, you should not write anything to stdout
/// or stderr yourself as long as a report is being displayed. Please use logs
/// for debug messages.
#[derive(Clone, Debug, Default)]
pub struct ProgressReport(MultiProgress);
//
impl ProgressReport {
    /// Prepare to report progress on the cli
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare to report on a new operation made of `steps` steps
    ///
    /// `already_done` steps are shown as complete from the start, e.g. when
    /// resuming an interrupted operation.
    pub fn add(
        &self,
        what: impl Into<Cow<'static, str>>,
        steps: usize,
        already_done: usize,
    ) -> ProgressTracker {
        let bar = ProgressBar::new(steps as u64)
            .with_prefix(what)
            .with_position(already_done as u64)
            .with_style(
                ProgressStyle::with_template("{prefix} {wide_bar} {pos}/{len} (~{eta} left) {msg}")
                    .expect("style above should be a valid indicatif style"),
            );
        if already_done < steps {
            self.0.add(bar.clone());
        }
        ProgressTracker {
            bar,
            report: self.0.clone(),
        }
    }
}

/// Mechanism to track progress
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    /// Progress bar for this specific process
    bar: ProgressBar,

    /// Underlying process report
    report: MultiProgress,
}
//
impl ProgressTracker {
    /// Describe the step that is currently being carried out
    pub fn set_message(&self, message: impl Into<Cow<'static, str>>) {
        self.bar.set_message(message);
    }

    /// Show that a step has been completed
    ///
    /// Returns truth that the progress bar has reached its maximum value
    pub fn make_progress(&self) -> bool {
        // Track progress
        self.bar.inc(1);
        let current = self.bar.position();
        let max = self.bar.length().unwrap_or(0);
        assert!(current <= max, "recorded more progress than expected");

        // Hide progress bar once done
        let finished = current == max;
        if finished {
            self.bar.finish_and_clear();
            self.report.remove(&self.bar);
        }
        finished
    }
}
