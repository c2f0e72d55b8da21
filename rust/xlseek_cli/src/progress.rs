use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use xlquery::{
    BuildPhase,
    BuildStatus,
    StatusSink,
};

const TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}";

pub fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Draws index build notifications as a terminal progress bar.
pub struct ProgressStatus {
    bar: ProgressBar,
}

impl ProgressStatus {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(bar_style());
        Self { bar }
    }
}

impl StatusSink for ProgressStatus {
    fn publish(&self, status: &BuildStatus) {
        match status.phase {
            BuildPhase::Fragmenting => {
                self.bar.set_length(status.total as u64);
                self.bar.set_position(status.done as u64);
            }
            BuildPhase::Shrinking => self.bar.set_message("shrinking"),
            BuildPhase::Finished => self.bar.finish_with_message("done"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_follows_status() {
        let sink = ProgressStatus::new();
        sink.bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        sink.publish(&BuildStatus {
            phase: BuildPhase::Fragmenting,
            done: 3,
            total: 10,
        });
        assert_eq!(sink.bar.length(), Some(10));
        assert_eq!(sink.bar.position(), 3);
        sink.publish(&BuildStatus {
            phase: BuildPhase::Finished,
            done: 10,
            total: 10,
        });
        assert!(sink.bar.is_finished());
    }
}
