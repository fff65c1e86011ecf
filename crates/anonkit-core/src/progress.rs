//! # Progress Reporting
//!
//! A per-table progress bar whose redraw step scales with the row count, so
//! a 50-row table and a 5-million-row table both redraw a bounded number of
//! times instead of once per row.

use indicatif::{ProgressBar, ProgressStyle};

/// Rows between redraws for a table of `total` rows.
///
/// | rows                | step               |
/// |---------------------|--------------------|
/// | < 100               | ceil(rows × 10%)   |
/// | 100 – 999           | ceil(rows × 1%)    |
/// | 1,000 – 9,999       | ceil(rows × 0.1%)  |
/// | 10,000 – 99,999     | ceil(rows × 0.01%) |
/// | ≥ 100,000           | ceil(rows × 0.001%)|
///
/// Never less than one.
pub fn redraw_frequency(total: u64) -> u64 {
    let divisor = match total {
        0..=99 => 10,
        100..=999 => 100,
        1_000..=9_999 => 1_000,
        10_000..=99_999 => 10_000,
        _ => 100_000,
    };
    total.div_ceil(divisor).max(1)
}

/// Progress for one table pass.
pub struct ProgressReporter {
    bar: ProgressBar,
    total: u64,
    step: u64,
    done: u64,
    redraws: u64,
}

impl ProgressReporter {
    /// A reporter for `total` rows. When `visible` is false nothing is drawn
    /// but counting still happens.
    pub fn new(total: u64, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.cyan} {bar:40.cyan/dim} {pos}/{len} ({eta})")
                .map(|s| s.progress_chars("█▓░"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            total,
            step: redraw_frequency(total),
            done: 0,
            redraws: 0,
        }
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn done(&self) -> u64 {
        self.done
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of times the bar position has been pushed to the terminal.
    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    /// Record one completed row.
    pub fn advance(&mut self) {
        self.done += 1;
        if self.done.is_multiple_of(self.step) || self.done == self.total {
            self.bar.set_position(self.done);
            self.redraws += 1;
        }
    }

    pub fn finish(&self) {
        self.bar.set_position(self.done);
        self.bar.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redraw_frequency_table() {
        assert_eq!(redraw_frequency(0), 1);
        assert_eq!(redraw_frequency(7), 1);
        assert_eq!(redraw_frequency(50), 5);
        assert_eq!(redraw_frequency(99), 10);
        assert_eq!(redraw_frequency(100), 1);
        assert_eq!(redraw_frequency(500), 5);
        assert_eq!(redraw_frequency(5_000), 5);
        assert_eq!(redraw_frequency(50_000), 5);
        assert_eq!(redraw_frequency(500_000), 5);
        assert_eq!(redraw_frequency(5_000_000), 50);
        assert_eq!(redraw_frequency(1_000_001), 11);
    }

    #[test]
    fn test_redraw_frequency_monotonic_across_bands() {
        let counts = [50, 500, 5_000, 50_000, 500_000];
        let steps: Vec<u64> = counts.iter().map(|&n| redraw_frequency(n)).collect();
        for pair in steps.windows(2) {
            assert!(pair[0] <= pair[1], "steps = {:?}", steps);
        }
    }

    #[test]
    fn test_reporter_redraws_on_step_and_at_end() {
        let mut reporter = ProgressReporter::new(95, false);
        assert_eq!(reporter.total(), 95);
        assert_eq!(reporter.step(), 10);
        for _ in 0..95 {
            reporter.advance();
        }
        reporter.finish();
        assert_eq!(reporter.done(), 95);
        // 9 full steps plus the final row.
        assert_eq!(reporter.redraws(), 10);
    }

    #[test]
    fn test_reporter_empty_table() {
        let reporter = ProgressReporter::new(0, false);
        reporter.finish();
        assert_eq!(reporter.done(), 0);
        assert_eq!(reporter.redraws(), 0);
    }
}
