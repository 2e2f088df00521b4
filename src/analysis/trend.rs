//! Week-over-week trend computation.

use super::window::DateWindow;
use crate::models::{DayCounts, Trend};
use chrono::NaiveDate;

/// Change (in percent) beyond which a topic counts as moving.
const STABLE_BAND: f64 = 10.0;

/// Trend direction and magnitude of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendReading {
    pub trend: Trend,
    pub percentage: u32,
}

/// Sum of the counts on `days`; missing days count as zero.
pub fn window_sum(frequencies: &DayCounts, days: &[NaiveDate]) -> u64 {
    days.iter()
        .map(|d| u64::from(frequencies.get(d).copied().unwrap_or(0)))
        .sum()
}

/// Compare the last seven days of the window against the seven before.
pub fn compute_trend(frequencies: &DayCounts, window: &DateWindow) -> TrendReading {
    let last = window_sum(frequencies, window.last_week());
    let prev = window_sum(frequencies, window.previous_week());
    trend_from_sums(prev, last)
}

/// The trend rule on raw week sums.
pub fn trend_from_sums(prev: u64, last: u64) -> TrendReading {
    if prev == 0 {
        return if last == 0 {
            TrendReading {
                trend: Trend::Stable,
                percentage: 0,
            }
        } else {
            TrendReading {
                trend: Trend::Up,
                percentage: 100,
            }
        };
    }

    let change = (last as f64 - prev as f64) / prev as f64 * 100.0;
    let trend = if change > STABLE_BAND {
        Trend::Up
    } else if change < -STABLE_BAND {
        Trend::Down
    } else {
        Trend::Stable
    };

    TrendReading {
        trend,
        percentage: change.abs().round() as u32,
    }
}
