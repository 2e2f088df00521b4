//! The fixed 31-day analysis window.

use chrono::{Days, NaiveDate};

use crate::error::PipelineError;

/// Number of days in a window, target day included.
pub const WINDOW_DAYS: usize = 31;

/// Ordered days `T-30..=T`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    days: Vec<NaiveDate>,
}

impl DateWindow {
    /// Plan the window ending at `target`.
    ///
    /// Fails only when the start of the window is not representable.
    pub fn ending_at(target: NaiveDate) -> Result<Self, PipelineError> {
        let start = target
            .checked_sub_days(Days::new((WINDOW_DAYS - 1) as u64))
            .ok_or_else(|| {
                PipelineError::InvalidInput(format!("date {} is out of range", target))
            })?;

        let days = start.iter_days().take(WINDOW_DAYS).collect();
        Ok(Self { days })
    }

    /// Parse a `YYYY-MM-DD` target and plan the window.
    pub fn parse(target: &str) -> Result<Self, PipelineError> {
        let date = NaiveDate::parse_from_str(target.trim(), "%Y-%m-%d").map_err(|e| {
            PipelineError::InvalidInput(format!("invalid target date '{}': {}", target, e))
        })?;
        Self::ending_at(date)
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn start(&self) -> NaiveDate {
        self.days[0]
    }

    pub fn target(&self) -> NaiveDate {
        self.days[WINDOW_DAYS - 1]
    }

    pub fn contains(&self, day: &NaiveDate) -> bool {
        *day >= self.start() && *day <= self.target()
    }

    /// Canonical `YYYY-MM-DD` keys, oldest first.
    #[allow(dead_code)] // Serialized reports carry the same keys through serde
    pub fn keys(&self) -> Vec<String> {
        self.days.iter().map(|d| day_key(*d)).collect()
    }

    /// The final seven days.
    pub fn last_week(&self) -> &[NaiveDate] {
        &self.days[WINDOW_DAYS - 7..]
    }

    /// The seven days immediately before [`Self::last_week`].
    pub fn previous_week(&self) -> &[NaiveDate] {
        &self.days[WINDOW_DAYS - 14..WINDOW_DAYS - 7]
    }
}

/// Render a day as its canonical key.
pub fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
