//! Search configuration.

use crate::delta::MINUTES_PER_DAY;

/// Which destination labels `execute` keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ResultRetention {
    /// Only the journey with the smallest bucket survives; every improvement replaces it.
    #[default]
    SingleBest,
    /// Every destination label found before termination is offered to a Pareto set over
    /// (arrival time, transfers). `astar_query` repeats the search for every transfer limit up to the
    /// query's, which yields the full arrival time and transfer count frontier.
    Pareto,
}

/// Configuration parameters of a search state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSettings {
    /// Longest journey considered, in days.
    pub max_travel_days: u16,

    /// Days `0..max_day_offset` after the base day can be represented.
    /// Events or runs beyond this window are skipped.
    pub max_day_offset: u16,

    /// Upper bound for the transfer limit of any query.
    pub max_transfers: u8,

    /// Minutes added to the cost per transfer.
    pub transfer_factor: f32,

    pub retention: ResultRetention,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_travel_days: 1,
            max_day_offset: 2,
            max_transfers: 7,
            transfer_factor: 0.0,
            retention: ResultRetention::SingleBest,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Transfer factor must be finite and non-negative, got {0}.")]
    InvalidTransferFactor(f32),
    #[error("Maximum travel time must be at least one day.")]
    ZeroTravelDays,
    #[error("Day window of {max_day_offset} days cannot hold journeys of {max_travel_days} days.")]
    WindowTooSmall { max_day_offset: u16, max_travel_days: u16 },
    #[error("Cost range {0} does not fit 16-bit bucket keys.")]
    BucketRangeTooLarge(u64),
}

impl SearchSettings {
    pub fn with_max_travel_days(mut self, max_travel_days: u16) -> Self {
        self.max_travel_days = max_travel_days;
        self
    }

    pub fn with_max_day_offset(mut self, max_day_offset: u16) -> Self {
        self.max_day_offset = max_day_offset;
        self
    }

    pub fn with_max_transfers(mut self, max_transfers: u8) -> Self {
        self.max_transfers = max_transfers;
        self
    }

    pub fn with_transfer_factor(mut self, transfer_factor: f32) -> Self {
        self.transfer_factor = transfer_factor;
        self
    }

    pub fn with_retention(mut self, retention: ResultRetention) -> Self {
        self.retention = retention;
        self
    }

    pub fn max_travel_minutes(&self) -> u32 {
        self.max_travel_days as u32 * MINUTES_PER_DAY as u32
    }

    /// Penalty of `transfers` transfers, rounded down to whole minutes.
    pub fn transfer_penalty(&self, transfers: u8) -> u32 {
        (self.transfer_factor * transfers as f32) as u32
    }

    /// Largest cost any label can have.
    pub fn max_bucket(&self) -> u64 {
        self.max_travel_minutes() as u64 + (self.transfer_factor * self.max_transfers as f32).ceil() as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.transfer_factor.is_finite() || self.transfer_factor < 0.0 {
            return Err(ConfigError::InvalidTransferFactor(self.transfer_factor));
        }
        if self.max_travel_days == 0 {
            return Err(ConfigError::ZeroTravelDays);
        }
        if self.max_day_offset <= self.max_travel_days {
            return Err(ConfigError::WindowTooSmall {
                max_day_offset: self.max_day_offset,
                max_travel_days: self.max_travel_days,
            });
        }
        let max_bucket = self.max_bucket();
        if max_bucket > u16::MAX as u64 {
            return Err(ConfigError::BucketRangeTooLarge(max_bucket));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = SearchSettings::default();
        assert_eq!(settings.validate(), Ok(()));
        assert_eq!(settings.max_bucket(), 1440);
    }

    #[test]
    fn bucket_range_includes_transfer_penalty() {
        let settings = SearchSettings::default().with_transfer_factor(2.5).with_max_transfers(3);
        assert_eq!(settings.max_bucket(), 1440 + 8);
        assert_eq!(settings.transfer_penalty(3), 7);
    }

    #[test]
    fn rejects_invalid_settings() {
        let settings = SearchSettings::default();
        assert_eq!(
            settings.with_transfer_factor(-1.0).validate(),
            Err(ConfigError::InvalidTransferFactor(-1.0))
        );
        assert_eq!(settings.with_max_travel_days(0).validate(), Err(ConfigError::ZeroTravelDays));
        assert!(matches!(
            settings.with_max_travel_days(2).validate(),
            Err(ConfigError::WindowTooSmall { max_day_offset: 2, max_travel_days: 2 })
        ));
        assert!(matches!(
            settings.with_max_travel_days(50).with_max_day_offset(60).validate(),
            Err(ConfigError::BucketRangeTooLarge(_))
        ));
    }
}
