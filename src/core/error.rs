use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("annual balance change end year must be less than or equal to last year")]
    BalanceChangeBeyondHorizon {
        index: usize,
        end_year: u32,
        horizon: u32,
    },

    #[error("portfolio allocation percent must sum up to 1")]
    AllocationSum { sum: f64 },

    #[error("end year {end_year} exceeds the maximum forecast horizon of {max} years")]
    HorizonTooLong { end_year: u32, max: u32 },

    #[error("rebalance cadence must be at least 1 when rebalancing every N years")]
    InvalidCadence,
}

impl ForecastError {
    pub fn category(&self) -> &'static str {
        "ValidationError"
    }
}
