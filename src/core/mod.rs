mod engine;
mod error;
mod rebalance;
mod types;

pub use engine::{
    ALLOCATION_SUM_TOLERANCE, convert_to_real_rates, forecast, forecast_next_year,
    forecast_with_limits, validate,
};
pub use error::ForecastError;
pub use rebalance::{
    NetValue, Rebalancer, net_portfolio_value, rebalance_every_n_years, rebalance_to_zero,
};
pub use types::{
    AnnualBalanceChange, AssetAllocation, AssetType, ForecastLimits, ForecastRequest,
    ForecastResponse, Portfolio, PortfolioAllocation, RebalancingStrategyKind,
};
