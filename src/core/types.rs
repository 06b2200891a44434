use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetType {
    #[serde(alias = "0", alias = "Equities", alias = "EQUITIES")]
    Equities,
    #[serde(alias = "1", alias = "Bonds", alias = "BONDS")]
    Bonds,
    #[serde(alias = "2", alias = "Cash", alias = "CASH")]
    Cash,
}

/// Per-asset balances. Negative balances model margin or debt.
pub type Portfolio = BTreeMap<AssetType, f64>;

#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAllocation {
    /// Annual rate of return. Nominal on the way in, real once the engine has
    /// subtracted inflation.
    pub return_rate: f64,
    /// Target fraction of total portfolio value, in `[0, 1]`.
    pub allocation: f64,
}

pub type PortfolioAllocation = BTreeMap<AssetType, AssetAllocation>;

/// Recurring contribution (positive) or withdrawal (negative) active for
/// every year in `start_year..=end_year`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AnnualBalanceChange {
    pub amount: f64,
    pub start_year: u32,
    pub end_year: u32,
    pub annual_pct_change: f64,
}

impl AnnualBalanceChange {
    pub fn is_active(&self, year: u32) -> bool {
        year >= self.start_year && year <= self.end_year
    }

    /// Cash flow for `year`, or `None` outside the active window.
    ///
    /// The first year pays `amount` as-is. Every later year compounds the
    /// percentage change one period less than the years elapsed, so the
    /// second active year still pays the base amount.
    pub fn effective_amount(&self, year: u32) -> Option<f64> {
        if !self.is_active(year) {
            return None;
        }
        if year == self.start_year {
            return Some(self.amount);
        }
        let periods = i32::try_from(year - self.start_year - 1).unwrap_or(i32::MAX);
        Some(self.amount * (1.0 + self.annual_pct_change).powi(periods))
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RebalancingStrategyKind {
    #[default]
    YearlyToZero,
    EveryNYearsByAlloc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub init_portfolio: Portfolio,
    pub balance_changes: Vec<AnnualBalanceChange>,
    pub allocation: PortfolioAllocation,
    pub annual_inflation_rate: f64,
    pub end_year: u32,
    pub rebalance_cadence: u32,
    pub rebalancing_strategy: RebalancingStrategyKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResponse {
    /// One snapshot per year; index 0 is the untouched initial portfolio.
    pub portfolios: Vec<Portfolio>,
}

impl ForecastResponse {
    pub fn final_portfolio(&self) -> Option<&Portfolio> {
        self.portfolios.last()
    }

    pub fn total_values(&self) -> Vec<f64> {
        self.portfolios
            .iter()
            .map(|portfolio| portfolio.values().sum())
            .collect()
    }
}

/// Resource bounds the engine enforces before stepping.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ForecastLimits {
    pub max_horizon_years: u32,
}

impl Default for ForecastLimits {
    fn default() -> Self {
        Self {
            max_horizon_years: 1000,
        }
    }
}
