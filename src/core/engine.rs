use tracing::debug;

use super::error::ForecastError;
use super::rebalance::Rebalancer;
use super::types::{
    AnnualBalanceChange, AssetAllocation, ForecastLimits, ForecastRequest, ForecastResponse,
    Portfolio, PortfolioAllocation,
};

/// Slack allowed when checking that target weights add up to one.
pub const ALLOCATION_SUM_TOLERANCE: f64 = 1e-9;

pub fn forecast(request: &ForecastRequest) -> Result<ForecastResponse, ForecastError> {
    forecast_with_limits(request, ForecastLimits::default())
}

pub fn forecast_with_limits(
    request: &ForecastRequest,
    limits: ForecastLimits,
) -> Result<ForecastResponse, ForecastError> {
    validate(request, limits)?;

    let rebalancer = Rebalancer::from_kind(request.rebalancing_strategy, request.rebalance_cadence);
    let real_allocation = convert_to_real_rates(&request.allocation, request.annual_inflation_rate);
    debug!(
        end_year = request.end_year,
        ?rebalancer,
        balance_changes = request.balance_changes.len(),
        "running portfolio forecast"
    );

    let mut portfolios = Vec::with_capacity(request.end_year as usize + 1);
    portfolios.push(request.init_portfolio.clone());
    for year in 1..=request.end_year {
        let previous = &portfolios[portfolios.len() - 1];
        let next = forecast_next_year(
            previous,
            &request.balance_changes,
            &real_allocation,
            year,
            rebalancer,
        );
        portfolios.push(next);
    }

    debug!(snapshots = portfolios.len(), "portfolio forecast complete");
    Ok(ForecastResponse { portfolios })
}

pub fn validate(request: &ForecastRequest, limits: ForecastLimits) -> Result<(), ForecastError> {
    for (index, change) in request.balance_changes.iter().enumerate() {
        if change.end_year > request.end_year {
            debug!(
                index,
                end_year = change.end_year,
                horizon = request.end_year,
                "balance change beyond horizon"
            );
            return Err(ForecastError::BalanceChangeBeyondHorizon {
                index,
                end_year: change.end_year,
                horizon: request.end_year,
            });
        }
    }

    let sum: f64 = request
        .allocation
        .values()
        .map(|target| target.allocation)
        .sum();
    if (sum - 1.0).abs() > ALLOCATION_SUM_TOLERANCE {
        debug!(sum, "allocation does not sum to one");
        return Err(ForecastError::AllocationSum { sum });
    }

    if request.end_year > limits.max_horizon_years {
        return Err(ForecastError::HorizonTooLong {
            end_year: request.end_year,
            max: limits.max_horizon_years,
        });
    }

    if matches!(
        Rebalancer::from_kind(request.rebalancing_strategy, request.rebalance_cadence),
        Rebalancer::EveryNYears { cadence: 0 }
    ) {
        return Err(ForecastError::InvalidCadence);
    }

    Ok(())
}

/// Real rate is the nominal rate less inflation, by plain subtraction.
pub fn convert_to_real_rates(
    allocation: &PortfolioAllocation,
    inflation_rate: f64,
) -> PortfolioAllocation {
    allocation
        .iter()
        .map(|(&asset, target)| {
            (
                asset,
                AssetAllocation {
                    return_rate: target.return_rate - inflation_rate,
                    allocation: target.allocation,
                },
            )
        })
        .collect()
}

/// One simulated year: grow, apply cash flows, rebalance.
pub fn forecast_next_year(
    previous: &Portfolio,
    balance_changes: &[AnnualBalanceChange],
    real_allocation: &PortfolioAllocation,
    year: u32,
    rebalancer: Rebalancer,
) -> Portfolio {
    let mut next = apply_growth(previous, real_allocation);
    apply_balance_changes(&mut next, balance_changes, real_allocation, year);
    rebalancer.rebalance(&next, real_allocation, year)
}

fn apply_growth(previous: &Portfolio, real_allocation: &PortfolioAllocation) -> Portfolio {
    previous
        .iter()
        .map(|(&asset, &value)| {
            // Unallocated assets have no configured return and stay flat.
            let rate = real_allocation
                .get(&asset)
                .map_or(0.0, |target| target.return_rate);
            (asset, value * (1.0 + rate))
        })
        .collect()
}

fn apply_balance_changes(
    portfolio: &mut Portfolio,
    balance_changes: &[AnnualBalanceChange],
    real_allocation: &PortfolioAllocation,
    year: u32,
) {
    for change in balance_changes {
        let Some(amount) = change.effective_amount(year) else {
            continue;
        };
        for (&asset, target) in real_allocation {
            *portfolio.entry(asset).or_insert(0.0) += amount * target.allocation;
        }
    }
}
