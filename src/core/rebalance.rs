use super::types::{AssetType, Portfolio, PortfolioAllocation, RebalancingStrategyKind};

/// Policy applied to each year's snapshot after growth and cash flows.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Rebalancer {
    /// Every year, move any negative balance onto the positive assets.
    ToZero,
    /// Every `cadence` years reset to target weights; in between behave like
    /// `ToZero` only when some asset is negative.
    EveryNYears { cadence: u32 },
}

impl Rebalancer {
    pub fn from_kind(kind: RebalancingStrategyKind, cadence: u32) -> Self {
        match kind {
            RebalancingStrategyKind::YearlyToZero => Rebalancer::ToZero,
            RebalancingStrategyKind::EveryNYearsByAlloc => Rebalancer::EveryNYears { cadence },
        }
    }

    pub fn rebalance(
        self,
        portfolio: &Portfolio,
        allocation: &PortfolioAllocation,
        year: u32,
    ) -> Portfolio {
        match self {
            Rebalancer::ToZero => rebalance_to_zero(portfolio),
            Rebalancer::EveryNYears { cadence } => {
                rebalance_every_n_years(portfolio, allocation, year, cadence)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetValue {
    pub total: f64,
    pub positive: Vec<AssetType>,
    pub negative: Vec<AssetType>,
}

/// Sums the portfolio and splits assets by sign. Zero balances land in
/// neither list.
pub fn net_portfolio_value(portfolio: &Portfolio) -> NetValue {
    let mut net = NetValue {
        total: 0.0,
        positive: Vec::new(),
        negative: Vec::new(),
    };
    for (&asset, &value) in portfolio {
        net.total += value;
        if value > 0.0 {
            net.positive.push(asset);
        } else if value < 0.0 {
            net.negative.push(asset);
        }
    }
    net
}

pub fn rebalance_to_zero(portfolio: &Portfolio) -> Portfolio {
    let net = net_portfolio_value(portfolio);
    zero_out_negatives(portfolio, &net)
}

fn zero_out_negatives(portfolio: &Portfolio, net: &NetValue) -> Portfolio {
    // Aggregate debt cannot be rebalanced away.
    if net.total < 0.0 {
        return portfolio.clone();
    }

    let mut rebalanced = portfolio.clone();
    if net.positive.is_empty() {
        return rebalanced;
    }

    let share_count = net.positive.len() as f64;
    for asset in &net.negative {
        let deficit_share = portfolio[asset] / share_count;
        rebalanced.insert(*asset, 0.0);
        for positive in &net.positive {
            if let Some(balance) = rebalanced.get_mut(positive) {
                *balance += deficit_share;
            }
        }
    }
    rebalanced
}

pub fn rebalance_every_n_years(
    portfolio: &Portfolio,
    allocation: &PortfolioAllocation,
    year: u32,
    cadence: u32,
) -> Portfolio {
    let net = net_portfolio_value(portfolio);
    if net.total < 0.0 {
        return portfolio.clone();
    }

    if year.checked_rem(cadence) == Some(0) {
        return allocation
            .iter()
            .map(|(&asset, target)| (asset, net.total * target.allocation))
            .collect();
    }

    if net.negative.is_empty() {
        portfolio.clone()
    } else {
        zero_out_negatives(portfolio, &net)
    }
}
