use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, MapAccess, Visitor},
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::core::{
    AnnualBalanceChange, AssetAllocation, AssetType, ForecastLimits, ForecastRequest,
    RebalancingStrategyKind, forecast_with_limits,
};

pub const FORECAST_ROUTE: &str = "/forecastPortfolio";

/// Asset-keyed map that rejects two spellings of the same asset, such as
/// `"equities"` and `"0"`.
#[derive(Debug)]
struct UniqueAssetMap<V>(BTreeMap<AssetType, V>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for UniqueAssetMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct UniqueAssetVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueAssetVisitor<V> {
            type Value = UniqueAssetMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map keyed by asset type")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut assets = BTreeMap::new();
                while let Some((asset, value)) = map.next_entry::<AssetType, V>()? {
                    if assets.insert(asset, value).is_some() {
                        return Err(de::Error::custom(format!(
                            "asset {asset:?} appears more than once"
                        )));
                    }
                }
                Ok(UniqueAssetMap(assets))
            }
        }

        deserializer.deserialize_map(UniqueAssetVisitor(PhantomData))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BalanceChangePayload {
    #[serde(alias = "Amount")]
    amount: f64,
    #[serde(alias = "StartYear")]
    start_year: u32,
    #[serde(alias = "EndYear")]
    end_year: u32,
    #[serde(alias = "AnnualPctChange")]
    annual_pct_change: f64,
}

impl From<BalanceChangePayload> for AnnualBalanceChange {
    fn from(value: BalanceChangePayload) -> Self {
        AnnualBalanceChange {
            amount: value.amount,
            start_year: value.start_year,
            end_year: value.end_year,
            annual_pct_change: value.annual_pct_change,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ForecastPayload {
    #[serde(alias = "InitPortfolio")]
    init_portfolio: Option<UniqueAssetMap<f64>>,
    #[serde(alias = "AnnualPortfolioBalanceChanges", alias = "balanceChanges")]
    annual_portfolio_balance_changes: Option<Vec<BalanceChangePayload>>,
    #[serde(alias = "PortfolioAllocation")]
    portfolio_allocation: Option<UniqueAssetMap<AssetAllocation>>,
    #[serde(alias = "AnnualInflationRate", alias = "inflation")]
    annual_inflation_rate: Option<f64>,
    #[serde(alias = "EndYear")]
    end_year: Option<u32>,
    #[serde(alias = "RebalanceCadence")]
    rebalance_cadence: Option<u32>,
    #[serde(alias = "RebalancingStrategy")]
    rebalancing_strategy: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

pub fn forecast_request_from_json(json: &[u8]) -> Result<ForecastRequest, String> {
    let payload = serde_json::from_slice::<ForecastPayload>(json)
        .map_err(|e| format!("Invalid forecast JSON payload: {e}"))?;
    forecast_request_from_payload(payload)
}

fn forecast_request_from_payload(payload: ForecastPayload) -> Result<ForecastRequest, String> {
    let Some(UniqueAssetMap(allocation)) = payload.portfolio_allocation else {
        return Err("portfolioAllocation is required".to_string());
    };
    let Some(end_year) = payload.end_year else {
        return Err("endYear is required".to_string());
    };

    Ok(ForecastRequest {
        init_portfolio: payload
            .init_portfolio
            .map(|UniqueAssetMap(portfolio)| portfolio)
            .unwrap_or_default(),
        balance_changes: payload
            .annual_portfolio_balance_changes
            .unwrap_or_default()
            .into_iter()
            .map(Into::into)
            .collect(),
        allocation,
        annual_inflation_rate: payload.annual_inflation_rate.unwrap_or(0.0),
        end_year,
        rebalance_cadence: payload.rebalance_cadence.unwrap_or(1),
        rebalancing_strategy: resolve_strategy(payload.rebalancing_strategy.as_ref()),
    })
}

/// Accepts the numeric codes `0`/`1` or a strategy name. Anything else falls
/// back to rebalancing to zero.
fn resolve_strategy(selector: Option<&Value>) -> RebalancingStrategyKind {
    let resolved = match selector {
        None | Some(Value::Null) => return RebalancingStrategyKind::default(),
        Some(Value::Number(code)) => match code.as_i64() {
            Some(0) => Some(RebalancingStrategyKind::YearlyToZero),
            Some(1) => Some(RebalancingStrategyKind::EveryNYearsByAlloc),
            _ => None,
        },
        Some(Value::String(name)) => {
            let normalized: String = name
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .collect();
            match normalized.as_str() {
                "0" | "yearlytozero" | "tozero" | "rebalancetozero" => {
                    Some(RebalancingStrategyKind::YearlyToZero)
                }
                "1" | "everynyearsbyalloc" | "everynyears" | "rebalanceeverynyears" => {
                    Some(RebalancingStrategyKind::EveryNYearsByAlloc)
                }
                _ => None,
            }
        }
        Some(_) => None,
    };

    resolved.unwrap_or_else(|| {
        warn!(?selector, "unrecognized rebalancing strategy, defaulting to rebalance-to-zero");
        RebalancingStrategyKind::default()
    })
}

pub fn app(limits: ForecastLimits) -> Router {
    Router::new()
        .route(
            FORECAST_ROUTE,
            get(forecast_handler).post(forecast_handler),
        )
        .fallback(not_found_handler)
        .with_state(limits)
}

pub async fn run_http_server(port: u16, limits: ForecastLimits) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, max_horizon_years = limits.max_horizon_years, "portfolio forecast API listening");

    axum::serve(listener, app(limits)).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "NotFound", "Not found")
}

async fn forecast_handler(State(limits): State<ForecastLimits>, body: Bytes) -> Response {
    let request = match forecast_request_from_json(&body) {
        Ok(request) => request,
        Err(msg) => {
            debug!(%msg, "rejected malformed forecast request");
            return error_response(StatusCode::BAD_REQUEST, "InvalidRequest", &msg);
        }
    };

    let outcome =
        tokio::task::spawn_blocking(move || forecast_with_limits(&request, limits)).await;
    match outcome {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(err)) => {
            debug!(%err, "rejected invalid forecast request");
            error_response(StatusCode::BAD_REQUEST, err.category(), &err.to_string())
        }
        Err(join_err) => {
            error!(%join_err, "forecast task failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalError",
                "forecast failed unexpectedly",
            )
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, category: &str, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: category.to_string(),
            message: msg.to_string(),
        },
    )
}
