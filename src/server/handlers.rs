use super::AppState;
use super::error::AppError;
use super::query::{RateQuery, RatesParams};
use crate::core::quota::QuotaStatus;
use crate::core::rates::ExchangeRates;
use axum::Json;
use axum::extract::{Query, State};

/// GET /exchange-rates?api=<provider>&base=<currency>
pub async fn exchange_rates(
    State(state): State<AppState>,
    Query(params): Query<RatesParams>,
) -> Result<Json<ExchangeRates>, AppError> {
    let query = RateQuery::parse(params, state.service.registry()).map_err(AppError::Validation)?;
    let rates = state
        .service
        .exchange_rates(&query.provider, &query.base)
        .await?;
    Ok(Json(rates))
}

/// GET /quota
pub async fn quota(State(state): State<AppState>) -> Json<Vec<QuotaStatus>> {
    Json(state.service.tracker().report().await)
}
