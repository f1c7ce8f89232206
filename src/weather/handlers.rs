use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use time::macros::format_description;
use time::Date;
use tracing::{info, instrument};

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    state::AppState,
    weather::dto::{HistoryQuery, IngestResponse, MetricsQuery, WeatherQuery},
    weather::repo::{day_range, MetricField, Observation, ObservationFilter},
};

pub fn weather_routes() -> Router<AppState> {
    Router::new()
        .route("/weather", get(fetch_weather))
        .route("/weather/metrics", get(metrics))
        .route("/weather/history", get(history))
}

fn city_filter(city: Option<String>) -> Option<String> {
    city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
}

fn require_field(field: Option<&str>) -> Result<MetricField, ApiError> {
    let field = field
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| {
            ApiError::Validation(
                "field parameter is required (temperature, humidity, wind_speed)".into(),
            )
        })?;
    MetricField::parse(field)
}

/// Fetch current weather for a city from the provider and persist it. Every
/// call appends a new observation; there is no dedup.
#[instrument(skip(state, claims))]
pub async fn fetch_weather(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(q): Query<WeatherQuery>,
) -> Result<Json<IngestResponse>, ApiError> {
    let city = city_filter(q.city)
        .ok_or_else(|| ApiError::Validation("city is required".into()))?;

    let reading = state.weather.current(&city).await?;
    let observation = Observation::save(&state.db, &city, &reading).await?;

    info!(%city, user_id = %claims.sub, "observation stored");
    Ok(Json(IngestResponse {
        message: "Weather data saved".into(),
        data: observation,
    }))
}

#[instrument(skip(state, _claims))]
pub async fn metrics(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    Query(q): Query<MetricsQuery>,
) -> Result<Response, ApiError> {
    let field = require_field(q.field.as_deref())?;
    let filter = ObservationFilter {
        city: city_filter(q.city),
        range: None,
    };

    match Observation::aggregate(&state.db, &filter, field).await? {
        Some(stats) => Ok(Json(stats).into_response()),
        None => Ok(Json(json!({ "error": "No data found" })).into_response()),
    }
}

#[instrument(skip(state, _claims))]
pub async fn history(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let field = require_field(q.field.as_deref())?;

    let mut filter = ObservationFilter {
        city: city_filter(q.city),
        range: None,
    };
    // The range only applies when both bounds are present.
    if let (Some(start), Some(end)) = (q.start_date.as_deref(), q.end_date.as_deref()) {
        filter.range = Some(day_range(
            parse_date(start, "start_date")?,
            parse_date(end, "end_date")?,
        ));
    }

    let rows = Observation::history(&state.db, &filter, field).await?;
    let body = rows
        .into_iter()
        .map(|r| json!({ "timestamp": Stamp(r.timestamp), (field.column()): r.value }))
        .collect();
    Ok(Json(body))
}

fn parse_date(s: &str, name: &str) -> Result<Date, ApiError> {
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ApiError::Validation(format!("{name} must be a YYYY-MM-DD date")))
}

/// RFC 3339 serialization for timestamps embedded in dynamic JSON.
#[derive(serde::Serialize)]
struct Stamp(#[serde(with = "time::serde::rfc3339")] time::OffsetDateTime);
