use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::macros::time;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;
use crate::weather::provider::ProviderReading;

/// One timestamped weather reading for a city. Append-only: rows are never
/// updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Observation {
    pub id: Uuid,
    pub city: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
}

/// The numeric observation fields clients may aggregate or project. Only
/// values of this enum ever reach SQL text, so interpolating the column name
/// is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricField {
    Temperature,
    Humidity,
    WindSpeed,
}

impl MetricField {
    pub fn parse(s: &str) -> Result<Self, ApiError> {
        match s {
            "temperature" => Ok(Self::Temperature),
            "humidity" => Ok(Self::Humidity),
            "wind_speed" => Ok(Self::WindSpeed),
            _ => Err(ApiError::Validation(
                "field must be one of temperature, humidity, wind_speed".into(),
            )),
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::WindSpeed => "wind_speed",
        }
    }
}

/// Optional exact-match city and inclusive timestamp range.
#[derive(Debug, Default, Clone)]
pub struct ObservationFilter {
    pub city: Option<String>,
    pub range: Option<(OffsetDateTime, OffsetDateTime)>,
}

/// Inclusive day window: start at midnight, end normalized to 23:59:59.999 so
/// an end date covers its whole day.
pub fn day_range(start: Date, end: Date) -> (OffsetDateTime, OffsetDateTime) {
    (
        start.midnight().assume_utc(),
        end.with_time(time!(23:59:59.999)).assume_utc(),
    )
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct HistoryRow {
    pub timestamp: OffsetDateTime,
    pub value: f64,
}

/// Aggregate statistics over one metric field. Standard deviation is the
/// population form (divisor N), matching the store's STDDEV_POP.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    #[serde(rename = "stdDevPopulation")]
    pub std_dev_population: f64,
}

#[derive(Debug, FromRow)]
struct StatsRow {
    avg: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    std_dev_population: Option<f64>,
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a ObservationFilter) {
    let mut prefix = " WHERE ";
    if let Some(city) = filter.city.as_deref() {
        qb.push(prefix).push("city = ").push_bind(city);
        prefix = " AND ";
    }
    if let Some((start, end)) = filter.range {
        qb.push(prefix)
            .push("timestamp >= ")
            .push_bind(start)
            .push(" AND timestamp <= ")
            .push_bind(end);
    }
}

impl Observation {
    /// Append one observation; the row timestamp is the insertion time.
    pub async fn save(
        db: &PgPool,
        city: &str,
        reading: &ProviderReading,
    ) -> Result<Observation, ApiError> {
        let row = sqlx::query_as::<_, Observation>(
            r#"
            INSERT INTO observations (city, temperature, humidity, wind_speed)
            VALUES ($1, $2, $3, $4)
            RETURNING id, city, timestamp, temperature, humidity, wind_speed
            "#,
        )
        .bind(city)
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.wind_speed)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    /// Matching observations projected to (timestamp, field), newest first.
    pub async fn history(
        db: &PgPool,
        filter: &ObservationFilter,
        field: MetricField,
    ) -> Result<Vec<HistoryRow>, ApiError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT timestamp, ");
        qb.push(field.column()).push(" AS value FROM observations");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY timestamp DESC");

        let rows = qb.build_query_as::<HistoryRow>().fetch_all(db).await?;
        Ok(rows)
    }

    /// Aggregate one field over matching observations, delegated to the
    /// database. `None` when nothing matches (AVG of zero rows is NULL).
    pub async fn aggregate(
        db: &PgPool,
        filter: &ObservationFilter,
        field: MetricField,
    ) -> Result<Option<FieldStats>, ApiError> {
        let col = field.column();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT AVG(");
        qb.push(col)
            .push(") AS avg, MIN(")
            .push(col)
            .push(") AS min, MAX(")
            .push(col)
            .push(") AS max, STDDEV_POP(")
            .push(col)
            .push(") AS std_dev_population FROM observations");
        push_filter(&mut qb, filter);

        let row = qb.build_query_as::<StatsRow>().fetch_one(db).await?;
        match (row.avg, row.min, row.max, row.std_dev_population) {
            (Some(avg), Some(min), Some(max), Some(std_dev_population)) => Ok(Some(FieldStats {
                avg,
                min,
                max,
                std_dev_population,
            })),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn metric_field_parses_known_fields() {
        assert_eq!(
            MetricField::parse("temperature").unwrap(),
            MetricField::Temperature
        );
        assert_eq!(MetricField::parse("humidity").unwrap(), MetricField::Humidity);
        assert_eq!(
            MetricField::parse("wind_speed").unwrap(),
            MetricField::WindSpeed
        );
    }

    #[test]
    fn metric_field_rejects_unknown_fields() {
        for bad in ["", "city", "timestamp", "TEMPERATURE", "temp; DROP TABLE"] {
            assert!(matches!(
                MetricField::parse(bad),
                Err(ApiError::Validation(_))
            ));
        }
    }

    #[test]
    fn day_range_covers_whole_end_day() {
        use time::macros::datetime;

        let (start, end) = day_range(date!(2024 - 01 - 01), date!(2024 - 01 - 01));
        assert_eq!(start, datetime!(2024-01-01 00:00:00 UTC));

        let last_second = datetime!(2024-01-01 23:59:59 UTC);
        let next_midnight = datetime!(2024-01-02 00:00:00 UTC);
        assert!(last_second >= start && last_second <= end);
        assert!(next_midnight > end);
    }

    #[test]
    fn field_stats_serializes_camel_case_stddev() {
        let stats = FieldStats {
            avg: 5.0,
            min: 2.0,
            max: 9.0,
            std_dev_population: 2.0,
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["stdDevPopulation"], 2.0);
        assert_eq!(json["avg"], 5.0);
    }
}
