use serde::{Deserialize, Serialize};

use crate::weather::repo::Observation;

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub city: Option<String>,
    pub field: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub city: Option<String>,
    pub field: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Response for a successful fetch-and-store.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: String,
    pub data: Observation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use uuid::Uuid;

    #[test]
    fn ingest_response_shape() {
        let res = IngestResponse {
            message: "Weather data saved".into(),
            data: Observation {
                id: Uuid::new_v4(),
                city: "Paris".into(),
                timestamp: datetime!(2024-01-01 12:00:00 UTC),
                temperature: 15.0,
                humidity: 60.0,
                wind_speed: 0.0,
            },
        };
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["message"], "Weather data saved");
        assert_eq!(json["data"]["city"], "Paris");
        assert_eq!(json["data"]["wind_speed"], 0.0);
        assert_eq!(json["data"]["timestamp"], "2024-01-01T12:00:00Z");
    }
}
