//! `GET /health`: readiness of the database plus a report of the telephony
//! gateway and room inventory. Only the database decides the status code.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use horizon_db::{ping, DbPool};
use horizon_telnyx::Telephony;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    telephony: Arc<dyn Telephony>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Probe {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: Probe,
    pub telephony: Probe,
    pub rooms: Option<i64>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, telephony: Arc<dyn Telephony>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, telephony })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match ping(&state.db_pool).await {
        Ok(()) => Probe { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            Probe { status: "degraded", detail: format!("database query failed: {error}") }
        }
    };
    let ready = database.status == "ready";
    let rooms = if ready { room_count(&state.db_pool).await } else { None };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        telephony: telephony_probe(state.telephony.as_ref()),
        rooms,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn telephony_probe(telephony: &dyn Telephony) -> Probe {
    match telephony.sending_number() {
        Some(number) => Probe { status: "ready", detail: format!("sending from {number}") },
        None => Probe {
            status: "disabled",
            detail: "no Telnyx number configured; calls and SMS are off".to_string(),
        },
    }
}

async fn room_count(pool: &DbPool) -> Option<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rooms").fetch_one(pool).await.ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use horizon_db::{connect_with_settings, migrations, HotelSeedDataset};
    use horizon_telnyx::NoopTelephony;

    use super::{health, HealthState};
    use crate::routes::test_support::FakeTelephony;

    #[tokio::test]
    async fn reports_inventory_and_telephony_when_database_is_reachable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("health.db").display());
        let pool = connect_with_settings(&url, 1, 5).await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");
        HotelSeedDataset::load(&pool).await.expect("seed");

        let state =
            HealthState { db_pool: pool.clone(), telephony: Arc::new(FakeTelephony::configured()) };
        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.rooms, Some(25));
        assert_eq!(payload.telephony.status, "ready");
        assert_eq!(payload.telephony.detail, "sending from +15550001111");

        pool.close().await;
    }

    #[tokio::test]
    async fn closed_database_is_service_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5)
            .await
            .expect("pool should connect");
        pool.close().await;

        let state = HealthState { db_pool: pool, telephony: Arc::new(NoopTelephony) };
        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert!(payload.database.detail.starts_with("database query failed"));
        assert_eq!(payload.telephony.status, "disabled");
        assert_eq!(payload.rooms, None);
    }
}
