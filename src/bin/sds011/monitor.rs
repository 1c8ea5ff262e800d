//! Periodic sampling with the latest reading served over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use sds011::DataPoint;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use crate::{connect, prepare, put_to_sleep, sample, Sensor, Timing};

// Time the device gets to (re-)settle before it is opened again.
const BACKOFF: Duration = Duration::from_secs(10);

/// Result of a health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Default)]
struct Snapshot {
    data: Option<DataPoint>,
    health: Option<Health>,
}

/// Latest reading and health, shared between the sampling loop and the
/// HTTP handlers.
#[derive(Clone)]
pub struct MonitorState {
    inner: Arc<RwLock<Snapshot>>,
    max_data_age: Duration,
}

impl MonitorState {
    pub fn new(max_data_age: Duration) -> Self {
        Self {
            inner: Arc::default(),
            max_data_age,
        }
    }

    pub async fn record(&self, point: DataPoint) {
        let mut snapshot = self.inner.write().await;
        snapshot.data = Some(point);
        snapshot.health = Some(Health {
            ok: true,
            details: None,
        });
    }

    pub async fn fail(&self, details: String) {
        self.inner.write().await.health = Some(Health {
            ok: false,
            details: Some(details),
        });
    }

    pub async fn latest(&self) -> Option<DataPoint> {
        self.inner.read().await.data
    }

    /// Health as of `now`. Stale data turns an otherwise good state bad.
    pub async fn health_at(&self, now: DateTime<Utc>) -> Option<Health> {
        let snapshot = self.inner.read().await;
        let health = snapshot.health.clone()?;
        if !health.ok {
            return Some(health);
        }

        let stale = snapshot.data.is_some_and(|point| {
            (now - point.timestamp)
                .to_std()
                .is_ok_and(|age| age > self.max_data_age)
        });
        if stale {
            return Some(Health {
                ok: false,
                details: Some(format!(
                    "Data is older than {}s",
                    self.max_data_age.as_secs()
                )),
            });
        }
        Some(health)
    }
}

pub fn router(state: MonitorState) -> Router {
    Router::new()
        .route("/", get(latest_data))
        .route("/health", get(health))
        .with_state(state)
}

async fn latest_data(State(state): State<MonitorState>) -> Response {
    match state.latest().await {
        Some(point) => Json(point).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn health(State(state): State<MonitorState>) -> Response {
    match state.health_at(Utc::now()).await {
        Some(health) => Json(health).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Serves HTTP and samples the device until interrupted.
pub async fn run(
    device: &str,
    timing: Timing,
    listen: SocketAddr,
    max_failures: u32,
) -> Result<()> {
    let state = MonitorState::new(timing.interval() * 2);

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Error binding {listen}"))?;
    info!("Listening on {}", listen);
    let app = router(state.clone());
    let mut server = tokio::spawn(async move { axum::serve(listener, app).await });

    let result = tokio::select! {
        res = supervise(device, timing, max_failures, &state) => res,
        res = &mut server => res
            .context("HTTP server task failed")?
            .context("HTTP server failed"),
    };
    server.abort();
    result
}

// Keeps a session with the device alive, reopening it after failures.
async fn supervise(
    device: &str,
    timing: Timing,
    max_failures: u32,
    state: &MonitorState,
) -> Result<()> {
    loop {
        match connect(device) {
            Ok(mut sensor) => {
                prepare(&mut sensor, device).await;
                let interrupted = tokio::select! {
                    _ = session(&mut sensor, device, timing, max_failures, state) => false,
                    _ = tokio::signal::ctrl_c() => true,
                };
                put_to_sleep(&mut sensor, device).await;
                if interrupted {
                    info!("Interrupted, shutting down");
                    return Ok(());
                }
            }
            Err(e) => {
                error!("{:#}", e);
                state.fail(format!("{:#}", e)).await;
            }
        }

        info!("Backing off for {:?}", BACKOFF);
        tokio::select! {
            _ = tokio::time::sleep(BACKOFF) => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

// Runs measurement cycles until `max_failures` of them fail in a row.
async fn session(
    sensor: &mut Sensor,
    device: &str,
    timing: Timing,
    max_failures: u32,
    state: &MonitorState,
) {
    let mut failures = 0;
    loop {
        match sample(sensor, device, timing.spin_up()).await {
            Ok(point) => {
                info!("Read data from {}: {}", device, point);
                state.record(point).await;
                failures = 0;
            }
            Err(e) => {
                error!("{:#}", e);
                state.fail(format!("{:#}", e)).await;
                failures += 1;
                if failures >= max_failures {
                    warn!("{} failed cycles on {}, reopening", failures, device);
                    return;
                }
            }
        }
        tokio::time::sleep(timing.interval()).await;
    }
}
