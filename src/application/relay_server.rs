use crate::application::relay::{RelayResponse, RelayService};
use crate::infrastructure::config::{RELAY_PATH, RelayConfig};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::hia_client::{HiaClient, ReqwestHiaClient};
use crate::infrastructure::secondary_webhook::{ReqwestSecondaryWebhook, SecondaryWebhook};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const HEALTH_PATH: &str = "/healthz";

pub fn router<H, W>(relay: Arc<RelayService<H, W>>) -> Router
where
    H: HiaClient + 'static,
    W: SecondaryWebhook + 'static,
{
    Router::new()
        .route(
            RELAY_PATH,
            get(relay_status::<H, W>).post(relay_event::<H, W>),
        )
        .route(HEALTH_PATH, get(healthz))
        .with_state(relay)
}

pub async fn serve(config: RelayConfig) -> Result<(), InfraError> {
    if config.access_key.is_none() {
        warn!("HIA_ACCESS_KEY is not set; every relay request will fail");
    }
    if config.secondary_webhook_url.is_none() {
        info!("SECONDARY_WEBHOOK_URL is not set; blocking notifications are disabled");
    }

    let relay = Arc::new(RelayService::new(
        Arc::new(ReqwestHiaClient::new(
            config.status_url.clone(),
            config.ingest_url.clone(),
        )),
        Arc::new(ReqwestSecondaryWebhook::new(
            config.secondary_webhook_url.clone(),
        )),
        config.access_key.clone(),
    ));

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %listener.local_addr()?,
        path = RELAY_PATH,
        upstream = %config.api_base,
        "relay listening"
    );

    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("relay stopped");
    Ok(())
}

async fn relay_status<H, W>(State(relay): State<Arc<RelayService<H, W>>>) -> Response
where
    H: HiaClient + 'static,
    W: SecondaryWebhook + 'static,
{
    into_response(relay.status().await)
}

async fn relay_event<H, W>(State(relay): State<Arc<RelayService<H, W>>>, body: Bytes) -> Response
where
    H: HiaClient + 'static,
    W: SecondaryWebhook + 'static,
{
    let body = match serde_json::from_slice::<Value>(&body) {
        Ok(body) => body,
        Err(error) => {
            warn!(%error, "rejecting unreadable event body");
            return into_response(RelayResponse::error(500, format!("Invalid JSON body: {error}")));
        }
    };

    // The webhook task keeps running after the response is sent.
    into_response(relay.handle_event(body).await.response)
}

async fn healthz() -> &'static str {
    "ok"
}

fn into_response(response: RelayResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}
