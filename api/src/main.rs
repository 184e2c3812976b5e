use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use aftercare_core::adherence::AdherenceEngine;
use aftercare_core::cipher::AesGcmCipher;
use aftercare_core::scheduler::{SweepScheduler, SystemClock};
use aftercare_core::store::{MemoryStore, RecordStore};

mod error;
mod gateway;
mod identity;
mod middleware;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Aftercare API",
        version = "0.1.0",
        description = "Turns free-text clinician notes into structured, time-bounded care plans and tracks patient adherence against them."
    ),
    paths(
        routes::health::health_check,
        routes::patients::register_patient,
        routes::patients::list_patients,
        routes::notes::file_note,
        routes::notes::list_patient_notes,
        routes::my::list_my_notes,
        routes::my::check_in,
        routes::my::complete_task,
        routes::my::delete_note,
        routes::my::delete_plan_item,
        routes::my::delete_checklist_item,
    ),
    components(schemas(
        HealthResponse,
        aftercare_core::error::ApiError,
        aftercare_core::model::Patient,
        aftercare_core::model::ChecklistItem,
        aftercare_core::model::PlanItem,
        aftercare_core::model::Frequency,
        routes::patients::RegisterPatientRequest,
        routes::notes::FileNoteRequest,
        routes::notes::NoteView,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aftercare_api=debug,aftercare_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Note-text encryption key (64 hex chars)
    let encryption_key =
        std::env::var("AFTERCARE_ENCRYPTION_KEY").expect("AFTERCARE_ENCRYPTION_KEY must be set");
    let cipher = Arc::new(
        AesGcmCipher::from_hex_key(&encryption_key)
            .expect("AFTERCARE_ENCRYPTION_KEY must be a 32-byte hex key"),
    );

    // Extraction model endpoint
    let api_key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set");
    let model =
        std::env::var("AFTERCARE_LLM_MODEL").unwrap_or_else(|_| "gemini-pro".to_string());
    let extraction = Arc::new(gateway::GeminiGateway::new(api_key, model));

    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let app_state = state::AppState::new(store.clone(), cipher, extraction);

    // Adherence sweeps: one eager run at startup, then one per period
    let sweep_period_secs: u64 = std::env::var("AFTERCARE_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600);
    let engine = Arc::new(AdherenceEngine::new(store));
    let scheduler = SweepScheduler::start(
        engine,
        Arc::new(SystemClock),
        Duration::from_secs(sweep_period_secs),
    );

    let cors_layer = middleware::cors::build_cors_layer();

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::patients::router())
        .merge(routes::notes::router())
        .merge(routes::my::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Aftercare API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    scheduler.stop().await;
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
