use axum::{
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use wms_core::config::AppState;
use wms_core::docs::ApiDoc;
use wms_core::handlers;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).compact().init();

    let state = match AppState::new().await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("🔥 Falha ao montar o estado da aplicação: {:?}", e);
            std::process::exit(1);
        }
    };

    // Esquema versionado junto do código; aplicar no boot é idempotente.
    if let Err(e) = sqlx::migrate!("./migrations").run(&state.db_pool).await {
        tracing::error!("🔥 Falha ao aplicar migrações: {:?}", e);
        std::process::exit(1);
    }
    tracing::info!("✅ Migrações aplicadas!");

    let app = Router::new()
        .route("/api/health", get(health_check_handler))
        // scan
        .route("/api/scan", post(handlers::scan::ingest_scan))
        // stock / ledger
        .route("/api/stock/adjust", post(handlers::stock::adjust_stock))
        .route("/api/stock", get(handlers::stock::list_stock))
        .route("/api/ledger/query", post(handlers::stock::query_ledger))
        .route("/api/ledger/summary", post(handlers::stock::summarize_ledger))
        .route("/api/ledger/reconcile", post(handlers::stock::reconcile_ledger))
        .route(
            "/api/ledger/opening-backfill",
            post(handlers::stock::opening_backfill),
        )
        // documents
        .route(
            "/api/receipts/confirm",
            post(handlers::documents::confirm_receipt),
        )
        .route(
            "/api/internal-issues",
            post(handlers::documents::create_internal_issue),
        )
        .route(
            "/api/internal-issues/{id}/lines",
            post(handlers::documents::upsert_internal_issue_line),
        )
        .route(
            "/api/internal-issues/{id}/confirm",
            post(handlers::documents::confirm_internal_issue),
        )
        .route(
            "/api/internal-issues/{id}/cancel",
            post(handlers::documents::cancel_internal_issue),
        )
        .route(
            "/api/internal-issues/{id}",
            get(handlers::documents::get_internal_issue),
        )
        .route(
            "/api/return-tasks/from-po",
            post(handlers::documents::create_return_task),
        )
        .route(
            "/api/return-tasks/{id}/pick",
            post(handlers::documents::record_return_pick),
        )
        .route(
            "/api/return-tasks/{id}/commit",
            post(handlers::documents::commit_return_task),
        )
        .route(
            "/api/return-tasks/{id}",
            get(handlers::documents::get_return_task),
        )
        // outbound
        .route("/api/outbound/commit", post(handlers::outbound::commit_outbound))
        // snapshot
        .route("/api/snapshot/run", post(handlers::snapshot::run_snapshot))
        .route(
            "/api/snapshot/three-books",
            get(handlers::snapshot::three_books_summary),
        )
        .route("/api/snapshot/day", get(handlers::snapshot::list_snapshot_day))
        .route("/api/snapshot/trends", get(handlers::snapshot::snapshot_trends))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("🔥 Falha ao iniciar o listener TCP: {:?}", e);
            std::process::exit(1);
        }
    };

    match listener.local_addr() {
        Ok(local) => tracing::info!("🚀 Servidor escutando em {}", local),
        Err(_) => tracing::info!("🚀 Servidor escutando em {}", addr),
    }

    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!("🔥 Servidor encerrou com erro: {:?}", e);
        std::process::exit(1);
    }
}

async fn health_check_handler() -> (StatusCode, Json<Value>) {
    let response = json!({ "status": "ok" });
    (StatusCode::OK, Json(response))
}
