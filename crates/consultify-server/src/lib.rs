pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, patch, post, put};
use axum::Router;
use consultify_core::config::AppConfig;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let protected = Router::new()
        // Identity
        .route("/api/auth/me", get(routes::auth::me))
        .route(
            "/api/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route("/api/users/{id}", patch(routes::users::update_user))
        .route(
            "/api/organizations",
            get(routes::organizations::list_organizations),
        )
        .route(
            "/api/organizations/{id}",
            patch(routes::organizations::update_organization),
        )
        // Projects
        .route(
            "/api/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/api/projects/{id}",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        // Tasks
        .route(
            "/api/projects/{id}/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/api/tasks/{id}",
            patch(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        // Initiatives and roadmap
        .route(
            "/api/projects/{id}/initiatives",
            get(routes::initiatives::list_initiatives)
                .post(routes::initiatives::create_initiative),
        )
        .route(
            "/api/initiatives/{id}",
            patch(routes::initiatives::update_initiative)
                .delete(routes::initiatives::delete_initiative),
        )
        .route("/api/roadmap", get(routes::roadmap::get_roadmap))
        // Assessments
        .route(
            "/api/assessments/frameworks",
            get(routes::assessments::list_frameworks),
        )
        .route(
            "/api/projects/{id}/assessments",
            get(routes::assessments::list_assessments)
                .post(routes::assessments::create_assessment),
        )
        .route(
            "/api/assessments/{id}",
            get(routes::assessments::get_assessment),
        )
        .route(
            "/api/assessments/{id}/scores/{dimension}",
            put(routes::assessments::set_score),
        )
        .route(
            "/api/assessments/{id}/complete",
            post(routes::assessments::complete_assessment),
        )
        .route(
            "/api/assessments/{id}/summary",
            get(routes::assessments::assessment_summary),
        )
        // Reports
        .route(
            "/api/assessments/{id}/report.pdf",
            get(routes::reports::assessment_pdf),
        )
        .route(
            "/api/projects/{id}/report.pdf",
            get(routes::reports::project_pdf),
        )
        // Governance and audit
        .route(
            "/api/change-requests",
            get(routes::change_requests::list_change_requests)
                .post(routes::change_requests::create_change_request),
        )
        .route(
            "/api/change-requests/{id}",
            get(routes::change_requests::get_change_request),
        )
        .route(
            "/api/change-requests/{id}/transition",
            post(routes::change_requests::transition_change_request),
        )
        .route("/api/audit", get(routes::audit::list_audit))
        // Billing
        .route("/api/billing/balance", get(routes::billing::get_balance))
        .route("/api/billing/ledger", get(routes::billing::get_ledger))
        .route("/api/billing/usage", get(routes::billing::get_usage))
        .route("/api/billing/credit", post(routes::billing::credit))
        // Integrations
        .route(
            "/api/integrations",
            get(routes::integrations::list_integrations)
                .put(routes::integrations::upsert_integration),
        )
        .route(
            "/api/integrations/{provider}",
            axum::routing::delete(routes::integrations::delete_integration),
        )
        // Analytics
        .route(
            "/api/analytics/dashboard",
            get(routes::analytics::dashboard),
        )
        .route(
            "/api/projects/{id}/progress",
            get(routes::analytics::project_progress),
        )
        // AI
        .route("/api/projects/{id}/ai/chat", post(routes::ai::chat))
        .route("/api/ai/research", post(routes::ai::research))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::require_auth,
        ));

    let public = Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/demo/start", post(routes::demo::start_demo))
        .route("/api/demo/session/{id}", get(routes::demo::get_session))
        .route(
            "/api/demo/session/{id}/advance",
            post(routes::demo::advance_session),
        );

    let cors = cors_layer(&app_state.config);
    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Open the configured database and serve the API.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(config, listener).await
}

/// Serve on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(config: AppConfig, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    for warning in config.validate() {
        tracing::warn!(level = ?warning.level, "{}", warning.message);
    }
    if config.has_errors() {
        anyhow::bail!("configuration has errors; run `consultify config check`");
    }
    let conn = consultify_core::db::open(&config.database.path)?;
    let app = build_router(AppState::new(conn, config));

    let actual_port = listener.local_addr()?.port();
    tracing::info!("Consultify API listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
