//! Studio CMS - library for app logic and testing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod mail;
pub mod media;
pub mod pagination;
pub mod routes;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::mail::{LogTransport, MailTransport, SmtpTransport};
use crate::media::MediaStore;

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub media: MediaStore,
    pub mailer: Arc<dyn MailTransport>,
}

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local frontend dev server.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::RANGE])
        .expose_headers([header::CONTENT_RANGE, pagination::X_TOTAL_COUNT.clone()])
        .allow_credentials(true)
}

/// Routes anyone may call.
fn public_routes() -> Router<AppState> {
    use routes::{auth, events, health, newsletter, portfolio, settings};

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/portfolio", get(portfolio::list_items))
        .route("/portfolio/{id}", get(portfolio::get_item))
        .route("/events", get(events::list_published))
        .route("/events/slug/{slug}", get(events::get_published_by_slug))
        .route(
            "/events/{id}/ticket-requests",
            post(events::create_ticket_request),
        )
        .route("/settings", get(settings::get_settings))
        .route("/settings/{key}", get(settings::get_setting))
        .route("/newsletter/subscribe", post(newsletter::subscribe))
        .route("/newsletter/unsubscribe", post(newsletter::unsubscribe))
        .route("/health", get(health::health_ping))
        .route("/health/database", get(health::health_database))
}

/// Routes behind `require_auth`.
fn protected_routes(state: AppState) -> Router<AppState> {
    use routes::{auth, events, newsletter, portfolio, settings, users};

    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/portfolio", post(portfolio::create_item))
        .route(
            "/portfolio/{id}",
            put(portfolio::update_item).delete(portfolio::delete_item),
        )
        .route("/events", post(events::create_event))
        .route("/events/admin", get(events::list_all))
        .route(
            "/events/{id}",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/events/{id}/ticket-requests",
            get(events::list_ticket_requests),
        )
        .route(
            "/events/ticket-requests",
            get(events::list_all_ticket_requests),
        )
        .route(
            "/events/ticket-requests/{id}",
            put(events::update_ticket_request_status),
        )
        .route(
            "/settings",
            post(settings::upsert_setting).put(settings::bulk_update_settings),
        )
        .route("/settings/{key}", delete(settings::delete_setting))
        .route("/newsletter/subscribers", get(newsletter::list_subscribers))
        .route(
            "/newsletter/subscribers/{id}",
            delete(newsletter::delete_subscriber),
        )
        .route("/newsletter/send", post(newsletter::send_newsletter))
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user).put(users::update_user))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::auth::require_auth,
        ))
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    let body_limit = state.config.max_upload_bytes;
    let uploads = ServeDir::new(state.media.root());

    Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .nest_service(media::PUBLIC_PREFIX, uploads)
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        // Multipart uploads are bounded by the same limit as every other body
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
}

fn build_mailer(config: &AppConfig) -> Result<Arc<dyn MailTransport>, mail::MailError> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "SMTP transport configured");
            Ok(Arc::new(SmtpTransport::new(smtp, &config.mail_from)?))
        }
        None => {
            tracing::warn!("SMTP_HOST not set; newsletters will only be logged");
            Ok(Arc::new(LogTransport))
        }
    }
}

/// Run the server (used by main).
pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();

    // Held for the process lifetime; dropping them loses buffered log lines.
    let _log_guards = logging::init(&config.environment);

    routes::health::init_start_time();

    // Refuse to start in production with the insecure default JWT secret.
    config.validate()?;

    let pool = db::init_pool(None).await?;
    db::run_migrations(&pool).await?;

    let media = MediaStore::new(config.upload_dir.clone());
    media.ensure_root().await?;
    tracing::info!("Serving uploads from {}", media.root().display());

    let mailer = build_mailer(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let state = AppState {
        pool,
        config: Arc::new(config),
        media,
        mailer,
    };
    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{offline_state, send};
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_cors_exposes_pagination_headers() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(offline_state(dir.path()));
        let req = Request::get("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let exposed = res
            .headers()
            .get(header::ACCESS_CONTROL_EXPOSE_HEADERS)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();
        assert!(exposed.contains("content-range"));
        assert!(exposed.contains("x-total-count"));
    }

    #[tokio::test]
    async fn test_uploads_are_served_from_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc-logo.png"), b"\x89PNG\r\n\x1a\nrest").unwrap();

        let app = create_app(offline_state(dir.path()));
        let req = Request::get("/uploads/abc-logo.png").body(Body::empty()).unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with(b"\x89PNG"));

        let app = create_app(offline_state(dir.path()));
        let req = Request::get("/uploads/missing.png").body(Body::empty()).unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = offline_state(dir.path());
        state.config = Arc::new(AppConfig {
            max_upload_bytes: 16,
            ..(*state.config).clone()
        });
        let app = create_app(state);
        let req = Request::post("/newsletter/subscribe")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, "64")
            .body(Body::from(vec![b' '; 64]))
            .unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
