//! Guardpost Server
//!
//! Serves the platform REST APIs, the live tracking stream, health probes
//! and Swagger UI from a single listener.
//!
//! ## Configuration
//!
//! Read from the TOML file given as the first argument, `GUARDPOST_CONFIG`,
//! or the standard locations, then overridden by `GUARDPOST_*` variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GUARDPOST_HTTP_PORT` | `8080` | HTTP port |
//! | `GUARDPOST_MONGODB_URI` | `mongodb://localhost:27017` | MongoDB connection URL |
//! | `GUARDPOST_MONGODB_DATABASE` | `guardpost` | MongoDB database name |
//! | `GUARDPOST_JWT_SECRET` | - | HS256 signing secret |
//! | `GUARDPOST_JWT_PRIVATE_KEY_PATH` | - | RSA private key PEM (RS256) |
//! | `GUARDPOST_JWT_PUBLIC_KEY_PATH` | - | RSA public key PEM (RS256) |
//! | `GUARDPOST_DEV_MODE` | `false` | Seed demo data on startup |
//! | `RUST_LOG` | `info` | Log level |

use std::sync::Arc;

use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa_swagger_ui::SwaggerUi;

use gp_config::{AppConfig, ConfigLoader};
use gp_platform::auth::{Argon2Config, AuthConfig, AuthService, PasswordPolicy, PasswordService, SessionCookieSettings};
use gp_platform::seed::DevDataSeeder;
use gp_platform::shared::health_api::HealthState;
use gp_platform::shared::indexes::initialize_indexes;
use gp_platform::shared::secure_token;
use gp_platform::{Platform, PlatformSettings};

fn auth_config(config: &AppConfig) -> Result<AuthConfig> {
    let jwt = &config.auth.jwt;
    let mut auth = AuthConfig {
        secret_key: jwt.secret.clone(),
        issuer: jwt.issuer.clone(),
        audience: jwt.audience.clone(),
        session_token_expiry_secs: jwt.session_token_expiry_secs as i64,
        ..Default::default()
    };

    if jwt.uses_rsa() {
        let (private_key, public_key) =
            AuthConfig::load_rsa_keys(&jwt.private_key_path, &jwt.public_key_path)?;
        auth = auth.with_rsa_keys(private_key, public_key);
        info!("Signing sessions with RS256");
    } else if auth.secret_key.is_empty() && config.dev_mode {
        warn!("No JWT secret configured; using a random one, sessions end on restart");
        auth.secret_key = secure_token::url_safe_token();
    }

    Ok(auth)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Session cookies need credentials, which rules out wildcards
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    gp_common::logging::init_logging("gp-server");

    info!("Starting Guardpost Server");

    let config = match std::env::args().nth(1) {
        Some(path) => ConfigLoader::with_path(path).load()?,
        None => ConfigLoader::new().load()?,
    };

    info!("Connecting to MongoDB: {}/{}", config.mongodb.uri, config.mongodb.database);
    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb.uri).await?;
    let db = mongo_client.database(&config.mongodb.database);

    let health = HealthState::new(Some(db.clone()), Some(env!("CARGO_PKG_VERSION").to_string()));

    initialize_indexes(&db).await?;
    info!("Indexes initialized");

    if config.dev_mode {
        let seeder = DevDataSeeder::new(db.clone())?;
        if let Err(e) = seeder.seed().await {
            warn!("Dev data seeding failed: {}", e);
        }
    }

    let auth_service = Arc::new(AuthService::new(auth_config(&config)?)?);
    let password_service = Arc::new(PasswordService::new(Argon2Config::default(), PasswordPolicy::default())?);
    info!("Auth services initialized");

    let platform = Platform {
        db,
        auth_service,
        password_service,
        health: health.clone(),
        settings: PlatformSettings {
            session_cookie: SessionCookieSettings {
                name: config.auth.session.cookie_name.clone(),
                secure: config.auth.session.secure,
                same_site: config.auth.session.same_site.clone(),
            },
            duplicate_window_secs: config.attendance.duplicate_window_secs,
            live_window_minutes: config.tracking.live_window_minutes,
            stream_interval_secs: config.tracking.stream_interval_secs,
            registration_expiry_hours: config.registration.default_expiry_hours,
        },
    };
    let (router, openapi) = platform.into_router();

    let app = Router::new()
        .merge(router)
        .merge(SwaggerUi::new("/swagger-ui").url("/q/openapi", openapi))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.http.cors_origins));

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening on http://{}", addr);

    health.set_ready();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Guardpost Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received...");
}
