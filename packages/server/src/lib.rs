#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web server for the incident responder.
//!
//! Serves the embedded single-page UI and a JSON API. Every browser gets a
//! session holding its incident context, chat log and dispatch status;
//! submissions are classified inline and dispatched to a background worker
//! whose progress the UI polls.

pub mod config;
mod handlers;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use incident_responder_ai::AiError;
use incident_responder_ai::providers::{LlmProvider, create_provider_from_env};
use incident_responder_dispatch::Dispatcher;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::session::SessionStore;

/// Largest accepted JSON body. Incident images arrive base64 encoded.
const MAX_JSON_BYTES: usize = 10 * 1024 * 1024;

/// Errors that prevent the server from starting or keep it from running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// No usable LLM provider is configured.
    #[error(transparent)]
    Ai(#[from] AiError),

    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state.
pub struct AppState {
    /// Model used for classification, chat and mindmaps.
    pub provider: Arc<dyn LlmProvider>,
    /// Background crew runner.
    pub dispatcher: Dispatcher,
    /// Live browser sessions.
    pub sessions: SessionStore,
}

impl AppState {
    /// Creates state whose dispatches write into `output_dir`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, output_dir: PathBuf) -> Self {
        let dispatcher = Dispatcher::new(provider.clone(), output_dir);
        Self {
            provider,
            dispatcher,
            sessions: SessionStore::default(),
        }
    }
}

/// Registers the UI and API routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(MAX_JSON_BYTES))
        .route("/", web::get().to(handlers::index))
        .service(
            web::scope("/api")
                .route("/health", web::get().to(handlers::health))
                .route("/sessions", web::post().to(handlers::create_session))
                .service(
                    web::scope("/sessions/{id}")
                        .route("/incidents", web::post().to(handlers::submit_incident))
                        .route("/status", web::get().to(handlers::status))
                        .route("/report", web::get().to(handlers::report))
                        .route("/report.pdf", web::get().to(handlers::report_pdf))
                        .route("/images/{file}", web::get().to(handlers::image))
                        .route("/mindmap", web::get().to(handlers::mindmap))
                        .route("/chat", web::get().to(handlers::chat_history))
                        .route("/chat", web::post().to(handlers::chat)),
                ),
        );
}

/// Starts the incident responder server.
///
/// Loads `.env`, initialises logging, creates the LLM provider from the
/// environment and serves until shut down. This is a regular async
/// function: the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError::Ai`] if no LLM provider is configured and
/// [`ServerError::Io`] if the server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> Result<(), ServerError> {
    let dotenv = dotenvy::dotenv();

    pretty_env_logger::init_custom_env("RUST_LOG");

    match dotenv {
        Ok(path) => log::info!("Loaded environment from {}", path.display()),
        Err(e) => log::debug!("No .env loaded: {e}"),
    }

    let config = ServerConfig::from_env();

    log::info!("Creating LLM provider...");
    let provider: Arc<dyn LlmProvider> = Arc::from(create_provider_from_env()?);

    log::info!("Writing reports to {}", config.output_dir.display());
    let state = web::Data::new(AppState {
        sessions: SessionStore::with_ttl(config.session_ttl),
        ..AppState::new(provider, config.output_dir)
    });

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr, config.port))?
    .run()
    .await?;

    Ok(())
}
