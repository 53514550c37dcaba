use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use ec_config::CoordinatorConfig;
use ec_types::{CoordError, CoordResult};

use crate::router::build_router;
use crate::state::AppState;

/// Terminates TLS and serves the router until Ctrl-C, mirroring
/// `estuary-flow/crates/dekaf`'s `RustlsConfig::from_pem_file` +
/// `axum_server::bind_rustls` — `form-state` itself never serves TLS, it
/// just runs `axum::serve` behind a reverse proxy.
pub async fn run(config: &CoordinatorConfig, state: AppState) -> CoordResult<()> {
    let tls_config = RustlsConfig::from_pem_file(&config.tls_cert_path, &config.tls_key_path)
        .await
        .map_err(|e| {
            log::error!("failed to load TLS cert/key: {e}");
            CoordError::ServerError
        })?;

    let addr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .map_err(|_| CoordError::BadRequest("invalid bind address/port".into()))?;

    let router = build_router(state, Duration::from_secs(config.request_timeout_secs));
    let handle = axum_server::Handle::new();

    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        log::info!("received ctrl-c, shutting down");
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
    });

    log::info!("serving on {addr}");
    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .map_err(|e| {
            log::error!("server error: {e}");
            CoordError::ServerError
        })
}
