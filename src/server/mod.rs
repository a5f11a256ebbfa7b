pub mod api;
pub mod cors;
pub mod error;
pub mod rate_limit;

use crate::cli::ServeArgs;
use api::AppState;
use log::{ error, info };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct Server {
    addr: String,
    state: AppState,
    args: ServeArgs,
}

impl Server {
    pub fn new(addr: String, state: AppState, args: ServeArgs) -> Self {
        Self { addr, state, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let sweeper = Arc::clone(&self.state.limiter).spawn_sweeper();
        let app = api::build_router(self.state.clone());
        let service = app.into_make_service_with_connect_info::<SocketAddr>();

        let result: Result<(), Box<dyn Error + Send + Sync>> = if self.args.enable_tls {
            match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert_path), Some(key_path)) => {
                    info!(
                        "TLS enabled. Loading certificate from '{}' and key from '{}'",
                        cert_path,
                        key_path
                    );
                    let tls_config = axum_server::tls_rustls::RustlsConfig
                        ::from_pem_file(cert_path, key_path).await?;
                    info!("HTTPS chat proxy listening on: https://{}", addr);
                    axum_server::bind_rustls(addr, tls_config).serve(service).await.map_err(Into::into)
                }
                (Some(_), None) | (None, Some(_)) => {
                    error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                    Err("Missing TLS certificate or key path".into())
                }
                (None, None) => {
                    error!("--enable-tls was set but no certificate/key paths provided.");
                    Err("TLS enabled without cert/key".into())
                }
            }
        } else {
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                e
            })?;
            info!("HTTP chat proxy listening on: http://{}", addr);
            axum::serve(listener, service)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(Into::into)
        };

        sweeper.abort();
        result
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
