use std::sync::Arc;

use tokio::net::TcpListener;
use wormlog_ledger::LedgerService;

use crate::auth::StaticTokenAuth;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Audit ledger HTTP server.
pub struct WormlogServer {
    config: ServerConfig,
    ledger: Arc<LedgerService>,
}

impl WormlogServer {
    pub fn new(config: ServerConfig, ledger: Arc<LedgerService>) -> Self {
        Self { config, ledger }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        let auth = StaticTokenAuth::new(
            self.config.read_token.clone(),
            self.config.write_token.clone(),
        );
        build_router(AppState::new(Arc::clone(&self.ledger), Arc::new(auth)))
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        if self.config.read_token.is_none() || self.config.write_token.is_none() {
            tracing::warn!("read or write token not configured; those routes will answer 500");
        }
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("wormlog server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wormlog_ledger::LedgerConfig;

    fn ledger() -> Arc<LedgerService> {
        Arc::new(LedgerService::from_config(&LedgerConfig::in_memory("s")).unwrap())
    }

    #[test]
    fn server_construction() {
        let server = WormlogServer::new(ServerConfig::default(), ledger());
        assert_eq!(server.config().bind_addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn router_builds() {
        let server = WormlogServer::new(ServerConfig::default(), ledger());
        let _router = server.router();
    }
}
