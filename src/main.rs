use std::sync::Arc;

mod config;
mod describe;
mod errors;
mod health;
mod logging;
mod mcp;
mod site;

use crate::config::AppConfig;
use crate::describe::DescriptionGenerator;
use crate::mcp::StdioMcpServer;
use crate::site::store::SiteStore;

#[tokio::main]
async fn main() {
    logging::init_logging();

    let cfg = AppConfig::from_env_and_args();
    if let Err(e) = cfg.validate() {
        tracing::warn!(config_error=%e, "invalid config");
    }

    let store = match cfg.site_file.as_deref() {
        Some(path) => SiteStore::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(error=%e, "site file unusable; serving an empty site");
            SiteStore::default()
        }),
        None => SiteStore::default(),
    };
    let counts = store.counts();

    // Startup health checks (best-effort, logged only)
    let site_file_ok = health::check_site_file(cfg.site_file.as_deref());
    let identity_ok = health::check_site_identity(&store);

    let generator = Arc::new(DescriptionGenerator::new(
        Arc::new(store),
        cfg.description_options(),
    ));
    tracing::info!(
        site_file_ok,
        site_identity_ok = identity_ok,
        posts = counts.posts,
        terms = counts.terms,
        auto_description = cfg.auto_description,
        additions = cfg.description_additions,
        "MCP server startup complete"
    );

    let server = StdioMcpServer::new(generator, cfg.site_file.clone());
    // Graceful shutdown without spawning (run future is not Send due to stdio locks)
    tokio::select! {
        res = server.run() => {
            if let Err(e) = res { tracing::error!(error=?e, "server terminated with error") }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, exiting");
        }
    }
}
