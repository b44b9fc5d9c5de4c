//! Test harness: a full engine + API server on an ephemeral port.

use analytics_service::AnalyticsEngine;
use api_service::{routes, ApiContext};
use config::PulseConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A running stack plus the handles needed to tear it down.
pub struct TestStack {
    pub addr: SocketAddr,
    pub engine: Arc<AnalyticsEngine>,
    quit: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

/// Small, fast configuration used by every scenario.
pub fn test_config() -> PulseConfig {
    let mut config = PulseConfig::default();
    config.analytics.workers = 4;
    config.monitoring.health_check_interval_ms = 100;
    config
}

pub async fn spawn_stack() -> TestStack {
    spawn_stack_with(test_config()).await
}

pub async fn spawn_stack_with(config: PulseConfig) -> TestStack {
    let engine = Arc::new(AnalyticsEngine::new(&config));
    engine.start();

    let ctx = Arc::new(ApiContext::new(Arc::clone(&engine), &config));
    let (quit_tx, quit_rx) = oneshot::channel::<()>();
    let (addr, server) =
        warp::serve(routes::routes(ctx)).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
            let _ = quit_rx.await;
        });

    TestStack {
        addr,
        engine,
        quit: Some(quit_tx),
        server: Some(tokio::spawn(server)),
    }
}

impl TestStack {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn teardown(mut self) {
        if let Some(quit) = self.quit.take() {
            let _ = quit.send(());
        }
        if let Some(server) = self.server.take() {
            let _ = server.await;
        }
        self.engine.shutdown(Duration::from_secs(5)).await;
    }
}
