//! Result endpoint lifecycle wrapped around a [`SessionController`].

use std::{fmt, io, net::SocketAddr};

use podscan_core::{
    Result, ScanConfig, ScanError, SessionController, SessionHandle,
    model::{ScanProgress, ScanResults, SessionStatus},
};
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{AppState, routes::create_router};

struct RunningEndpoint {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<io::Result<()>>,
}

pub struct Orchestrator {
    controller: SessionController,
    listen: SocketAddr,
    endpoint: Mutex<Option<RunningEndpoint>>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let running = self
            .endpoint
            .try_lock()
            .map(|endpoint| endpoint.as_ref().map(|e| e.local_addr))
            .ok()
            .flatten();
        f.debug_struct("Orchestrator")
            .field("listen", &self.listen)
            .field("running", &running)
            .field("controller", &self.controller)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(controller: SessionController, listen: SocketAddr) -> Self {
        Self {
            controller,
            listen,
            endpoint: Mutex::new(None),
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Bind the result endpoint and serve it in the background.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut endpoint = self.endpoint.lock().await;
        if let Some(running) = endpoint.as_ref() {
            return Err(ScanError::Endpoint(format!(
                "result endpoint already running on {}",
                running.local_addr
            )));
        }

        let listener = TcpListener::bind(self.listen).await.map_err(|err| {
            ScanError::Endpoint(format!("failed to bind {}: {err}", self.listen))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| ScanError::Endpoint(err.to_string()))?;

        let shutdown = CancellationToken::new();
        let router = create_router(AppState::new(self.controller.clone()));
        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        info!(addr = %local_addr, "result endpoint listening");
        *endpoint = Some(RunningEndpoint {
            local_addr,
            shutdown,
            task,
        });
        Ok(local_addr)
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoint.lock().await.as_ref().map(|e| e.local_addr)
    }

    /// Gracefully shut the result endpoint down. Scans already launched are
    /// left running.
    pub async fn stop(&self) {
        let Some(running) = self.endpoint.lock().await.take() else {
            return;
        };
        info!(addr = %running.local_addr, "stopping result endpoint");
        running.shutdown.cancel();
        match running.task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(error = %err, "result endpoint exited with an error"),
            Err(err) => error!(error = %err, "result endpoint task failed"),
        }
    }

    pub async fn scan(&self, config: &ScanConfig) -> Result<SessionHandle> {
        self.controller.scan(config).await
    }

    pub async fn progress(&self) -> ScanProgress {
        self.controller.progress().await
    }

    pub async fn status(&self) -> SessionStatus {
        self.controller.status().await
    }

    pub async fn results(&self) -> ScanResults {
        self.controller.results().await
    }

    pub async fn clear(&self) {
        self.controller.clear().await
    }
}
