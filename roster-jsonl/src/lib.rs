//! JSONL sink for `roster`. Writes one client event per line.
//! Always writes; bring your own path.

use roster::telemetry::{event_to_json, ClientEvent, TelemetrySink};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

#[derive(Clone, Debug)]
pub struct JsonlSink {
    path: Arc<PathBuf>,
}

impl JsonlSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: Arc::new(path.into()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl tower_service::Service<ClientEvent> for JsonlSink {
    type Response = ();
    type Error = io::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: ClientEvent) -> Self::Future {
        let path = Arc::clone(&self.path);
        let line = event_to_json(&event).to_string() + "\n";
        Box::pin(async move {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path.as_path())
                .await
                .map_err(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "jsonl sink open failed");
                    e
                })?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            Ok(())
        })
    }
}

impl TelemetrySink for JsonlSink {
    type SinkError = io::Error;
}
