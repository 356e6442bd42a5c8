//! Upstream schema stream client

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::StreamExt;
use tokio::sync::{watch, RwLock};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use lattice_core::{ChangeEvent, SchemaRegistry};

/// Delay before re-dialing a dropped upstream session.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Consumer-owned cancellation signal for stream subscriptions. Dropping the
/// handle cancels every outstanding token.
pub struct Cancellation {
    tx: watch::Sender<bool>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Cancellation { tx }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// A token to hand to a service; resolves when `cancel` is called.
    pub fn token(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait until the token is signalled (or its `Cancellation` is dropped).
pub(crate) async fn cancelled(token: &mut watch::Receiver<bool>) {
    loop {
        if *token.borrow() {
            return;
        }
        if token.changed().await.is_err() {
            return;
        }
    }
}

enum SessionEnd {
    Cancelled,
    Closed,
}

/// Consumes the upstream WebSocket of JSON change events and feeds the shared
/// registry. Events are applied one at a time, in delivery order; the
/// registry's publish step is the only externally visible effect.
///
/// When a session ends — error, server close, or cancellation — any
/// buffered-but-unpublished registry state is discarded so it never merges
/// into a later session. The previously published snapshot stays visible
/// until the new session completes its first batch.
pub struct StreamService {
    url: String,
    registry: Arc<RwLock<SchemaRegistry>>,
    cancel: watch::Receiver<bool>,
}

impl StreamService {
    pub fn new(
        url: impl Into<String>,
        registry: Arc<RwLock<SchemaRegistry>>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        StreamService {
            url: url.into(),
            registry,
            cancel,
        }
    }

    /// Run until cancelled, reconnecting after transport failures. A
    /// cancellation is not an error and is not surfaced as one.
    pub async fn run(mut self) -> Result<()> {
        loop {
            match self.run_session().await {
                Ok(SessionEnd::Cancelled) => {
                    info!("schema stream cancelled");
                    self.registry.write().await.reset_pending();
                    return Ok(());
                }
                Ok(SessionEnd::Closed) => info!("schema stream closed by server"),
                Err(e) => warn!("schema stream error: {e:#}"),
            }
            self.registry.write().await.reset_pending();

            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                _ = cancelled(&mut self.cancel) => {
                    info!("schema stream cancelled");
                    return Ok(());
                }
            }
        }
    }

    async fn run_session(&mut self) -> Result<SessionEnd> {
        debug!(url = %self.url, "dialing schema stream");
        let connect = connect_async(self.url.as_str());
        let mut ws = tokio::select! {
            res = connect => res?.0,
            _ = cancelled(&mut self.cancel) => return Ok(SessionEnd::Cancelled),
        };
        info!(url = %self.url, "schema stream connected");

        loop {
            let message = tokio::select! {
                msg = ws.next() => msg,
                _ = cancelled(&mut self.cancel) => return Ok(SessionEnd::Cancelled),
            };
            match message {
                Some(Ok(Message::Text(text))) => self.handle_text(&text).await,
                Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                // Pings and pongs are handled by the library; binary frames
                // are not part of the event protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn handle_text(&self, text: &str) {
        match serde_json::from_str::<ChangeEvent>(text) {
            Ok(event) => {
                debug!(
                    module = %event.module_name,
                    change = ?event.change_type,
                    more = event.more,
                    "applying change event"
                );
                self.registry.write().await.apply(event);
            }
            Err(e) => warn!("undecodable change event: {e}"),
        }
    }
}
