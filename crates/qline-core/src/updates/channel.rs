//! Persistent update channel
//!
//! Maintains the long-lived SSE subscription to the update endpoint and
//! turns its messages into [`UpdateEvent`]s. Reconnects automatically with
//! exponential backoff until told to shut down.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::sse::SseDecoder;
use crate::api::{ApiClient, Transport, TransportError};
use crate::config::Config;
use crate::models::{QueueId, QueueUpdate};

/// Commands sent to the channel task
#[derive(Debug, Clone)]
pub enum ChannelCommand {
    /// Close the subscription and stop
    Shutdown,
}

/// Events emitted by the channel task
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent {
    /// Connection status changed
    StatusChanged(ChannelStatus),
    /// The server reports that a queue changed
    QueueChanged(QueueId),
    /// Reconnected after a drop; notifications may have been missed
    Resubscribed,
    /// Connection or decoding problem
    Error(String),
}

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Not connected (waiting to retry, or stopped)
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Subscribed and listening
    Connected,
}

/// Handle to control the channel task
pub struct UpdateChannelHandle {
    /// Send commands to the channel task
    pub command_tx: mpsc::Sender<ChannelCommand>,
    /// Receive events from the channel task
    pub event_rx: mpsc::Receiver<UpdateEvent>,
    /// Watch connection status
    pub status_rx: watch::Receiver<ChannelStatus>,
}

impl UpdateChannelHandle {
    /// Ask the task to stop
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(ChannelCommand::Shutdown).await;
    }
}

/// Configuration for the update channel
#[derive(Debug, Clone)]
pub struct UpdateChannelConfig {
    /// Update stream URL
    pub url: String,
    /// Initial reconnect delay
    pub initial_reconnect_delay: Duration,
    /// Maximum reconnect delay
    pub max_reconnect_delay: Duration,
}

impl Default for UpdateChannelConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

impl UpdateChannelConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.updates_url(),
            initial_reconnect_delay: config.reconnect_initial_delay(),
            max_reconnect_delay: config.reconnect_max_delay(),
        }
    }
}

/// Delay before the attempt after one that waited `current`
pub fn next_reconnect_delay(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

/// Delay after a working connection ends
///
/// A server `retry:` hint is held within the configured bounds.
fn reset_reconnect_delay(config: &UpdateChannelConfig, retry_ms: Option<u64>) -> Duration {
    match retry_ms {
        Some(ms) => Duration::from_millis(ms)
            .max(config.initial_reconnect_delay)
            .min(config.max_reconnect_delay),
        None => config.initial_reconnect_delay,
    }
}

/// Spawn the update channel task
///
/// Returns a handle to control and monitor it. The task stops on
/// [`ChannelCommand::Shutdown`] or when the handle's command sender is
/// dropped.
pub fn spawn_update_channel<T: Transport>(
    config: UpdateChannelConfig,
    api: Arc<ApiClient<T>>,
) -> UpdateChannelHandle {
    let (command_tx, command_rx) = mpsc::channel(4);
    let (event_tx, event_rx) = mpsc::channel(64);
    let (status_tx, status_rx) = watch::channel(ChannelStatus::Disconnected);

    tokio::spawn(channel_loop(config, api, command_rx, event_tx, status_tx));

    UpdateChannelHandle {
        command_tx,
        event_rx,
        status_rx,
    }
}

/// Stream position carried across reconnects
#[derive(Default)]
struct StreamCursor {
    decoder: SseDecoder,
    ever_connected: bool,
}

enum ListenOutcome {
    Shutdown,
    Closed,
}

/// Main channel loop with reconnection
async fn channel_loop<T: Transport>(
    config: UpdateChannelConfig,
    api: Arc<ApiClient<T>>,
    mut command_rx: mpsc::Receiver<ChannelCommand>,
    event_tx: mpsc::Sender<UpdateEvent>,
    status_tx: watch::Sender<ChannelStatus>,
) {
    let mut cursor = StreamCursor::default();
    let mut reconnect_delay = config.initial_reconnect_delay;

    loop {
        set_status(&status_tx, &event_tx, ChannelStatus::Connecting).await;

        let mut connected = false;
        match connect_and_listen(
            &config,
            &api,
            &mut cursor,
            &mut connected,
            &mut command_rx,
            &event_tx,
            &status_tx,
        )
        .await
        {
            Ok(ListenOutcome::Shutdown) => {
                set_status(&status_tx, &event_tx, ChannelStatus::Disconnected).await;
                break;
            }
            Ok(ListenOutcome::Closed) => {
                debug!("Update stream closed by server");
            }
            Err(e) => {
                warn!("Update channel error: {}", e);
                let _ = event_tx
                    .send(UpdateEvent::Error(format!("Connection error: {}", e)))
                    .await;
            }
        }

        if connected {
            // A working connection resets the backoff; honor a server `retry:`
            reconnect_delay = reset_reconnect_delay(&config, cursor.decoder.retry_ms());
        }

        set_status(&status_tx, &event_tx, ChannelStatus::Disconnected).await;

        // Wait before reconnecting, but check for shutdown command
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {
                reconnect_delay = next_reconnect_delay(reconnect_delay, config.max_reconnect_delay);
            }
            cmd = command_rx.recv() => {
                match cmd {
                    Some(ChannelCommand::Shutdown) | None => break,
                }
            }
        }
    }

    debug!("Update channel stopped");
}

/// Subscribe and forward updates until the stream ends or shutdown
async fn connect_and_listen<T: Transport>(
    config: &UpdateChannelConfig,
    api: &ApiClient<T>,
    cursor: &mut StreamCursor,
    connected: &mut bool,
    command_rx: &mut mpsc::Receiver<ChannelCommand>,
    event_tx: &mpsc::Sender<UpdateEvent>,
    status_tx: &watch::Sender<ChannelStatus>,
) -> Result<ListenOutcome, TransportError> {
    let last_id = cursor.decoder.last_event_id().map(str::to_string);
    let mut stream = tokio::select! {
        stream = api.open_update_stream(&config.url, last_id.as_deref()) => stream?,
        cmd = command_rx.recv() => {
            return match cmd {
                Some(ChannelCommand::Shutdown) | None => Ok(ListenOutcome::Shutdown),
            };
        }
    };

    // Partial lines from a dropped connection are discarded
    cursor.decoder = reset_decoder(&cursor.decoder);

    *connected = true;
    info!("Subscribed to queue updates at {}", config.url);
    set_status(status_tx, event_tx, ChannelStatus::Connected).await;

    if cursor.ever_connected {
        let _ = event_tx.send(UpdateEvent::Resubscribed).await;
    }
    cursor.ever_connected = true;

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(ChannelCommand::Shutdown) | None => return Ok(ListenOutcome::Shutdown),
                }
            }

            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        for event in cursor.decoder.push(&bytes) {
                            if !event.is_message() {
                                continue;
                            }
                            match serde_json::from_str::<QueueUpdate>(&event.data) {
                                Ok(update) => {
                                    debug!("Queue {} changed", update.queue_id);
                                    let _ = event_tx.send(UpdateEvent::QueueChanged(update.queue_id)).await;
                                }
                                Err(e) => {
                                    warn!("Ignoring undecodable update {:?}: {}", event.data, e);
                                }
                            }
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Ok(ListenOutcome::Closed),
                }
            }
        }
    }
}

/// Fresh decoder that remembers the last event id and retry hint
fn reset_decoder(previous: &SseDecoder) -> SseDecoder {
    SseDecoder::resume(
        previous.last_event_id().map(str::to_string),
        previous.retry_ms(),
    )
}

async fn set_status(
    status_tx: &watch::Sender<ChannelStatus>,
    event_tx: &mpsc::Sender<UpdateEvent>,
    status: ChannelStatus,
) {
    if *status_tx.borrow() == status {
        return;
    }
    let _ = status_tx.send(status);
    let _ = event_tx.send(UpdateEvent::StatusChanged(status)).await;
}
