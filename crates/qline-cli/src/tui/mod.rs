//! qline TUI
//!
//! Live view of all queues, kept current by the server's update stream.
//!
//! ## Layout
//!
//! Two-pane layout:
//! - Left: All queues (● marks the ones you are in)
//! - Right: Members of the active queue, in order
//!
//! ## Keys
//!
//! - j/k or ↑/↓: Move selection up/down
//! - h/l or Tab: Switch panes
//! - Enter: Join / open the selected queue, or request a swap with a member
//! - s: Skip your turn
//! - x: Leave the queue
//! - n: New queue
//! - r: Refresh
//! - q: Quit

mod app;
mod ui;

use std::fs::File;
use std::future::Future;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use qline_core::updates::UpdateChannelHandle;
use qline_core::view::viewer_zone;
use qline_core::{
    spawn_update_channel, Config, CredentialStore, QueueId, ReqwestTransport, SessionError,
    UpdateChannelConfig, UpdateEvent,
};

use crate::Session;
use app::{App, Request};

/// Run the TUI application
pub async fn run(
    config: Config,
    credentials: Arc<dyn CredentialStore>,
    queue_id: Option<String>,
) -> Result<()> {
    // Initialize TUI logging (file-based, only if QLINE_LOG is set)
    init_tui_logging(&config);

    let session = Session::from_config(&config, ReqwestTransport::new(), credentials);
    let channel = spawn_update_channel(
        UpdateChannelConfig::from_config(&config),
        session.api_arc(),
    );

    // Initial load, then the queue asked for on the command line
    let initial = queue_id.map(QueueId::from);
    spawn_session(&session, move |s| async move {
        s.load().await?;
        if let Some(queue_id) = initial {
            s.open_queue(&queue_id).await?;
        }
        Ok(())
    });

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = App::new(viewer_zone(config.utc_offset_minutes));
    let result = run_app(&mut terminal, &mut app, &session, channel).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    session: &Session,
    mut channel: UpdateChannelHandle,
) -> Result<()> {
    let mut state_rx = session.store().subscribe();
    let mut channel_open = true;
    app.apply_state(state_rx.borrow_and_update().clone());

    loop {
        app.check_status_timeout();

        terminal.draw(|frame| ui::draw(frame, app))?;

        tokio::select! {
            biased;

            changed = state_rx.changed() => {
                if changed.is_ok() {
                    let state = state_rx.borrow_and_update().clone();
                    app.apply_state(state);
                }
            }

            event = channel.event_rx.recv(), if channel_open => {
                match event {
                    Some(UpdateEvent::StatusChanged(status)) => {
                        app.channel_status = status;
                    }
                    Some(event) => {
                        if let UpdateEvent::Error(ref message) = event {
                            app.set_status(format!("Updates: {}", message));
                        }
                        spawn_session(session, move |s| async move {
                            s.handle_channel_event(&event).await
                        });
                    }
                    None => channel_open = false,
                }
            }

            // Poll for terminal events
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if event::poll(Duration::from_millis(0))? {
                    if let Event::Key(key) = event::read()? {
                        // Only handle key press events (not release)
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if let Some(request) = app.handle_key(key.code, key.modifiers) {
                            start_request(session, request);
                        }
                    }
                }
            }
        }

        if app.should_quit {
            channel.shutdown().await;
            break;
        }
    }

    Ok(())
}

/// Run a key-triggered request in the background
///
/// Results arrive through the state subscription.
fn start_request(session: &Session, request: Request) {
    debug!("Starting {:?}", request);
    match request {
        Request::Dispatch(action) => {
            spawn_session(session, move |s| async move { s.dispatch(&action).await })
        }
        Request::Create(name) => spawn_session(session, move |s| async move {
            s.create_queue(&name).await.map(drop)
        }),
        Request::Refresh => spawn_session(session, |s| async move { s.fetch_queues().await }),
    }
}

/// Spawn work on a session clone
///
/// Failures are already recorded in the state; they are only logged here.
fn spawn_session<F, Fut>(session: &Session, work: F)
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<(), SessionError>> + Send + 'static,
{
    let task = work(session.clone());
    tokio::spawn(async move {
        if let Err(e) = task.await {
            debug!("Background request failed: {}", e);
        }
    });
}

/// Initialize logging for TUI mode
///
/// Only initializes if QLINE_LOG environment variable is set.
/// Logs to file (config.log_file or default {data_dir}/debug.log).
fn init_tui_logging(config: &Config) {
    let Ok(log_level) = std::env::var("QLINE_LOG") else {
        return;
    };

    let log_path = config.log_path();
    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!("qline_core={},qline_cli={}", log_level, log_level));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("TUI logging initialized to {:?}", log_path);
}
