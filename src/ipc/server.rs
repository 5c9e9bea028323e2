//! Localhost TCP server for IPC
//!
//! Serves the companion settings/tray process: configuration reads,
//! hot-reload application, status queries, and a display-event push
//! stream for the overlay renderer. Frames are 4-byte little-endian
//! length-prefixed JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::EngineMsg;
use crate::events::DisplayEvent;

use super::protocol::{DaemonStatus, Notification, Request, Response};

const MAX_FRAME: usize = 1024 * 1024;

/// IPC server handling companion connections
pub struct Server {
    listener: Option<TcpListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    /// Display events fanned out to subscribed clients
    event_tx: broadcast::Sender<DisplayEvent>,
    /// Command path into the engine actor
    engine_tx: mpsc::Sender<EngineMsg>,
}

/// Shared server state
struct ServerState {
    /// Copy of the active snapshot, replaced on successful apply
    config: Config,
    config_path: PathBuf,
    start_time: Instant,
}

impl Server {
    /// Bind the server to a localhost address
    pub async fn bind(
        addr: &str,
        config: Config,
        config_path: PathBuf,
        event_tx: broadcast::Sender<DisplayEvent>,
        engine_tx: mpsc::Sender<EngineMsg>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind IPC socket on {addr}"))?;

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            config,
            config_path,
            start_time: Instant::now(),
        }));

        info!(%addr, "IPC server listening");

        Ok(Self {
            listener: Some(listener),
            state,
            shutdown_tx,
            event_tx,
            engine_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(%addr, "client connected");
                    let state = Arc::clone(&self.state);
                    let engine_tx = self.engine_tx.clone();
                    let event_tx = self.event_tx.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, engine_tx, event_tx) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        mut stream: TcpStream,
        state: Arc<RwLock<ServerState>>,
        engine_tx: mpsc::Sender<EngineMsg>,
        event_tx: broadcast::Sender<DisplayEvent>,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match stream.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_FRAME {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            stream.read_exact(&mut msg_buf).await?;

            // Parse request
            let request: Request =
                serde_json::from_slice(&msg_buf).context("failed to parse request")?;

            debug!(?request, "received request");

            if matches!(request, Request::Subscribe) {
                // Subscribe before confirming so no event can slip
                // between the acknowledgement and the stream
                let event_rx = event_tx.subscribe();
                Self::send_message(&mut stream, &Response::Subscribed).await?;
                return Self::push_display_events(stream, event_rx).await;
            }

            let response = Self::process_request(request, &state, &engine_tx).await;
            Self::send_message(&mut stream, &response).await?;
        }
    }

    /// Forward display events to a subscribed client until it
    /// disconnects. A subscribed connection is push-only.
    async fn push_display_events(
        mut stream: TcpStream,
        mut event_rx: broadcast::Receiver<DisplayEvent>,
    ) -> Result<()> {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    debug!(%event, "pushing display event");
                    Self::send_message(&mut stream, &Notification::Display(event)).await?;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "display event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Ok(());
                }
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(stream: &mut TcpStream, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        stream.write_all(&msg_len).await?;
        stream.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and build the response
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        engine_tx: &mpsc::Sender<EngineMsg>,
    ) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => match Self::query_engine(engine_tx).await {
                Ok(status) => {
                    let state = state.read().await;
                    Response::Status(DaemonStatus {
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        listener_running: status.listener_running,
                        showing: status.showing,
                        targets: status.targets,
                        uptime_secs: state.start_time.elapsed().as_secs(),
                    })
                }
                Err(e) => Response::Error {
                    code: "engine".to_string(),
                    message: e.to_string(),
                },
            },

            Request::GetConfig => {
                let state = state.read().await;
                Response::Config(state.config.clone())
            }

            Request::ApplyConfig { config } => {
                Self::apply_config(config, state, engine_tx).await
            }

            // Handled before dispatch; a stray Subscribe here is a bug
            Request::Subscribe => Response::Error {
                code: "protocol".to_string(),
                message: "subscribe must open a push stream".to_string(),
            },
        }
    }

    /// Hand the new snapshot to the engine, then persist it
    async fn apply_config(
        config: Config,
        state: &Arc<RwLock<ServerState>>,
        engine_tx: &mpsc::Sender<EngineMsg>,
    ) -> Response {
        let (reply_tx, reply_rx) = oneshot::channel();
        let msg = EngineMsg::ApplyConfig {
            config: config.clone(),
            reply: reply_tx,
        };
        if engine_tx.send(msg).await.is_err() {
            return Response::Error {
                code: "engine".to_string(),
                message: "engine unavailable".to_string(),
            };
        }

        match reply_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Response::Error {
                    code: "listener".to_string(),
                    message: e.to_string(),
                };
            }
            Err(_) => {
                return Response::Error {
                    code: "engine".to_string(),
                    message: "engine dropped the request".to_string(),
                };
            }
        }

        let mut state = state.write().await;
        if let Err(e) = config.save(&state.config_path) {
            // The engine already runs the new snapshot; report the
            // persistence failure to the settings surface
            warn!(?e, "failed to persist configuration");
            return Response::Error {
                code: "persist".to_string(),
                message: e.to_string(),
            };
        }
        state.config = config;
        info!("configuration applied and persisted");
        Response::Applied
    }

    async fn query_engine(
        engine_tx: &mpsc::Sender<EngineMsg>,
    ) -> Result<crate::engine::EngineStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        engine_tx
            .send(EngineMsg::Snapshot { reply: reply_tx })
            .await
            .context("engine unavailable")?;
        reply_rx.await.context("engine dropped the query")
    }

    /// Gracefully shut down, disconnecting every client
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("IPC server shutdown complete");
    }
}
