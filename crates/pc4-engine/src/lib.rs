//! The TCL protocol engine: wires the frame reassembler, command
//! dispatcher, print-job state machine, paper-chute oscillator, and status
//! broadcaster around one mutex-guarded state instance.
//!
//! Grounded on `core-input`'s async service task: one shared instance
//! behind a lock, a cooperative `running` flag checked by every timer
//! before it acts, and `stop()` that flips the flag and lets in-flight
//! one-shot timers no-op themselves rather than forcing an abort. The
//! periodic broadcaster is the one long-running loop and has no such
//! natural exit point between ticks, so `stop()` additionally cancels
//! and joins it directly.
//!
//! Construction deliberately avoids any back-pointer from the engine to
//! its transport. A transport is handed inbound bytes through an
//! `InboundSink`; this crate provides `ChannelSink`, a trivial
//! implementation that forwards bytes over an mpsc channel the engine
//! drains itself once started. That keeps the two sides decoupled: the
//! transport never holds an `Arc<Engine<_>>`.

mod config;
mod state;
mod wire;

pub use config::EngineConfig;
pub use state::PrintJobState;

use async_trait::async_trait;
use pc4_transport::{InboundSink, TransportAdapter, TransportError};
use state::{Action, EngineState};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::warn;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Forwards inbound bytes into a channel the engine drains on its own
/// task. Pass `Arc::new(sink)` to whatever `TransportAdapter` constructor
/// expects an `InboundSink`; pair it with the `Receiver` given to
/// `Engine::new`.
pub struct ChannelSink(mpsc::UnboundedSender<Vec<u8>>);

#[async_trait]
impl InboundSink for ChannelSink {
    async fn deliver(&self, chunk: &[u8]) {
        let _ = self.0.send(chunk.to_vec());
    }
}

/// Creates a connected `ChannelSink` / `Receiver` pair for wiring a
/// transport to an engine without either side holding a pointer to the
/// other's concrete type.
pub fn channel_sink() -> (ChannelSink, mpsc::UnboundedReceiver<Vec<u8>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink(tx), rx)
}

pub struct Engine<T: TransportAdapter + 'static> {
    state: Mutex<EngineState>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    broadcaster_handle: Mutex<Option<JoinHandle<()>>>,
    transport: Arc<T>,
    config: EngineConfig,
}

impl<T: TransportAdapter + 'static> Engine<T> {
    pub fn new(
        config: EngineConfig,
        transport: Arc<T>,
        inbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(EngineState::new(&config)),
            inbound_rx: Mutex::new(Some(inbound_rx)),
            broadcaster_handle: Mutex::new(None),
            transport,
            config,
        })
    }

    /// Marks the engine running, starts the transport, and spawns the
    /// periodic broadcaster and the inbound-channel pump. The first
    /// broadcaster tick fires immediately, per `tokio::time::interval`.
    pub async fn start(self: &Arc<Self>) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().await;
            state.running = true;
        }
        self.transport.start().await?;

        if let Some(rx) = self.inbound_rx.lock().await.take() {
            self.spawn_inbound_pump(rx);
        }
        let handle = self.spawn_broadcaster();
        *self.broadcaster_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Cooperative shutdown: flips `running` and bumps both generation
    /// counters under the lock so any timer already in flight observes
    /// itself as stale, cancels and joins the periodic broadcaster, then
    /// stops the transport.
    pub async fn stop(self: &Arc<Self>) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().await;
            state.running = false;
            state.job_gen = state.job_gen.wrapping_add(1);
            state.chute_gen = state.chute_gen.wrapping_add(1);
        }
        if let Some(handle) = self.broadcaster_handle.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.transport.stop().await?;
        Ok(())
    }

    /// Feed one chunk of inbound bytes (any size, any boundary) to the
    /// reassembler and dispatch whatever frames fall out of it.
    pub async fn deliver(self: &Arc<Self>, chunk: &[u8]) {
        let actions = {
            let mut state = self.state.lock().await;
            let now = tokio::time::Instant::now();
            let results = state.framer.ingest(chunk, now);
            let mut actions = Vec::new();
            for result in results {
                match result {
                    Ok(frame) => actions.extend(state.handle_frame(&frame, &self.config)),
                    Err(err) => warn!(target: "framer", %err, "frame rejected"),
                }
            }
            actions
        };
        self.run_actions(actions).await;
    }

    pub async fn job_state(&self) -> PrintJobState {
        self.state.lock().await.job_state
    }

    pub async fn status_flags(&self) -> [u8; 5] {
        self.state.lock().await.status.flag_bytes()
    }

    pub async fn status_report_template_id(&self) -> u8 {
        self.state.lock().await.status.status_report_template_id()
    }

    pub async fn last_print_template_id(&self) -> u8 {
        self.state.lock().await.last_print_template_id
    }

    async fn run_actions(self: &Arc<Self>, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(frame) => {
                    if let Err(err) = self.transport.send(&frame).await {
                        warn!(target: "dispatcher", %err, "on-demand status send failed");
                    }
                }
                Action::ArmJobTimer { delay_ms, gen } => self.spawn_job_timer(delay_ms, gen),
                Action::ArmChuteSetTimer { delay_ms, gen } => {
                    self.spawn_chute_set_timer(delay_ms, gen)
                }
                Action::ArmChuteClearTimer { delay_ms, gen } => {
                    self.spawn_chute_clear_timer(delay_ms, gen)
                }
            }
        }
    }

    fn spawn_job_timer(self: &Arc<Self>, delay_ms: u64, gen: u64) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let actions = {
                let mut state = engine.state.lock().await;
                state.fire_job_timer(gen, &engine.config)
            };
            engine.run_actions(actions).await;
        });
    }

    fn spawn_chute_set_timer(self: &Arc<Self>, delay_ms: u64, gen: u64) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let actions = {
                let mut state = engine.state.lock().await;
                state.fire_chute_set(gen, &engine.config)
            };
            engine.run_actions(actions).await;
        });
    }

    fn spawn_chute_clear_timer(self: &Arc<Self>, delay_ms: u64, gen: u64) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let actions = {
                let mut state = engine.state.lock().await;
                state.fire_chute_clear(gen)
            };
            engine.run_actions(actions).await;
        });
    }

    fn spawn_inbound_pump(self: &Arc<Self>, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                engine.deliver(&chunk).await;
            }
        });
    }

    fn spawn_broadcaster(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let period = engine.config.status_reporting_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let frame = {
                    let state = engine.state.lock().await;
                    if !state.running {
                        break;
                    }
                    state.build_status_frame(&engine.config)
                };
                if let Err(err) = engine.transport.send(&frame).await {
                    warn!(target: "broadcaster", %err, "periodic status send failed");
                }
            }
        })
    }
}
