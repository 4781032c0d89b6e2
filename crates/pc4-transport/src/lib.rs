//! The collaborator contract between the protocol engine and whatever
//! carries its bytes: a USB CDC-ACM device, a Unix domain socket, or (for
//! tests) an in-memory pipe.
//!
//! Shaped after `core-terminal`'s `TerminalBackend` trait plus its
//! `CrosstermBackend` implementation: one small trait abstracting the real
//! I/O device, one concrete backend per medium, lifecycle guarded by
//! `start`/`stop` rather than a RAII guard (the engine, not a caller's
//! stack frame, owns the lifecycle here).

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport has no connected peer")]
    NotConnected,
}

/// The outbound half of the contract: the engine calls `send` with a
/// complete frame, and controls the adapter's lifecycle with `start`/`stop`.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;
    async fn start(&self) -> Result<(), TransportError>;
    async fn stop(&self) -> Result<(), TransportError>;
}

/// The inbound half: implemented by whatever owns the engine. The adapter
/// calls into this as bytes arrive, so the engine never holds a pointer
/// back into the transport (see the engine's own docs for why).
#[async_trait]
pub trait InboundSink: Send + Sync {
    async fn deliver(&self, chunk: &[u8]);
}

/// Duplex in-memory pipe. `inject` plays the role of bytes arriving off the
/// wire; `next_outbound`/`try_next_outbound` drain what the engine sent.
/// This is the harness every protocol-level test and the binary's
/// integration tests run against.
pub struct InMemoryTransport<S: InboundSink + 'static> {
    sink: Arc<S>,
    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    outbound_rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl<S: InboundSink + 'static> InMemoryTransport<S> {
    pub fn new(sink: Arc<S>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Self {
            sink,
            outbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
        }
    }

    pub async fn inject(&self, chunk: &[u8]) {
        self.sink.deliver(chunk).await;
    }

    pub async fn next_outbound(&self) -> Option<Vec<u8>> {
        self.outbound_rx.lock().await.recv().await
    }

    pub async fn try_next_outbound(&self) -> Option<Vec<u8>> {
        self.outbound_rx.lock().await.try_recv().ok()
    }
}

#[async_trait]
impl<S: InboundSink + 'static> TransportAdapter for InMemoryTransport<S> {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        self.outbound_tx
            .send(frame.to_vec())
            .map_err(|_| TransportError::NotConnected)
    }

    async fn start(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A real adapter for manual exercise of the binary: a Unix domain socket
/// standing in for the USB CDC-ACM endpoint (the spec names a Unix socket
/// as an acceptable substitute transport; opening the actual gadget device
/// node is out of scope).
///
/// `start()` binds and returns immediately; accepting and serving
/// connections happens on a spawned task so it never blocks the engine's
/// own startup (which also begins the periodic broadcaster) on a host
/// actually dialing in. Disconnection simply waits for the next `accept`.
pub struct UnixSocketTransport<S: InboundSink + 'static> {
    path: PathBuf,
    sink: Arc<S>,
    write_half: Arc<Mutex<Option<tokio::net::unix::OwnedWriteHalf>>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: InboundSink + 'static> UnixSocketTransport<S> {
    pub fn new(path: impl Into<PathBuf>, sink: Arc<S>) -> Self {
        Self {
            path: path.into(),
            sink,
            write_half: Arc::new(Mutex::new(None)),
            accept_task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<S: InboundSink + 'static> TransportAdapter for UnixSocketTransport<S> {
    async fn start(&self) -> Result<(), TransportError> {
        let _ = std::fs::remove_file(&self.path);
        let listener = UnixListener::bind(&self.path)?;
        debug!(target: "transport", path = %self.path.display(), "listening");

        let sink = Arc::clone(&self.sink);
        let write_half = Arc::clone(&self.write_half);
        let handle = tokio::spawn(async move {
            loop {
                let (stream, _addr) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(target: "transport", %err, "accept_failed");
                        break;
                    }
                };
                debug!(target: "transport", "peer_connected");
                let (mut read_half, w) = stream.into_split();
                *write_half.lock().await = Some(w);

                let mut buf = [0u8; 4096];
                loop {
                    match read_half.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => sink.deliver(&buf[..n]).await,
                        Err(err) => {
                            warn!(target: "transport", %err, "read_error");
                            break;
                        }
                    }
                }
                *write_half.lock().await = None;
            }
        });
        *self.accept_task.lock().await = Some(handle);
        Ok(())
    }

    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.write_half.lock().await;
        match guard.as_mut() {
            Some(writer) => {
                writer.write_all(frame).await?;
                Ok(())
            }
            None => Err(TransportError::NotConnected),
        }
    }

    async fn stop(&self) -> Result<(), TransportError> {
        if let Some(handle) = self.accept_task.lock().await.take() {
            handle.abort();
        }
        *self.write_half.lock().await = None;
        let _ = std::fs::remove_file(&self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        received: StdMutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl InboundSink for RecordingSink {
        async fn deliver(&self, chunk: &[u8]) {
            self.received.lock().unwrap().push(chunk.to_vec());
        }
    }

    #[tokio::test]
    async fn inject_reaches_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let transport = InMemoryTransport::new(sink.clone());
        transport.inject(b"^S|^").await;
        assert_eq!(sink.received.lock().unwrap().as_slice(), &[b"^S|^".to_vec()]);
    }

    #[tokio::test]
    async fn send_is_observable_via_next_outbound() {
        let sink = Arc::new(RecordingSink::default());
        let transport = InMemoryTransport::new(sink);
        transport.send(b"*S|0|*").await.unwrap();
        let frame = transport.next_outbound().await.unwrap();
        assert_eq!(frame, b"*S|0|*".to_vec());
    }

    #[tokio::test]
    async fn start_and_stop_are_no_ops_for_in_memory_transport() {
        let sink = Arc::new(RecordingSink::default());
        let transport = InMemoryTransport::new(sink);
        transport.start().await.unwrap();
        transport.stop().await.unwrap();
    }
}
