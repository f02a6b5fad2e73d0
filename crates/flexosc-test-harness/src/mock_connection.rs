//! In-memory [`OscConnection`] for surface tests.
//!
//! Sent messages are recorded; inbound messages are injected by the test and
//! delivered by `receive_messages` exactly like datagrams would be. The mock
//! also counts receive loops so tests can check lazy start and stop.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use flexosc_core::ConnectionParams;
use flexosc_core::error::{Error, Result};
use flexosc_proto::OscMessage;
use flexosc_transport::OscConnection;

/// Test double for a UDP connection.
pub struct MockConnection {
    params: ConnectionParams,
    sent: StdMutex<Vec<OscMessage>>,
    inbound_tx: mpsc::UnboundedSender<OscMessage>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<OscMessage>>,
    loops_started: AtomicUsize,
    loops_running: AtomicUsize,
    fail_sends: AtomicBool,
    fail_receive: AtomicBool,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl MockConnection {
    pub fn new(params: ConnectionParams) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            params,
            sent: StdMutex::new(Vec::new()),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            loops_started: AtomicUsize::new(0),
            loops_running: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
            fail_receive: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Queue a message as if the peer had sent it.
    pub fn inject(&self, msg: OscMessage) {
        // The receiver lives as long as `self`.
        let _ = self.inbound_tx.send(msg);
    }

    /// Everything passed to `send_message` so far.
    pub fn sent(&self) -> Vec<OscMessage> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Make subsequent sends fail with a transport error.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent receive loops fail at once, as when the receive port
    /// cannot be bound.
    pub fn set_fail_receive(&self, fail: bool) {
        self.fail_receive.store(fail, Ordering::SeqCst);
    }

    /// How many receive loops have been entered.
    pub fn loops_started(&self) -> usize {
        self.loops_started.load(Ordering::SeqCst)
    }

    /// How many receive loops are running right now.
    pub fn loops_running(&self) -> usize {
        self.loops_running.load(Ordering::SeqCst)
    }
}

/// Decrements the running-loop count however the loop exits.
struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl OscConnection for MockConnection {
    fn params(&self) -> &ConnectionParams {
        &self.params
    }

    async fn send_message(&self, msg: &OscMessage) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Transport("mock send failure".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(msg.clone());
        }
        Ok(())
    }

    async fn receive_messages(
        &self,
        sink: mpsc::Sender<OscMessage>,
        cancel: CancellationToken,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if self.fail_receive.load(Ordering::SeqCst) {
            return Err(Error::Transport("mock receive failure".into()));
        }
        self.loops_started.fetch_add(1, Ordering::SeqCst);
        self.loops_running.fetch_add(1, Ordering::SeqCst);
        let _running = RunningGuard(&self.loops_running);

        let mut inbound = self.inbound_rx.lock().await;
        loop {
            let msg = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.shutdown.cancelled() => break,
                msg = inbound.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.shutdown.cancelled() => break,
                sent = sink.send(msg) => sent.map_err(|_| Error::StreamClosed)?,
            }
        }
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shutdown.cancel();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn params() -> ConnectionParams {
        ConnectionParams::new("127.0.0.1", 3819, 8000)
    }

    #[tokio::test]
    async fn records_sends() {
        let conn = MockConnection::new(params());
        let msg = OscMessage::new("/transport_stop").unwrap();
        conn.send_message(&msg).await.unwrap();
        assert_eq!(conn.sent(), vec![msg]);
    }

    #[tokio::test]
    async fn injected_messages_reach_sink() {
        let conn = MockConnection::new(params());
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        let task = {
            let conn = Arc::clone(&conn);
            let cancel = cancel.clone();
            tokio::spawn(async move { conn.receive_messages(tx, cancel).await })
        };

        let msg = OscMessage::new("/rec_enable_toggle").unwrap().with_arg(1);
        conn.inject(msg.clone());
        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, msg);
        assert_eq!(conn.loops_running(), 1);

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(conn.loops_running(), 0);
        assert_eq!(conn.loops_started(), 1);
    }

    #[tokio::test]
    async fn close_rejects_sends() {
        let conn = MockConnection::new(params());
        conn.close().await;
        let msg = OscMessage::new("/goto_end").unwrap();
        assert!(matches!(conn.send_message(&msg).await, Err(Error::Closed)));
    }
}
