//! Inbound message fan-out.
//!
//! A [`MessageStream`] turns the single receive loop of an
//! [`OscConnection`] into any number of [`Subscription`]s, each optionally
//! filtered on an OSC address.
//!
//! ```text
//!  receive loop --mpsc(64)--> forward task --mpsc(64)--> Subscription (/transport_play)
//!                                         \--mpsc(64)--> Subscription (/rec_enable_toggle)
//!                                         \--mpsc(64)--> Subscription (all)
//! ```
//!
//! The receive loop runs only while at least one subscription exists: the
//! first subscriber starts it, the last one to go away cancels it. A
//! subscriber sees messages received after it subscribed, never earlier
//! ones. Every interested subscriber gets the same `Arc<OscMessage>`.
//!
//! Nothing is dropped on the way. The forward task waits for room in every
//! matching subscriber's queue before taking the next message, so a slow
//! subscriber stalls the forward task, the loop's queue fills up, and the
//! loop stops reading the socket until the subscriber catches up.
//!
//! If the receive loop fails (the receive port is taken, say), the next
//! [`recv`](Subscription::recv) of every subscriber returns the error and the
//! stream stops receiving. Subscribing again or attaching a connection
//! retries.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use flexosc_core::error::{Error, Result};
use flexosc_core::options::DEFAULT_CHANNEL_CAPACITY;
use flexosc_proto::OscMessage;
use flexosc_transport::OscConnection;

/// Multi-subscriber view of a connection's inbound messages.
///
/// Cloning gives another handle to the same stream. The connection can be
/// swapped with [`attach`](Self::attach) / [`detach`](Self::detach) without
/// disturbing existing subscriptions.
#[derive(Clone)]
pub struct MessageStream {
    shared: Arc<Shared>,
}

struct Shared {
    /// Capacity of the loop's queue and of each subscriber's queue.
    channel_capacity: usize,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    connection: Option<Arc<dyn OscConnection>>,
    subscribers: Vec<Subscriber>,
    receiver: Option<ReceiveTask>,
    next_id: u64,
}

struct Subscriber {
    id: u64,
    filter: Option<String>,
    queue: mpsc::Sender<Delivery>,
}

impl Subscriber {
    fn wants(&self, msg: &OscMessage) -> bool {
        match &self.filter {
            Some(address) => msg.address() == address,
            None => true,
        }
    }
}

/// What a subscriber's queue carries.
enum Delivery {
    Message(Arc<OscMessage>),
    /// The receive loop ended with this error.
    Failed(String),
}

/// The running receive loop, driven by its forwarding task.
struct ReceiveTask {
    id: u64,
    cancel: CancellationToken,
    forward: JoinHandle<()>,
}

impl ReceiveTask {
    fn spawn(shared: Arc<Shared>, id: u64, connection: Arc<dyn OscConnection>) -> Self {
        let cancel = CancellationToken::new();
        let (sink, mut inbound) = mpsc::channel(shared.channel_capacity);

        tracing::debug!(params = %connection.params(), "Starting OSC receive task");

        let receive = {
            let cancel = cancel.clone();
            let connection = Arc::clone(&connection);
            tokio::spawn(async move { connection.receive_messages(sink, cancel).await })
        };

        let forward = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let msg = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        msg = inbound.recv() => match msg {
                            Some(msg) => msg,
                            // The loop ended and dropped its sink.
                            None => break,
                        },
                    };
                    if !shared.deliver(Arc::new(msg), &cancel).await {
                        break;
                    }
                }
                drop(inbound);

                match receive.await {
                    Ok(Ok(())) => {
                        tracing::debug!(params = %connection.params(), "OSC receive task stopped")
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(
                            params = %connection.params(),
                            error = %e,
                            "OSC receive task ended with error"
                        );
                        shared.fail(id, e).await;
                    }
                    Err(e) => tracing::error!(error = %e, "OSC receive task panicked"),
                }
            })
        };

        Self {
            id,
            cancel,
            forward,
        }
    }

    /// Cancel and wait for the loop and the forwarding task to finish.
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.forward.await {
            tracing::error!(error = %e, "OSC forward task panicked");
        }
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the receive task if there are subscribers, a connection and no
    /// task yet.
    fn start_if_needed(self: &Arc<Self>, state: &mut State) {
        if state.receiver.is_some() || state.subscribers.is_empty() {
            return;
        }
        let Some(connection) = state.connection.clone() else {
            return;
        };
        state.next_id += 1;
        state.receiver = Some(ReceiveTask::spawn(Arc::clone(self), state.next_id, connection));
    }

    /// Drop subscriber `id`; hands back the receive task if it was the last.
    fn release(&self, id: u64) -> Option<ReceiveTask> {
        let mut state = self.state();
        state.subscribers.retain(|s| s.id != id);
        if state.subscribers.is_empty() {
            state.receiver.take()
        } else {
            None
        }
    }

    /// Hand `msg` to every subscriber that wants it, waiting for room.
    ///
    /// Returns `false` if cancelled while waiting.
    async fn deliver(&self, msg: Arc<OscMessage>, cancel: &CancellationToken) -> bool {
        let queues: Vec<_> = self
            .state()
            .subscribers
            .iter()
            .filter(|s| s.wants(&msg))
            .map(|s| s.queue.clone())
            .collect();

        for queue in queues {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                // A subscriber that left meanwhile is skipped.
                _ = queue.send(Delivery::Message(Arc::clone(&msg))) => {}
            }
        }
        true
    }

    /// Receive task `id` ended with `error`: mark the stream as not
    /// receiving and tell every subscriber.
    async fn fail(&self, id: u64, error: Error) {
        let queues: Vec<_> = {
            let mut state = self.state();
            if state.receiver.as_ref().is_none_or(|r| r.id != id) {
                // Stopped or replaced meanwhile.
                return;
            }
            state.receiver = None;
            state.subscribers.iter().map(|s| s.queue.clone()).collect()
        };

        let reason = format!("OSC receive loop failed: {}", error);
        for queue in queues {
            let _ = queue.send(Delivery::Failed(reason.clone())).await;
        }
    }
}

impl MessageStream {
    /// A stream with no connection and the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// A stream whose receive loop and subscribers each buffer up to
    /// `channel_capacity` messages.
    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                channel_capacity: channel_capacity.max(1),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Subscribe to messages whose address equals `address`.
    ///
    /// Starts the receive loop if none is running and a connection is
    /// attached. Must be called from within a Tokio runtime.
    pub fn subscribe(&self, address: impl Into<String>) -> Subscription {
        self.add_subscriber(Some(address.into()))
    }

    /// Subscribe to every inbound message.
    pub fn subscribe_all(&self) -> Subscription {
        self.add_subscriber(None)
    }

    fn add_subscriber(&self, filter: Option<String>) -> Subscription {
        let (queue_tx, queue) = mpsc::channel(self.shared.channel_capacity);

        let mut state = self.shared.state();
        state.next_id += 1;
        let id = state.next_id;
        state.subscribers.push(Subscriber {
            id,
            filter: filter.clone(),
            queue: queue_tx,
        });
        self.shared.start_if_needed(&mut state);

        tracing::trace!(
            address = filter.as_deref().unwrap_or("*"),
            subscribers = state.subscribers.len(),
            "Subscribed to OSC messages"
        );

        Subscription {
            id,
            filter,
            queue,
            shared: Arc::clone(&self.shared),
            active: true,
        }
    }

    /// Attach `connection`, stopping the loop of any previous one.
    ///
    /// Returns the previous connection, which is not closed. Receiving
    /// starts right away if there are subscribers.
    pub async fn attach(
        &self,
        connection: Arc<dyn OscConnection>,
    ) -> Option<Arc<dyn OscConnection>> {
        let (previous, stopped) = {
            let mut state = self.shared.state();
            let stopped = state.receiver.take();
            let previous = state.connection.replace(connection);
            (previous, stopped)
        };
        if let Some(task) = stopped {
            task.stop().await;
        }

        // A concurrent subscribe may already have started a loop on the new
        // connection while the old one was stopping.
        let mut state = self.shared.state();
        self.shared.start_if_needed(&mut state);
        previous
    }

    /// Stop receiving and remove the connection, returning it unclosed.
    ///
    /// Subscriptions stay valid and resume on the next [`attach`](Self::attach).
    pub async fn detach(&self) -> Option<Arc<dyn OscConnection>> {
        let (previous, stopped) = {
            let mut state = self.shared.state();
            (state.connection.take(), state.receiver.take())
        };
        if let Some(task) = stopped {
            task.stop().await;
        }
        previous
    }

    /// The attached connection, if any.
    pub fn connection(&self) -> Option<Arc<dyn OscConnection>> {
        self.shared.state().connection.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.state().subscribers.len()
    }

    /// Whether a receive loop is currently running.
    pub fn is_receiving(&self) -> bool {
        self.shared.state().receiver.is_some()
    }
}

impl Default for MessageStream {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state();
        f.debug_struct("MessageStream")
            .field("connected", &state.connection.is_some())
            .field("subscribers", &state.subscribers.len())
            .field("receiving", &state.receiver.is_some())
            .finish()
    }
}

/// One subscriber's view of a [`MessageStream`].
///
/// Messages queue up until [`recv`](Self::recv) takes them; while the queue
/// is full the receive loop waits. Dropping the subscription unsubscribes
/// and cancels the receive loop (without waiting) if it was the last one.
/// Use [`unsubscribe`](Self::unsubscribe) to also wait for the loop to
/// finish.
pub struct Subscription {
    id: u64,
    filter: Option<String>,
    queue: mpsc::Receiver<Delivery>,
    shared: Arc<Shared>,
    active: bool,
}

impl Subscription {
    /// The address this subscription is filtered on, `None` for all.
    pub fn address(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Wait for the next matching message.
    ///
    /// Waits across connection changes. Returns [`Error::Transport`] once
    /// if the receive loop fails; the subscription stays valid and receives
    /// again when a loop is restarted.
    pub async fn recv(&mut self) -> Result<Arc<OscMessage>> {
        match self.queue.recv().await {
            Some(Delivery::Message(msg)) => Ok(msg),
            Some(Delivery::Failed(reason)) => Err(Error::Transport(reason)),
            None => Err(Error::StreamClosed),
        }
    }

    /// Unsubscribe, waiting for the receive loop to stop if this was the
    /// last subscriber.
    pub async fn unsubscribe(mut self) {
        self.active = false;
        if let Some(task) = self.shared.release(self.id) {
            task.stop().await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Some(task) = self.shared.release(self.id) {
            // The tasks exit promptly once cancelled.
            task.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("address", &self.filter)
            .finish()
    }
}
