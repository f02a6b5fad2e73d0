//! ControlSurface -- the controls, the current connection and its inbound
//! stream, in one place.
//!
//! The surface owns at most one connection at a time. Changing the
//! connection parameters stops receiving, closes the old connection, opens
//! a new one and resumes receiving if anyone is subscribed. Subscriptions
//! and LED states survive the change.
//!
//! # Example
//!
//! ```no_run
//! use flexosc_core::ConnectionParams;
//! use flexosc_surface::ControlSurface;
//!
//! # async fn example() -> flexosc_core::Result<()> {
//! let surface = ControlSurface::with_default_controls();
//! surface.set_params(ConnectionParams::new("127.0.0.1", 3819, 8000)).await?;
//!
//! let mut rec = surface.led_state("rec")?;
//! surface.click("rec").await?;
//! println!("rec enabled: {:?}", rec.changed().await?);
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use flexosc_core::error::{Error, Result};
use flexosc_core::{ConnectionParams, TransportOptions};
use flexosc_proto::OscMessage;
use flexosc_transport::{OscConnection, UdpConnectionBuilder};

use crate::control::{Control, LedState, default_transport_controls};
use crate::stream::{MessageStream, Subscription};

const EVENT_CAPACITY: usize = 64;

/// Changes to a surface, for whoever renders it.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    ControlAdded(Control),
    /// Name of the removed control.
    ControlRemoved(String),
    ParamsChanged(ConnectionParams),
}

/// A grid of controls talking to one DAW.
pub struct ControlSurface {
    options: TransportOptions,
    stream: MessageStream,
    controls: Mutex<Vec<Control>>,
    events: broadcast::Sender<SurfaceEvent>,

    /// Serializes connection changes.
    reconnect: tokio::sync::Mutex<()>,
}

impl ControlSurface {
    /// An empty surface with default transport options.
    pub fn new() -> Self {
        Self::with_options(TransportOptions::default())
    }

    /// An empty surface whose connections use `options`.
    pub fn with_options(options: TransportOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            stream: MessageStream::with_capacity(options.channel_capacity),
            options,
            controls: Mutex::new(Vec::new()),
            events,
            reconnect: tokio::sync::Mutex::new(()),
        }
    }

    /// A surface holding [`default_transport_controls`].
    pub fn with_default_controls() -> Self {
        let surface = Self::new();
        surface.lock_controls().extend(default_transport_controls());
        surface
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    fn lock_controls(&self) -> MutexGuard<'_, Vec<Control>> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Connect to the DAW described by `params`, replacing any current
    /// connection.
    ///
    /// The old connection is closed before the new one is opened. If
    /// opening fails the surface is left without a connection and the
    /// error is returned.
    pub async fn set_params(&self, params: ConnectionParams) -> Result<()> {
        let _guard = self.reconnect.lock().await;

        self.disconnect_locked().await;

        let connection = UdpConnectionBuilder::new(params.clone())
            .options(self.options.clone())
            .build()
            .await
            .map_err(|e| {
                tracing::warn!(params = %params, error = %e, "Failed to open OSC connection");
                e
            })?;

        self.install(Arc::new(connection)).await;
        Ok(())
    }

    /// Use an already opened connection, closing the current one first.
    pub async fn set_connection(&self, connection: Arc<dyn OscConnection>) {
        let _guard = self.reconnect.lock().await;
        self.disconnect_locked().await;
        self.install(connection).await;
    }

    async fn install(&self, connection: Arc<dyn OscConnection>) {
        let params = connection.params().clone();
        tracing::info!(params = %params, "Control surface connected");
        self.stream.attach(connection).await;
        let _ = self.events.send(SurfaceEvent::ParamsChanged(params));
    }

    async fn disconnect_locked(&self) {
        if let Some(old) = self.stream.detach().await {
            tracing::debug!(params = %old.params(), "Closing previous OSC connection");
            old.close().await;
        }
    }

    /// Stop receiving and close the current connection, if any.
    pub async fn disconnect(&self) {
        let _guard = self.reconnect.lock().await;
        self.disconnect_locked().await;
    }

    /// Parameters of the current connection.
    pub fn params(&self) -> Option<ConnectionParams> {
        self.stream.connection().map(|c| c.params().clone())
    }

    pub fn is_connected(&self) -> bool {
        self.stream.connection().is_some()
    }

    /// Send `msg` on the current connection.
    ///
    /// Returns [`Error::NotConnected`] if no connection is configured.
    pub async fn send_message(&self, msg: &OscMessage) -> Result<()> {
        let connection = self.stream.connection().ok_or(Error::NotConnected)?;
        connection.send_message(msg).await
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Messages arriving on `address`.
    pub fn subscribe(&self, address: impl Into<String>) -> Subscription {
        self.stream.subscribe(address)
    }

    /// Every inbound message.
    pub fn subscribe_all(&self) -> Subscription {
        self.stream.subscribe_all()
    }

    pub fn stream(&self) -> &MessageStream {
        &self.stream
    }

    /// Surface change notifications.
    pub fn events(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Controls
    // ------------------------------------------------------------------

    /// Add a control. Names must be unique on a surface.
    pub fn add_control(&self, control: Control) -> Result<()> {
        {
            let mut controls = self.lock_controls();
            if controls.iter().any(|c| c.name == control.name) {
                return Err(Error::InvalidParameter(format!(
                    "duplicate control name: {}",
                    control.name
                )));
            }
            controls.push(control.clone());
        }
        tracing::debug!(control = %control, "Control added");
        let _ = self.events.send(SurfaceEvent::ControlAdded(control));
        Ok(())
    }

    /// Remove the control called `name`, returning it.
    pub fn remove_control(&self, name: &str) -> Option<Control> {
        let removed = {
            let mut controls = self.lock_controls();
            let index = controls.iter().position(|c| c.name == name)?;
            controls.remove(index)
        };
        tracing::debug!(control = %removed, "Control removed");
        let _ = self.events.send(SurfaceEvent::ControlRemoved(removed.name.clone()));
        Some(removed)
    }

    pub fn controls(&self) -> Vec<Control> {
        self.lock_controls().clone()
    }

    pub fn control(&self, name: &str) -> Option<Control> {
        self.lock_controls().iter().find(|c| c.name == name).cloned()
    }

    fn require_control(&self, name: &str) -> Result<Control> {
        self.control(name)
            .ok_or_else(|| Error::InvalidParameter(format!("no control named {}", name)))
    }

    /// Click the control called `name`.
    pub async fn click(&self, name: &str) -> Result<()> {
        let control = self.require_control(name)?;
        let msg = control.click_message()?;
        tracing::debug!(control = %control.name, address = %msg.address, "Click");
        self.send_message(&msg).await
    }

    /// Track the LED of the control called `name`.
    ///
    /// Fails with [`Error::InvalidParameter`] if there is no such control
    /// or it has no LED.
    pub fn led_state(&self, name: &str) -> Result<LedState> {
        let control = self.require_control(name)?;
        let address = control.rcv_address().ok_or_else(|| {
            Error::InvalidParameter(format!("control {} has no LED", name))
        })?;
        Ok(LedState::spawn(self.stream.subscribe(address)))
    }
}

impl Default for ControlSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ControlSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlSurface")
            .field("params", &self.params())
            .field("controls", &self.lock_controls().len())
            .field("stream", &self.stream)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{Icon, Position};
    use flexosc_test_harness::MockConnection;
    use std::time::Duration;

    fn params(rcv_port: u16) -> ConnectionParams {
        ConnectionParams::new("127.0.0.1", 3819, rcv_port)
    }

    async fn next_event(rx: &mut broadcast::Receiver<SurfaceEvent>) -> SurfaceEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn send_without_connection_is_not_connected() {
        let surface = ControlSurface::with_default_controls();
        let msg = OscMessage::new("/transport_play").unwrap();
        assert!(matches!(surface.send_message(&msg).await, Err(Error::NotConnected)));
        assert!(matches!(surface.click("play").await, Err(Error::NotConnected)));
        assert!(!surface.is_connected());
        assert!(surface.params().is_none());
    }

    #[tokio::test]
    async fn click_sends_no_arg_message() {
        let surface = ControlSurface::with_default_controls();
        let conn = MockConnection::new(params(8000));
        surface.set_connection(conn.clone()).await;

        surface.click("stop").await.unwrap();
        surface.click("next").await.unwrap();

        let sent: Vec<_> = conn.sent().iter().map(|m| m.to_string()).collect();
        assert_eq!(
            sent,
            vec!["OscMessage(/transport_stop)", "OscMessage(/next_marker)"]
        );
    }

    #[tokio::test]
    async fn click_unknown_control_is_invalid_parameter() {
        let surface = ControlSurface::new();
        surface.set_connection(MockConnection::new(params(8000))).await;
        assert!(matches!(surface.click("play").await, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn send_errors_reach_the_caller() {
        let surface = ControlSurface::new();
        let conn = MockConnection::new(params(8000));
        surface.set_connection(conn.clone()).await;

        conn.set_fail_sends(true);
        let msg = OscMessage::new("/goto_start").unwrap();
        assert!(matches!(surface.send_message(&msg).await, Err(Error::Transport(_))));

        conn.set_fail_sends(false);
        surface.send_message(&msg).await.unwrap();
    }

    #[tokio::test]
    async fn set_connection_closes_previous_and_keeps_subscribers() {
        let surface = ControlSurface::new();
        let old = MockConnection::new(params(8000));
        let new = MockConnection::new(params(8001));
        let mut events = surface.events();

        surface.set_connection(old.clone()).await;
        assert_eq!(next_event(&mut events).await, SurfaceEvent::ParamsChanged(params(8000)));

        let mut sub = surface.subscribe("/transport_play");
        surface.set_connection(new.clone()).await;
        assert_eq!(next_event(&mut events).await, SurfaceEvent::ParamsChanged(params(8001)));

        assert!(old.is_closed());
        assert!(!new.is_closed());
        assert_eq!(old.loops_running(), 0);
        assert_eq!(surface.params(), Some(params(8001)));

        new.inject(OscMessage::new("/transport_play").unwrap().with_arg(1));
        let msg = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.single_bool(), Some(true));
    }

    #[tokio::test]
    async fn disconnect_closes_connection() {
        let surface = ControlSurface::new();
        let conn = MockConnection::new(params(8000));
        surface.set_connection(conn.clone()).await;

        surface.disconnect().await;
        assert!(conn.is_closed());
        assert!(!surface.is_connected());
    }

    #[tokio::test]
    async fn set_params_failure_leaves_surface_disconnected() {
        let surface = ControlSurface::new();
        let conn = MockConnection::new(params(8000));
        surface.set_connection(conn.clone()).await;

        let result = surface
            .set_params(ConnectionParams::new("daw.invalid", 3819, 8000))
            .await;
        assert!(matches!(result, Err(Error::HostResolution(_))));
        assert!(conn.is_closed(), "old connection closed before opening");
        assert!(!surface.is_connected());
    }

    #[tokio::test]
    async fn control_add_and_remove_are_announced() {
        let surface = ControlSurface::new();
        let mut events = surface.events();

        let loop_button = Control::button("loop", "/loop_toggle", Icon::Unknown, Position::new(6, 0));
        surface.add_control(loop_button.clone()).unwrap();
        assert_eq!(next_event(&mut events).await, SurfaceEvent::ControlAdded(loop_button.clone()));

        let dup = surface.add_control(loop_button.clone());
        assert!(matches!(dup, Err(Error::InvalidParameter(_))));

        assert_eq!(surface.control("loop"), Some(loop_button.clone()));
        assert_eq!(surface.remove_control("loop"), Some(loop_button));
        assert_eq!(
            next_event(&mut events).await,
            SurfaceEvent::ControlRemoved("loop".into())
        );
        assert!(surface.remove_control("loop").is_none());
        assert!(surface.controls().is_empty());
    }

    #[tokio::test]
    async fn led_state_requires_led_control() {
        let surface = ControlSurface::with_default_controls();
        assert!(matches!(surface.led_state("stop"), Err(Error::InvalidParameter(_))));
        assert!(matches!(surface.led_state("nope"), Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn led_state_tracks_daw_feedback() {
        let surface = ControlSurface::with_default_controls();
        let conn = MockConnection::new(params(8000));
        surface.set_connection(conn.clone()).await;

        let mut play = surface.led_state("play").unwrap();
        conn.inject(OscMessage::new("/transport_play").unwrap().with_arg(1));

        let on = tokio::time::timeout(Duration::from_secs(2), play.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(on, Some(true));
    }
}
