//! Controls placed on a surface.
//!
//! A [`Control`] is a named button on a grid. Clicking it sends an OSC
//! message with no arguments to its send address. An LED button also
//! listens on a receive address and lights up according to the first
//! integer argument of the messages arriving there (see
//! [`OscMessage::single_bool`]).

use std::fmt;
use std::str::FromStr;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use flexosc_core::error::{Error, Result};
use flexosc_proto::OscMessage;

use crate::stream::Subscription;

/// Icon shown on a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Icon {
    #[default]
    Unknown,
    Play,
    Stop,
    Rec,
    StopTrash,
    Add,
    Rem,
    Start,
    End,
    Prev,
    Next,
}

impl Icon {
    pub const ALL: [Icon; 11] = [
        Icon::Unknown,
        Icon::Play,
        Icon::Stop,
        Icon::Rec,
        Icon::StopTrash,
        Icon::Add,
        Icon::Rem,
        Icon::Start,
        Icon::End,
        Icon::Prev,
        Icon::Next,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Icon::Unknown => "unknown",
            Icon::Play => "play",
            Icon::Stop => "stop",
            Icon::Rec => "rec",
            Icon::StopTrash => "stop-trash",
            Icon::Add => "add",
            Icon::Rem => "rem",
            Icon::Start => "start",
            Icon::End => "end",
            Icon::Prev => "prev",
            Icon::Next => "next",
        }
    }
}

impl fmt::Display for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Icon {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Icon::ALL
            .iter()
            .find(|icon| icon.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| Error::InvalidParameter(format!("unknown icon: {}", s)))
    }
}

/// Grid cell of a control, column first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Position {
    pub col: u16,
    pub row: u16,
}

impl Position {
    pub const fn new(col: u16, row: u16) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// What a control does on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    /// Sends to `send_address` when clicked.
    Button { send_address: String },
    /// Sends like a button and shows the state reported on `rcv_address`.
    LedButton {
        send_address: String,
        rcv_address: String,
    },
}

/// A control on the surface grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub name: String,
    pub icon: Icon,
    pub position: Position,
    pub kind: ControlKind,
}

impl Control {
    pub fn button(
        name: impl Into<String>,
        send_address: impl Into<String>,
        icon: Icon,
        position: Position,
    ) -> Self {
        Self {
            name: name.into(),
            icon,
            position,
            kind: ControlKind::Button {
                send_address: send_address.into(),
            },
        }
    }

    /// An LED button sending and receiving on the same address.
    pub fn led_button(
        name: impl Into<String>,
        address: impl Into<String>,
        icon: Icon,
        position: Position,
    ) -> Self {
        let address = address.into();
        Self {
            name: name.into(),
            icon,
            position,
            kind: ControlKind::LedButton {
                send_address: address.clone(),
                rcv_address: address,
            },
        }
    }

    pub fn send_address(&self) -> &str {
        match &self.kind {
            ControlKind::Button { send_address } => send_address,
            ControlKind::LedButton { send_address, .. } => send_address,
        }
    }

    /// The address whose messages drive the LED, for LED buttons.
    pub fn rcv_address(&self) -> Option<&str> {
        match &self.kind {
            ControlKind::Button { .. } => None,
            ControlKind::LedButton { rcv_address, .. } => Some(rcv_address),
        }
    }

    /// The message a click sends.
    ///
    /// Fails with [`Error::Encoding`] if the send address is not ASCII.
    pub fn click_message(&self) -> Result<OscMessage> {
        OscMessage::new(self.send_address())
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ControlKind::Button { send_address } => {
                write!(f, "{} {} button -> {}", self.name, self.position, send_address)
            }
            ControlKind::LedButton {
                send_address,
                rcv_address,
            } => write!(
                f,
                "{} {} led -> {} <- {}",
                self.name, self.position, send_address, rcv_address
            ),
        }
    }
}

/// The DAW transport layout: play, stop, record, markers and locate.
pub fn default_transport_controls() -> Vec<Control> {
    vec![
        Control::led_button("play", "/transport_play", Icon::Play, Position::new(0, 0)),
        Control::button("stop", "/transport_stop", Icon::Stop, Position::new(1, 0)),
        Control::led_button("rec", "/rec_enable_toggle", Icon::Rec, Position::new(2, 0)),
        Control::button("stop-trash", "/stop_forget", Icon::StopTrash, Position::new(3, 0)),
        Control::button("add-marker", "/add_marker", Icon::Add, Position::new(4, 0)),
        Control::button("rem-marker", "/remove_marker", Icon::Rem, Position::new(5, 0)),
        Control::button("start", "/goto_start", Icon::Start, Position::new(0, 1)),
        Control::button("end", "/goto_end", Icon::End, Position::new(3, 1)),
        Control::button("prev", "/prev_marker", Icon::Prev, Position::new(1, 1)),
        Control::button("next", "/next_marker", Icon::Next, Position::new(2, 1)),
    ]
}

/// Live on/off state of an LED button.
///
/// `None` until the first message carrying an integer arrives. Messages
/// without a leading integer leave the state unchanged. Dropping the
/// `LedState` ends its subscription.
pub struct LedState {
    state: watch::Receiver<Option<bool>>,
    task: JoinHandle<()>,
}

impl LedState {
    /// Track the state reported on `subscription`.
    pub fn spawn(mut subscription: Subscription) -> Self {
        let (tx, state) = watch::channel(None);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    msg = subscription.recv() => match msg {
                        Ok(msg) => match msg.single_bool() {
                            Some(on) => {
                                tracing::trace!(address = %msg.address, on, "LED state");
                                tx.send_replace(Some(on));
                            }
                            None => {
                                tracing::debug!(message = %msg, "Ignoring LED message without integer argument");
                            }
                        },
                        Err(Error::StreamClosed) => break,
                        Err(e) => {
                            // The stream keeps the subscription and retries.
                            tracing::warn!(error = %e, "LED subscription interrupted");
                        }
                    },
                }
            }
        });
        Self { state, task }
    }

    /// The current state.
    pub fn get(&self) -> Option<bool> {
        *self.state.borrow()
    }

    /// Wait for the state to change and return the new value.
    pub async fn changed(&mut self) -> Result<Option<bool>> {
        self.state
            .changed()
            .await
            .map_err(|_| Error::StreamClosed)?;
        Ok(*self.state.borrow_and_update())
    }

    /// Another receiver of the same state.
    pub fn watch(&self) -> watch::Receiver<Option<bool>> {
        self.state.clone()
    }
}

impl Drop for LedState {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedState").field("state", &self.get()).finish()
    }
}
