//! Watch the play and record LEDs of a DAW.
//!
//! Connects the default transport surface to a DAW on this machine and
//! prints every change of the play and record-enable states for 60
//! seconds. Toggle play or record in the DAW to see them.
//!
//! # Requirements
//!
//! - A DAW with OSC enabled, listening on UDP 3819 (Ardour's default) and
//!   sending feedback to UDP 8000
//!
//! # Usage
//!
//! ```sh
//! cargo run -p flexosc --example monitor_transport
//! ```

use std::time::Duration;

use flexosc::{ConnectionParams, ControlSurface};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let params = ConnectionParams::new("127.0.0.1", 3819, 8000);
    println!("Connecting to {}...", params);

    let surface = ControlSurface::with_default_controls();
    surface.set_params(params).await?;

    let mut play = surface.led_state("play")?;
    let mut rec = surface.led_state("rec")?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(remaining) => break,
            state = play.changed() => println!("play: {}", describe(state?)),
            state = rec.changed() => println!("rec:  {}", describe(state?)),
        }
    }

    surface.disconnect().await;
    Ok(())
}

fn describe(state: Option<bool>) -> &'static str {
    match state {
        Some(true) => "on",
        Some(false) => "off",
        None => "unknown",
    }
}
