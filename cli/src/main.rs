// flexosc command-line remote -- send OSC messages to a DAW, press
// transport buttons and watch what the DAW sends back.
//
// Usage:
//   flexosc controls
//   flexosc --host 192.168.1.20 press play
//   flexosc send /transport_play
//   flexosc send /set_transport_speed f:0.5
//   flexosc send /marker_name i:3 s:"Verse 2"
//   flexosc --rcv-port 8000 listen --address /transport_play
//   flexosc --params "studio.local:↑3819:↓8000" listen --duration 30
//   flexosc -v --timeout-ms 250 watch rec

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flexosc::{
    ConnectionParams, ControlSurface, OscAtomic, OscMessage, Subscription, TransportOptions,
    default_transport_controls,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// flexosc -- remote-control a DAW transport over OSC.
#[derive(Parser)]
#[command(name = "flexosc", version, about)]
struct Cli {
    /// DAW host name or IP address.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// UDP port the DAW listens on.
    #[arg(long, default_value_t = 3819)]
    send_port: u16,

    /// Local UDP port the DAW sends feedback to.
    #[arg(long, default_value_t = 8000)]
    rcv_port: u16,

    /// All three at once, as `host:↑send:↓rcv` or `host:send:rcv`.
    /// Overrides --host, --send-port and --rcv-port.
    #[arg(long)]
    params: Option<ConnectionParams>,

    /// Receive poll interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Log debug output (RUST_LOG overrides).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the default transport controls.
    Controls,

    /// Send one OSC message.
    ///
    /// Arguments are `i:<int>`, `f:<float>`, `s:<text>` or `b:<hex>`.
    /// Untyped arguments are read as int, then float, then string.
    Send {
        /// OSC address, e.g. /transport_play.
        address: String,
        /// Message arguments.
        args: Vec<String>,
    },

    /// Click a default transport control by name (see `controls`).
    Press {
        control: String,
    },

    /// Print messages received from the DAW.
    Listen {
        /// Only print messages sent to this address.
        #[arg(long)]
        address: Option<String>,

        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Follow the LED of a default control (play or rec).
    Watch {
        control: String,

        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },
}

// ---------------------------------------------------------------------------
// Argument parsing helpers
// ---------------------------------------------------------------------------

/// Parse one command-line argument into an OSC atomic.
fn parse_arg(raw: &str) -> Result<OscAtomic> {
    if let Some((tag, value)) = raw.split_once(':') {
        match tag {
            "i" => {
                let v: i32 = value.parse().with_context(|| format!("bad int: {value}"))?;
                return Ok(v.into());
            }
            "f" => {
                let v: f32 = value.parse().with_context(|| format!("bad float: {value}"))?;
                return Ok(v.into());
            }
            "s" => return Ok(OscAtomic::try_from(value)?),
            "b" => return Ok(parse_hex(value)?.into()),
            _ => {}
        }
    }

    if let Ok(v) = raw.parse::<i32>() {
        return Ok(v.into());
    }
    if let Ok(v) = raw.parse::<f32>() {
        return Ok(v.into());
    }
    Ok(OscAtomic::try_from(raw)?)
}

/// Parse a hex string like "0a0b0c" into bytes.
fn parse_hex(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        bail!("hex blob must have an even number of digits: {s}");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .with_context(|| format!("invalid hex blob: {s}"))
        })
        .collect()
}

fn connection_params(cli: &Cli) -> ConnectionParams {
    cli.params
        .clone()
        .unwrap_or_else(|| ConnectionParams::new(cli.host.clone(), cli.send_port, cli.rcv_port))
}

async fn connect(cli: &Cli) -> Result<ControlSurface> {
    let options = TransportOptions {
        receive_timeout: Duration::from_millis(cli.timeout_ms),
        ..TransportOptions::default()
    };
    options.validate()?;

    let surface = ControlSurface::with_options(options);
    for control in default_transport_controls() {
        surface.add_control(control)?;
    }

    let params = connection_params(cli);
    surface
        .set_params(params.clone())
        .await
        .with_context(|| format!("failed to connect to {params}"))?;
    Ok(surface)
}

/// `None` means run until Ctrl-C.
fn deadline(duration_secs: u64) -> Option<tokio::time::Instant> {
    (duration_secs > 0).then(|| tokio::time::Instant::now() + Duration::from_secs(duration_secs))
}

/// Resolves at the deadline, or never.
async fn until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(dl) => tokio::time::sleep_until(dl).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_controls() -> Result<()> {
    println!("{:<12} {:<8} {:<6} {:<20} Receives", "Name", "Cell", "Icon", "Sends");
    println!("{:-<12} {:-<8} {:-<6} {:-<20} {:-<20}", "", "", "", "", "");
    for control in default_transport_controls() {
        println!(
            "{:<12} {:<8} {:<6} {:<20} {}",
            control.name,
            control.position.to_string(),
            control.icon.to_string(),
            control.send_address(),
            control.rcv_address().unwrap_or("-"),
        );
    }
    Ok(())
}

async fn cmd_send(surface: &ControlSurface, address: &str, raw_args: &[String]) -> Result<()> {
    let args = raw_args
        .iter()
        .map(|a| parse_arg(a))
        .collect::<Result<Vec<_>>>()?;
    let msg = OscMessage::new(address)?.with_args(args);
    surface.send_message(&msg).await?;
    println!("Sent {msg}");
    Ok(())
}

async fn cmd_press(surface: &ControlSurface, name: &str) -> Result<()> {
    let Some(control) = surface.control(name) else {
        bail!("no control named {name:?}; run `flexosc controls` for the list");
    };
    surface.click(name).await?;
    println!("Pressed {} ({})", control.name, control.send_address());
    Ok(())
}

async fn cmd_listen(mut sub: Subscription, duration_secs: u64) -> Result<()> {
    match sub.address() {
        Some(address) => println!("Listening for {address} (Ctrl-C to stop)..."),
        None => println!("Listening for all messages (Ctrl-C to stop)..."),
    }

    let deadline = deadline(duration_secs);
    loop {
        tokio::select! {
            _ = until(deadline) => {
                println!("Listen duration elapsed.");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
            msg = sub.recv() => println!("{}", msg?),
        }
    }

    sub.unsubscribe().await;
    Ok(())
}

async fn cmd_watch(surface: &ControlSurface, name: &str, duration_secs: u64) -> Result<()> {
    let mut led = surface.led_state(name)?;
    println!("Watching {name} (Ctrl-C to stop)...");

    let deadline = deadline(duration_secs);
    loop {
        tokio::select! {
            _ = until(deadline) => {
                println!("Watch duration elapsed.");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
            state = led.changed() => match state? {
                Some(true) => println!("{name}: on"),
                Some(false) => println!("{name}: off"),
                None => println!("{name}: unknown"),
            },
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("flexosc={default_level},warn"))),
        )
        .with_writer(std::io::stderr)
        .init();

    // `controls` does not need a connection.
    if matches!(cli.command, Command::Controls) {
        return cmd_controls();
    }

    let surface = connect(&cli).await?;

    let result = match &cli.command {
        Command::Send { address, args } => cmd_send(&surface, address, args).await,
        Command::Press { control } => cmd_press(&surface, control).await,
        Command::Listen { address, duration } => {
            let sub = match address {
                Some(address) => surface.subscribe(address.clone()),
                None => surface.subscribe_all(),
            };
            cmd_listen(sub, *duration).await
        }
        Command::Watch { control, duration } => cmd_watch(&surface, control, *duration).await,
        Command::Controls => unreachable!("controls handled above"),
    };

    surface.disconnect().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_args() {
        assert_eq!(parse_arg("i:42").unwrap(), OscAtomic::Int32(42));
        assert_eq!(parse_arg("f:0.5").unwrap(), OscAtomic::Float32(0.5));
        assert_eq!(parse_arg("s:12").unwrap().as_str(), Some("12"));
        assert_eq!(parse_arg("b:0a0B").unwrap(), OscAtomic::Blob(vec![0x0a, 0x0b]));
    }

    #[test]
    fn untyped_args_are_inferred() {
        assert_eq!(parse_arg("-3").unwrap(), OscAtomic::Int32(-3));
        assert_eq!(parse_arg("1.25").unwrap(), OscAtomic::Float32(1.25));
        assert_eq!(parse_arg("Verse 2").unwrap().as_str(), Some("Verse 2"));
        assert_eq!(parse_arg("x:y").unwrap().as_str(), Some("x:y"));
    }

    #[test]
    fn bad_args_are_rejected() {
        assert!(parse_arg("i:forty").is_err());
        assert!(parse_arg("b:abc").is_err());
        assert!(parse_arg("b:zz").is_err());
        assert!(parse_arg("s:café").is_err());
    }

    #[test]
    fn params_flag_overrides_individual_flags() {
        let cli = Cli::parse_from([
            "flexosc",
            "--host",
            "ignored",
            "--params",
            "studio.local:↑3819:↓9000",
            "controls",
        ]);
        assert_eq!(
            connection_params(&cli),
            ConnectionParams::new("studio.local", 3819, 9000)
        );

        let cli = Cli::parse_from(["flexosc", "--rcv-port", "8100", "controls"]);
        assert_eq!(
            connection_params(&cli),
            ConnectionParams::new("127.0.0.1", 3819, 8100)
        );
    }
}
