//! End-to-end tests over loopback UDP: a control surface on one side, a
//! mock DAW on the other.

use std::time::Duration;

use flexosc::proto::OscAtomic;
use flexosc::transport::UdpSocketTransport;
use flexosc::{
    ConnectionParams, ControlSurface, Error, OscConnection, OscMessage, TransportOptions,
    UdpConnectionBuilder,
};
use flexosc_test_harness::MockOscPeer;

const WAIT: Duration = Duration::from_secs(2);

/// A loopback port nobody is bound to right now.
async fn free_port() -> u16 {
    UdpSocketTransport::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .port()
}

fn fast_options() -> TransportOptions {
    TransportOptions {
        receive_timeout: Duration::from_millis(50),
        ..TransportOptions::default()
    }
}

/// Surface connected to `daw`, receiving on a fresh port.
async fn surface_for(daw: &MockOscPeer) -> (ControlSurface, u16) {
    let rcv_port = free_port().await;
    let surface = ControlSurface::with_options(fast_options());
    for control in flexosc::default_transport_controls() {
        surface.add_control(control).unwrap();
    }
    surface
        .set_params(ConnectionParams::new("127.0.0.1", daw.port(), rcv_port))
        .await
        .unwrap();
    (surface, rcv_port)
}

/// Send from the DAW until the surface's receive loop has bound its port.
async fn send_until_received(
    daw: &MockOscPeer,
    rcv_port: u16,
    msg: &OscMessage,
    sub: &mut flexosc::Subscription,
) -> std::sync::Arc<OscMessage> {
    for _ in 0..40 {
        daw.send_to_port(msg, rcv_port).await.unwrap();
        if let Ok(got) = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await {
            return got.unwrap();
        }
    }
    panic!("surface never received {}", msg);
}

#[tokio::test]
async fn clicks_reach_the_daw() {
    let mut daw = MockOscPeer::new().await.unwrap();
    let (surface, _) = surface_for(&daw).await;

    for name in ["play", "stop", "add-marker", "end"] {
        surface.click(name).await.unwrap();
    }

    let mut addresses = Vec::new();
    for _ in 0..4 {
        let msg = daw.expect_message(WAIT).await.unwrap();
        assert!(msg.args.is_empty());
        addresses.push(msg.address().to_string());
    }
    assert_eq!(
        addresses,
        vec!["/transport_play", "/transport_stop", "/add_marker", "/goto_end"]
    );
}

#[tokio::test]
async fn arguments_survive_the_wire() {
    let mut daw = MockOscPeer::new().await.unwrap();
    let (surface, _) = surface_for(&daw).await;

    let msg = OscMessage::new("/set_transport_speed")
        .unwrap()
        .with_arg(42)
        .with_arg(53.4f32)
        .with_arg(OscAtomic::try_from("text").unwrap())
        .with_arg(vec![1u8, 2, 3, 4, 5, 6, 7]);
    surface.send_message(&msg).await.unwrap();

    assert_eq!(daw.expect_message(WAIT).await.unwrap(), msg);
}

#[tokio::test]
async fn daw_feedback_drives_led_state() {
    let daw = MockOscPeer::new().await.unwrap();
    let (surface, rcv_port) = surface_for(&daw).await;

    let mut first = surface.subscribe("/rec_enable_toggle");
    let mut rec = surface.led_state("rec").unwrap();

    let on = OscMessage::new("/rec_enable_toggle").unwrap().with_arg(1);
    send_until_received(&daw, rcv_port, &on, &mut first).await;

    let state = tokio::time::timeout(WAIT, async {
        loop {
            if rec.get() == Some(true) {
                return true;
            }
            if rec.changed().await.is_err() {
                return false;
            }
        }
    })
    .await
    .unwrap();
    assert!(state);
}

#[tokio::test]
async fn garbage_from_the_daw_does_not_stop_receiving() {
    let daw = MockOscPeer::new().await.unwrap();
    let (surface, rcv_port) = surface_for(&daw).await;
    let mut all = surface.subscribe_all();

    let ping = OscMessage::new("/ping").unwrap();
    send_until_received(&daw, rcv_port, &ping, &mut all).await;

    daw.send_raw_to_port(b"not osc at all", rcv_port).await.unwrap();
    daw.send_raw_to_port(b"/x\0\0", rcv_port).await.unwrap();
    let after = OscMessage::new("/after_garbage").unwrap().with_arg(7);
    daw.send_to_port(&after, rcv_port).await.unwrap();

    loop {
        let got = tokio::time::timeout(WAIT, all.recv()).await.unwrap().unwrap();
        if got.address() == "/after_garbage" {
            assert_eq!(got.args[0].as_int(), Some(7));
            break;
        }
        assert_eq!(got.address(), "/ping", "only retries of the first message");
    }
}

#[tokio::test]
async fn receive_port_is_released_on_disconnect() {
    let daw = MockOscPeer::new().await.unwrap();
    let (surface, rcv_port) = surface_for(&daw).await;

    let mut sub = surface.subscribe_all();
    let ping = OscMessage::new("/ping").unwrap();
    send_until_received(&daw, rcv_port, &ping, &mut sub).await;
    sub.unsubscribe().await;

    // The loop is stopped but the connection keeps its socket until closed.
    surface.disconnect().await;
    let rebound = UdpSocketTransport::bind(&format!("0.0.0.0:{}", rcv_port)).await;
    assert!(rebound.is_ok(), "port still held: {:?}", rebound.err());
}

#[tokio::test]
async fn taken_receive_port_is_reported_to_subscribers() {
    let mut daw = MockOscPeer::new().await.unwrap();
    let holder = UdpSocketTransport::bind_port(0).await.unwrap();
    let taken = holder.local_addr().port();

    let surface = ControlSurface::with_options(fast_options());
    surface
        .set_params(ConnectionParams::new("127.0.0.1", daw.port(), taken))
        .await
        .unwrap();
    let mut all = surface.subscribe_all();

    let result = tokio::time::timeout(WAIT, all.recv())
        .await
        .expect("bind failure should reach the subscriber");
    assert!(matches!(result, Err(Error::Transport(_))), "{:?}", result);
    assert!(!surface.stream().is_receiving());

    // Sending does not depend on the receive port.
    let play = OscMessage::new("/transport_play").unwrap();
    surface.send_message(&play).await.unwrap();
    assert_eq!(daw.expect_message(WAIT).await.unwrap(), play);
    drop(holder);
}

#[tokio::test]
async fn changing_params_moves_to_new_daw() {
    let mut first = MockOscPeer::new().await.unwrap();
    let mut second = MockOscPeer::new().await.unwrap();
    let (surface, _) = surface_for(&first).await;

    surface.click("play").await.unwrap();
    assert_eq!(first.expect_message(WAIT).await.unwrap().address(), "/transport_play");

    let rcv_port = free_port().await;
    surface
        .set_params(ConnectionParams::new("localhost", second.port(), rcv_port))
        .await
        .unwrap();
    assert_eq!(surface.params().unwrap().send_port, second.port());

    surface.click("stop").await.unwrap();
    assert_eq!(second.expect_message(WAIT).await.unwrap().address(), "/transport_stop");
    first.expect_silence(Duration::from_millis(100)).await.unwrap();
}

#[tokio::test]
async fn closed_connection_refuses_to_send() {
    let daw = MockOscPeer::new().await.unwrap();
    let conn = UdpConnectionBuilder::new(ConnectionParams::new("127.0.0.1", daw.port(), 0))
        .build()
        .await
        .unwrap();

    conn.close().await;
    conn.close().await;
    let msg = OscMessage::new("/transport_play").unwrap();
    assert!(matches!(conn.send_message(&msg).await, Err(Error::Closed)));
}
