use std::time::{Duration, Instant, SystemTime};

use tokio::net::UdpSocket;
use tokio::sync::watch;

use blockbeat::control::osc::{encode, OscArg, OscMessage, OscPacket};
use blockbeat::control::server::{bind, run_receiver};
use blockbeat::control::{channel, Command, ControlBatch, ControlChannel, ControlRuntime, OscConfig};
use blockbeat::types::{GameAction, ParamName};

fn local_config() -> OscConfig {
    OscConfig {
        rx_port: 0,
        ..OscConfig::default()
    }
}

fn osc(address: &str, args: Vec<OscArg>) -> Vec<u8> {
    encode(&OscPacket::Message(OscMessage::new(address, args)))
}

async fn wait_for(control: &ControlChannel, done: impl Fn(&ControlChannel) -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !done(control) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("control datagrams were not received in time");
}

#[tokio::test]
async fn udp_updates_coalesce_to_the_latest_value() {
    let socket = bind(&local_config()).await.unwrap();
    let addr = socket.local_addr().unwrap();
    let (sender, mut control) = channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let receiver = tokio::spawn(run_receiver(socket, sender, shutdown_rx));

    let sent = SystemTime::now();
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(&osc("/gravity_interval", vec![OscArg::Float(0.5)]), addr)
        .await
        .unwrap();
    client
        .send_to(&osc("/param/gravity_interval", vec![OscArg::Double(0.25)]), addr)
        .await
        .unwrap();
    client
        .send_to(br#"{"action": "hardDrop"}"#, addr)
        .await
        .unwrap();
    wait_for(&control, |c| {
        let s = c.stats();
        s.params == 2 && s.commands == 1
    })
    .await;

    let mut batch = ControlBatch::default();
    control.drain_into(&mut batch);
    let updates: Vec<_> = batch.params().collect();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].name, ParamName::GravityInterval);
    assert_eq!(updates[0].value, 0.25);
    assert!(updates[0].received >= sent && updates[0].received <= SystemTime::now());
    assert_eq!(batch.commands, vec![Command::Action(GameAction::HardDrop)]);
    assert_eq!(control.stats().superseded, 1);

    // nothing left for the next tick
    control.drain_into(&mut batch);
    assert!(batch.is_empty());

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), receiver)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn malformed_and_unknown_datagrams_are_counted_and_dropped() {
    let socket = bind(&local_config()).await.unwrap();
    let addr = socket.local_addr().unwrap();
    let (sender, mut control) = channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(run_receiver(socket, sender, shutdown_rx));

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"\x00\x01garbage", addr).await.unwrap();
    client
        .send_to(&osc("/no_such_param", vec![OscArg::Float(1.0)]), addr)
        .await
        .unwrap();
    client
        .send_to(br#"{"param": "bpm", "value": "fast"}"#, addr)
        .await
        .unwrap();
    client
        .send_to(&osc("/bpm", vec![OscArg::Int(128)]), addr)
        .await
        .unwrap();
    wait_for(&control, |c| c.stats().rejected == 3 && c.stats().params == 1).await;

    let mut batch = ControlBatch::default();
    control.drain_into(&mut batch);
    assert_eq!(batch.param(ParamName::Bpm).map(|u| u.value), Some(128.0));
}

#[test]
fn runtime_delivers_stop_from_the_network() {
    let (runtime, control) = ControlRuntime::start(&local_config()).unwrap();
    let addr = runtime.local_addr().expect("receiver should be bound");

    let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    client.send_to(&osc("/stop", vec![]), addr).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while !control.stop_requested() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(control.stop_requested());
    runtime.shutdown();
}

#[test]
fn disabled_runtime_has_no_socket() {
    let config = OscConfig {
        enabled: false,
        ..local_config()
    };
    let (runtime, control) = ControlRuntime::start(&config).unwrap();
    assert!(runtime.local_addr().is_none());
    assert!(!control.stop_requested());
    runtime.shutdown();
}
