//! Listener selection and startup failures.

use std::sync::Arc;

use intake_listeners::config::{parse_config, IntakeConfig};
use intake_listeners::intake::{start_ssf, start_statsd, IntakeServer};
use intake_listeners::net::{ListenAddr, ListenerError, PacketPool};

mod common;
use common::{recording_handler, test_server, test_settings, WAIT};

fn pool() -> Arc<PacketPool> {
    Arc::new(PacketPool::new(1024))
}

#[tokio::test]
async fn statsd_rejects_unix_addresses() {
    let (server, _) = test_server(test_settings());
    let addr = ListenAddr::parse("unix:///tmp/statsd.sock").unwrap();

    let err = start_statsd(&server, &addr, pool()).unwrap_err();
    assert!(matches!(err, ListenerError::UnsupportedAddress { .. }));
    assert!(err.to_string().contains("/tmp/statsd.sock"));
}

#[tokio::test]
async fn ssf_rejects_tcp_addresses() {
    let (server, _) = test_server(test_settings());
    let addr = ListenAddr::parse("tcp://127.0.0.1:0").unwrap();

    let err = start_ssf(&server, &addr, pool()).unwrap_err();
    assert!(matches!(err, ListenerError::UnsupportedAddress { .. }));
}

#[tokio::test]
async fn bind_failure_names_the_address() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = ListenAddr::Tcp(taken.local_addr().unwrap());
    let (server, _) = test_server(test_settings());

    let err = start_statsd(&server, &addr, pool()).unwrap_err();
    assert!(matches!(err, ListenerError::Bind { .. }));
    assert!(err.to_string().contains(&taken.local_addr().unwrap().to_string()));
}

#[tokio::test]
async fn failed_startup_stops_listeners_already_running() {
    let (server, _) = test_server(test_settings());
    let statsd = vec![ListenAddr::parse("udp://127.0.0.1:0").unwrap()];
    let ssf = vec![ListenAddr::parse("tcp://127.0.0.1:0").unwrap()];

    let err = server.start_listeners(&statsd, &ssf).unwrap_err();
    assert!(matches!(err, ListenerError::UnsupportedAddress { .. }));
    assert!(server.shutdown_handle().is_triggered());
}

#[tokio::test]
async fn starts_every_configured_listener() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("ssf.sock");
    let config = parse_config(&format!(
        r#"
[listeners]
statsd_addresses = ["udp://127.0.0.1:0", "tcp://127.0.0.1:0"]
ssf_addresses = ["udp://127.0.0.1:0", "unix://{}"]
num_readers = 2
recv_buffer_bytes = 0
"#,
        socket.display()
    ))
    .unwrap();

    let (handler, _) = recording_handler();
    let server = IntakeServer::from_config(&config, handler).unwrap();
    let handles = server
        .start_listeners(&config.statsd_addrs().unwrap(), &config.ssf_addrs().unwrap())
        .unwrap();

    let networks: Vec<_> = handles.iter().map(|h| h.local_addr().network()).collect();
    assert_eq!(networks, ["udp", "tcp", "udp", "unix"]);

    server.shutdown();
    for handle in handles {
        tokio::time::timeout(WAIT, handle.closed()).await.unwrap();
    }
}

#[tokio::test]
async fn config_without_tls_serves_plain_tcp() {
    let (handler, _) = recording_handler();
    let server = IntakeServer::from_config(&IntakeConfig::default(), handler).unwrap();
    assert!(server.tls().is_none());
    assert_eq!(server.settings().num_readers, 1);
}
