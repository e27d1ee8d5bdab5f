//! SSF over Unix domain sockets.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

use intake_listeners::intake::{start_ssf, IntakeServer};
use intake_listeners::net::lock::{lock_path_for, FileLock, LockError};
use intake_listeners::net::{ListenAddr, ListenerError, ListenerHandle, PacketPool};

mod common;
use common::{ssf_frame, test_server, test_settings, Packet, WAIT};

fn start(server: &IntakeServer, path: &Path) -> Result<ListenerHandle, ListenerError> {
    let pool = Arc::new(PacketPool::new(server.settings().trace_max_length + 1));
    start_ssf(server, &ListenAddr::Unix(path.to_path_buf()), pool)
}

async fn send_span(path: &Path, payload: &[u8]) {
    let mut stream = UnixStream::connect(path).await.unwrap();
    stream.write_all(&ssf_frame(payload)).await.unwrap();
    stream.shutdown().await.unwrap();
}

#[tokio::test]
async fn delivers_framed_spans() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssf.sock");
    let (server, received) = test_server(test_settings());
    let _handle = start(&server, &path).unwrap();

    let mut stream = UnixStream::connect(&path).await.unwrap();
    let mut bytes = ssf_frame(b"span-one");
    bytes.extend(ssf_frame(b"span-two"));
    stream.write_all(&bytes).await.unwrap();

    assert_eq!(
        received.take(2).await,
        vec![Packet::Trace(b"span-one".to_vec()), Packet::Trace(b"span-two".to_vec())]
    );
    server.shutdown();
}

#[tokio::test]
async fn socket_is_world_writable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssf.sock");
    let (server, _received) = test_server(test_settings());
    let _handle = start(&server, &path).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o666);
    server.shutdown();
}

#[tokio::test]
async fn replaces_stale_socket_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssf.sock");
    std::fs::write(&path, b"left over").unwrap();

    let (server, received) = test_server(test_settings());
    let _handle = start(&server, &path).unwrap();

    send_span(&path, b"fresh").await;
    assert_eq!(received.next().await, Packet::Trace(b"fresh".to_vec()));
    server.shutdown();
}

#[tokio::test]
async fn second_listener_on_same_path_fails_and_leaves_first_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssf.sock");

    let (first, received) = test_server(test_settings());
    let _handle = start(&first, &path).unwrap();

    let (second, _) = test_server(test_settings());
    let err = start(&second, &path).unwrap_err();
    assert!(
        matches!(err, ListenerError::Lock { source: LockError::Held { .. }, .. }),
        "unexpected error: {err}"
    );

    // The first listener still owns the socket.
    send_span(&path, b"still here").await;
    assert_eq!(received.next().await, Packet::Trace(b"still here".to_vec()));
    first.shutdown();
}

#[tokio::test]
async fn shutdown_closes_listener_then_releases_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssf.sock");
    let (server, _received) = test_server(test_settings());
    let handle = start(&server, &path).unwrap();

    server.shutdown();
    tokio::time::timeout(WAIT, handle.closed()).await.unwrap();

    assert!(UnixStream::connect(&path).await.is_err(), "listener still accepting");
    let lock = FileLock::try_acquire(&lock_path_for(&path)).unwrap();
    drop(lock);
}

#[tokio::test]
async fn new_listener_takes_over_after_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssf.sock");

    let (old, _) = test_server(test_settings());
    let handle = start(&old, &path).unwrap();
    old.shutdown();
    tokio::time::timeout(WAIT, handle.closed()).await.unwrap();

    let (new, received) = test_server(test_settings());
    let _handle = start(&new, &path).unwrap();
    send_span(&path, b"takeover").await;
    assert_eq!(received.next().await, Packet::Trace(b"takeover".to_vec()));
    new.shutdown();
}

#[tokio::test]
async fn bad_frame_closes_only_that_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssf.sock");
    let (server, received) = test_server(test_settings());
    let _handle = start(&server, &path).unwrap();

    let mut bad = UnixStream::connect(&path).await.unwrap();
    bad.write_all(&[7, 0, 0, 0, 1, b'x']).await.unwrap();

    send_span(&path, b"good").await;
    assert_eq!(received.next().await, Packet::Trace(b"good".to_vec()));
    received.assert_quiet().await;
    server.shutdown();
}
