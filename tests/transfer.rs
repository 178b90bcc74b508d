//! Integration tests for whole transfers over loopback.
//!
//! Each test spins up a real `tokio::net::UdpSocket` on loopback, runs the
//! server half in a background task, and verifies that the file arrives
//! byte-identical and both sides report success.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use udp_file_transfer::{
    config::ServerConfig,
    send_file,
    server::Server,
    socket::Socket,
    CancelToken, Client, TransferConfig, TransferError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Bind a server socket on an OS-chosen loopback port and return
/// `(server, resolved_addr)` so the client knows where to send.
async fn bind_server(receive_dir: &Path) -> (Server<Socket>, SocketAddr) {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let socket = Socket::bind(addr).await.expect("bind server socket");
    let local = socket.local_addr;
    let config = ServerConfig {
        receive_dir: receive_dir.to_path_buf(),
    };
    (Server::new(socket, config), local)
}

fn write_source(dir: &Path, name: &str, len: usize) -> (std::path::PathBuf, Vec<u8>) {
    let data: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
    let path = dir.join(name);
    std::fs::write(&path, &data).unwrap();
    (path, data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// A multi-segment file with a short final segment arrives intact.
#[tokio::test]
async fn file_arrives_byte_identical() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let (path, data) = write_source(src.path(), "payload.bin", 10_000);

    let (mut server, server_addr) = bind_server(dst.path()).await;
    let server_task = tokio::spawn(async move { server.receive_one().await });

    let config = TransferConfig::default().with_datagram_size(512);
    let client_report = tokio::time::timeout(Duration::from_secs(10), send_file(server_addr, &path, config))
        .await
        .expect("client timed out")
        .expect("client failed");

    let server_report = tokio::time::timeout(Duration::from_secs(10), server_task)
        .await
        .expect("server timed out")
        .expect("server task panicked")
        .expect("server failed")
        .expect("server cancelled");

    assert_eq!(std::fs::read(dst.path().join("payload.bin")).unwrap(), data);
    assert_eq!(client_report.file_name, "payload.bin");
    assert_eq!(server_report.file_len, 10_000);

    // 10_000 / 503 = 19.9 → 20 data segments, plus announcement and EOF.
    assert_eq!(client_report.stats.logical, 22);
    assert_eq!(server_report.stats.logical, 22);
}

/// An empty file is one announcement and one EOF segment.
#[tokio::test]
async fn empty_file_sends_only_eof() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let (path, _) = write_source(src.path(), "empty.txt", 0);

    let (mut server, server_addr) = bind_server(dst.path()).await;
    let server_task = tokio::spawn(async move { server.receive_one().await });

    let report = send_file(server_addr, &path, TransferConfig::default())
        .await
        .expect("client failed");
    server_task.await.unwrap().unwrap().unwrap();

    assert_eq!(report.stats.logical, 2);
    assert_eq!(report.stats.datagrams, 2);
    assert!(std::fs::read(dst.path().join("empty.txt")).unwrap().is_empty());
}

/// M full-capacity segments give M + 2 logical datagrams.
#[tokio::test]
async fn exact_multiple_of_capacity_counts_m_plus_two() {
    const DATAGRAM: usize = 32; // capacity 23
    const M: usize = 4;

    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let (path, data) = write_source(src.path(), "exact.bin", M * (DATAGRAM - 9));

    let (mut server, server_addr) = bind_server(dst.path()).await;
    let server_task = tokio::spawn(async move { server.receive_one().await });

    let config = TransferConfig::default().with_datagram_size(DATAGRAM);
    let report = send_file(server_addr, &path, config).await.unwrap();
    server_task.await.unwrap().unwrap().unwrap();

    assert_eq!(report.stats.logical, (M + 2) as u64);
    assert_eq!(report.stats.retransmissions, 0);
    // Every datagram on the wire but the announcement is full size.
    let announcement = 9 + 8 + "exact.bin".len();
    assert_eq!(report.stats.bytes, (announcement + (M + 1) * DATAGRAM) as u64);
    assert_eq!(std::fs::read(dst.path().join("exact.bin")).unwrap(), data);
}

/// The server serves successive transfers one after another.
#[tokio::test]
async fn server_handles_consecutive_files() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let (first, first_data) = write_source(src.path(), "first.bin", 700);
    let (second, second_data) = write_source(src.path(), "second.bin", 1300);

    let (mut server, server_addr) = bind_server(dst.path()).await;
    let server_task = tokio::spawn(async move {
        let a = server.receive_one().await.unwrap().unwrap();
        let b = server.receive_one().await.unwrap().unwrap();
        (a, b)
    });

    let config = TransferConfig::default().with_datagram_size(128);
    send_file(server_addr, &first, config.clone()).await.unwrap();
    send_file(server_addr, &second, config).await.unwrap();

    let (a, b) = server_task.await.unwrap();
    assert_eq!(a.file_name, "first.bin");
    assert_eq!(b.file_name, "second.bin");
    assert_eq!(std::fs::read(dst.path().join("first.bin")).unwrap(), first_data);
    assert_eq!(std::fs::read(dst.path().join("second.bin")).unwrap(), second_data);
}

/// Sending to an address where nobody is listening fails with
/// `MaxRetriesExceeded` rather than hanging forever.
#[tokio::test]
async fn silent_server_fails_with_max_retries() {
    let src = tempfile::tempdir().unwrap();
    let (path, _) = write_source(src.path(), "lost.bin", 100);

    // Bound but never read: datagrams vanish without an ICMP reply.
    let silent = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let config = TransferConfig {
        attempt_timeout: Duration::from_millis(20),
        max_retries: 5,
        ..TransferConfig::default()
    };

    let result = send_file(silent.local_addr, &path, config).await;
    assert!(
        matches!(
            result,
            Err(TransferError::MaxRetriesExceeded { seq: 0, attempts: 6 })
        ),
        "expected MaxRetriesExceeded, got: {result:?}"
    );
}

/// A cancelled token stops the sender at the next attempt.
#[tokio::test]
async fn cancelled_client_stops() {
    let src = tempfile::tempdir().unwrap();
    let (path, _) = write_source(src.path(), "never.bin", 100);
    let silent = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

    let cancel = CancelToken::new();
    let socket = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let client = Client::new(socket, silent.local_addr, TransferConfig::default())
        .unwrap()
        .with_cancel(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), client.send_file(&path))
        .await
        .expect("cancellation not observed");
    trigger.await.unwrap();
    assert!(matches!(result, Err(TransferError::Cancelled)), "got {result:?}");
}

/// A missing source file is a local I/O failure, reported before any send.
#[tokio::test]
async fn missing_source_is_io_error() {
    let src = tempfile::tempdir().unwrap();
    let result = send_file(
        "127.0.0.1:9".parse().unwrap(),
        src.path().join("nope.bin"),
        TransferConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(TransferError::Io(_))), "got {result:?}");
}

/// A wildcard-bound server may answer from a different local address than
/// the one the client sent to; its ACKs still count.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn acks_from_wildcard_server_are_accepted() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let (path, data) = write_source(src.path(), "routed.bin", 300);

    let socket = Socket::bind("0.0.0.0:0".parse().unwrap()).await.unwrap();
    let port = socket.local_addr.port();
    let config = ServerConfig {
        receive_dir: dst.path().to_path_buf(),
    };
    let mut server = Server::new(socket, config);
    let server_task = tokio::spawn(async move { server.receive_one().await });

    // 127.0.0.2 reaches the server, whose replies leave from 127.0.0.1.
    let target: SocketAddr = ([127, 0, 0, 2], port).into();
    let config = TransferConfig {
        datagram_size: 64,
        attempt_timeout: Duration::from_millis(50),
        max_retries: 10,
    };
    let report = send_file(target, &path, config).await.expect("client failed");
    server_task.await.unwrap().unwrap().unwrap();

    assert_eq!(report.stats.logical, 2 + 300usize.div_ceil(55) as u64);
    assert_eq!(std::fs::read(dst.path().join("routed.bin")).unwrap(), data);
}

/// The smallest datagram carries one byte per segment, and the file name
/// need not fit in a data datagram.
#[tokio::test]
async fn one_byte_segments_with_long_name() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let name = "a-file-name-much-longer-than-ten-bytes.dat";
    let (path, data) = write_source(src.path(), name, 20);

    let (mut server, server_addr) = bind_server(dst.path()).await;
    let server_task = tokio::spawn(async move { server.receive_one().await });

    let config = TransferConfig::default().with_datagram_size(10);
    let report = send_file(server_addr, &path, config).await.expect("client failed");
    let server_report = server_task.await.unwrap().unwrap().unwrap();

    assert_eq!(report.stats.logical, 22);
    assert_eq!(server_report.file_name, name);
    assert_eq!(std::fs::read(dst.path().join(name)).unwrap(), data);
}
