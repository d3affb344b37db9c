//! End-to-end pipeline tests against loopback stand-ins: a one-shot
//! HTTP responder playing the monitoring API and a UDP socket playing
//! the trap receiver.

use bifrost::error::{FetchError, RunError, TranslateError};
use bifrost::snmp::Oid;
use bifrost::{Config, NodeFetcher, Orchestrator, Telemetry, TrapSender};
use base64::prelude::*;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

/// Serve exactly one HTTP exchange and hand back the raw request.
async fn spawn_api_stub(
    status_line: &'static str,
    body: String,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });
    (format!("http://{}", addr), handle)
}

async fn spawn_trap_receiver() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

fn pipeline(api_url: &str, receiver_port: u16) -> Orchestrator<NodeFetcher, TrapSender> {
    let mut config = Config::default();
    config.api.url = api_url.to_string();
    config.api.username = "svc-bifrost".to_string();
    config.api.password = "secret".to_string();
    config.trap.receiver = "127.0.0.1".to_string();
    config.trap.receiver_port = receiver_port;
    config.validate().unwrap();

    Orchestrator::from_config(&config, Telemetry::disabled()).unwrap()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// An OCTET STRING TLV for a short ASCII value.
fn octet_string(value: &str) -> Vec<u8> {
    let mut tlv = vec![0x04, value.len() as u8];
    tlv.extend_from_slice(value.as_bytes());
    tlv
}

#[tokio::test]
async fn end_to_end_single_node_trap() {
    let (url, request) = spawn_api_stub(
        "200 OK",
        r#"[{"NodeID": 5, "Caption": "core-sw", "Status": "Down"}]"#.to_string(),
    )
    .await;
    let (receiver, port) = spawn_trap_receiver().await;

    let summary = pipeline(&url, port).run().await.unwrap();
    assert_eq!(summary.node_count, 1);

    // The fetch authenticated with HTTP Basic.
    let request = request.await.unwrap();
    assert!(
        request.to_lowercase().contains("authorization: basic"),
        "missing Basic auth header in:\n{}",
        request
    );
    assert!(request.contains(&BASE64_STANDARD.encode("svc-bifrost:secret")));

    // One well-formed trap arrived with the translated field values.
    let mut buf = vec![0u8; 4096];
    let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
    let datagram = &buf[..len];

    assert_eq!(datagram[0], 0x30);
    assert!(contains(datagram, &octet_string("public")));
    assert!(contains(datagram, &octet_string("down")));
    assert!(contains(datagram, &octet_string("core-sw")));
    assert!(contains(datagram, &octet_string("10.199.0.5")));
    assert!(contains(datagram, &octet_string("5")));
    assert!(contains(datagram, &octet_string("unknown")));

    // The snmpTrapOID header varbind carries the enterprise root as a
    // real OID value.
    let root: Oid = "1.3.6.1.4.1.11307.10".parse().unwrap();
    let mut oid_tlv = vec![0x06, root.to_ber().len() as u8];
    oid_tlv.extend_from_slice(&root.to_ber());
    assert!(contains(datagram, &oid_tlv));
}

#[tokio::test]
async fn http_401_aborts_with_auth_error() {
    let (url, _request) = spawn_api_stub("401 Unauthorized", "{}".to_string()).await;
    let (_receiver, port) = spawn_trap_receiver().await;

    let err = pipeline(&url, port).run().await.unwrap_err();
    assert!(matches!(err, RunError::Fetch(FetchError::Auth)));
}

#[tokio::test]
async fn http_500_aborts_with_unexpected_response() {
    let (url, _request) = spawn_api_stub("500 Internal Server Error", "oops".to_string()).await;
    let (_receiver, port) = spawn_trap_receiver().await;

    let err = pipeline(&url, port).run().await.unwrap_err();
    assert!(matches!(
        err,
        RunError::Fetch(FetchError::UnexpectedResponse { status: 500 })
    ));
}

#[tokio::test]
async fn non_array_payload_aborts_with_malformed_payload() {
    let (url, _request) = spawn_api_stub("200 OK", r#"{"nodes": []}"#.to_string()).await;
    let (_receiver, port) = spawn_trap_receiver().await;

    let err = pipeline(&url, port).run().await.unwrap_err();
    assert!(matches!(
        err,
        RunError::Fetch(FetchError::MalformedPayload { .. })
    ));
}

#[tokio::test]
async fn three_nodes_respect_the_pacing_floor() {
    let (url, _request) = spawn_api_stub(
        "200 OK",
        r#"[{"NodeID": 1}, {"NodeID": 2}, {"NodeID": 3}]"#.to_string(),
    )
    .await;
    let (receiver, port) = spawn_trap_receiver().await;

    let start = Instant::now();
    let summary = pipeline(&url, port).run().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(summary.node_count, 3);
    assert!(
        elapsed >= Duration::from_millis(40),
        "3 sends completed in {:?}, below (N-1) x 20ms",
        elapsed
    );

    let mut buf = vec![0u8; 4096];
    for _ in 0..3 {
        receiver.recv_from(&mut buf).await.unwrap();
    }
}

#[tokio::test]
async fn bad_node_mid_run_aborts_before_the_rest() {
    let (url, _request) = spawn_api_stub(
        "200 OK",
        r#"[{"NodeID": 1}, {"NodeID": "core-sw"}, {"NodeID": 3}]"#.to_string(),
    )
    .await;
    let (receiver, port) = spawn_trap_receiver().await;

    let err = pipeline(&url, port).run().await.unwrap_err();
    assert!(matches!(
        err,
        RunError::Translate {
            position: 1,
            source: TranslateError::InvalidNodeId { .. },
        }
    ));

    // Exactly one trap made it out before the abort.
    let mut buf = vec![0u8; 4096];
    receiver.recv_from(&mut buf).await.unwrap();
    let second = tokio::time::timeout(
        Duration::from_millis(100),
        receiver.recv_from(&mut buf),
    )
    .await;
    assert!(second.is_err(), "no trap may follow the aborting node");
}

#[tokio::test]
async fn limit_flag_truncates_the_run() {
    let (url, _request) = spawn_api_stub(
        "200 OK",
        r#"[{"NodeID": 1}, {"NodeID": 2}, {"NodeID": 3}]"#.to_string(),
    )
    .await;
    let (receiver, port) = spawn_trap_receiver().await;

    let summary = pipeline(&url, port)
        .with_limit(Some(1))
        .run()
        .await
        .unwrap();
    assert_eq!(summary.node_count, 1);

    let mut buf = vec![0u8; 4096];
    receiver.recv_from(&mut buf).await.unwrap();
    let second = tokio::time::timeout(
        Duration::from_millis(100),
        receiver.recv_from(&mut buf),
    )
    .await;
    assert!(second.is_err());
}
