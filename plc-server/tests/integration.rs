//! Drives `plc-server` over a real TCP socket: connect, write, read back,
//! exercising the full length-prefixed JSON wire protocol end to end.

use std::sync::Arc;

use plc_core::Memory;
use plc_server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn send(stream: &mut TcpStream, body: &[u8]) {
    let len = u32::try_from(body.len()).unwrap();
    stream.write_all(&len.to_be_bytes()).await.unwrap();
    stream.write_all(body).await.unwrap();
}

async fn recv(stream: &mut TcpStream) -> serde_json::Value {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.unwrap();
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn write_then_read_round_trips_over_the_socket() {
    let memory = Arc::new(Memory::new());
    let server = Server::new(memory, "127.0.0.1:0".parse().unwrap());
    server.start().await.unwrap();
    let addr = server.local_addr().await.unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();

    send(
        &mut client,
        br#"{"command":"write","keyvalues":{"a":1,"b":"hello","c":true,"d":null}}"#,
    )
    .await;
    let write_reply = recv(&mut client).await;
    assert_eq!(write_reply, serde_json::json!({}));

    send(&mut client, br#"{"command":"read","keys":["a","b","c","d","missing"]}"#).await;
    let read_reply = recv(&mut client).await;
    assert_eq!(
        read_reply,
        serde_json::json!({"keyvalues": {"a": 1, "b": "hello", "c": true, "d": null}})
    );

    server.stop().await;
}

#[tokio::test]
async fn malformed_request_gets_an_empty_reply_and_the_connection_stays_open() {
    let memory = Arc::new(Memory::new());
    let server = Server::new(memory, "127.0.0.1:0".parse().unwrap());
    server.start().await.unwrap();
    let addr = server.local_addr().await.unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();

    send(&mut client, b"not json at all").await;
    assert_eq!(recv(&mut client).await, serde_json::json!({}));

    // the connection must still be usable for a well-formed request after a
    // malformed one — the server never crashes the process or the socket.
    send(&mut client, br#"{"command":"read","keys":[]}"#).await;
    assert_eq!(recv(&mut client).await, serde_json::json!({"keyvalues": {}}));

    server.stop().await;
}

#[tokio::test]
async fn read_omits_keys_absent_from_memory() {
    let memory = Arc::new(Memory::new());
    memory
        .write([("only".to_string(), plc_core::Value::Int(5))].into_iter().collect())
        .await;
    let server = Server::new(memory, "127.0.0.1:0".parse().unwrap());
    server.start().await.unwrap();
    let addr = server.local_addr().await.unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();
    send(&mut client, br#"{"command":"read","keys":["only","absent"]}"#).await;
    let reply = recv(&mut client).await;
    assert_eq!(reply, serde_json::json!({"keyvalues": {"only": 5}}));

    server.stop().await;
}

#[tokio::test]
async fn stop_makes_is_running_false_and_closes_the_listener() {
    let memory = Arc::new(Memory::new());
    let server = Server::new(memory, "127.0.0.1:0".parse().unwrap());
    server.start().await.unwrap();
    assert!(server.is_running().await);

    server.stop().await;
    assert!(!server.is_running().await);
}
