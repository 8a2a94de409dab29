#![allow(clippy::unwrap_used)]
// Integration tests for `ActorClient` against a scripted mock hub.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use lcolamps_driver::{ActorClient, DriverError, LampAddress, LampDriver, PowerReading};

async fn mock_hub(replies: Vec<&'static str>) -> (ActorClient, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let mut received = Vec::new();
        for reply in replies {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            let mut lines = BufReader::new(read_half).lines();
            received.push(lines.next_line().await.unwrap().unwrap());
            write_half.write_all(format!("{reply}\n").as_bytes()).await.unwrap();
        }
        received
    });

    (ActorClient::new("127.0.0.1", port), handle)
}

fn hgar() -> LampAddress {
    LampAddress::Actor {
        on_verb: "hgar on".into(),
        off_verb: "hgar off".into(),
        status_verb: "hgar status".into(),
    }
}

#[tokio::test]
async fn send_on_uses_on_verb() {
    let (client, server) = mock_hub(vec!["OK"]).await;

    client.send(&hgar(), true).await.unwrap();
    assert_eq!(server.await.unwrap(), vec!["hgar on"]);
}

#[tokio::test]
async fn send_off_uses_off_verb() {
    let (client, server) = mock_hub(vec!["OK"]).await;

    client.send(&hgar(), false).await.unwrap();
    assert_eq!(server.await.unwrap(), vec!["hgar off"]);
}

#[tokio::test]
async fn err_reply_is_rejected() {
    let (client, _server) = mock_hub(vec!["ERR lamp interlocked"]).await;

    let result = client.send(&hgar(), true).await;
    match result {
        Err(DriverError::Rejected { message }) => assert_eq!(message, "lamp interlocked"),
        other => panic!("expected Rejected, got: {other:?}"),
    }
}

#[tokio::test]
async fn query_parses_status_replies() {
    let (client, server) = mock_hub(vec!["OK on", "OK off"]).await;

    let neon = LampAddress::Actor {
        on_verb: "ne on".into(),
        off_verb: "ne off".into(),
        status_verb: "ne status".into(),
    };
    let readings = client.query(&[hgar(), neon]).await.unwrap();

    assert_eq!(readings, vec![PowerReading::On, PowerReading::Off]);
    assert_eq!(server.await.unwrap(), vec!["hgar status", "ne status"]);
}

#[tokio::test]
async fn m2_address_is_rejected_by_actor_driver() {
    let (client, _server) = mock_hub(vec![]).await;
    let address = LampAddress::M2 {
        m2_name: "TCS".into(),
        relay: 1,
    };

    let result = client.send(&address, true).await;
    assert!(matches!(result, Err(DriverError::Rejected { .. })));
}
