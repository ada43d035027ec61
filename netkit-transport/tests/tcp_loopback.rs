//! End-to-end TCP tests against a real loopback socket pair.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use compio::net::TcpListener;
use netkit_core::config::{AN_MSG_MAX_SIZE, SEND_HIGH_WATERMARK};
use netkit_core::error::ErrorKind;
use netkit_core::event::{EventQueue, NetEvent};
use netkit_transport::owner::{Connection, ConnectionOwner};
use netkit_transport::tcp::TcpConnection;

async fn settle() {
    compio::time::sleep(Duration::from_millis(50)).await;
}

/// Binds a listener, accepts exactly one connection, and wires it into a
/// fresh `ConnectionOwner`/`EventQueue` pair. Returns the listener's address
/// so a client can dial it.
async fn accepting_server() -> (std::net::SocketAddr, Arc<EventQueue>, Arc<ConnectionOwner>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let events = Arc::new(EventQueue::new());
    let owner = Arc::new(ConnectionOwner::new());
    let events_for_task = Arc::clone(&events);
    let owner_for_task = Arc::clone(&owner);
    compio::runtime::spawn(async move {
        let (stream, peer) = listener.accept().await.unwrap();
        let conn = TcpConnection::from_accepted(
            stream,
            match peer.ip() {
                std::net::IpAddr::V4(v4) => v4,
                _ => unreachable!("loopback is always v4 here"),
            },
            peer.port(),
            addr.port(),
            events_for_task,
        );
        conn.set_owner(&owner_for_task);
        owner_for_task.add_conn(Arc::clone(&conn));
        conn.start_read();
    })
    .detach();
    (addr, events, owner)
}

fn recv_payloads(events: &EventQueue) -> Vec<bytes::Bytes> {
    let mut payloads = Vec::new();
    while let Some(event) = events.pop_one() {
        if let NetEvent::Recv { payload, .. } = event {
            payloads.push(payload);
        }
    }
    payloads
}

#[compio::test]
async fn client_and_server_exchange_a_frame() {
    let (addr, server_events, _server_owner) = accepting_server().await;

    let client_events = Arc::new(EventQueue::new());
    let client_owner = Arc::new(ConnectionOwner::new());
    let client = TcpConnection::connect(
        Ipv4Addr::new(127, 0, 0, 1),
        addr.port(),
        0,
        3,
        Arc::clone(&client_owner),
        Arc::clone(&client_events),
    )
    .await
    .expect("loopback connect should succeed");

    settle().await;
    assert!(client.write(b"hello from client"));
    settle().await;

    assert_eq!(recv_payloads(&server_events), vec![bytes::Bytes::from_static(b"hello from client")]);
}

#[compio::test]
async fn messages_arrive_in_write_order() {
    // S2: three writes of lengths 3, 1, 5 must be delivered as three
    // distinct `Recv`s in that order, each with its original length.
    let (addr, server_events, _server_owner) = accepting_server().await;
    let client_events = Arc::new(EventQueue::new());
    let client_owner = Arc::new(ConnectionOwner::new());
    let client = TcpConnection::connect(Ipv4Addr::new(127, 0, 0, 1), addr.port(), 0, 3, client_owner, client_events)
        .await
        .unwrap();
    settle().await;

    assert!(client.write(b"one"));
    assert!(client.write(b"2"));
    assert!(client.write(b"three"));
    settle().await;

    let payloads = recv_payloads(&server_events);
    assert_eq!(payloads, vec![bytes::Bytes::from_static(b"one"), bytes::Bytes::from_static(b"2"), bytes::Bytes::from_static(b"three")]);
}

#[compio::test]
async fn zero_length_write_is_rejected_and_does_not_corrupt_the_next_message() {
    // S3: `write(&[])` must be refused up front (never reaches the wire),
    // and a subsequent valid write must still arrive intact.
    let (addr, server_events, _server_owner) = accepting_server().await;
    let client_events = Arc::new(EventQueue::new());
    let client_owner = Arc::new(ConnectionOwner::new());
    let client = TcpConnection::connect(Ipv4Addr::new(127, 0, 0, 1), addr.port(), 0, 3, client_owner, client_events)
        .await
        .unwrap();
    settle().await;

    assert!(!client.write(b""));
    assert!(client.write(b"still fine"));
    settle().await;

    assert_eq!(recv_payloads(&server_events), vec![bytes::Bytes::from_static(b"still fine")]);
}

#[compio::test]
async fn concurrent_writes_from_many_tasks_never_splice_bytes() {
    // S4 / Property #3: many tasks calling `write` concurrently on the same
    // connection must each deliver their own pattern intact, never
    // interleaved with another task's bytes.
    const TASKS: usize = 64;
    let (addr, server_events, _server_owner) = accepting_server().await;
    let client_events = Arc::new(EventQueue::new());
    let client_owner = Arc::new(ConnectionOwner::new());
    let client = TcpConnection::connect(Ipv4Addr::new(127, 0, 0, 1), addr.port(), 0, 3, client_owner, client_events)
        .await
        .unwrap();
    settle().await;

    let mut handles = Vec::with_capacity(TASKS);
    for i in 0..TASKS {
        let client = Arc::clone(&client);
        let pattern = vec![i as u8; 16];
        handles.push(compio::runtime::spawn(async move {
            assert!(client.write(&pattern));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    settle().await;

    let mut payloads = recv_payloads(&server_events);
    assert_eq!(payloads.len(), TASKS);
    payloads.sort();
    let mut expected: Vec<bytes::Bytes> = (0..TASKS).map(|i| bytes::Bytes::from(vec![i as u8; 16])).collect();
    expected.sort();
    assert_eq!(payloads, expected, "every task's 16-byte pattern must arrive whole, never spliced with another's");
}

#[compio::test]
async fn peer_disconnect_yields_one_error_then_one_disconnect() {
    // S5: the remote process disappearing mid-session must surface exactly
    // one `Error` followed by exactly one `Disconnect`, with nothing after.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    compio::runtime::spawn(async move {
        // Accept, then immediately drop the raw stream without ever wrapping
        // it — the peer vanishes without doing a clean AN_Msg-level close.
        let (_stream, _peer) = listener.accept().await.unwrap();
    })
    .detach();

    let client_events = Arc::new(EventQueue::new());
    let client_owner = Arc::new(ConnectionOwner::new());
    let client = TcpConnection::connect(Ipv4Addr::new(127, 0, 0, 1), addr.port(), 0, 3, client_owner, Arc::clone(&client_events))
        .await
        .unwrap();
    settle().await;

    let events: Vec<_> = std::iter::from_fn(|| client_events.pop_one()).collect();
    let tail = &events[events.len().saturating_sub(2)..];
    assert!(matches!(tail[0], NetEvent::Error { kind: ErrorKind::RecvErr, .. }));
    assert!(matches!(tail[1], NetEvent::Disconnect { .. }));
    assert_eq!(events.iter().filter(|e| matches!(e, NetEvent::Disconnect { .. })).count(), 1);
}

#[compio::test]
async fn write_is_refused_at_the_high_watermark_and_recovers_after_drain() {
    // Property #9: once buffered-but-undetached bytes reach
    // SEND_HIGH_WATERMARK, `write` must refuse further writes, and must
    // accept writes again once the backlog drains.
    let (addr, server_events, _server_owner) = accepting_server().await;
    let client_events = Arc::new(EventQueue::new());
    let client_owner = Arc::new(ConnectionOwner::new());
    let client = TcpConnection::connect(Ipv4Addr::new(127, 0, 0, 1), addr.port(), 0, 3, client_owner, client_events)
        .await
        .unwrap();
    settle().await;

    // Never yielding between writes: the first write's spawned flush task
    // has no chance to run, so every later call until the watermark just
    // appends to FramedBuffer's tail.
    let chunk = vec![0xABu8; AN_MSG_MAX_SIZE];
    let mut accepted = 0usize;
    let mut refused_at = None;
    for attempt in 0..(SEND_HIGH_WATERMARK / AN_MSG_MAX_SIZE + 4) {
        if client.write(&chunk) {
            accepted += 1;
        } else {
            refused_at = Some(attempt);
            break;
        }
    }
    assert!(refused_at.is_some(), "watermark should have been hit well before exhausting the loop");
    assert!(accepted * AN_MSG_MAX_SIZE <= SEND_HIGH_WATERMARK + AN_MSG_MAX_SIZE);

    // Let the backlog drain, then confirm writes are accepted again.
    compio::time::sleep(Duration::from_millis(300)).await;
    assert!(client.write(b"recovered"));
    settle().await;

    let payloads = recv_payloads(&server_events);
    assert_eq!(payloads.last(), Some(&bytes::Bytes::from_static(b"recovered")));
}

#[compio::test]
async fn closing_a_connection_is_idempotent_and_deregisters_it() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    compio::runtime::spawn(async move {
        let _ = listener.accept().await;
    })
    .detach();

    let events = Arc::new(EventQueue::new());
    let owner = Arc::new(ConnectionOwner::new());
    let client = TcpConnection::connect(Ipv4Addr::new(127, 0, 0, 1), addr.port(), 0, 0, Arc::clone(&owner), Arc::clone(&events))
        .await
        .unwrap();
    assert_eq!(owner.len(), 1);

    client.close();
    client.close();

    assert!(owner.is_empty());
    assert!(!client.write(b"should be refused once closed"));
}

#[compio::test]
async fn connect_to_nothing_exhausts_retries_and_reports_error() {
    let events = Arc::new(EventQueue::new());
    let owner = Arc::new(ConnectionOwner::new());
    // Port 1 is reserved and nothing is listening in this test environment.
    let result = TcpConnection::connect(Ipv4Addr::new(127, 0, 0, 1), 1, 0, 0, owner, Arc::clone(&events)).await;
    assert!(result.is_err());

    let event = events.pop_one().expect("a ConnectErr should have been pushed");
    assert!(matches!(event, NetEvent::Error { kind: ErrorKind::ConnectErr, .. }));
}
