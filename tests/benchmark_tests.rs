//! Performance benchmarks for the fan-out path

use server::config::ServerConfig;
use server::hub::ChatHub;
use server::memory::{in_memory, stalled, MemoryPeer};
use shared::{decode, encode, ChatMessage};
use std::time::{Duration, Instant};

async fn hub_with_peers(count: usize, config: &ServerConfig) -> (ChatHub, Vec<MemoryPeer>) {
    let hub = ChatHub::start(config);
    let mut peers = Vec::with_capacity(count);
    for _ in 0..count {
        let (sink, stream, peer) = in_memory();
        hub.attach(sink, stream, None);
        peers.push(peer);
    }

    while hub.registry().len().await < count {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    (hub, peers)
}

/// Benchmarks message encoding and decoding
#[test]
fn benchmark_codec() {
    let message = ChatMessage::new("alice", "a reasonably sized chat message for timing");
    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = encode(&message).unwrap();
        let _ = decode(&frame).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Codec: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks fan-out of many messages to many connections
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn benchmark_fanout_throughput() {
    let connections = 50;
    let messages = 200;
    let (hub, mut peers) = hub_with_peers(connections, &ServerConfig::default()).await;

    let start = Instant::now();
    for i in 0..messages {
        peers[i % connections].send_message(&ChatMessage::new("bench", i.to_string()));
    }

    let mut received = 0;
    for peer in peers.iter_mut() {
        for _ in 0..messages {
            peer.recv().await.unwrap();
            received += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Fan-out: {} deliveries in {:?} ({:.0} deliveries/s)",
        received,
        duration,
        received as f64 / duration.as_secs_f64()
    );

    assert_eq!(received, connections * messages);
    // Should complete in under 5 seconds
    assert!(duration.as_secs() < 5);

    hub.shutdown().await;
}

/// Benchmarks delivery latency with a stalled client present
#[tokio::test]
async fn benchmark_stalled_client_bounded_delay() {
    let config = ServerConfig {
        write_timeout: Duration::from_millis(100),
        ..ServerConfig::default()
    };
    let (hub, mut peers) = hub_with_peers(5, &config).await;

    let (sink, stream, _stalled_peer) = stalled();
    hub.attach(sink, stream, None);
    while hub.registry().len().await < 6 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let start = Instant::now();
    peers[0].send_message(&ChatMessage::new("bench", "first"));
    for peer in peers.iter_mut() {
        peer.recv().await.unwrap();
    }
    let first = start.elapsed();

    let start = Instant::now();
    peers[0].send_message(&ChatMessage::new("bench", "second"));
    for peer in peers.iter_mut() {
        peer.recv().await.unwrap();
    }
    let second = start.elapsed();

    println!("Delivery with stalled client: first {:?}, after removal {:?}", first, second);

    // The stalled client costs at most one write timeout, then it is gone
    assert!(first < Duration::from_secs(1));
    assert!(second < Duration::from_millis(500));
    assert_eq!(hub.registry().len().await, 5);

    hub.shutdown().await;
}
