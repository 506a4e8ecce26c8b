use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;

use rendezvous::signaling::{ClientMessage, ConnectionId, RoomId, RoomRegistry, SignalingRelay};

/// relay with one room and `listeners` joined listeners
fn populated_relay(listeners: usize) -> SignalingRelay {
    let mut registry = RoomRegistry::new();
    let room_id = RoomId::from("BENCH1");
    registry.create(room_id.clone(), ConnectionId::from("host"));
    for n in 0..listeners {
        let _ = registry.add_participant(&room_id, ConnectionId::from(format!("listener_{}", n)));
    }
    SignalingRelay::new(registry)
}

/// parsing benchmark
fn bench_parsing(c: &mut Criterion) {
    let text = r#"{"type":"ice-candidate","candidate":{"candidate":"candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host","sdpMid":"0","sdpMLineIndex":0},"target_id":"conn_0123456789abcdef"}"#;

    let mut group = c.benchmark_group("Parsing");
    group.throughput(Throughput::Elements(1));

    group.bench_function("ClientMessage", |b| {
        b.iter(|| {
            let msg: ClientMessage = serde_json::from_str(black_box(text)).unwrap();
            black_box(msg)
        })
    });

    group.finish();
}

/// routing benchmark
fn bench_forward(c: &mut Criterion) {
    let mut relay = populated_relay(16);
    let sender = ConnectionId::from("host");
    let candidate = json!({"candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host"});

    let mut group = c.benchmark_group("Forward");
    group.throughput(Throughput::Elements(1));

    group.bench_function("ice_candidate", |b| {
        b.iter(|| {
            let out = relay.handle(
                black_box(&sender),
                ClientMessage::IceCandidate {
                    candidate: candidate.clone(),
                    target_id: ConnectionId::from("listener_0"),
                },
            );
            black_box(out)
        })
    });

    group.finish();
}

/// join + disconnect cycle against a busy room
fn bench_join_leave(c: &mut Criterion) {
    let mut relay = populated_relay(256);
    let joiner = ConnectionId::from("joiner");
    let room_id = RoomId::from("BENCH1");

    let mut group = c.benchmark_group("JoinLeave");
    group.throughput(Throughput::Elements(1));

    group.bench_function("join_then_disconnect", |b| {
        b.iter(|| {
            let joined = relay.handle(
                &joiner,
                ClientMessage::JoinRoom {
                    room_id: room_id.clone(),
                },
            );
            let left = relay.disconnect(black_box(&joiner));
            black_box((joined, left))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parsing, bench_forward, bench_join_leave);
criterion_main!(benches);
