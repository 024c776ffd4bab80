//! Integration test: UDP datagrams → MetricReceiver → dispatch gateway
//!
//! Binds real loopback sockets and verifies the full flow: datagrams are
//! read, split, lexed, enriched and dispatched, counters are shared across
//! loops, and closing the socket after cancellation ends the loop cleanly.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use statsgate_core::domain::{Event, Metric, MetricKind};
use statsgate_core::ports::{DispatchError, IDispatchGateway, Parsed};
use statsgate_receiver::{
    bind_udp, ClosableUdpSocket, MetricReceiver, ReceiveError, StatsCounters, StatsdLexer,
};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Forwards every dispatched unit to a channel
struct ChannelGateway {
    tx: mpsc::UnboundedSender<Parsed>,
}

#[async_trait::async_trait]
impl IDispatchGateway for ChannelGateway {
    async fn dispatch_metric(
        &self,
        _cancel: &CancellationToken,
        metric: Metric,
    ) -> Result<(), DispatchError> {
        self.tx
            .send(Parsed::Metric(metric))
            .map_err(|e| DispatchError::Failed(e.into()))
    }

    async fn dispatch_event(
        &self,
        _cancel: &CancellationToken,
        event: Event,
    ) -> Result<(), DispatchError> {
        self.tx
            .send(Parsed::Event(event))
            .map_err(|e| DispatchError::Failed(e.into()))
    }
}

struct Harness {
    receiver: Arc<MetricReceiver>,
    socket: Arc<ClosableUdpSocket>,
    addr: SocketAddr,
    cancel: CancellationToken,
    rx: mpsc::UnboundedReceiver<Parsed>,
}

fn harness(namespace: &str, tags: Vec<&str>) -> Harness {
    let (tx, rx) = mpsc::unbounded_channel();
    let receiver = Arc::new(MetricReceiver::new(
        namespace,
        tags,
        Arc::new(StatsdLexer),
        Arc::new(ChannelGateway { tx }),
        Arc::new(StatsCounters::new()),
    ));

    let udp = bind_udp("127.0.0.1:0".parse().unwrap(), false, 256 * 1024)
        .expect("Failed to bind loopback socket");
    let socket = Arc::new(ClosableUdpSocket::new(udp, CancellationToken::new()));
    let addr = socket.local_addr().unwrap();

    Harness {
        receiver,
        socket,
        addr,
        cancel: CancellationToken::new(),
        rx,
    }
}

fn spawn_loop(h: &Harness) -> tokio::task::JoinHandle<Result<(), ReceiveError>> {
    let receiver = Arc::clone(&h.receiver);
    let socket = Arc::clone(&h.socket);
    let cancel = h.cancel.clone();
    tokio::spawn(async move { receiver.receive(&cancel, socket.as_ref()).await })
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Parsed>) -> Parsed {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("Timed out waiting for dispatch")
        .expect("Gateway channel closed")
}

#[tokio::test]
async fn test_datagram_is_lexed_enriched_and_dispatched() {
    let mut h = harness("ns", vec!["env:prod"]);
    let task = spawn_loop(&h);

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender
        .send_to(b"foo:1|c|#a:b\n_e{5,4}:title|text\nbroken\n", h.addr)
        .await
        .unwrap();

    match next(&mut h.rx).await {
        Parsed::Metric(m) => {
            assert_eq!(m.name, "ns.foo");
            assert_eq!(m.kind, MetricKind::Counter);
            assert_eq!(m.tags.as_slice(), ["a:b".to_string(), "env:prod".to_string()]);
            assert_eq!(m.source_ip.as_ref().map(|ip| ip.as_str()), Some("127.0.0.1"));
        }
        other => panic!("expected metric, got {other:?}"),
    }
    match next(&mut h.rx).await {
        Parsed::Event(e) => {
            assert_eq!(e.title, "title");
            assert_eq!(e.text, "text");
            assert_ne!(e.date_happened, 0);
            assert_eq!(e.tags.as_slice(), ["env:prod".to_string()]);
        }
        other => panic!("expected event, got {other:?}"),
    }

    h.cancel.cancel();
    h.socket.close();
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("Receive loop did not stop")
        .unwrap();
    assert!(result.is_ok());

    let stats = h.receiver.stats();
    assert_eq!(stats.packets_received, 1);
    assert_eq!(stats.metrics_received, 1);
    assert_eq!(stats.events_received, 1);
    assert_eq!(stats.bad_lines, 1);
    assert!(stats.last_packet.is_some());
}

#[tokio::test]
async fn test_close_without_cancel_is_fatal() {
    let h = harness("", vec![]);
    let task = spawn_loop(&h);

    h.socket.close();
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("Receive loop did not stop")
        .unwrap();

    assert!(matches!(result, Err(ReceiveError::Socket(_))));
}

#[tokio::test]
async fn test_loops_on_two_sockets_share_counters() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let stats = Arc::new(StatsCounters::new());
    let gateway: Arc<dyn IDispatchGateway> = Arc::new(ChannelGateway { tx });
    let cancel = CancellationToken::new();

    let mut sockets = Vec::new();
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let receiver = Arc::new(MetricReceiver::new(
            "",
            Vec::<String>::new(),
            Arc::new(StatsdLexer),
            Arc::clone(&gateway),
            Arc::clone(&stats),
        ));
        let udp = bind_udp("127.0.0.1:0".parse().unwrap(), false, 256 * 1024).unwrap();
        let socket = Arc::new(ClosableUdpSocket::new(udp, CancellationToken::new()));
        sockets.push(Arc::clone(&socket));

        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            receiver.receive(&cancel, socket.as_ref()).await
        }));
    }

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for socket in &sockets {
        sender
            .send_to(b"x:1|g", socket.local_addr().unwrap())
            .await
            .unwrap();
    }
    next(&mut rx).await;
    next(&mut rx).await;

    cancel.cancel();
    for socket in &sockets {
        socket.close();
    }
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.packets_received, 2);
    assert_eq!(snapshot.metrics_received, 2);
}
