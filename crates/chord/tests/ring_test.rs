//! Rings of real nodes on loopback.
//!
//! # Test Strategy
//!
//! 1. **Routing**: lookups resolve to the first node at or after the key
//! 2. **Storage**: values land on the owner and move when a node joins
//! 3. **Join**: finger tables and predecessors match a brute-force oracle
//! 4. **Failures**: bad contacts and mismatched rings abort the join, a
//!    join failing half way is rolled back, inconsistent rings end routing

use async_trait::async_trait;
use chord::{NodeConfig, RingClient, RingNode};
use corelib::{Error, Identifier, Key, NodeRef, RingConfig};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use transport::{Reply, Request, Response, RpcClient, RpcHandler, RpcServer};

const BITS: u8 = 8;

fn ring_config() -> RingConfig {
    RingConfig::with_bits(BITS)
}

async fn seed(id: u64) -> Arc<RingNode> {
    let config = NodeConfig::default().with_id(id).with_ring(ring_config());
    RingNode::launch(config).await.unwrap()
}

async fn join(id: u64, contact: &RingNode) -> Arc<RingNode> {
    let config = NodeConfig::default()
        .with_id(id)
        .with_ring(ring_config())
        .with_join(contact.addr());
    RingNode::launch(config).await.unwrap()
}

/// Builds a ring by joining `ids[1..]` through `ids[0]`.
async fn ring(ids: &[u64]) -> Vec<Arc<RingNode>> {
    let mut nodes = vec![seed(ids[0]).await];
    for &id in &ids[1..] {
        let node = join(id, &nodes[0]).await;
        nodes.push(node);
    }
    nodes
}

fn shutdown(nodes: &[Arc<RingNode>]) {
    for node in nodes {
        node.shutdown();
    }
}

fn node_with(nodes: &[Arc<RingNode>], id: u64) -> &RingNode {
    nodes.iter().find(|n| n.id() == Identifier(id)).unwrap()
}

/// First id at or clockwise after `x`.
fn oracle_successor(ids: &[u64], x: u64) -> u64 {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .copied()
        .find(|&id| id >= x)
        .unwrap_or(sorted[0])
}

/// Last id strictly before `x`.
fn oracle_predecessor(ids: &[u64], x: u64) -> u64 {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .rev()
        .copied()
        .find(|&id| id < x)
        .unwrap_or(sorted[sorted.len() - 1])
}

fn assert_converged(nodes: &[Arc<RingNode>], ids: &[u64]) {
    let size = 1u64 << BITS;
    for node in nodes {
        let n = node.id().0;
        let status = node.status();
        for (i, entry) in status.fingers.iter().enumerate() {
            let start = (n + (1u64 << i)) % size;
            assert_eq!(entry.start.0, start);
            assert_eq!(
                entry.node.id.0,
                oracle_successor(ids, start),
                "finger {} of node {}",
                i + 1,
                n
            );
        }
        let predecessor = status.predecessor.unwrap();
        assert_eq!(predecessor.id.0, oracle_predecessor(ids, n), "predecessor of {}", n);
    }
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_find_successor_three_nodes() {
    let nodes = ring(&[10, 100, 200]).await;
    for node in &nodes {
        assert_eq!(node.find_successor(Identifier(150)).await.unwrap().id, Identifier(200));
        assert_eq!(node.find_successor(Identifier(105)).await.unwrap().id, Identifier(200));
        assert_eq!(node.find_successor(Identifier(50)).await.unwrap().id, Identifier(100));
        assert_eq!(node.find_successor(Identifier(100)).await.unwrap().id, Identifier(100));
        assert_eq!(node.find_successor(Identifier(201)).await.unwrap().id, Identifier(10));
        assert_eq!(node.find_successor(Identifier(3)).await.unwrap().id, Identifier(10));
    }
    assert_eq!(node_with(&nodes, 10).successor().id, Identifier(100));
    assert_eq!(node_with(&nodes, 200).successor().id, Identifier(10));
    shutdown(&nodes);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_single_node_owns_everything() {
    let node = seed(42).await;
    assert_eq!(node.successor().id, Identifier(42));
    assert_eq!(node.predecessor().unwrap().id, Identifier(42));
    for id in [0u64, 41, 42, 43, 255] {
        assert_eq!(node.find_successor(Identifier(id)).await.unwrap().id, Identifier(42));
    }
    node.insert("alpha", b"1".to_vec()).await.unwrap();
    assert_eq!(node.lookup("alpha").await.unwrap(), b"1".to_vec());

    // a key hashing exactly onto the node
    let key = (0..100_000)
        .map(|n| format!("k{}", n))
        .find(|k| node.space().key_id(&Key::from(k.as_str())).unwrap() == Identifier(42))
        .unwrap();
    node.insert(key.as_str(), b"v".to_vec()).await.unwrap();
    assert_eq!(node.lookup(key.as_str()).await.unwrap(), b"v".to_vec());
    assert!(node.stored_keys().contains(&Identifier(42)));
    node.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lookup_every_identifier_from_every_node() {
    let ids = [10, 100, 200, 37, 250];
    let nodes = ring(&ids).await;
    for node in &nodes {
        for x in 0..(1u64 << BITS) {
            let owner = node.find_successor(Identifier(x)).await.unwrap();
            assert_eq!(owner.id.0, oracle_successor(&ids, x), "owner of {} via {}", x, node.id());
        }
    }
    shutdown(&nodes);
}

// ============================================================================
// Storage
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_insert_lands_on_owner() {
    let nodes = ring(&[10, 100, 200]).await;
    let owner = nodes[0].insert(Identifier(105), b"v".to_vec()).await.unwrap();
    assert_eq!(owner.id, Identifier(200));
    assert_eq!(node_with(&nodes, 200).stored_keys(), vec![Identifier(105)]);
    assert!(node_with(&nodes, 100).stored_keys().is_empty());
    for node in &nodes {
        assert_eq!(node.lookup(Identifier(105)).await.unwrap(), b"v".to_vec());
    }
    shutdown(&nodes);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_overwrite_keeps_last_value() {
    let nodes = ring(&[10, 100, 200]).await;
    nodes[1].insert("color", b"red".to_vec()).await.unwrap();
    nodes[2].insert("color", b"blue".to_vec()).await.unwrap();
    nodes[2].insert("color", b"blue".to_vec()).await.unwrap();
    assert_eq!(nodes[0].lookup("color").await.unwrap(), b"blue".to_vec());
    let stored: usize = nodes.iter().map(|n| n.stored_keys().len()).sum();
    assert_eq!(stored, 1);
    shutdown(&nodes);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_key_is_not_found() {
    let nodes = ring(&[10, 100]).await;
    let err = nodes[0].lookup(Identifier(77)).await.unwrap_err();
    assert_eq!(err, Error::KeyNotFound(Identifier(77)));
    shutdown(&nodes);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_join_migrates_keys() {
    let mut nodes = ring(&[10, 200]).await;
    for key in [150u64, 50, 5] {
        nodes[0].insert(Identifier(key), key.to_be_bytes().to_vec()).await.unwrap();
    }
    assert_eq!(
        node_with(&nodes, 200).stored_keys(),
        vec![Identifier(50), Identifier(150)]
    );

    nodes.push(join(100, &nodes[1]).await);
    assert_eq!(node_with(&nodes, 100).stored_keys(), vec![Identifier(50)]);
    assert_eq!(node_with(&nodes, 200).stored_keys(), vec![Identifier(150)]);
    assert_eq!(node_with(&nodes, 10).stored_keys(), vec![Identifier(5)]);
    for node in &nodes {
        for key in [150u64, 50, 5] {
            assert_eq!(node.lookup(Identifier(key)).await.unwrap(), key.to_be_bytes().to_vec());
        }
    }
    shutdown(&nodes);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_owner_refuses_foreign_keys() {
    let nodes = ring(&[10, 100, 200]).await;
    let rpc = RpcClient::new(BITS, Duration::from_secs(2));
    let err = rpc
        .put_key(node_with(&nodes, 100).addr(), Identifier(150), b"x".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RoutingFailure(_)));
    assert!(node_with(&nodes, 100).stored_keys().is_empty());
    shutdown(&nodes);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_external_client() {
    let nodes = ring(&[10, 100, 200]).await;
    let client = RingClient::new(nodes[0].addr(), &ring_config()).unwrap();
    let owner = client.insert(Key::from(Identifier(60)), b"x".to_vec()).await.unwrap();
    assert_eq!(owner.id, Identifier(100));
    assert_eq!(client.lookup(Identifier(60)).await.unwrap(), b"x".to_vec());
    assert_eq!(client.owner(Identifier(201)).await.unwrap().id, Identifier(10));

    let status = client.status(Some(owner.addr.as_str())).await.unwrap();
    assert_eq!(status.node.id, Identifier(100));
    assert_eq!(status.keys, 1);
    assert_eq!(status.predecessor.unwrap().id, Identifier(10));
    shutdown(&nodes);
}

// ============================================================================
// Join
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_fingers_converge_after_joins() {
    let ids = [10u64, 100, 200, 37, 250, 5, 128, 64, 180, 90, 222, 150, 11, 129];
    let mut nodes = vec![seed(ids[0]).await];
    for (k, &id) in ids.iter().enumerate().skip(1) {
        // vary the contact between the seed, the newest and a middle node
        let contact = Arc::clone(&nodes[(k * 7) % nodes.len()]);
        nodes.push(join(id, &contact).await);
        assert_converged(&nodes, &ids[..=k]);
    }
    for node in &nodes {
        for &id in &ids {
            let owner = node.find_successor(Identifier(id)).await.unwrap();
            assert_eq!(owner.id, Identifier(id));
        }
    }
    shutdown(&nodes);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_adjacent_identifiers() {
    let ids = [0u64, 1, 255, 254, 128];
    let nodes = ring(&ids).await;
    assert_converged(&nodes, &ids);
    shutdown(&nodes);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_contact_aborts_join() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = listener.local_addr().unwrap().to_string();
    drop(listener);
    let mut ring = ring_config();
    ring.rpc_timeout_ms = 500;
    let config = NodeConfig::default().with_id(7).with_ring(ring).with_join(dead);
    let err = RingNode::launch(config).await.unwrap_err();
    assert!(matches!(err, Error::RemoteUnreachable { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_width_mismatch_aborts_join() {
    let node = seed(10).await;
    let config = NodeConfig::default()
        .with_id(7)
        .with_ring(RingConfig::with_bits(16))
        .with_join(node.addr());
    let err = RingNode::launch(config).await.unwrap_err();
    assert!(matches!(err, Error::Misconfigured(_)));
    node.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_taken_identifier_aborts_join() {
    let nodes = ring(&[10, 100, 200]).await;
    let config = NodeConfig::default()
        .with_id(100)
        .with_ring(ring_config())
        .with_join(nodes[0].addr());
    let err = RingNode::launch(config).await.unwrap_err();
    assert!(matches!(err, Error::RoutingFailure(_)));
    // the ring is untouched
    assert_converged(&nodes, &[10, 100, 200]);
    shutdown(&nodes);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_identifier_outside_space_is_rejected() {
    let config = NodeConfig::default().with_id(300).with_ring(ring_config());
    let err = RingNode::launch(config).await.unwrap_err();
    assert!(matches!(err, Error::Misconfigured(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_join_failing_after_linking_is_rolled_back() {
    let nodes = ring(&[10, 100, 200]).await;
    nodes[0].insert(Identifier(50), b"fifty".to_vec()).await.unwrap();
    node_with(&nodes, 200).shutdown();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // 60 links in front of 100 and takes key 50, then needs 200 to
    // correct fingers
    let mut ring = ring_config();
    ring.rpc_timeout_ms = 500;
    let config = NodeConfig::default()
        .with_id(60)
        .with_ring(ring)
        .with_join(nodes[0].addr());
    let err = RingNode::launch(config).await.unwrap_err();
    assert!(matches!(err, Error::RemoteUnreachable { .. }));

    let owner = node_with(&nodes, 100);
    assert_eq!(owner.predecessor().unwrap().id, Identifier(10));
    assert_eq!(owner.stored_keys(), vec![Identifier(50)]);
    assert_eq!(nodes[0].lookup(Identifier(50)).await.unwrap(), b"fifty".to_vec());
    assert_eq!(owner.lookup(Identifier(50)).await.unwrap(), b"fifty".to_vec());
    assert_eq!(node_with(&nodes, 10).successor().id, Identifier(100));
    shutdown(&nodes);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_restore_finger_only_replaces_matching_entry() {
    let nodes = ring(&[10, 100, 200]).await;
    let rpc = RpcClient::new(BITS, Duration::from_secs(2));
    let (n10, n100, n200) = (
        node_with(&nodes, 10),
        node_with(&nodes, 100).node_ref().clone(),
        node_with(&nodes, 200).node_ref().clone(),
    );

    // finger 8 of 10 holds 200, not 100
    rpc.restore_finger(n10.addr(), 8, &n100, &n200).await.unwrap();
    assert_eq!(n10.status().fingers[7].node.id, Identifier(200));

    rpc.restore_finger(n10.addr(), 1, &n100, &n200).await.unwrap();
    assert_eq!(n10.successor().id, Identifier(200));
    rpc.restore_finger(n10.addr(), 1, &n200, &n100).await.unwrap();
    assert_eq!(n10.successor().id, Identifier(100));

    let err = rpc.restore_finger(n10.addr(), 0, &n100, &n200).await.unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(_)));
    shutdown(&nodes);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wildcard_listen_needs_advertise() {
    let config = NodeConfig::new("0.0.0.0:0").with_ring(ring_config());
    let err = RingNode::launch(config).await.unwrap_err();
    assert!(matches!(err, Error::Misconfigured(_)));

    let config = NodeConfig::new("0.0.0.0:0")
        .with_advertise("127.0.0.1:7999")
        .with_ring(ring_config());
    let node = RingNode::launch(config).await.unwrap();
    assert_eq!(node.addr(), "127.0.0.1:7999");
    node.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_key_outside_space_is_refused() {
    let node = seed(42).await;
    let err = node.insert(Identifier(300), b"x".to_vec()).await.unwrap_err();
    assert!(matches!(err, Error::Misconfigured(_)));
    let err = node.lookup(Identifier(300)).await.unwrap_err();
    assert!(matches!(err, Error::Misconfigured(_)));
    assert!(node.stored_keys().is_empty());

    let client = RingClient::new(node.addr(), &ring_config()).unwrap();
    let err = client.insert(Identifier(256), b"x".to_vec()).await.unwrap_err();
    assert!(matches!(err, Error::Misconfigured(_)));
    node.shutdown();
}

// ============================================================================
// Inconsistent rings
// ============================================================================

const HONEST: u8 = 0;
const STUCK: u8 = 1;
const CREEPING: u8 = 2;

/// A peer at id 200 that behaves like a lone node until switched into
/// reporting a broken view of the ring.
///
/// `STUCK` claims successor 201 and offers itself as closest preceding
/// finger. `CREEPING` moves one identifier forward per routing step.
struct Faulty {
    me: NodeRef,
    mode: AtomicU8,
    step: AtomicU64,
}

impl Faulty {
    fn at(&self, id: u64) -> NodeRef {
        NodeRef::new(Identifier(id % (1u64 << BITS)), self.me.addr.clone())
    }
}

#[async_trait]
impl RpcHandler for Faulty {
    async fn handle(&self, request: Request) -> Reply {
        let mode = self.mode.load(Ordering::SeqCst);
        match request {
            Request::FindSuccessor { .. } => Ok(Response::Node(self.me.clone())),
            Request::GetPredecessor => Ok(Response::Predecessor(Some(self.me.clone()))),
            Request::GetSuccessor => Ok(Response::Node(match mode {
                HONEST => self.me.clone(),
                STUCK => self.at(self.me.id.0 + 1),
                _ => self.at(self.step.load(Ordering::SeqCst) + 1),
            })),
            Request::ClosestPrecedingFinger { .. } => Ok(Response::Node(match mode {
                CREEPING => self.at(self.step.fetch_add(1, Ordering::SeqCst) + 1),
                _ => self.me.clone(),
            })),
            Request::UpdateFingerTable { .. } => Ok(Response::FingerUpdated {
                changed: false,
                predecessor: None,
            }),
            Request::TransferKeys { .. } => Ok(Response::Keys(Vec::new())),
            _ => Ok(Response::Ack),
        }
    }
}

/// Node 10 joined to a `Faulty` peer at 200.
async fn faulty_ring() -> (Arc<RingNode>, Arc<Faulty>, watch::Sender<bool>) {
    let server = RpcServer::bind("127.0.0.1:0", BITS).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let faulty = Arc::new(Faulty {
        me: NodeRef::new(Identifier(200), addr.clone()),
        mode: AtomicU8::new(HONEST),
        step: AtomicU64::new(200),
    });
    let (tx, rx) = watch::channel(false);
    tokio::spawn(server.serve(Arc::clone(&faulty), rx));

    let config = NodeConfig::default()
        .with_id(10)
        .with_ring(ring_config())
        .with_join(addr);
    let node = RingNode::launch(config).await.unwrap();
    assert_eq!(node.successor().id, Identifier(200));
    (node, faulty, tx)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_routing_without_progress_fails() {
    let (node, faulty, _shutdown) = faulty_ring().await;
    faulty.mode.store(STUCK, Ordering::SeqCst);
    let err = node.find_successor(Identifier(5)).await.unwrap_err();
    assert!(matches!(err, Error::RoutingFailure(_)));
    // keys in (10, 200] never leave node 10
    assert_eq!(node.find_successor(Identifier(150)).await.unwrap().id, Identifier(200));
    node.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_routing_gives_up_after_hop_limit() {
    let (node, faulty, _shutdown) = faulty_ring().await;
    faulty.mode.store(CREEPING, Ordering::SeqCst);
    // reaching 5 one identifier at a time takes ~60 hops, the limit is 32
    let err = node.find_successor(Identifier(5)).await.unwrap_err();
    match err {
        Error::RoutingFailure(reason) => assert!(reason.contains("32 hops"), "{}", reason),
        other => panic!("expected a routing failure, got {:?}", other),
    }
    node.shutdown();
}
