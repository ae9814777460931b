//! The block fetcher: a scheduler that distributes a prioritized set of
//! block-hash requests across an open-ended, dynamically changing pool of
//! peers.
//!
//! A [`Fetcher`] owns a priority queue of pending requests and a
//! hash-to-delivery registry. `add_peer` spawns one long-lived task per peer
//! that pipelines two outstanding `getdata` batches against it, adapting its
//! batch size to observed completion time; a second task per peer reads
//! inbound messages and resolves deliveries as `block` replies arrive.

mod queue;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use tracing::{info, trace, warn};

use btc_chain::block;

use crate::config::Config;
use crate::error::PeerError;
use crate::peer::{Peer, PeerId};
use crate::protocol::external::codec::{MessageDecoder, MessageEncoder};
use crate::protocol::external::{InventoryHash, Message};

use queue::PriorityQueue;

/// A single-shot promise for one requested block, returned to the caller of
/// [`Fetcher::fetch_blocks`].
///
/// The fetcher's internal bookkeeping (the queue entry and the hash
/// registry) holds only a [`Weak`] reference to the slot backing this
/// handle. Dropping every `Delivery` for a hash makes the corresponding
/// request silently discardable the next time a peer claims it.
pub struct Delivery(Arc<DeliverySlot>);

impl Delivery {
    /// Suspends until the block has arrived.
    pub async fn wait(&self) -> Arc<block::Block> {
        loop {
            let notified = self.0.notify.notified();
            if let Some(block) = self.0.get().await {
                return block;
            }
            notified.await;
        }
    }
}

struct DeliverySlot {
    block: tokio::sync::Mutex<Option<Arc<block::Block>>>,
    notify: tokio::sync::Notify,
}

impl DeliverySlot {
    fn new() -> Self {
        DeliverySlot {
            block: tokio::sync::Mutex::new(None),
            notify: tokio::sync::Notify::new(),
        }
    }

    async fn get(&self) -> Option<Arc<block::Block>> {
        self.block.lock().await.clone()
    }

    async fn is_resolved(&self) -> bool {
        self.block.lock().await.is_some()
    }

    /// Resolves the slot if it hasn't already been resolved. A second
    /// `block` reply for the same hash (which should not happen on a
    /// well-behaved peer) is ignored rather than overwriting the first.
    async fn resolve(&self, block: Arc<block::Block>) {
        let mut guard = self.block.lock().await;
        if guard.is_none() {
            *guard = Some(block);
            drop(guard);
            self.notify.notify_waiters();
        }
    }

    async fn wait_resolved(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_resolved().await {
                return;
            }
            notified.await;
        }
    }
}

/// The unit of scheduling work: one block hash at one priority, carrying the
/// set of peers already asked for it.
#[derive(Clone)]
struct BlockRequest {
    block_hash: block::Hash,
    priority: i64,
    delivery: Weak<DeliverySlot>,
    peers_tried: HashSet<PeerId>,
}

/// Per-peer scheduler state: the adaptive batch size, and the requests this
/// peer currently holds that have been claimed but not yet resolved or
/// requeued. The latter lets a disconnecting peer's fetcher loop hand its
/// stranded work straight back to the queue instead of waiting on another
/// peer's batch timeout to rescue it.
struct FetcherPeerState {
    batch_size: AtomicUsize,
    outstanding: Mutex<Vec<BlockRequest>>,
}

impl FetcherPeerState {
    fn new(initial_batch_size: usize) -> Self {
        FetcherPeerState {
            batch_size: AtomicUsize::new(initial_batch_size),
            outstanding: Mutex::new(Vec::new()),
        }
    }

    fn batch_size(&self) -> usize {
        self.batch_size.load(Ordering::Relaxed)
    }

    fn set_batch_size(&self, size: usize) {
        self.batch_size.store(size, Ordering::Relaxed);
    }

    fn mark_outstanding(&self, requests: &[BlockRequest]) {
        self.outstanding.lock().unwrap().extend(requests.iter().cloned());
    }

    fn clear_outstanding(&self, requests: &[BlockRequest]) {
        let mut guard = self.outstanding.lock().unwrap();
        for request in requests {
            if let Some(pos) = guard
                .iter()
                .position(|o| o.block_hash == request.block_hash && o.priority == request.priority)
            {
                guard.remove(pos);
            }
        }
    }

    fn drain(&self) -> Vec<BlockRequest> {
        std::mem::take(&mut *self.outstanding.lock().unwrap())
    }
}

/// Schedules block requests across a dynamic pool of peers.
pub struct Fetcher {
    config: Config,
    queue: PriorityQueue<BlockRequest>,
    registry: Mutex<HashMap<block::Hash, Weak<DeliverySlot>>>,
    /// Spans an entire claim-and-requeue sequence so two peers' tasks never
    /// race on the same head-of-queue element.
    claim_lock: tokio::sync::Mutex<()>,
    peer_states: Mutex<HashMap<PeerId, Arc<FetcherPeerState>>>,
}

impl Fetcher {
    pub fn new(config: Config) -> Arc<Fetcher> {
        Arc::new(Fetcher {
            config,
            queue: PriorityQueue::new(),
            registry: Mutex::new(HashMap::new()),
            claim_lock: tokio::sync::Mutex::new(()),
            peer_states: Mutex::new(HashMap::new()),
        })
    }

    /// Registers `(block_hash, priority)` pairs and returns one [`Delivery`]
    /// per pair, in input order. A duplicate `block_hash` overwrites the
    /// earlier registry entry; both requests stay queued, but only the
    /// delivery registered last can ever be resolved by `handle_msg` — the
    /// caller is responsible for deduplicating hashes if that matters.
    pub fn fetch_blocks(&self, requests: Vec<(block::Hash, i64)>) -> Vec<Delivery> {
        let mut deliveries = Vec::with_capacity(requests.len());
        let mut registry = self.registry.lock().unwrap();
        for (block_hash, priority) in requests {
            let slot = Arc::new(DeliverySlot::new());
            registry.insert(block_hash, Arc::downgrade(&slot));
            let request = BlockRequest {
                block_hash,
                priority,
                delivery: Arc::downgrade(&slot),
                peers_tried: HashSet::new(),
            };
            self.queue.push(priority, request);
            deliveries.push(Delivery(slot));
        }
        deliveries
    }

    /// Spawns a long-lived fetcher loop bound to `peer`, plus a companion
    /// task that reads inbound messages and dispatches them to
    /// [`Fetcher::handle_msg`]. Returns immediately.
    pub fn add_peer<C>(self: &Arc<Self>, peer: Peer<C>)
    where
        C: MessageEncoder + MessageDecoder + Send + Sync + 'static,
    {
        let peer = Arc::new(peer);
        let fetcher = self.clone();
        tokio::spawn(fetcher.run_peer(peer));
    }

    async fn run_peer<C>(self: Arc<Self>, peer: Arc<Peer<C>>)
    where
        C: MessageEncoder + MessageDecoder + Send + Sync + 'static,
    {
        let peer_id = peer.id();
        let state = Arc::new(FetcherPeerState::new(self.config.initial_batch_size));
        self.peer_states.lock().unwrap().insert(peer_id, state.clone());

        tokio::select! {
            _ = self.clone().send_loop(peer.clone(), state.clone()) => {}
            result = self.clone().receive_loop(peer.clone()) => {
                if let Err(error) = result {
                    info!(peer = %peer_id, %error, "peer connection closed");
                }
            }
        }

        self.teardown_peer(&peer_id, &state);
    }

    /// Dispatches one inbound message. Only `block` replies matter here;
    /// every other message name is a no-op for the fetcher.
    pub async fn handle_msg(&self, message: &Message) {
        if let Message::Block(block) = message {
            let hash = block.hash();
            let slot = {
                let registry = self.registry.lock().unwrap();
                registry.get(&hash).and_then(Weak::upgrade)
            };
            match slot {
                Some(slot) => slot.resolve(block.clone()).await,
                None => trace!(%hash, "received block with no matching request"),
            }
        }
    }

    async fn receive_loop<C>(self: Arc<Self>, peer: Arc<Peer<C>>) -> Result<(), PeerError>
    where
        C: MessageEncoder + MessageDecoder + Send + Sync + 'static,
    {
        loop {
            let message = peer.receive().await?;
            self.handle_msg(&message).await;
        }
    }

    async fn send_loop<C>(self: Arc<Self>, peer: Arc<Peer<C>>, state: Arc<FetcherPeerState>)
    where
        C: MessageEncoder + MessageDecoder + Send + Sync + 'static,
    {
        let peer_id = peer.id();

        let (mut batch, mut start) = self.get_batch(&peer, peer_id, state.batch_size()).await;
        state.mark_outstanding(&batch);

        loop {
            let (next_batch, next_start) =
                self.get_batch(&peer, peer_id, state.batch_size()).await;
            state.mark_outstanding(&next_batch);

            let remaining = self.config.max_batch_time.saturating_sub(start.elapsed());
            tokio::select! {
                _ = wait_for_batch(&batch) => {}
                _ = tokio::time::sleep(remaining) => {}
            }

            let outgoing = std::mem::take(&mut batch);
            state.clear_outstanding(&outgoing);
            let mut completed = 0usize;
            for request in outgoing {
                let resolved = match request.delivery.upgrade() {
                    Some(slot) => slot.is_resolved().await,
                    None => true,
                };
                if resolved {
                    completed += 1;
                } else {
                    // Not an orphaned request: re-queue so another peer
                    // (peers_tried now excludes no one it excluded before)
                    // can pick it up.
                    let priority = request.priority;
                    self.queue.push(priority, request);
                }
            }

            let size = adaptive_batch_size(
                start.elapsed(),
                completed,
                self.config.target_batch_time,
                self.config.max_batch_size,
            );
            state.set_batch_size(size);

            batch = next_batch;
            start = next_start;
        }
    }

    /// Claims up to `batch_size` requests for `peer` under the batch-claim
    /// lock, sends one `getdata` for them, and returns the claimed requests
    /// with the time the `getdata` was dispatched.
    async fn get_batch<C>(
        &self,
        peer: &Peer<C>,
        peer_id: PeerId,
        batch_size: usize,
    ) -> (Vec<BlockRequest>, Instant)
    where
        C: MessageEncoder + MessageDecoder + Send + Sync + 'static,
    {
        let _guard = self.claim_lock.lock().await;

        let mut claimed = Vec::with_capacity(batch_size);
        let mut skipped = Vec::new();
        while claimed.len() < batch_size {
            if self.queue.is_empty() && !claimed.is_empty() {
                break;
            }
            let mut request = self.queue.take().await;
            let slot = match request.delivery.upgrade() {
                Some(slot) => slot,
                None => continue, // caller dropped every Delivery handle
            };
            if slot.is_resolved().await {
                continue; // stale requeue from an earlier, now-resolved claim
            }
            if request.peers_tried.contains(&peer_id) {
                skipped.push(request);
                continue;
            }
            request.peers_tried.insert(peer_id);
            claimed.push(request);
        }
        for request in skipped {
            let priority = request.priority;
            self.queue.push(priority, request);
        }

        let start = Instant::now();
        if claimed.is_empty() {
            return (claimed, start);
        }

        let items = claimed
            .iter()
            .map(|r| InventoryHash::Block(r.block_hash))
            .collect();
        match peer.send_message(&Message::GetData(items)) {
            Ok(()) => (claimed, start),
            Err(error) => {
                let error = crate::error::FetchError::SendFailure(error);
                warn!(peer = %peer_id, %error, "getdata send failed, requeueing batch");
                for request in claimed {
                    let priority = request.priority;
                    self.queue.push(priority, request);
                }
                (Vec::new(), start)
            }
        }
    }

    fn teardown_peer(&self, peer_id: &PeerId, state: &FetcherPeerState) {
        let stranded = state.drain();
        if !stranded.is_empty() {
            info!(
                peer = %peer_id,
                count = stranded.len(),
                "requeueing requests stranded by peer disconnect"
            );
        }
        for request in stranded {
            let priority = request.priority;
            self.queue.push(priority, request);
        }
        self.peer_states.lock().unwrap().remove(peer_id);
    }
}

/// Sizes the next batch so that, at the observed per-item completion rate,
/// a batch takes about `target_batch_time` to finish: faster completions
/// grow the batch, slower ones shrink it, always clamped to
/// `[1, max_batch_size]`.
fn adaptive_batch_size(
    elapsed: std::time::Duration,
    completed: usize,
    target_batch_time: std::time::Duration,
    max_batch_size: usize,
) -> usize {
    let completed = completed.max(1);
    let per_item_secs = elapsed.as_secs_f64() / completed as f64;
    if per_item_secs <= 0.0 {
        max_batch_size
    } else {
        let target = target_batch_time.as_secs_f64();
        (((target / per_item_secs).floor() as usize + 1).min(max_batch_size)).max(1)
    }
}

async fn wait_for_batch(batch: &[BlockRequest]) {
    for request in batch {
        if let Some(slot) = request.delivery.upgrade() {
            slot.wait_resolved().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use btc_chain::parameters::Network;

    use super::*;
    use crate::constants::CURRENT_VERSION;
    use crate::protocol::external::codec::BitcoinCodec;

    fn peer_id(port: u16) -> PeerId {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    fn fake_peer(port: u16) -> (Peer<BitcoinCodec>, tokio::io::DuplexStream) {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let codec = BitcoinCodec::new(Network::Mainnet, CURRENT_VERSION);
        (Peer::new(peer_id(port), ours, Network::Mainnet, codec), theirs)
    }

    #[tokio::test]
    async fn fetch_blocks_returns_one_delivery_per_pair_in_order() {
        let fetcher = Fetcher::new(Config::default());
        let h0 = block::Hash([0; 32]);
        let h1 = block::Hash([1; 32]);

        let deliveries = fetcher.fetch_blocks(vec![(h0, 5), (h1, 1)]);
        assert_eq!(deliveries.len(), 2);
        assert!(!fetcher.queue.is_empty());
    }

    #[tokio::test]
    async fn fetch_blocks_of_empty_list_does_not_touch_the_queue() {
        let fetcher = Fetcher::new(Config::default());
        let deliveries = fetcher.fetch_blocks(vec![]);
        assert!(deliveries.is_empty());
        assert!(fetcher.queue.is_empty());
    }

    #[tokio::test]
    async fn get_batch_discards_requests_whose_delivery_was_dropped() {
        let fetcher = Fetcher::new(Config::default());
        let (peer, _theirs) = fake_peer(1);

        let hash = block::Hash([2; 32]);
        let deliveries = fetcher.fetch_blocks(vec![(hash, 0)]);
        drop(deliveries);

        let (claimed, _start) = fetcher.get_batch(&peer, peer_id(1), 10).await;
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn get_batch_skips_requests_already_tried_by_this_peer() {
        let fetcher = Fetcher::new(Config::default());
        let (peer, _theirs) = fake_peer(2);

        let hash = block::Hash([3; 32]);
        let _deliveries = fetcher.fetch_blocks(vec![(hash, 0)]);

        let (first_claim, _) = fetcher.get_batch(&peer, peer_id(2), 10).await;
        assert_eq!(first_claim.len(), 1);

        // Requeue it ourselves, as the per-peer loop would on a timeout.
        let request = first_claim.into_iter().next().unwrap();
        let priority = request.priority;
        fetcher.queue.push(priority, request);

        // The same peer must not be handed the request a second time.
        let (second_claim, _) = fetcher.get_batch(&peer, peer_id(2), 10).await;
        assert!(second_claim.is_empty());
    }

    #[tokio::test]
    async fn priority_ordering_is_preserved_across_claims() {
        let fetcher = Fetcher::new(Config::default());
        let (peer, _theirs) = fake_peer(3);

        let h_low = block::Hash([10; 32]);
        let h_mid = block::Hash([11; 32]);
        let h_high = block::Hash([12; 32]);
        let _deliveries = fetcher.fetch_blocks(vec![(h_low, 10), (h_mid, 5), (h_high, 7)]);

        let (claimed, _) = fetcher.get_batch(&peer, peer_id(3), 1).await;
        assert_eq!(claimed[0].block_hash, h_mid);
        let (claimed, _) = fetcher.get_batch(&peer, peer_id(3), 1).await;
        assert_eq!(claimed[0].block_hash, h_high);
        let (claimed, _) = fetcher.get_batch(&peer, peer_id(3), 1).await;
        assert_eq!(claimed[0].block_hash, h_low);
    }

    #[tokio::test]
    async fn handle_msg_resolves_the_matching_delivery() {
        let fetcher = Fetcher::new(Config::default());
        let header = btc_chain::block::Header::new(
            1,
            block::Hash([0; 32]),
            [0; 32],
            chrono::Utc::now(),
            0x1d00_ffff,
            0,
        );
        let block = Arc::new(block::Block {
            header,
            transaction_count: 0,
            raw_transactions: Vec::new(),
        });
        let hash = block.hash();

        let deliveries = fetcher.fetch_blocks(vec![(hash, 0)]);
        fetcher
            .handle_msg(&Message::Block(block.clone()))
            .await;

        let resolved = deliveries[0].wait().await;
        assert_eq!(resolved.hash(), hash);
    }

    #[test]
    fn adaptive_batch_size_grows_when_completion_is_faster_than_target() {
        // 10 items in 1s against a 3s target: plenty of headroom, batch grows.
        let size = adaptive_batch_size(
            std::time::Duration::from_secs(1),
            10,
            std::time::Duration::from_secs(3),
            500,
        );
        assert!(size > 10, "expected growth from 10, got {size}");
    }

    #[test]
    fn adaptive_batch_size_shrinks_when_completion_is_slower_than_target() {
        // 10 items in 30s against a 3s target: badly overshot, batch shrinks.
        let size = adaptive_batch_size(
            std::time::Duration::from_secs(30),
            10,
            std::time::Duration::from_secs(3),
            500,
        );
        assert!(size < 10, "expected shrinkage from 10, got {size}");
    }

    #[test]
    fn adaptive_batch_size_is_clamped_to_configured_max() {
        let size = adaptive_batch_size(
            std::time::Duration::from_secs(0),
            1,
            std::time::Duration::from_secs(3),
            25,
        );
        assert_eq!(size, 25);
    }

    #[test]
    fn adaptive_batch_size_never_drops_below_one() {
        let size = adaptive_batch_size(
            std::time::Duration::from_secs(3600),
            1,
            std::time::Duration::from_secs(3),
            500,
        );
        assert_eq!(size, 1);
    }

    #[tokio::test]
    async fn teardown_requeues_outstanding_requests_for_another_peer() {
        let fetcher = Fetcher::new(Config::default());
        let (peer_a, _theirs_a) = fake_peer(20);

        let hash = block::Hash([20; 32]);
        let _deliveries = fetcher.fetch_blocks(vec![(hash, 0)]);

        let (claimed, _start) = fetcher.get_batch(&peer_a, peer_id(20), 10).await;
        assert_eq!(claimed.len(), 1);

        let state = Arc::new(FetcherPeerState::new(Config::default().initial_batch_size));
        state.mark_outstanding(&claimed);

        // Peer A disconnects with its batch still outstanding.
        fetcher.teardown_peer(&peer_id(20), &state);

        assert!(!fetcher.queue.is_empty());
        assert!(state.drain().is_empty());

        // A different peer, who never tried this hash before, can claim it.
        let (peer_b, _theirs_b) = fake_peer(21);
        let (rescued, _start) = fetcher.get_batch(&peer_b, peer_id(21), 10).await;
        assert_eq!(rescued.len(), 1);
        assert_eq!(rescued[0].block_hash, hash);
    }

    #[tokio::test]
    async fn handle_msg_is_a_no_op_for_an_unregistered_hash() {
        let fetcher = Fetcher::new(Config::default());
        let header = btc_chain::block::Header::new(
            1,
            block::Hash([0; 32]),
            [0; 32],
            chrono::Utc::now(),
            0x1d00_ffff,
            0,
        );
        let block = Arc::new(block::Block {
            header,
            transaction_count: 0,
            raw_transactions: Vec::new(),
        });

        // Should not panic even though nothing is registered for this hash.
        fetcher.handle_msg(&Message::Block(block)).await;
    }
}
