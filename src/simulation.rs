//! Multi-session convergence simulation.
//!
//! Spins up N simulated browsers against one shared in-memory remote
//! store, has them issue random concurrent edits and sync in rounds,
//! and then checks convergence two ways:
//!
//!  - live replicas must agree on the set of selected instances once
//!    everything is drained (deletes reach every replica no earlier
//!    than the adds they refer to, so the set is fetch-window
//!    independent; list positions and concurrently-written metadata
//!    are not, and heal on the next full projection);
//!  - fresh replicas projecting the full history from version zero
//!    must be identical, list order and metadata included.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tabsync_client::{
    MemoryPersistence, MemoryStore, MemoryTransport, SyncConfigBuilder, SyncOrchestrator,
};
use tabsync_engine::catalog::MemoryCatalog;
use tabsync_engine::state::SelectionState;
use tabsync_ops::op::{BrowserId, MetadataPatch, SortDirection};

type Replica = SyncOrchestrator<MemoryTransport, MemoryPersistence>;

pub struct SimulationStats {
    pub browsers: usize,
    pub rounds: usize,
    pub ops_issued: usize,
    pub store_ops: usize,
    pub final_selected: usize,
    pub live_replicas_agree: bool,
    pub fresh_replicas_identical: bool,
    pub elapsed_ms: u128,
}

impl SimulationStats {
    pub fn print(&self) {
        println!(
            "\n--- {} browsers, {} rounds ---",
            self.browsers, self.rounds
        );
        println!("  operations issued : {}", self.ops_issued);
        println!("  distinct in store : {}", self.store_ops);
        println!("  final selections  : {}", self.final_selected);
        println!("  live agreement    : {}", self.live_replicas_agree);
        println!("  fresh identical   : {}", self.fresh_replicas_identical);
        println!("  elapsed           : {} ms", self.elapsed_ms);
    }

    pub fn converged(&self) -> bool {
        self.live_replicas_agree && self.fresh_replicas_identical
    }
}

fn catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    for i in 0..8 {
        catalog.insert(format!("img-{}", i), format!("IMG_{:04}.jpg", i));
    }
    catalog
}

fn replica(store: &MemoryStore, name: &str) -> Replica {
    SyncOrchestrator::new(
        BrowserId::new(name),
        Arc::new(store.handle()),
        Arc::new(MemoryPersistence::new()),
        Arc::new(catalog()),
        SyncConfigBuilder::new().sync_interval(2).build(),
    )
}

/// The fetch-window-independent projection live replicas must agree on.
fn selected_set(state: &SelectionState) -> BTreeSet<String> {
    state
        .selected_images
        .iter()
        .map(|entry| format!("{}:{}:{}", entry.instance_id, entry.image_id, entry.file_name))
        .collect()
}

fn random_edit(replica: &Replica, rng: &mut impl Rng) {
    match rng.gen_range(0..10) {
        0..=4 => {
            let image = format!("img-{}", rng.gen_range(0..8));
            replica.add_selection(image, None);
        }
        5..=6 => {
            let state = replica.state();
            if let Some(entry) = state.selected_images.choose(rng) {
                replica.delete_selection(&entry.instance_id);
            }
        }
        7..=8 => {
            let state = replica.state();
            if let Some(entry) = state.selected_images.choose(rng) {
                replica.update_metadata(
                    &entry.instance_id,
                    MetadataPatch::photo_number(rng.gen_range(1..100).to_string()),
                );
            }
        }
        _ => {
            let direction = match rng.gen_range(0..3) {
                0 => Some(SortDirection::Asc),
                1 => Some(SortDirection::Desc),
                _ => None,
            };
            replica.change_sort(direction);
        }
    }
}

pub async fn simulate_workspace(
    browsers: usize,
    rounds: usize,
    edits_per_round: usize,
) -> SimulationStats {
    let started = Instant::now();
    let store = MemoryStore::new();
    let mut rng = rand::thread_rng();

    let replicas: Vec<Replica> = (0..browsers)
        .map(|i| replica(&store, &format!("browser-{}", i)))
        .collect();

    let mut ops_issued = 0;
    for _ in 0..rounds {
        for replica in &replicas {
            for _ in 0..edits_per_round {
                random_edit(replica, &mut rng);
                ops_issued += 1;
            }
            replica
                .sync()
                .await
                .expect("memory transport does not fail");
        }
        // Pace the rounds the way a periodic background sync would.
        tokio::time::sleep(replicas[0].sync_interval()).await;
    }

    // Drain: keep syncing until every replica has pushed its queue and
    // seen everything in the store.
    for _ in 0..2 {
        for replica in &replicas {
            replica
                .sync()
                .await
                .expect("memory transport does not fail");
        }
    }

    let projections: Vec<_> = replicas
        .iter()
        .map(|r| selected_set(&r.state()))
        .collect();
    let live_replicas_agree = projections.windows(2).all(|pair| pair[0] == pair[1]);

    // A browser opening a new session projects the full history from
    // version zero; those projections must match exactly.
    let mut fresh_states = Vec::new();
    for i in 0..browsers.min(3) {
        let fresh = replica(&store, &format!("fresh-{}", i));
        fresh
            .sync()
            .await
            .expect("memory transport does not fail");
        fresh_states.push(fresh.state());
    }
    let fresh_replicas_identical = fresh_states.windows(2).all(|pair| pair[0] == pair[1]);

    SimulationStats {
        browsers,
        rounds,
        ops_issued,
        store_ops: store.len(),
        final_selected: fresh_states
            .first()
            .map(|s| s.selected_images.len())
            .unwrap_or(0),
        live_replicas_agree,
        fresh_replicas_identical,
        elapsed_ms: started.elapsed().as_millis(),
    }
}
