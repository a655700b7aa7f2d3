//! Asset graph reconciliation.
//!
//! Fetches the wallet's flat asset collection, stitches it into a
//! two-level parent/child derivation graph and merges the result into the
//! task store. Runs on demand and at startup; tolerates being invoked
//! while pollers are active and never stops or alters one. A fetch
//! failure leaves prior state untouched and is logged only.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::assets::source::AssetSource;
use crate::assets::types::{Asset, DeclaredType};
use crate::store::TaskStore;

/// A classified asset set: source assets plus a multimap from parent
/// source id to its derived facts. Orphans (derived facts with no
/// resolvable parent reference) are counted and otherwise ignored.
#[derive(Debug, Default)]
pub struct AssetGraph {
    pub sources: Vec<Asset>,
    pub derived_by_parent: HashMap<String, Vec<Asset>>,
    pub orphans: usize,
}

/// Partitions a flat asset list by declared type and links derived facts
/// to their declared parents.
pub fn classify(assets: Vec<Asset>) -> AssetGraph {
    let mut graph = AssetGraph::default();

    for asset in assets {
        match asset.declared_type {
            DeclaredType::Source => graph.sources.push(asset),
            DeclaredType::DerivedFact => match asset.parent_id.clone() {
                Some(parent_id) => {
                    graph.derived_by_parent.entry(parent_id).or_default().push(asset);
                }
                None => {
                    debug!("Ignoring orphaned derived fact {}", asset.id);
                    graph.orphans += 1;
                }
            },
        }
    }

    graph
}

/// Fetch-and-merge driver over an [`AssetSource`] and the task store.
pub struct AssetGraphReconciler {
    source: Arc<dyn AssetSource>,
    store: Arc<TaskStore>,
    owner: String,
}

impl AssetGraphReconciler {
    pub fn new(source: Arc<dyn AssetSource>, store: Arc<TaskStore>, owner: &str) -> Self {
        Self {
            source,
            store,
            owner: owner.to_string(),
        }
    }

    /// One reconciliation pass. Never surfaces an error to the caller; a
    /// failed fetch is logged and the store keeps its prior state.
    pub async fn refresh(&self) {
        let records = match self.source.assets_by_owner(&self.owner).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Asset graph refresh failed, keeping prior state: {}", e);
                return;
            }
        };

        let total = records.len();
        let graph = classify(records.into_iter().map(|r| r.into_asset()).collect());
        if graph.orphans > 0 {
            debug!("{} orphaned derived facts ignored", graph.orphans);
        }

        let summary = self.store.merge_graph(&graph);
        info!(
            "Reconciled {} assets: {} sources, {} new tasks, {} newly completed",
            total,
            graph.sources.len(),
            summary.new_tasks,
            summary.newly_completed
        );
    }
}
