//! Asset model, listing fetch and graph reconciliation.

pub mod reconciler;
pub mod source;
pub mod types;

pub use reconciler::{classify, AssetGraph, AssetGraphReconciler};
pub use source::{AssetSource, HttpAssetSource};
pub use types::{Asset, AssetRecord, DeclaredType};
