//! Asset model.
//!
//! Assets are minted externally and never mutated locally; the pipeline
//! only reads and classifies them.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

/// Declared type of an externally-minted asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeclaredType {
    /// The unit of work a paid task is anchored to, typically a reference
    /// URL in its description.
    Source,
    /// An output record produced by a completed job, linked back to its
    /// source asset.
    DerivedFact,
}

/// An immutable ledger-recorded asset.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub declared_type: DeclaredType,
    pub description: String,
    /// Present only on derived facts; refers to the originating source
    /// asset's id. A derived fact without one is an orphan.
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Wire shape of an asset from the listing query. Creation timestamps come
/// from whichever metadata field the minting path happened to fill.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub id: String,
    pub declared_type: DeclaredType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_ref: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub minted_at: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn parse_timestamp(s: &str, asset_id: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Unparseable timestamp '{}' on asset {}: {}", s, asset_id, e);
            Utc::now()
        })
}

impl AssetRecord {
    /// Resolves the creation timestamp from the first non-empty candidate
    /// field, falling back to now when none is set.
    fn resolve_created_at(&self) -> DateTime<Utc> {
        [&self.created_at, &self.minted_at, &self.timestamp]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .map(|s| parse_timestamp(s, &self.id))
            .unwrap_or_else(Utc::now)
    }

    pub fn into_asset(self) -> Asset {
        let created_at = self.resolve_created_at();
        let parent_id = self.parent_ref.filter(|p| !p.trim().is_empty());
        Asset {
            id: self.id,
            declared_type: self.declared_type,
            description: self.description,
            parent_id,
            created_at,
        }
    }
}
