//! Parser for `rbd mirror pool status --verbose --format json`.
//!
//! Two layouts are in the wild and both are accepted:
//!
//! - mode-list: every image carries `"mode": "journal" | "snapshot" | ...`
//! - peer-description: images carry `peer_sites[]` whose `description`
//!   embeds the snapshot stats as a JSON fragment
//!
//! The image list may be wrapped as `{"images": [...]}` or given bare.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::error::CollectError;

/// Mirroring mode declared for an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageMode {
    Journal,
    Snapshot,
    Disabled,
    Other(String),
}

impl ImageMode {
    pub fn parse(s: &str) -> Self {
        match s {
            "journal" => ImageMode::Journal,
            "snapshot" => ImageMode::Snapshot,
            "disabled" => ImageMode::Disabled,
            other => ImageMode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImageMode::Journal => "journal",
            ImageMode::Snapshot => "snapshot",
            ImageMode::Disabled => "disabled",
            ImageMode::Other(s) => s,
        }
    }

    /// Modes that have a structured status payload.
    pub fn is_mirrored(&self) -> bool {
        matches!(self, ImageMode::Journal | ImageMode::Snapshot)
    }
}

/// First peer site reported for an image.
///
/// Fields that are missing, `null` or not strings read as `None`, so an odd
/// peer entry only affects its own image.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PeerSite {
    #[serde(default, deserialize_with = "string_or_none")]
    pub description: Option<String>,
    /// Replication state token, e.g. `up+replaying`.
    #[serde(default, deserialize_with = "string_or_none")]
    pub state: Option<String>,
    /// Last status update, `YYYY-MM-DD HH:MM:SS`.
    #[serde(default, deserialize_with = "string_or_none")]
    pub last_update: Option<String>,
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// One image enumerated from the pool status.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    pub name: String,
    /// `None` when the layout carries no explicit mode.
    pub mode: Option<ImageMode>,
    pub peer: Option<PeerSite>,
}

/// Parsed pool status, images in payload order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStatus {
    pub images: Vec<ResourceEntry>,
}

impl PoolStatus {
    /// Whether any image declares an explicit mode (mode-list layout).
    pub fn lists_modes(&self) -> bool {
        self.images.iter().any(|img| img.mode.is_some())
    }
}

#[derive(Deserialize)]
struct ImageDoc {
    name: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    peer_sites: Vec<PeerSite>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PoolDoc {
    Bare(Vec<ImageDoc>),
    Wrapped {
        #[serde(default)]
        images: Vec<ImageDoc>,
    },
}

/// Parses raw pool-status output.
pub fn parse_pool_status(raw: &[u8]) -> Result<PoolStatus, CollectError> {
    let doc: PoolDoc =
        serde_json::from_slice(raw).map_err(|e| CollectError::decode("pool status", e))?;

    let images = match doc {
        PoolDoc::Bare(images) => images,
        PoolDoc::Wrapped { images } => images,
    };

    Ok(PoolStatus {
        images: images
            .into_iter()
            .map(|img| ResourceEntry {
                name: img.name,
                mode: img.mode.as_deref().map(ImageMode::parse),
                peer: img.peer_sites.into_iter().next(),
            })
            .collect(),
    })
}
