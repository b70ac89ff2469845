//! Citation data types
//!
//! A citation ties a graph node back to the place in the source text the
//! extractor found it.

use serde::{Deserialize, Serialize};

use crate::domain::NodeId;

/// Where a cited node came from in the source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// Graph node this citation supports
    pub node_id: NodeId,
    /// UTF-8 byte offset into the source text
    pub source_offset: usize,
    /// 1-indexed line
    pub line: usize,
    /// 1-indexed column, in characters
    pub column: usize,
    /// Context around the offset (~80 chars)
    pub anchor_text: String,
    /// Offsets of duplicates merged into the node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_offsets: Vec<usize>,
}
