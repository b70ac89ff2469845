//! Temporal entity graph over normalized events.
//!
//! Dated nodes come first in ascending date order (ties by source offset)
//! and get ids `ev-0001`, `ev-0002`, ... in that order. Undated nodes follow
//! and stay isolated. Edges carry the day gap between their endpoints.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{NodeId, NormalizedEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Consecutive dated nodes in the global timeline
    TemporalNext,
    /// Two visits to the same canonical hospital within the window
    SameHospitalWindow,
    /// Consecutive occurrences of the same canonical diagnosis
    DiagnosisContinuity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub kind: EdgeKind,
    pub from: NodeId,
    pub to: NodeId,
    pub gap_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub event: NormalizedEvent,
}

impl Node {
    pub fn date(&self) -> Option<NaiveDate> {
        self.event.date_normalized
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    dated_len: usize,
    window_days: i64,
    index: BTreeMap<NodeId, usize>,
    continuity: BTreeMap<String, Vec<usize>>,
}

impl EventGraph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dated nodes in timeline order
    pub fn dated_nodes(&self) -> &[Node] {
        &self.nodes[..self.dated_len]
    }

    pub fn undated_nodes(&self) -> &[Node] {
        &self.nodes[self.dated_len..]
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Whether any edge touches the node
    pub fn is_linked(&self, id: &NodeId) -> bool {
        self.edges.iter().any(|e| &e.from == id || &e.to == id)
    }

    /// Canonical diagnoses present on dated nodes
    pub fn diagnoses(&self) -> impl Iterator<Item = &str> {
        self.continuity.keys().map(String::as_str)
    }

    /// Dated occurrences of one canonical diagnosis, following its
    /// continuity chain
    pub fn continuity_chain(&self, canonical: &str) -> Vec<&Node> {
        self.continuity
            .get(canonical)
            .map(|chain| chain.iter().map(|&i| &self.nodes[i]).collect())
            .unwrap_or_default()
    }
}

/// Builds an `EventGraph` from normalized events
#[derive(Debug, Clone)]
pub struct RelationMapper {
    window_days: i64,
}

impl RelationMapper {
    pub fn new(window_days: i64) -> Self {
        Self { window_days }
    }

    pub fn map(&self, events: Vec<NormalizedEvent>) -> EventGraph {
        let (mut dated, undated): (Vec<_>, Vec<_>) = events.into_iter().partition(|e| e.is_dated());
        dated.sort_by_key(|e| (e.date_normalized, e.raw.source_offset));
        let dated_len = dated.len();

        let nodes: Vec<Node> = dated
            .into_iter()
            .chain(undated)
            .enumerate()
            .map(|(i, event)| Node {
                id: NodeId::from_index(i),
                event,
            })
            .collect();

        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();

        let mut continuity: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut by_hospital: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, node) in nodes[..dated_len].iter().enumerate() {
            if let Some(diagnosis) = &node.event.diagnosis_canonical {
                continuity.entry(diagnosis.clone()).or_default().push(i);
            }
            if let Some(hospital) = &node.event.hospital_canonical {
                by_hospital.entry(hospital.clone()).or_default().push(i);
            }
        }

        let mut edges = Vec::new();

        for i in 1..dated_len {
            edges.push(edge(EdgeKind::TemporalNext, &nodes, i - 1, i));
        }

        for chain in continuity.values() {
            for pair in chain.windows(2) {
                edges.push(edge(EdgeKind::DiagnosisContinuity, &nodes, pair[0], pair[1]));
            }
        }

        for visits in by_hospital.values() {
            for (k, &a) in visits.iter().enumerate() {
                for &b in &visits[k + 1..] {
                    if gap(&nodes, a, b) > self.window_days {
                        break;
                    }
                    edges.push(edge(EdgeKind::SameHospitalWindow, &nodes, a, b));
                }
            }
        }

        debug!(
            nodes = nodes.len(),
            dated = dated_len,
            edges = edges.len(),
            "mapped event graph"
        );

        EventGraph {
            nodes,
            edges,
            dated_len,
            window_days: self.window_days,
            index,
            continuity,
        }
    }
}

fn gap(nodes: &[Node], from: usize, to: usize) -> i64 {
    match (nodes[from].date(), nodes[to].date()) {
        (Some(a), Some(b)) => (b - a).num_days(),
        _ => 0,
    }
}

fn edge(kind: EdgeKind, nodes: &[Node], from: usize, to: usize) -> Edge {
    Edge {
        kind,
        from: nodes[from].id.clone(),
        to: nodes[to].id.clone(),
        gap_days: gap(nodes, from, to),
    }
}
