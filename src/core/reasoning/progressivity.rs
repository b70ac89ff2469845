//! Disease-progressivity rule.
//!
//! Classifies the target lineage (or, without a target, the most frequent
//! dated diagnosis) as a single acute occurrence or a recurring course.
//! Occurrences are gathered along DIAGNOSIS_CONTINUITY chains; coded events
//! joined to the lineage only by code stem have no chain and are added
//! individually. Several occurrences on one day count as one timeline date.

use std::collections::BTreeSet;

use crate::core::graph::{EventGraph, Node};
use crate::domain::NodeId;
use crate::domain::{ProgressivityFinding, ProgressivityStatus};

use super::DiagnosisLineage;

pub fn evaluate(
    graph: &EventGraph,
    lineage: Option<&DiagnosisLineage<'_>>,
    min_progression_days: i64,
) -> ProgressivityFinding {
    let (diagnosis, occurrences): (Option<String>, Vec<&Node>) = match lineage {
        Some(lineage) => (
            Some(lineage.target().label().to_string()),
            lineage_occurrences(graph, lineage),
        ),
        None => match most_frequent_diagnosis(graph) {
            Some(canonical) => {
                let chain = graph.continuity_chain(&canonical);
                (Some(canonical), chain)
            }
            None => (None, Vec::new()),
        },
    };

    let mut timeline: Vec<_> = occurrences.iter().filter_map(|n| n.date()).collect();
    timeline.dedup();

    let status = match (timeline.first(), timeline.last()) {
        (Some(first), Some(last)) if timeline.len() >= 2 => {
            if (*last - *first).num_days() >= min_progression_days {
                ProgressivityStatus::ProgressiveChronic
            } else {
                ProgressivityStatus::AcuteIsolated
            }
        }
        (Some(_), _) => ProgressivityStatus::AcuteIsolated,
        _ => ProgressivityStatus::Unknown,
    };

    ProgressivityFinding {
        status,
        diagnosis,
        timeline,
        node_ids: occurrences.iter().map(|n| n.id.clone()).collect(),
    }
}

/// Dated nodes on the continuity chains the lineage covers, plus nodes
/// sharing the target's code stem, in timeline order
fn lineage_occurrences<'g>(
    graph: &'g EventGraph,
    lineage: &DiagnosisLineage<'_>,
) -> Vec<&'g Node> {
    let chained: BTreeSet<&NodeId> = graph
        .diagnoses()
        .filter(|canonical| lineage.covers(canonical))
        .flat_map(|canonical| graph.continuity_chain(canonical))
        .map(|node| &node.id)
        .collect();

    graph
        .dated_nodes()
        .iter()
        .filter(|node| chained.contains(&node.id) || lineage.shares_code_stem(&node.event))
        .collect()
}

/// Canonical diagnosis with the most dated occurrences; ties go to the one
/// seen first on the timeline.
fn most_frequent_diagnosis(graph: &EventGraph) -> Option<String> {
    let mut order: Vec<(&str, usize)> = Vec::new();

    for node in graph.dated_nodes() {
        let Some(canonical) = node.event.diagnosis_canonical.as_deref() else {
            continue;
        };
        match order.iter_mut().find(|(name, _)| *name == canonical) {
            Some((_, count)) => *count += 1,
            None => order.push((canonical, 1)),
        }
    }

    order
        .iter()
        .fold(None::<(&str, usize)>, |best, &(name, count)| match best {
            Some((_, max)) if count <= max => best,
            _ => Some((name, count)),
        })
        .map(|(name, _)| name.to_string())
}
