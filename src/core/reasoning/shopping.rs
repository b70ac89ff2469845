//! Doctor-shopping rule: a sliding window over dated visits with a
//! canonical hospital, counting distinct hospitals per window.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::core::graph::{EdgeKind, EventGraph, Node};
use crate::domain::{DateWindow, DoctorShoppingFinding, NodeId};

struct Visit<'a> {
    node: &'a Node,
    date: NaiveDate,
    hospital: &'a str,
}

pub fn evaluate(graph: &EventGraph, threshold: usize, window_days: i64) -> DoctorShoppingFinding {
    let visits: Vec<Visit<'_>> = graph
        .dated_nodes()
        .iter()
        .filter_map(|node| {
            Some(Visit {
                node,
                date: node.date()?,
                hospital: node.event.hospital_canonical.as_deref()?,
            })
        })
        .collect();

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut left = 0;
    // (distinct hospitals, left, right) of the first window reaching the max
    let mut best: Option<(usize, usize, usize)> = None;

    for right in 0..visits.len() {
        *counts.entry(visits[right].hospital).or_default() += 1;

        while (visits[right].date - visits[left].date).num_days() > window_days {
            let hospital = visits[left].hospital;
            if let Some(count) = counts.get_mut(hospital) {
                *count -= 1;
                if *count == 0 {
                    counts.remove(hospital);
                }
            }
            left += 1;
        }

        let distinct = counts.len();
        if best.map_or(true, |(max, _, _)| distinct > max) {
            best = Some((distinct, left, right));
        }
    }

    let Some((max_hospitals, start, end)) = best else {
        return DoctorShoppingFinding {
            threshold,
            ..Default::default()
        };
    };

    let in_window = &visits[start..=end];
    let node_ids: Vec<NodeId> = in_window.iter().map(|v| v.node.id.clone()).collect();
    let members: BTreeSet<&NodeId> = node_ids.iter().collect();
    let repeat_visits = graph
        .edges_of_kind(EdgeKind::SameHospitalWindow)
        .filter(|e| members.contains(&e.from) && members.contains(&e.to))
        .count();

    DoctorShoppingFinding {
        is_suspicious: max_hospitals >= threshold,
        max_hospitals,
        threshold,
        window: Some(DateWindow {
            start: visits[start].date,
            end: visits[end].date,
        }),
        node_ids,
        repeat_visits,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{event, graph};
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_three_hospitals_in_ten_days() {
        let g = graph(vec![
            event("2024-05-01", Some("서울대학교병원"), Some("요추 추간판 장애"), None),
            event("2024-05-05", Some("삼성서울병원"), Some("요추 추간판 장애"), None),
            event("2024-05-10", Some("서울아산병원"), Some("요추 추간판 장애"), None),
        ]);

        let finding = evaluate(&g, 2, 30);
        assert!(finding.is_suspicious);
        assert_eq!(finding.max_hospitals, 3);
        assert_eq!(
            finding.window,
            Some(DateWindow {
                start: ymd(2024, 5, 1),
                end: ymd(2024, 5, 10)
            })
        );
        assert_eq!(finding.node_ids.len(), 3);
        assert_eq!(finding.repeat_visits, 0);
    }

    #[test]
    fn test_threshold_boundary() {
        let g = graph(vec![
            event("2024-05-01", Some("A"), None, None),
            event("2024-05-02", Some("B"), None, None),
            event("2024-05-03", Some("C"), None, None),
        ]);

        assert!(evaluate(&g, 3, 30).is_suspicious);
        assert!(!evaluate(&g, 4, 30).is_suspicious);
    }

    #[test]
    fn test_spread_out_visits_not_suspicious() {
        let g = graph(vec![
            event("2024-01-01", Some("A"), None, None),
            event("2024-03-01", Some("B"), None, None),
            event("2024-05-01", Some("C"), None, None),
        ]);

        let finding = evaluate(&g, 2, 30);
        assert!(!finding.is_suspicious);
        assert_eq!(finding.max_hospitals, 1);
        // first window reaching the max
        assert_eq!(finding.window.unwrap().start, ymd(2024, 1, 1));
    }

    #[test]
    fn test_repeat_visits_counted_inside_window() {
        let g = graph(vec![
            event("2024-05-01", Some("A"), None, None),
            event("2024-05-03", Some("A"), None, None),
            event("2024-05-04", Some("B"), None, None),
        ]);

        let finding = evaluate(&g, 3, 30);
        assert_eq!(finding.max_hospitals, 2);
        assert_eq!(finding.repeat_visits, 1);
    }

    #[test]
    fn test_unmatched_hospitals_ignored() {
        let g = graph(vec![
            event("2024-05-01", None, Some("x"), None),
            event("2024-05-02", None, Some("y"), None),
        ]);

        let finding = evaluate(&g, 1, 30);
        assert_eq!(finding.max_hospitals, 0);
        assert!(!finding.is_suspicious);
        assert!(finding.window.is_none());
        assert_eq!(finding.threshold, 1);
    }
}
