//! Upward rollup walk.
//!
//! Starting at a summary node, recompute it from its children, then move to
//! its parent, and so on until the root. The walk is an explicit bounded
//! loop over the in-memory [`TaskArena`]; the repository persists the steps
//! that changed something.

use tracing::debug;
use uuid::Uuid;

use crate::arena::TaskArena;
use crate::error::CoreError;
use crate::models::RevertPolicy;
use crate::rollup::{rollup, Rollup};
use crate::summary::{self, SummaryFlags};

/// One level of a walk.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationStep {
    pub task_id: Uuid,
    pub rollup: Rollup,
    /// False when the node already carried these values and flags
    pub changed: bool,
}

/// Recomputes a single node from its current children.
///
/// Returns `None` when the node has no children or none of them is
/// scheduled; the node is left untouched in both cases.
pub fn roll_up_node(arena: &mut TaskArena, task_id: Uuid) -> Option<PropagationStep> {
    if arena.child_count(task_id) == 0 {
        return None;
    }
    let result = rollup(arena.children(task_id))?;
    let node = arena.get_mut(task_id)?;

    let changed = !result.is_reflected_in(node) || SummaryFlags::of(node) != SummaryFlags::SUMMARY;
    node.start_date = Some(result.start_date);
    node.end_date = Some(result.end_date);
    node.duration_days = Some(result.duration_days);
    node.progress = result.progress;
    SummaryFlags::SUMMARY.apply_to(node);

    Some(PropagationStep {
        task_id,
        rollup: result,
        changed,
    })
}

/// Walks from `start` up to the root, rolling up each level.
///
/// Stops at the first node without children or without any scheduled child,
/// and at the root. Fails if more than `max_depth` levels are visited.
pub fn propagate_upward(
    arena: &mut TaskArena,
    start: Uuid,
    max_depth: usize,
) -> Result<Vec<PropagationStep>, CoreError> {
    let mut steps = Vec::new();
    let mut current = Some(start);

    while let Some(task_id) = current {
        if steps.len() >= max_depth {
            return Err(CoreError::PropagationDepthExceeded { start, max_depth });
        }
        let Some(step) = roll_up_node(arena, task_id) else {
            debug!(task_id = %task_id, "Nothing to roll up; walk stops");
            break;
        };
        debug!(
            task_id = %task_id,
            start = %step.rollup.start_date,
            end = %step.rollup.end_date,
            progress = step.rollup.progress,
            changed = step.changed,
            "Rolled up summary task"
        );
        steps.push(step);
        current = arena.get(task_id).and_then(|n| n.parent_id);
    }

    Ok(steps)
}

/// Ids touched by a full-project recalculation, in the order they were fixed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecalcReport {
    pub flags_fixed: Vec<Uuid>,
    pub rolled_up: Vec<Uuid>,
}

impl RecalcReport {
    pub fn changed_ids(&self) -> Vec<Uuid> {
        let mut ids = self.flags_fixed.clone();
        for id in &self.rolled_up {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }
}

/// Re-derives summary flags from child counts and rolls up every summary
/// node deepest-first. Safe to run at any time; a consistent tree is left
/// unchanged.
pub fn recalculate(
    arena: &mut TaskArena,
    max_depth: usize,
    policy: RevertPolicy,
) -> Result<RecalcReport, CoreError> {
    let mut report = RecalcReport::default();

    let mut ids: Vec<Uuid> = arena.nodes().map(|n| n.id).collect();
    ids.sort();
    for id in &ids {
        let expected = SummaryFlags::for_child_count(arena.child_count(*id));
        let Some(node) = arena.get_mut(*id) else {
            continue;
        };
        let fixed = if expected == SummaryFlags::SUMMARY {
            summary::promote(node)
        } else if node.is_summary || node.task_mode != expected.task_mode {
            summary::demote(node, policy)
        } else {
            false
        };
        if fixed {
            report.flags_fixed.push(*id);
        }
    }

    let mut parents = Vec::new();
    for id in ids {
        if arena.child_count(id) > 0 {
            parents.push((arena.ancestors(id, max_depth)?.len(), id));
        }
    }
    parents.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    for (_, id) in parents {
        if let Some(step) = roll_up_node(arena, id) {
            if step.changed {
                report.rolled_up.push(id);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskMode, TaskNode};
    use chrono::NaiveDate;

    fn date(m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2026, m, d)
    }

    fn node(name: &str, parent: Option<Uuid>) -> TaskNode {
        TaskNode {
            name: name.to_string(),
            parent_id: parent,
            ..Default::default()
        }
    }

    fn leaf(name: &str, parent: Uuid, start: Option<NaiveDate>, end: Option<NaiveDate>, progress: i32) -> TaskNode {
        let duration = match (start, end) {
            (Some(s), Some(e)) => Some((e - s).num_days() as f64),
            _ => None,
        };
        TaskNode {
            name: name.to_string(),
            parent_id: Some(parent),
            start_date: start,
            end_date: end,
            duration_days: duration,
            progress,
            ..Default::default()
        }
    }

    /// A -> B -> C -> D with D a scheduled leaf.
    fn chain() -> (TaskArena, [Uuid; 4]) {
        let a = node("A", None);
        let b = node("B", Some(a.id));
        let c = node("C", Some(b.id));
        let d = leaf("D", c.id, date(3, 1), date(3, 11), 40);
        let ids = [a.id, b.id, c.id, d.id];
        (TaskArena::new(vec![a, b, c, d]), ids)
    }

    #[test]
    fn test_chain_updates_each_ancestor_once_in_order() {
        let (mut arena, [a, b, c, d]) = chain();
        let steps = propagate_upward(&mut arena, c, 64).unwrap();
        let order: Vec<Uuid> = steps.iter().map(|s| s.task_id).collect();
        assert_eq!(order, vec![c, b, a]);
        assert!(steps.iter().all(|s| s.changed));

        for id in [a, b, c] {
            let n = arena.get(id).unwrap();
            assert_eq!(n.start_date, date(3, 1));
            assert_eq!(n.end_date, date(3, 11));
            assert_eq!(n.duration_days, Some(10.0));
            assert_eq!(n.progress, 40);
            assert!(n.is_summary);
            assert_eq!(n.task_mode, TaskMode::Auto);
        }
        assert!(!arena.get(d).unwrap().is_summary);
    }

    #[test]
    fn test_walk_is_idempotent() {
        let (mut arena, [_, _, c, _]) = chain();
        let first = propagate_upward(&mut arena, c, 64).unwrap();
        let snapshot: Vec<TaskNode> = first.iter().map(|s| arena.get(s.task_id).unwrap().clone()).collect();

        let second = propagate_upward(&mut arena, c, 64).unwrap();
        assert_eq!(first.len(), second.len());
        assert!(second.iter().all(|s| !s.changed));
        for (step, before) in second.iter().zip(snapshot) {
            assert_eq!(arena.get(step.task_id).unwrap(), &before);
        }
    }

    #[test]
    fn test_unscheduled_children_stop_walk_and_keep_values() {
        let mut parent = node("P", None);
        parent.start_date = date(1, 5);
        parent.end_date = date(1, 9);
        parent.duration_days = Some(4.0);
        parent.progress = 20;
        let child = leaf("c", parent.id, None, None, 90);
        let pid = parent.id;
        let before = parent.clone();
        let mut arena = TaskArena::new(vec![parent, child]);

        let steps = propagate_upward(&mut arena, pid, 64).unwrap();
        assert!(steps.is_empty());
        assert_eq!(arena.get(pid).unwrap(), &before);
    }

    #[test]
    fn test_missing_or_childless_start_is_noop() {
        let (mut arena, [_, _, _, d]) = chain();
        assert!(propagate_upward(&mut arena, d, 64).unwrap().is_empty());
        assert!(propagate_upward(&mut arena, Uuid::now_v7(), 64).unwrap().is_empty());
    }

    #[test]
    fn test_depth_bound_stops_cycles() {
        let mut a = node("a", None);
        let b = leaf("b", a.id, date(2, 1), date(2, 2), 0);
        a.parent_id = Some(b.id);
        let aid = a.id;
        let mut arena = TaskArena::new(vec![a, b]);
        let err = propagate_upward(&mut arena, aid, 5).unwrap_err();
        assert!(matches!(err, CoreError::PropagationDepthExceeded { max_depth: 5, .. }));
    }

    #[test]
    fn test_depth_bound_on_long_chain() {
        let (mut arena, [_, _, c, _]) = chain();
        assert!(propagate_upward(&mut arena, c, 2).is_err());
        assert!(propagate_upward(&mut arena, c, 3).is_ok());
    }

    #[test]
    fn test_recalculate_repairs_flags_and_values() {
        let mut a = node("A", None);
        // stale: marked leaf although it has children
        a.progress = 99;
        let b = leaf("b", a.id, date(6, 1), date(6, 3), 50);
        let c = leaf("c", a.id, date(6, 2), date(6, 6), 100);
        // stale: marked summary although it has no children
        let mut lonely = node("lonely", None);
        lonely.is_summary = true;
        lonely.task_mode = TaskMode::Auto;
        let (aid, lid) = (a.id, lonely.id);
        let mut arena = TaskArena::new(vec![a, b, c, lonely]);

        let report = recalculate(&mut arena, 64, RevertPolicy::Keep).unwrap();
        assert!(report.flags_fixed.contains(&aid));
        assert!(report.flags_fixed.contains(&lid));
        assert_eq!(report.rolled_up, vec![aid]);

        let a = arena.get(aid).unwrap();
        assert_eq!(a.start_date, date(6, 1));
        assert_eq!(a.end_date, date(6, 6));
        // weights 2 and 4: (2*50 + 4*100) / 6 = 83.3
        assert_eq!(a.progress, 83);
        assert!(!arena.get(lid).unwrap().is_summary);

        let again = recalculate(&mut arena, 64, RevertPolicy::Keep).unwrap();
        assert_eq!(again, RecalcReport::default());
    }

    #[test]
    fn test_recalculate_rolls_up_bottom_first() {
        let (mut arena, [a, _, _, _]) = chain();
        recalculate(&mut arena, 64, RevertPolicy::Keep).unwrap();
        assert_eq!(arena.get(a).unwrap().progress, 40);
        assert_eq!(arena.get(a).unwrap().duration_days, Some(10.0));
    }
}
