//! Summary vs. leaf status of a node.
//!
//! A node with children is a summary (`Auto`, derived schedule); a node
//! without children is a leaf (`Manual`, user-entered schedule). The level
//! based seed is only a construction-time hint and is always corrected from
//! the real child count before a node is stored.

use crate::models::{RevertPolicy, TaskLevel, TaskMode, TaskNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryFlags {
    pub is_summary: bool,
    pub task_mode: TaskMode,
}

impl SummaryFlags {
    pub const SUMMARY: SummaryFlags = SummaryFlags {
        is_summary: true,
        task_mode: TaskMode::Auto,
    };

    pub const LEAF: SummaryFlags = SummaryFlags {
        is_summary: false,
        task_mode: TaskMode::Manual,
    };

    /// Heuristic seed from the level alone.
    pub fn seed_for_level(level: TaskLevel) -> Self {
        if level.is_container_like() {
            Self::SUMMARY
        } else {
            Self::LEAF
        }
    }

    pub fn for_child_count(children: usize) -> Self {
        if children > 0 {
            Self::SUMMARY
        } else {
            Self::LEAF
        }
    }

    pub fn of(node: &TaskNode) -> Self {
        SummaryFlags {
            is_summary: node.is_summary,
            task_mode: node.task_mode,
        }
    }

    pub fn apply_to(self, node: &mut TaskNode) {
        node.is_summary = self.is_summary;
        node.task_mode = self.task_mode;
    }
}

/// Marks `node` as a summary because a child was attached to it.
/// Returns true if the flags changed.
pub fn promote(node: &mut TaskNode) -> bool {
    let changed = SummaryFlags::of(node) != SummaryFlags::SUMMARY;
    SummaryFlags::SUMMARY.apply_to(node);
    changed
}

/// Turns a node that just lost its last child back into a manual leaf.
///
/// Under [`RevertPolicy::Keep`] the previously rolled-up values stay in place
/// and become ordinary manual values. Returns true if anything changed.
pub fn demote(node: &mut TaskNode, policy: RevertPolicy) -> bool {
    let before = node.clone();
    SummaryFlags::LEAF.apply_to(node);
    if policy == RevertPolicy::Clear {
        node.start_date = None;
        node.end_date = None;
        node.duration_days = None;
        node.progress = 0;
    }
    *node != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    #[rstest]
    #[case(TaskLevel::Project, SummaryFlags::LEAF)]
    #[case(TaskLevel::Building, SummaryFlags::SUMMARY)]
    #[case(TaskLevel::Activity, SummaryFlags::SUMMARY)]
    #[case(TaskLevel::Task, SummaryFlags::LEAF)]
    fn test_seed_for_level(#[case] level: TaskLevel, #[case] expected: SummaryFlags) {
        assert_eq!(SummaryFlags::seed_for_level(level), expected);
    }

    #[test]
    fn test_child_count_overrides_seed() {
        assert_eq!(SummaryFlags::for_child_count(0), SummaryFlags::LEAF);
        assert_eq!(SummaryFlags::for_child_count(3), SummaryFlags::SUMMARY);
    }

    fn rolled_up_node() -> TaskNode {
        TaskNode {
            start_date: NaiveDate::from_ymd_opt(2026, 4, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 4, 9),
            duration_days: Some(8.0),
            progress: 45,
            is_summary: true,
            task_mode: TaskMode::Auto,
            ..Default::default()
        }
    }

    #[test]
    fn test_demote_keeps_last_known_values() {
        let mut node = rolled_up_node();
        assert!(demote(&mut node, RevertPolicy::Keep));
        assert!(!node.is_summary);
        assert_eq!(node.task_mode, TaskMode::Manual);
        assert_eq!(node.duration_days, Some(8.0));
        assert_eq!(node.progress, 45);
        assert!(node.start_date.is_some());
    }

    #[test]
    fn test_demote_clear_policy() {
        let mut node = rolled_up_node();
        demote(&mut node, RevertPolicy::Clear);
        assert_eq!(node.start_date, None);
        assert_eq!(node.end_date, None);
        assert_eq!(node.duration_days, None);
        assert_eq!(node.progress, 0);
    }

    #[test]
    fn test_promote_reports_change_once() {
        let mut node = TaskNode::default();
        assert!(promote(&mut node));
        assert!(!promote(&mut node));
        assert_eq!(SummaryFlags::of(&node), SummaryFlags::SUMMARY);
    }
}
