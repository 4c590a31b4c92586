//! Tree views over a flat task listing, and invariant checks.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::arena::TaskArena;
use crate::models::{TaskMode, TaskNode};
use crate::rollup::rollup;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    #[serde(flatten)]
    pub task: TaskNode,
    /// Number of ancestors; roots are 0
    pub depth: usize,
    pub children: Vec<TreeNode>,
}

/// Rebuilds the forest from `parent_id` links.
///
/// Siblings are ordered by `sort_order`, then creation time. A node whose
/// parent is not part of `tasks` is treated as a root.
pub fn build_tree(tasks: Vec<TaskNode>) -> Vec<TreeNode> {
    let ids: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();
    let mut by_parent: HashMap<Option<Uuid>, Vec<TaskNode>> = HashMap::new();
    for task in tasks {
        let key = task.parent_id.filter(|p| ids.contains(p));
        by_parent.entry(key).or_default().push(task);
    }

    fn attach(parent: Option<Uuid>, depth: usize, by_parent: &mut HashMap<Option<Uuid>, Vec<TaskNode>>) -> Vec<TreeNode> {
        let mut level = by_parent.remove(&parent).unwrap_or_default();
        level.sort_by_key(|t| (t.sort_order, t.created_at, t.id));
        level
            .into_iter()
            .map(|task| {
                let children = attach(Some(task.id), depth + 1, by_parent);
                TreeNode {
                    task,
                    depth,
                    children,
                }
            })
            .collect()
    }

    attach(None, 0, &mut by_parent)
}

/// Depth-first, parents before children.
pub fn flatten(tree: &[TreeNode]) -> Vec<&TreeNode> {
    let mut out = Vec::new();
    let mut stack: Vec<&TreeNode> = tree.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(node.children.iter().rev());
    }
    out
}

/// `node` and all of its descendants.
pub fn subtree_ids(node: &TreeNode) -> Vec<Uuid> {
    flatten(std::slice::from_ref(node))
        .into_iter()
        .map(|n| n.task.id)
        .collect()
}

/// Number of ancestors of `task` found in `all`.
pub fn indent_level(task: &TaskNode, all: &[TaskNode]) -> usize {
    let parents: HashMap<Uuid, Option<Uuid>> = all.iter().map(|t| (t.id, t.parent_id)).collect();
    let mut depth = 0;
    let mut current = task.parent_id;
    while let Some(parent) = current {
        if depth > all.len() {
            break;
        }
        depth += 1;
        current = parents.get(&parent).copied().flatten();
    }
    depth
}

/// Contiguous `1..=n` sort orders for one sibling group, keeping the current order.
pub fn reindex_sort_orders(siblings: &[TaskNode]) -> Vec<(Uuid, i64)> {
    let mut sorted: Vec<&TaskNode> = siblings.iter().collect();
    sorted.sort_by_key(|t| (t.sort_order, t.id));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, t)| (t.id, i as i64 + 1))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum InvariantViolation {
    #[error("task {task_id} is its own ancestor")]
    Cycle { task_id: Uuid },
    #[error("task {task_id} references missing parent {parent_id}")]
    MissingParent { task_id: Uuid, parent_id: Uuid },
    #[error("task {task_id} has a parent {parent_id} in another project")]
    CrossProjectParent { task_id: Uuid, parent_id: Uuid },
    #[error("task {task_id} has {field} out of range")]
    OutOfRange { task_id: Uuid, field: &'static str },
    #[error("task {task_id} has only one of start and end date")]
    HalfScheduled { task_id: Uuid },
    #[error("milestone {task_id} does not start and end on the same day with zero duration")]
    MilestoneMismatch { task_id: Uuid },
    #[error("task {task_id} has {children} children but summary={is_summary} mode={task_mode}")]
    SummaryFlagMismatch {
        task_id: Uuid,
        children: usize,
        is_summary: bool,
        task_mode: TaskMode,
    },
    #[error("summary task {task_id} does not match the rollup of its children")]
    StaleRollup { task_id: Uuid },
    #[error("sort order {sort_order} is used more than once under parent {parent_id:?}")]
    DuplicateSortOrder {
        parent_id: Option<Uuid>,
        sort_order: i64,
    },
}

/// Checks every stored invariant of a project's tree.
pub fn check_invariants(tasks: &[TaskNode], max_depth: usize) -> Vec<InvariantViolation> {
    let arena = TaskArena::new(tasks.iter().cloned());
    let mut violations = Vec::new();

    let mut sorted: Vec<&TaskNode> = tasks.iter().collect();
    sorted.sort_by_key(|t| t.id);

    let mut seen_orders: HashSet<(Uuid, Option<Uuid>, i64)> = HashSet::new();
    let mut reported_orders: HashSet<(Uuid, Option<Uuid>, i64)> = HashSet::new();

    for task in sorted {
        let id = task.id;

        if let Some(parent_id) = task.parent_id {
            match arena.get(parent_id) {
                None => violations.push(InvariantViolation::MissingParent {
                    task_id: id,
                    parent_id,
                }),
                Some(parent) if parent.project_id != task.project_id => {
                    violations.push(InvariantViolation::CrossProjectParent {
                        task_id: id,
                        parent_id,
                    })
                }
                Some(_) => {}
            }
            // An overlong chain is not evidence of a cycle through this node.
            if matches!(arena.would_create_cycle(id, parent_id, max_depth), Ok(true)) {
                violations.push(InvariantViolation::Cycle { task_id: id });
            }
        }

        if task.duration_days.is_some_and(|d| !(d >= 0.0)) {
            violations.push(InvariantViolation::OutOfRange {
                task_id: id,
                field: "duration_days",
            });
        }
        if !(0..=100).contains(&task.progress) {
            violations.push(InvariantViolation::OutOfRange {
                task_id: id,
                field: "progress",
            });
        }
        if task.start_date.is_some() != task.end_date.is_some() {
            violations.push(InvariantViolation::HalfScheduled { task_id: id });
        }
        if task.is_milestone
            && (task.start_date != task.end_date || task.duration_days.is_some_and(|d| d != 0.0))
        {
            violations.push(InvariantViolation::MilestoneMismatch { task_id: id });
        }

        let children = arena.child_count(id);
        let expect_summary = children > 0;
        let expected_mode = if expect_summary { TaskMode::Auto } else { TaskMode::Manual };
        if task.is_summary != expect_summary || task.task_mode != expected_mode {
            violations.push(InvariantViolation::SummaryFlagMismatch {
                task_id: id,
                children,
                is_summary: task.is_summary,
                task_mode: task.task_mode,
            });
        }
        if expect_summary {
            if let Some(expected) = rollup(arena.children(id)) {
                if !expected.is_reflected_in(task) {
                    violations.push(InvariantViolation::StaleRollup { task_id: id });
                }
            }
        }

        let key = (task.project_id, task.parent_id, task.sort_order);
        if !seen_orders.insert(key) && reported_orders.insert(key) {
            violations.push(InvariantViolation::DuplicateSortOrder {
                parent_id: task.parent_id,
                sort_order: task.sort_order,
            });
        }
    }

    violations
}
