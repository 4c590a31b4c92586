//! In-memory copy of one project's task tree.
//!
//! Mutations load the project's nodes once inside their transaction, apply
//! the change here and to the store, run the rollup walk against the arena,
//! and write back only the nodes the walk changed.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::CoreError;
use crate::models::TaskNode;

#[derive(Debug, Clone, Default)]
pub struct TaskArena {
    nodes: HashMap<Uuid, TaskNode>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

impl TaskArena {
    pub fn new(nodes: impl IntoIterator<Item = TaskNode>) -> Self {
        let mut arena = TaskArena::default();
        for node in nodes {
            arena.insert(node);
        }
        arena
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&TaskNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: Uuid) -> Option<&mut TaskNode> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    /// Direct children of `id`, ordered by `sort_order`.
    pub fn children(&self, id: Uuid) -> Vec<&TaskNode> {
        let mut out: Vec<&TaskNode> = self
            .children
            .get(&id)
            .map(|ids| ids.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default();
        out.sort_by_key(|n| (n.sort_order, n.id));
        out
    }

    pub fn child_count(&self, id: Uuid) -> usize {
        self.children.get(&id).map_or(0, Vec::len)
    }

    /// Largest `sort_order` among the nodes sharing `parent_id`, or 0.
    pub fn max_sibling_sort_order(&self, project_id: Uuid, parent_id: Option<Uuid>) -> i64 {
        self.nodes
            .values()
            .filter(|n| n.project_id == project_id && n.parent_id == parent_id)
            .map(|n| n.sort_order)
            .max()
            .unwrap_or(0)
    }

    pub fn insert(&mut self, node: TaskNode) {
        match self.nodes.get(&node.id).map(|previous| previous.parent_id) {
            Some(old_parent) if old_parent == node.parent_id => {
                self.nodes.insert(node.id, node);
                return;
            }
            Some(old_parent) => self.unlink(node.id, old_parent),
            None => {}
        }
        if let Some(parent) = node.parent_id {
            self.children.entry(parent).or_default().push(node.id);
        }
        self.nodes.insert(node.id, node);
    }

    fn unlink(&mut self, id: Uuid, parent: Option<Uuid>) {
        if let Some(parent) = parent {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|c| *c != id);
                if siblings.is_empty() {
                    self.children.remove(&parent);
                }
            }
        }
    }

    /// Removes `id` and every descendant. Returns the removed ids.
    pub fn remove_subtree(&mut self, id: Uuid) -> Vec<Uuid> {
        let Some(root) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let parent = root.parent_id;
        self.unlink(id, parent);

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.nodes.remove(&current).is_none() {
                continue;
            }
            removed.push(current);
            if let Some(kids) = self.children.remove(&current) {
                stack.extend(kids);
            }
        }
        removed
    }

    /// Ancestor ids of `id`, nearest first.
    ///
    /// Fails with `PropagationDepthExceeded` if the chain is longer than
    /// `max_depth`, which is also how a corrupted (cyclic) chain shows up.
    pub fn ancestors(&self, id: Uuid, max_depth: usize) -> Result<Vec<Uuid>, CoreError> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(parent) = current {
            if chain.len() >= max_depth {
                return Err(CoreError::PropagationDepthExceeded {
                    start: id,
                    max_depth,
                });
            }
            chain.push(parent);
            current = self.nodes.get(&parent).and_then(|n| n.parent_id);
        }
        Ok(chain)
    }

    /// True if placing `task_id` under `new_parent_id` would make the task its
    /// own ancestor.
    ///
    /// A chain above the new parent longer than `max_depth` is reported as
    /// `PropagationDepthExceeded` rather than as a cycle.
    pub fn would_create_cycle(
        &self,
        task_id: Uuid,
        new_parent_id: Uuid,
        max_depth: usize,
    ) -> Result<bool, CoreError> {
        if task_id == new_parent_id {
            return Ok(true);
        }
        // Walk up from the new parent; reaching the task means it is a descendant.
        let mut current = Some(new_parent_id);
        let mut steps = 0;
        while let Some(id) = current {
            if id == task_id {
                return Ok(true);
            }
            if steps > max_depth {
                return Err(CoreError::PropagationDepthExceeded {
                    start: new_parent_id,
                    max_depth,
                });
            }
            steps += 1;
            current = self.nodes.get(&id).and_then(|n| n.parent_id);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, parent: Option<Uuid>, sort_order: i64) -> TaskNode {
        TaskNode {
            name: name.to_string(),
            parent_id: parent,
            sort_order,
            ..Default::default()
        }
    }

    #[test]
    fn test_children_sorted_and_counted() {
        let root = node("root", None, 1);
        let b = node("b", Some(root.id), 2);
        let a = node("a", Some(root.id), 1);
        let arena = TaskArena::new(vec![root.clone(), b, a]);
        let names: Vec<&str> = arena.children(root.id).iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(arena.child_count(root.id), 2);
        assert_eq!(arena.max_sibling_sort_order(Uuid::nil(), Some(root.id)), 2);
        assert_eq!(arena.max_sibling_sort_order(Uuid::nil(), Some(Uuid::now_v7())), 0);
    }

    #[test]
    fn test_reinsert_moves_between_parents() {
        let p1 = node("p1", None, 1);
        let p2 = node("p2", None, 2);
        let mut c = node("c", Some(p1.id), 1);
        let mut arena = TaskArena::new(vec![p1.clone(), p2.clone(), c.clone()]);
        c.parent_id = Some(p2.id);
        arena.insert(c.clone());
        assert_eq!(arena.child_count(p1.id), 0);
        assert_eq!(arena.child_count(p2.id), 1);
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn test_remove_subtree() {
        let a = node("a", None, 1);
        let b = node("b", Some(a.id), 1);
        let c = node("c", Some(b.id), 1);
        let d = node("d", Some(a.id), 2);
        let mut arena = TaskArena::new(vec![a.clone(), b.clone(), c.clone(), d.clone()]);
        let mut removed = arena.remove_subtree(b.id);
        removed.sort();
        let mut expected = vec![b.id, c.id];
        expected.sort();
        assert_eq!(removed, expected);
        assert_eq!(arena.child_count(a.id), 1);
        assert!(arena.get(c.id).is_none());
        assert!(arena.remove_subtree(b.id).is_empty());
    }

    #[test]
    fn test_ancestors_and_cycle_detection() {
        let a = node("a", None, 1);
        let b = node("b", Some(a.id), 1);
        let c = node("c", Some(b.id), 1);
        let arena = TaskArena::new(vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(arena.ancestors(c.id, 10).unwrap(), vec![b.id, a.id]);
        assert!(arena.ancestors(c.id, 1).is_err());

        assert!(arena.would_create_cycle(a.id, c.id, 10).unwrap());
        assert!(arena.would_create_cycle(b.id, b.id, 10).unwrap());
        assert!(!arena.would_create_cycle(c.id, a.id, 10).unwrap());
    }

    #[test]
    fn test_deep_acyclic_chain_is_not_a_cycle() {
        let mut nodes = vec![node("n0", None, 1)];
        for i in 1..6 {
            let parent = nodes[i - 1].id;
            nodes.push(node(&format!("n{}", i), Some(parent), 1));
        }
        let bottom = nodes[5].id;
        let stray = node("stray", None, 2);
        let arena = TaskArena::new(nodes.into_iter().chain([stray.clone()]));

        assert!(!arena.would_create_cycle(stray.id, bottom, 10).unwrap());
        let err = arena.would_create_cycle(stray.id, bottom, 2).unwrap_err();
        assert!(matches!(err, CoreError::PropagationDepthExceeded { max_depth: 2, .. }));
    }

    #[test]
    fn test_corrupted_chain_is_bounded() {
        let mut a = node("a", None, 1);
        let b = node("b", Some(a.id), 1);
        a.parent_id = Some(b.id);
        let arena = TaskArena::new(vec![a.clone(), b.clone()]);
        assert!(matches!(
            arena.ancestors(a.id, 8),
            Err(CoreError::PropagationDepthExceeded { max_depth: 8, .. })
        ));
    }
}
