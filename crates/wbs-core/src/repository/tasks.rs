use crate::arena::TaskArena;
use crate::error::CoreError;
use crate::models::{DeleteOutcome, NewTaskData, TaskNode, UpdateTaskData};
use crate::propagation::{self, PropagationStep, RecalcReport};
use crate::repository::{ProjectRepository, SqliteRepository, TaskRepository};
use crate::summary::{self, SummaryFlags};
use crate::tree::{self, InvariantViolation, TreeNode};
use crate::validation::{
    validate_name, validate_progress, validate_sort_order, ScheduleChange, ScheduleFields,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Nodes whose derived fields have to be written back before commit.
#[derive(Debug, Default)]
struct DirtySet(Vec<Uuid>);

impl DirtySet {
    fn mark(&mut self, id: Uuid) {
        if !self.0.contains(&id) {
            self.0.push(id);
        }
    }

    fn mark_changed(&mut self, steps: &[PropagationStep]) {
        for step in steps.iter().filter(|s| s.changed) {
            self.mark(step.task_id);
        }
    }
}

impl SqliteRepository {
    /// Takes the project's lock and opens a transaction whose first statement
    /// is a write, so SQLite hands out the write lock before anything is read.
    async fn begin_project_write(
        &self,
        project_id: Uuid,
    ) -> Result<(OwnedMutexGuard<()>, Transaction<'static, Sqlite>), CoreError> {
        let guard = self.locks().acquire(project_id).await;
        let mut tx = self.pool().begin().await?;

        let touched = sqlx::query("UPDATE planner_projects SET updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Project {}", project_id)));
        }
        Ok((guard, tx))
    }

    async fn load_arena(
        tx: &mut Transaction<'_, Sqlite>,
        project_id: Uuid,
    ) -> Result<TaskArena, CoreError> {
        let nodes: Vec<TaskNode> =
            sqlx::query_as("SELECT * FROM planner_tasks WHERE project_id = $1")
                .bind(project_id)
                .fetch_all(&mut **tx)
                .await?;
        Ok(TaskArena::new(nodes))
    }

    /// The arena only holds the current project, so a parent missing from it
    /// either does not exist or lives in another project.
    async fn ensure_parent(
        tx: &mut Transaction<'_, Sqlite>,
        arena: &TaskArena,
        parent_id: Uuid,
    ) -> Result<(), CoreError> {
        if arena.get(parent_id).is_some() {
            return Ok(());
        }
        let elsewhere: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM planner_tasks WHERE id = $1")
            .bind(parent_id)
            .fetch_optional(&mut **tx)
            .await?;
        match elsewhere {
            Some(_) => Err(CoreError::validation(
                "parent_id",
                format!("task {} belongs to another project", parent_id),
            )),
            None => Err(CoreError::NotFound(format!("Parent task {}", parent_id))),
        }
    }

    async fn insert_node(tx: &mut Transaction<'_, Sqlite>, task: &TaskNode) -> Result<(), CoreError> {
        sqlx::query(
            r#"INSERT INTO planner_tasks (
                id, project_id, parent_id, level, sort_order, name,
                start_date, end_date, duration_days, progress,
                is_summary, is_milestone, task_mode, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(task.id)
        .bind(task.project_id)
        .bind(task.parent_id)
        .bind(task.level)
        .bind(task.sort_order)
        .bind(&task.name)
        .bind(task.start_date)
        .bind(task.end_date)
        .bind(task.duration_days)
        .bind(task.progress)
        .bind(task.is_summary)
        .bind(task.is_milestone)
        .bind(task.task_mode)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// User-facing write. Never touches `is_summary` or `task_mode`.
    async fn write_node(tx: &mut Transaction<'_, Sqlite>, task: &TaskNode) -> Result<(), CoreError> {
        sqlx::query(
            r#"UPDATE planner_tasks
            SET parent_id = $1, level = $2, sort_order = $3, name = $4,
                start_date = $5, end_date = $6, duration_days = $7, progress = $8,
                is_milestone = $9, updated_at = $10
            WHERE id = $11
            "#,
        )
        .bind(task.parent_id)
        .bind(task.level)
        .bind(task.sort_order)
        .bind(&task.name)
        .bind(task.start_date)
        .bind(task.end_date)
        .bind(task.duration_days)
        .bind(task.progress)
        .bind(task.is_milestone)
        .bind(task.updated_at)
        .bind(task.id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Engine-only write of the derived schedule and the summary flags.
    async fn write_derived(tx: &mut Transaction<'_, Sqlite>, task: &TaskNode) -> Result<(), CoreError> {
        sqlx::query(
            r#"UPDATE planner_tasks
            SET start_date = $1, end_date = $2, duration_days = $3, progress = $4,
                is_summary = $5, task_mode = $6, updated_at = $7
            WHERE id = $8
            "#,
        )
        .bind(task.start_date)
        .bind(task.end_date)
        .bind(task.duration_days)
        .bind(task.progress)
        .bind(task.is_summary)
        .bind(task.task_mode)
        .bind(Utc::now())
        .bind(task.id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn flush(
        tx: &mut Transaction<'_, Sqlite>,
        arena: &TaskArena,
        dirty: &DirtySet,
    ) -> Result<(), CoreError> {
        for id in &dirty.0 {
            if let Some(node) = arena.get(*id) {
                Self::write_derived(tx, node).await?;
            }
        }
        Ok(())
    }

    fn walk(&self, arena: &mut TaskArena, start: Uuid, dirty: &mut DirtySet) -> Result<usize, CoreError> {
        let steps = propagation::propagate_upward(arena, start, self.config().max_walk_depth)?;
        dirty.mark_changed(&steps);
        Ok(steps.len())
    }

    /// A node just lost a child. Without children left it goes back to a
    /// manual leaf; otherwise its chain is rolled up again.
    /// Returns true if the node was demoted.
    fn settle_former_parent(
        &self,
        arena: &mut TaskArena,
        parent_id: Uuid,
        dirty: &mut DirtySet,
    ) -> Result<bool, CoreError> {
        if arena.child_count(parent_id) > 0 {
            self.walk(arena, parent_id, dirty)?;
            return Ok(false);
        }
        let policy = self.config().revert_policy;
        let Some(node) = arena.get_mut(parent_id) else {
            return Ok(false);
        };
        let was_summary = node.is_summary;
        let grandparent = node.parent_id;
        summary::demote(node, policy);
        dirty.mark(parent_id);
        debug!(task_id = %parent_id, ?policy, "Last child removed; task demoted to manual");

        // The demoted node still counts toward its own parent's rollup.
        if let Some(grandparent) = grandparent {
            self.walk(arena, grandparent, dirty)?;
        }
        Ok(was_summary)
    }

    /// Milestones stay single-day leaves, so they cannot take children.
    fn ensure_not_milestone(arena: &TaskArena, parent_id: Uuid) -> Result<(), CoreError> {
        match arena.get(parent_id) {
            Some(parent) if parent.is_milestone => Err(CoreError::InvariantViolation(format!(
                "milestone '{}' cannot have child tasks",
                parent.name
            ))),
            _ => Ok(()),
        }
    }

    fn sort_order_taken(arena: &TaskArena, task: &TaskNode) -> bool {
        arena.nodes().any(|n| {
            n.id != task.id && n.parent_id == task.parent_id && n.sort_order == task.sort_order
        })
    }
}

#[async_trait]
impl TaskRepository for SqliteRepository {
    async fn create_task(&self, data: NewTaskData) -> Result<TaskNode, CoreError> {
        validate_name(&data.name)?;
        let schedule = ScheduleFields {
            start_date: data.start_date,
            end_date: data.end_date,
            duration_days: data.duration_days,
            is_milestone: data.is_milestone,
        }
        .normalize(ScheduleChange {
            dates_changed: true,
            duration_supplied: data.duration_days.is_some(),
        })?;

        let (_guard, mut tx) = self.begin_project_write(data.project_id).await?;
        let mut arena = Self::load_arena(&mut tx, data.project_id).await?;
        if let Some(parent_id) = data.parent_id {
            Self::ensure_parent(&mut tx, &arena, parent_id).await?;
            Self::ensure_not_milestone(&arena, parent_id)?;
        }

        let now = Utc::now();
        // Random ids keep short prefixes distinct for tasks created together.
        let mut task = TaskNode {
            id: Uuid::new_v4(),
            project_id: data.project_id,
            parent_id: data.parent_id,
            level: data.level,
            sort_order: arena.max_sibling_sort_order(data.project_id, data.parent_id) + 1,
            name: data.name.trim().to_string(),
            start_date: schedule.start_date,
            end_date: schedule.end_date,
            duration_days: schedule.duration_days,
            progress: 0,
            is_summary: false,
            is_milestone: schedule.is_milestone,
            task_mode: Default::default(),
            created_at: now,
            updated_at: now,
        };

        let seeded = SummaryFlags::seed_for_level(task.level);
        let flags = SummaryFlags::for_child_count(arena.child_count(task.id));
        if seeded != flags {
            debug!(level = %task.level, "Level seed overridden by child count");
        }
        flags.apply_to(&mut task);

        Self::insert_node(&mut tx, &task).await?;
        arena.insert(task.clone());

        let mut dirty = DirtySet::default();
        let mut walked = 0;
        if let Some(parent_id) = task.parent_id {
            if let Some(parent) = arena.get_mut(parent_id) {
                if summary::promote(parent) {
                    dirty.mark(parent_id);
                }
            }
            walked = self.walk(&mut arena, parent_id, &mut dirty)?;
        }
        Self::flush(&mut tx, &arena, &dirty).await?;
        tx.commit().await?;

        info!(
            task_id = %task.id,
            project_id = %task.project_id,
            parent_id = ?task.parent_id,
            sort_order = task.sort_order,
            walked,
            "Task created"
        );
        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<TaskNode>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM planner_tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<TaskNode>, CoreError> {
        // Ids are stored as blobs, so the prefix is matched on the text form.
        let prefix = short_id.trim().to_lowercase();
        let tasks: Vec<TaskNode> = sqlx::query_as("SELECT * FROM planner_tasks")
            .fetch_all(self.pool())
            .await?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.id.to_string().starts_with(&prefix))
            .collect())
    }

    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<TaskNode>, CoreError> {
        if self.find_project_by_id(project_id).await?.is_none() {
            return Err(CoreError::NotFound(format!("Project {}", project_id)));
        }
        let tasks = sqlx::query_as(
            "SELECT * FROM planner_tasks WHERE project_id = $1 ORDER BY sort_order, created_at, id",
        )
        .bind(project_id)
        .fetch_all(self.pool())
        .await?;
        Ok(tasks)
    }

    async fn project_tree(&self, project_id: Uuid) -> Result<Vec<TreeNode>, CoreError> {
        Ok(tree::build_tree(self.list_tasks(project_id).await?))
    }

    async fn update_task(&self, id: Uuid, data: UpdateTaskData) -> Result<TaskNode, CoreError> {
        if let Some(name) = &data.name {
            validate_name(name)?;
        }
        if let Some(progress) = data.progress {
            validate_progress(progress)?;
        }
        if let Some(sort_order) = data.sort_order {
            validate_sort_order(sort_order)?;
        }

        let stored = self
            .find_task_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task {}", id)))?;
        if data.is_empty() {
            return Ok(stored);
        }

        let (_guard, mut tx) = self.begin_project_write(stored.project_id).await?;
        let mut arena = Self::load_arena(&mut tx, stored.project_id).await?;
        let current = arena
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("Task {}", id)))?;

        if current.is_summary && data.touches_schedule() {
            return Err(CoreError::SummaryReadOnly(id));
        }
        if current.is_summary && data.is_milestone == Some(true) {
            return Err(CoreError::InvariantViolation(format!(
                "summary task '{}' cannot be a milestone",
                current.name
            )));
        }

        let mut updated = current.clone();
        if let Some(name) = &data.name {
            updated.name = name.trim().to_string();
        }
        if let Some(level) = data.level {
            updated.level = level;
        }
        if let Some(progress) = data.progress {
            updated.progress = progress;
        }
        updated.is_milestone = data.is_milestone.unwrap_or(current.is_milestone);

        if !current.is_summary {
            let schedule = ScheduleFields {
                start_date: data.start_date.unwrap_or(current.start_date),
                end_date: data.end_date.unwrap_or(current.end_date),
                duration_days: data.duration_days.unwrap_or(current.duration_days),
                is_milestone: updated.is_milestone,
            }
            .normalize(ScheduleChange {
                dates_changed: data.start_date.is_some() || data.end_date.is_some(),
                duration_supplied: data.duration_days.is_some(),
            })?;
            updated.start_date = schedule.start_date;
            updated.end_date = schedule.end_date;
            updated.duration_days = schedule.duration_days;
        }

        let reparented = matches!(data.parent_id, Some(parent) if parent != current.parent_id);
        if reparented {
            let new_parent = data.parent_id.flatten();
            if let Some(parent_id) = new_parent {
                Self::ensure_parent(&mut tx, &arena, parent_id).await?;
                Self::ensure_not_milestone(&arena, parent_id)?;
                if arena.would_create_cycle(id, parent_id, self.config().max_walk_depth)? {
                    let parent_name = arena.get(parent_id).map(|p| p.name.clone()).unwrap_or_default();
                    return Err(CoreError::CycleDetected(current.name.clone(), parent_name));
                }
            }
            updated.parent_id = new_parent;
            updated.sort_order = data.sort_order.unwrap_or_else(|| {
                arena.max_sibling_sort_order(current.project_id, new_parent) + 1
            });
        } else if let Some(sort_order) = data.sort_order {
            updated.sort_order = sort_order;
        }

        if (reparented || updated.sort_order != current.sort_order)
            && Self::sort_order_taken(&arena, &updated)
        {
            return Err(CoreError::validation(
                "sort_order",
                format!("{} is already used by a sibling", updated.sort_order),
            ));
        }

        updated.updated_at = Utc::now();
        Self::write_node(&mut tx, &updated).await?;
        arena.insert(updated.clone());

        let mut dirty = DirtySet::default();
        let mut parent_demoted = false;
        if reparented {
            if let Some(old_parent) = current.parent_id {
                parent_demoted = self.settle_former_parent(&mut arena, old_parent, &mut dirty)?;
            }
            if let Some(new_parent) = updated.parent_id {
                if let Some(parent) = arena.get_mut(new_parent) {
                    if summary::promote(parent) {
                        dirty.mark(new_parent);
                    }
                }
                self.walk(&mut arena, new_parent, &mut dirty)?;
            }
        } else if data.touches_schedule() || data.is_milestone.is_some() {
            if let Some(parent_id) = updated.parent_id {
                self.walk(&mut arena, parent_id, &mut dirty)?;
            }
        }
        Self::flush(&mut tx, &arena, &dirty).await?;
        tx.commit().await?;

        info!(
            task_id = %id,
            reparented,
            parent_demoted,
            rewritten = dirty.0.len(),
            "Task updated"
        );
        Ok(arena.get(id).cloned().unwrap_or(updated))
    }

    async fn delete_task(&self, id: Uuid) -> Result<DeleteOutcome, CoreError> {
        let stored = self
            .find_task_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task {}", id)))?;

        let (_guard, mut tx) = self.begin_project_write(stored.project_id).await?;
        let mut arena = Self::load_arena(&mut tx, stored.project_id).await?;
        let current = arena
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("Task {}", id)))?;

        // Descendants go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM planner_tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Task {}", id)));
        }
        let removed = arena.remove_subtree(id);

        let mut dirty = DirtySet::default();
        let mut parent_demoted = false;
        if let Some(parent_id) = current.parent_id {
            parent_demoted = self.settle_former_parent(&mut arena, parent_id, &mut dirty)?;
        }
        Self::flush(&mut tx, &arena, &dirty).await?;
        tx.commit().await?;

        if parent_demoted {
            warn!(
                task_id = %id,
                parent_id = ?current.parent_id,
                policy = ?self.config().revert_policy,
                "Parent lost its last child and is now a manual task"
            );
        }
        info!(task_id = %id, removed = removed.len(), "Task deleted");

        Ok(DeleteOutcome {
            task_id: id,
            removed: removed.len() as u64,
            parent_id: current.parent_id,
            parent_demoted,
        })
    }

    async fn propagate_from(&self, id: Uuid) -> Result<Vec<PropagationStep>, CoreError> {
        let stored = self
            .find_task_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task {}", id)))?;

        let (_guard, mut tx) = self.begin_project_write(stored.project_id).await?;
        let mut arena = Self::load_arena(&mut tx, stored.project_id).await?;
        let steps = propagation::propagate_upward(&mut arena, id, self.config().max_walk_depth)?;

        let mut dirty = DirtySet::default();
        dirty.mark_changed(&steps);
        Self::flush(&mut tx, &arena, &dirty).await?;
        tx.commit().await?;

        debug!(task_id = %id, steps = steps.len(), rewritten = dirty.0.len(), "Walk finished");
        Ok(steps)
    }

    async fn recalculate_project(&self, project_id: Uuid) -> Result<RecalcReport, CoreError> {
        let (_guard, mut tx) = self.begin_project_write(project_id).await?;
        let mut arena = Self::load_arena(&mut tx, project_id).await?;
        let report = propagation::recalculate(
            &mut arena,
            self.config().max_walk_depth,
            self.config().revert_policy,
        )?;

        let mut dirty = DirtySet::default();
        for id in report.changed_ids() {
            dirty.mark(id);
        }
        Self::flush(&mut tx, &arena, &dirty).await?;
        tx.commit().await?;

        if report == RecalcReport::default() {
            info!(project_id = %project_id, "Project recalculated; nothing to repair");
        } else {
            warn!(
                project_id = %project_id,
                flags_fixed = report.flags_fixed.len(),
                rolled_up = report.rolled_up.len(),
                "Project recalculation repaired stored values"
            );
        }
        Ok(report)
    }

    async fn compact_sort_orders(&self, project_id: Uuid) -> Result<usize, CoreError> {
        let (_guard, mut tx) = self.begin_project_write(project_id).await?;
        let arena = Self::load_arena(&mut tx, project_id).await?;

        let mut groups: HashMap<Option<Uuid>, Vec<TaskNode>> = HashMap::new();
        for node in arena.nodes() {
            groups.entry(node.parent_id).or_default().push(node.clone());
        }
        let current: HashMap<Uuid, i64> = arena.nodes().map(|n| (n.id, n.sort_order)).collect();
        let moves: Vec<(Uuid, i64)> = groups
            .values()
            .flat_map(|siblings| tree::reindex_sort_orders(siblings))
            .filter(|(id, order)| current.get(id) != Some(order))
            .collect();

        // Two passes: park every moved node above the current maximum first so
        // the unique sibling index never sees a transient duplicate.
        let offset = current.values().copied().max().unwrap_or(0) + 1;
        for pass_offset in [offset, 0] {
            for (id, order) in &moves {
                sqlx::query("UPDATE planner_tasks SET sort_order = $1 WHERE id = $2")
                    .bind(order + pass_offset)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;

        info!(project_id = %project_id, moved = moves.len(), "Sort orders compacted");
        Ok(moves.len())
    }

    async fn check_project(&self, project_id: Uuid) -> Result<Vec<InvariantViolation>, CoreError> {
        let tasks = self.list_tasks(project_id).await?;
        let violations = tree::check_invariants(&tasks, self.config().max_walk_depth);
        if !violations.is_empty() {
            warn!(project_id = %project_id, count = violations.len(), "Project has invariant violations");
        }
        Ok(violations)
    }
}
