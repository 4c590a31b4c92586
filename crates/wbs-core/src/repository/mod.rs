use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{DeleteOutcome, EngineConfig, NewTaskData, Project, TaskNode, UpdateTaskData};
use crate::propagation::{PropagationStep, RecalcReport};
use crate::tree::{InvariantViolation, TreeNode};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

// Re-export domain modules
pub mod projects;
pub mod tasks;

/// Domain-specific trait for task tree operations
#[async_trait]
pub trait TaskRepository {
    /// Inserts a node, promotes its parent and rolls the parent chain up.
    async fn create_task(&self, data: NewTaskData) -> Result<TaskNode, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<TaskNode>, CoreError>;
    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<TaskNode>, CoreError>;
    /// Every node of the project ordered by `sort_order`.
    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<TaskNode>, CoreError>;
    async fn project_tree(&self, project_id: Uuid) -> Result<Vec<TreeNode>, CoreError>;
    /// Sparse update. Schedule fields of summary tasks are rejected.
    async fn update_task(&self, id: Uuid, data: UpdateTaskData) -> Result<TaskNode, CoreError>;
    /// Deletes the node and its subtree, then demotes or re-rolls the parent.
    async fn delete_task(&self, id: Uuid) -> Result<DeleteOutcome, CoreError>;
    /// Re-runs the rollup walk from `id` up to the root.
    async fn propagate_from(&self, id: Uuid) -> Result<Vec<PropagationStep>, CoreError>;
    /// Re-derives flags and rollups for the whole project.
    async fn recalculate_project(&self, project_id: Uuid) -> Result<RecalcReport, CoreError>;
    /// Renumbers every sibling group to `1..=n`, keeping the order.
    async fn compact_sort_orders(&self, project_id: Uuid) -> Result<usize, CoreError>;
    async fn check_project(&self, project_id: Uuid) -> Result<Vec<InvariantViolation>, CoreError>;
}

/// Domain-specific trait for project operations
#[async_trait]
pub trait ProjectRepository {
    async fn add_project(&self, name: String, description: Option<String>) -> Result<Project, CoreError>;
    async fn find_project_by_id(&self, id: Uuid) -> Result<Option<Project>, CoreError>;
    async fn find_project_by_name(&self, name: &str) -> Result<Option<Project>, CoreError>;
    async fn find_projects(&self) -> Result<Vec<Project>, CoreError>;
    async fn delete_project(&self, name: String) -> Result<(), CoreError>;
}

/// Main repository trait that composes all domain traits
#[async_trait]
pub trait Repository: TaskRepository + ProjectRepository {}

/// One async mutex per project. Every mutation holds its project's lock
/// for the whole insert/update/delete plus rollup walk.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProjectLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl ProjectLocks {
    pub(crate) async fn acquire(&self, project_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(project_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drops the entry of a project that no longer exists.
    pub(crate) fn forget(&self, project_id: Uuid) {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        locks.remove(&project_id);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// SQLite implementation of the repository pattern
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: DbPool,
    config: EngineConfig,
    locks: ProjectLocks,
}

impl SqliteRepository {
    pub fn new(pool: DbPool, config: EngineConfig) -> Self {
        Self {
            pool,
            config,
            locks: ProjectLocks::default(),
        }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn locks(&self) -> &ProjectLocks {
        &self.locks
    }
}

impl Repository for SqliteRepository {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_project_lock_serializes_same_project() {
        let locks = ProjectLocks::default();
        let project = Uuid::now_v7();
        let guard = locks.acquire(project).await;

        let contender = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = contender.acquire(project).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should get the lock")
            .unwrap();
    }

    #[tokio::test]
    async fn test_project_locks_are_independent() {
        let locks = ProjectLocks::default();
        let _a = locks.acquire(Uuid::now_v7()).await;
        let other = tokio::time::timeout(Duration::from_millis(200), locks.acquire(Uuid::now_v7())).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_deleted_project_releases_its_lock() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("locks.db");
        let pool = crate::db::establish_connection(&db_path.to_string_lossy())
            .await
            .unwrap();
        let repo = SqliteRepository::new(pool, EngineConfig::default());

        let kept = repo.add_project("Kept".to_string(), None).await.unwrap();
        let gone = repo.add_project("Gone".to_string(), None).await.unwrap();
        repo.recalculate_project(kept.id).await.unwrap();
        repo.recalculate_project(gone.id).await.unwrap();
        assert_eq!(repo.locks().tracked(), 2);

        repo.delete_project("Gone".to_string()).await.unwrap();
        assert_eq!(repo.locks().tracked(), 1);

        repo.recalculate_project(kept.id).await.unwrap();
        assert_eq!(repo.locks().tracked(), 1);
    }
}
