use crate::error::CoreError;
use crate::models::Project;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

#[async_trait]
impl super::ProjectRepository for SqliteRepository {
    async fn add_project(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<Project, CoreError> {
        crate::validation::validate_name(&name)?;
        if self.find_project_by_name(&name).await?.is_some() {
            return Err(CoreError::Conflict(format!(
                "A project named '{}' already exists",
                name
            )));
        }

        let project_id = Uuid::new_v4();
        let now = Utc::now();
        let project: Project = sqlx::query_as(
            r#"INSERT INTO planner_projects (id, name, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(&name)
        .bind(description)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        info!(project_id = %project.id, name = %project.name, "Project created");
        Ok(project)
    }

    async fn find_project_by_id(&self, id: Uuid) -> Result<Option<Project>, CoreError> {
        let project = sqlx::query_as("SELECT * FROM planner_projects WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(project)
    }

    async fn find_project_by_name(&self, name: &str) -> Result<Option<Project>, CoreError> {
        let project = sqlx::query_as("SELECT * FROM planner_projects WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        Ok(project)
    }

    async fn find_projects(&self) -> Result<Vec<Project>, CoreError> {
        let projects = sqlx::query_as("SELECT * FROM planner_projects ORDER BY name")
            .fetch_all(self.pool())
            .await?;
        Ok(projects)
    }

    async fn delete_project(&self, name: String) -> Result<(), CoreError> {
        let project = self
            .find_project_by_name(&name)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Project '{}'", name)))?;

        let guard = self.locks().acquire(project.id).await;
        let mut tx = self.pool().begin().await?;

        let task_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM planner_tasks WHERE project_id = $1")
                .bind(project.id)
                .fetch_one(&mut *tx)
                .await?;

        if task_count.0 > 0 {
            return Err(CoreError::Conflict(format!(
                "Cannot delete project '{}' because it has {} task(s). Delete the tasks first.",
                name, task_count.0
            )));
        }

        let result = sqlx::query("DELETE FROM planner_projects WHERE id = $1")
            .bind(project.id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Project '{}'", name)));
        }
        tx.commit().await?;
        drop(guard);
        self.locks().forget(project.id);

        info!(project_id = %project.id, "Project deleted");
        Ok(())
    }
}
