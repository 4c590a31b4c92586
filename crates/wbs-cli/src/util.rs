use anyhow::{anyhow, Result};
use uuid::Uuid;
use wbs_core::error::CoreError;
use wbs_core::models::Project;
use wbs_core::repository::Repository;

pub async fn resolve_task_id(repo: &impl Repository, short_id: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(short_id) {
        return Ok(id);
    }
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::validation(
            "id",
            "short ID must be at least 2 characters long"
        )));
    }
    let tasks = repo.find_tasks_by_short_id_prefix(short_id).await?;
    if tasks.len() == 1 {
        Ok(tasks[0].id)
    } else if tasks.is_empty() {
        Err(anyhow!(CoreError::NotFound(format!(
            "No task found with ID prefix '{}'",
            short_id
        ))))
    } else {
        let task_info: Vec<(String, String)> = tasks
            .into_iter()
            .map(|t| (t.id.to_string(), t.name))
            .collect();
        Err(anyhow!(CoreError::AmbiguousId(task_info)))
    }
}

/// Looks a project up by exact name, then by full ID.
pub async fn resolve_project(repo: &impl Repository, name_or_id: &str) -> Result<Project> {
    if let Some(project) = repo.find_project_by_name(name_or_id).await? {
        return Ok(project);
    }
    if let Ok(id) = Uuid::parse_str(name_or_id) {
        if let Some(project) = repo.find_project_by_id(id).await? {
            return Ok(project);
        }
    }
    Err(anyhow!(CoreError::NotFound(format!(
        "No project named '{}'",
        name_or_id
    ))))
}
