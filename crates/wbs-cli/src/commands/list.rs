use anyhow::Result;
use wbs_core::repository::Repository;
use wbs_core::tree::flatten;

use crate::cli::ListCommand;
use crate::util::resolve_project;
use crate::views::table::{display_tasks, ViewTask};

pub async fn list_tasks(repo: &impl Repository, command: ListCommand) -> Result<()> {
    let project = resolve_project(repo, &command.project).await?;
    let tree = repo.project_tree(project.id).await?;

    if command.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    let view_tasks: Vec<ViewTask> = flatten(&tree)
        .into_iter()
        .map(ViewTask::from_tree_node)
        .collect();
    display_tasks(&view_tasks);

    Ok(())
}
