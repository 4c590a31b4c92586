use anyhow::Result;
use owo_colors::OwoColorize;
use wbs_core::models::UpdateTaskData;
use wbs_core::repository::Repository;

use crate::cli::EditCommand;
use crate::parser::parse_date;
use crate::util::resolve_task_id;

pub async fn edit_task(repo: &impl Repository, command: EditCommand) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;

    let start_date = if command.start_clear {
        Some(None)
    } else if let Some(start) = &command.start {
        Some(Some(parse_date(start)?))
    } else {
        None
    };

    let end_date = if command.end_clear {
        Some(None)
    } else if let Some(end) = &command.end {
        Some(Some(parse_date(end)?))
    } else {
        None
    };

    let duration_days = if command.duration_clear {
        Some(None)
    } else {
        command.duration.map(Some)
    };

    let parent_id = if command.parent_clear {
        Some(None)
    } else if let Some(parent_str) = &command.parent {
        Some(Some(resolve_task_id(repo, parent_str).await?))
    } else {
        None
    };

    let update_data = UpdateTaskData {
        name: command.name,
        level: command.level,
        sort_order: command.sort_order,
        start_date,
        end_date,
        duration_days,
        progress: command.progress,
        is_milestone: command.milestone,
        parent_id,
    };

    if update_data.is_empty() {
        println!("No changes specified.");
        return Ok(());
    }

    let updated_task = repo.update_task(task_id, update_data).await?;
    println!(
        "{} Task '{}' updated.",
        "✓".green().bold(),
        updated_task.name.bright_white().bold()
    );
    Ok(())
}
