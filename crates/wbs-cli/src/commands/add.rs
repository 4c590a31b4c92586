use anyhow::Result;
use owo_colors::{OwoColorize, Style};
use wbs_core::models::NewTaskData;
use wbs_core::repository::Repository;

use crate::cli::AddCommand;
use crate::parser::parse_date;
use crate::util::{resolve_project, resolve_task_id};
use crate::views::table::short_id;

pub async fn add_task(repo: &impl Repository, command: AddCommand) -> Result<()> {
    let project = resolve_project(repo, &command.project).await?;
    let parent_id = match &command.parent {
        Some(parent) => Some(resolve_task_id(repo, parent).await?),
        None => None,
    };
    let start_date = command.start.as_deref().map(parse_date).transpose()?;
    let end_date = command.end.as_deref().map(parse_date).transpose()?;

    let new_task_data = NewTaskData {
        project_id: project.id,
        parent_id,
        name: command.name,
        level: command.level,
        start_date,
        end_date,
        duration_days: command.duration,
        is_milestone: command.milestone,
    };

    let added_task = repo.create_task(new_task_data).await?;

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    println!(
        "{} Created task: {}",
        "✓".style(success_style),
        added_task.name.bright_white().bold()
    );
    println!(
        "  {} Task ID: {}",
        "→".style(info_style),
        added_task.id.to_string().yellow()
    );
    if let (Some(start), Some(end)) = (added_task.start_date, added_task.end_date) {
        println!(
            "  {} Scheduled: {} .. {} ({} days)",
            "→".style(info_style),
            start.to_string().cyan(),
            end.to_string().cyan(),
            added_task.duration_days.unwrap_or_default()
        );
    }

    if let Some(parent_id) = added_task.parent_id {
        if let Some(parent) = repo.find_task_by_id(parent_id).await? {
            let span = match (parent.start_date, parent.end_date) {
                (Some(s), Some(e)) => format!("{} .. {}", s, e),
                _ => "unscheduled".to_string(),
            };
            println!(
                "  {} Parent {} '{}' now spans {} at {}%",
                "→".style(info_style),
                short_id(&parent.id).yellow(),
                parent.name,
                span,
                parent.progress
            );
        }
    }

    Ok(())
}
