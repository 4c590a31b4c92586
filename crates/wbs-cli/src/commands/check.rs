use anyhow::{bail, Result};
use owo_colors::OwoColorize;
use wbs_core::repository::Repository;

use crate::cli::CheckCommand;
use crate::util::resolve_project;
use crate::views::table::display_violations;

pub async fn check_project(repo: &impl Repository, command: CheckCommand) -> Result<()> {
    let project = resolve_project(repo, &command.project).await?;
    let violations = repo.check_project(project.id).await?;

    if violations.is_empty() {
        println!(
            "{} Project '{}' is consistent.",
            "✓".green().bold(),
            project.name
        );
        return Ok(());
    }

    display_violations(&violations);
    bail!(
        "{} violation(s) found; `wbs recalc -p {}` repairs derived values",
        violations.len(),
        project.name
    )
}
