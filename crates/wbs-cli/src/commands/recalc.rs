use anyhow::Result;
use owo_colors::OwoColorize;
use wbs_core::repository::Repository;

use crate::cli::RecalcCommand;
use crate::util::resolve_project;

pub async fn recalc_project(repo: &impl Repository, command: RecalcCommand) -> Result<()> {
    let project = resolve_project(repo, &command.project).await?;
    let report = repo.recalculate_project(project.id).await?;

    println!(
        "{} Recalculated '{}': {} flag fix(es), {} summary rollup(s) rewritten.",
        "✓".green().bold(),
        project.name,
        report.flags_fixed.len(),
        report.rolled_up.len()
    );

    if command.compact {
        let moved = repo.compact_sort_orders(project.id).await?;
        println!("  {} {} sort order(s) renumbered.", "→".blue(), moved);
    }
    Ok(())
}
