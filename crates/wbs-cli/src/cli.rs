use clap::{Parser, Subcommand};
use wbs_core::models::TaskLevel;

/// Plan work breakdown structures whose summary tasks roll up their children's schedule and progress
#[derive(Parser, Debug)]
#[command(name = "wbs", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a task node to a project
    Add(AddCommand),
    /// Show a project's task tree
    List(ListCommand),
    /// Delete a task and everything below it
    Delete(DeleteCommand),
    /// Edit a task
    Edit(EditCommand),
    /// Manage projects
    Project(ProjectCommand),
    /// Report invariant violations in a project's stored tree
    Check(CheckCommand),
    /// Re-derive summary flags and rollups for a whole project
    Recalc(RecalcCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The name of the task
    pub name: String,
    /// Project name or ID
    #[clap(short, long)]
    pub project: String,
    /// Level of the node (project, building, activity, task)
    #[clap(short, long, default_value = "task")]
    pub level: TaskLevel,
    /// The parent task ID (a unique prefix is enough)
    #[clap(long)]
    pub parent: Option<String>,
    /// Start date (e.g., '2026-03-01', 'next monday')
    #[clap(long)]
    pub start: Option<String>,
    /// End date (e.g., '2026-03-20', 'in 2 weeks')
    #[clap(long)]
    pub end: Option<String>,
    /// Duration in days; derived from the dates when omitted
    #[clap(long)]
    pub duration: Option<f64>,
    /// Mark the task as a milestone (single date, zero duration)
    #[clap(long)]
    pub milestone: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    /// The ID of the task to edit
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub level: Option<TaskLevel>,

    #[arg(long)]
    pub sort_order: Option<i64>,

    #[arg(long)]
    pub start: Option<String>,
    #[arg(long, conflicts_with = "start")]
    pub start_clear: bool,

    #[arg(long)]
    pub end: Option<String>,
    #[arg(long, conflicts_with = "end")]
    pub end_clear: bool,

    #[arg(long)]
    pub duration: Option<f64>,
    #[arg(long, conflicts_with = "duration")]
    pub duration_clear: bool,

    #[arg(long)]
    pub progress: Option<i32>,

    #[arg(long, action = clap::ArgAction::Set)]
    pub milestone: Option<bool>,

    #[arg(long)]
    pub parent: Option<String>,
    #[arg(long, conflicts_with = "parent")]
    pub parent_clear: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// The ID of the task to delete
    pub id: String,
    /// Force deletion without confirmation
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Project name or ID
    #[clap(short, long)]
    pub project: String,
    /// Print the tree as JSON instead of a table
    #[clap(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct CheckCommand {
    /// Project name or ID
    #[clap(short, long)]
    pub project: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RecalcCommand {
    /// Project name or ID
    #[clap(short, long)]
    pub project: String,
    /// Also renumber sibling sort orders to 1..n
    #[clap(long)]
    pub compact: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ProjectCommand {
    #[command(subcommand)]
    pub command: ProjectSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProjectSubcommand {
    /// Add a new project
    Add(AddProjectCommand),
    /// List projects
    List,
    /// Delete an empty project
    Delete(DeleteProjectCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AddProjectCommand {
    /// The name of the project
    pub name: String,

    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteProjectCommand {
    /// The name of the project to delete
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_parses_clear_flags_and_milestone_value() {
        let cli = Cli::try_parse_from([
            "wbs", "edit", "ab12", "--end-clear", "--milestone", "true", "--level", "activity",
        ])
        .unwrap();
        match cli.command {
            Commands::Edit(edit) => {
                assert!(edit.end_clear);
                assert_eq!(edit.milestone, Some(true));
                assert_eq!(edit.level, Some(TaskLevel::Activity));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        assert!(Cli::try_parse_from(["wbs", "edit", "ab12", "--start", "2026-01-01", "--start-clear"]).is_err());
        assert!(Cli::try_parse_from(["wbs", "add", "x", "-p", "site", "-l", "phase"]).is_err());
    }
}
