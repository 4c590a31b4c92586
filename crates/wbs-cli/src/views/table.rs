use chrono::{DateTime, NaiveDate, Utc};
use comfy_table::{Attribute, Cell, Color, Row, Table};
use uuid::Uuid;
use wbs_core::models::{TaskLevel, TaskNode};
use wbs_core::tree::{InvariantViolation, TreeNode};

#[derive(Debug, Clone)]
pub struct ViewTask {
    pub id: Uuid,
    pub name: String,
    pub level: TaskLevel,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_days: Option<f64>,
    pub progress: i32,
    pub is_summary: bool,
    pub is_milestone: bool,
    pub depth: usize,
}

impl ViewTask {
    pub fn from_tree_node(node: &TreeNode) -> Self {
        Self::from_task(&node.task, node.depth)
    }

    pub fn from_task(task: &TaskNode, depth: usize) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            level: task.level,
            start_date: task.start_date,
            end_date: task.end_date,
            duration_days: task.duration_days,
            progress: task.progress,
            is_summary: task.is_summary,
            is_milestone: task.is_milestone,
            depth,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewProject {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn date_cell(date: Option<NaiveDate>) -> Cell {
    match date {
        Some(d) => Cell::new(d.format("%Y-%m-%d")),
        None => Cell::new("-").fg(Color::DarkGrey),
    }
}

pub fn display_tasks(tasks: &[ViewTask]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Level", "Start", "End", "Days", "Progress"]);

    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&task.id)));

        let mut display_name = "  ".repeat(task.depth);
        if task.is_milestone {
            display_name.push_str("◆ ");
        }
        display_name.push_str(&task.name);

        let mut name_cell = Cell::new(display_name);
        if task.is_summary {
            name_cell = name_cell.add_attribute(Attribute::Bold);
        }
        row.add_cell(name_cell);
        row.add_cell(Cell::new(task.level));
        row.add_cell(date_cell(task.start_date));
        row.add_cell(date_cell(task.end_date));
        row.add_cell(match task.duration_days {
            Some(days) => Cell::new(format!("{}", days)),
            None => Cell::new("-").fg(Color::DarkGrey),
        });

        let progress_cell = Cell::new(format!("{}%", task.progress));
        row.add_cell(match task.progress {
            100 => progress_cell.fg(Color::Green),
            0 => progress_cell,
            _ => progress_cell.fg(Color::Yellow),
        });
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_projects(projects: &[ViewProject]) {
    if projects.is_empty() {
        println!("No projects found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Description", "Created At"]);

    for project in projects {
        let mut row = Row::new();
        row.add_cell(Cell::new(project.id.to_string()));
        row.add_cell(Cell::new(&project.name));
        row.add_cell(Cell::new(project.description.as_deref().unwrap_or("None")));
        row.add_cell(Cell::new(project.created_at.format("%Y-%m-%d %H:%M")));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_violations(violations: &[InvariantViolation]) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Violation"]);
    for (i, violation) in violations.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(violation.to_string()).fg(Color::Red),
        ]);
    }
    println!("{table}");
}
