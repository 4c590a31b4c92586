// Each subcommand lives in its own module.

pub mod add;
pub mod check;
pub mod delete;
pub mod edit;
pub mod list;
pub mod project;
pub mod recalc;
