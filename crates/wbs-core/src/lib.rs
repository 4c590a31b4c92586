//! # WBS Core Library
//!
//! Hierarchical work breakdown structures with automatic schedule and
//! progress rollup, stored in SQLite.
//!
//! ## Features
//!
//! - **Summary Rollup**: A node with children derives its start, end,
//!   duration and duration-weighted progress from them
//! - **Upward Propagation**: Every mutation walks from the touched node's
//!   parent to the root, rewriting only the ancestors that changed
//! - **Automatic Summary Flags**: Attaching a first child promotes a node to
//!   an auto-scheduled summary; removing the last one demotes it again
//! - **Serialized Mutations**: One lock and one transaction per project and
//!   mutation, so concurrent sibling edits cannot lose updates
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`repository`]: Data access layer with Repository pattern
//! - [`rollup`]: The pure summary computation
//! - [`propagation`]: The upward walk and full-project recalculation
//! - [`tree`]: Tree views of a flat listing, and invariant checks
//! - [`error`]: Error types and their transport classification
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use wbs_core::{
//!     db,
//!     models::{EngineConfig, NewTaskData, TaskLevel},
//!     repository::{ProjectRepository, SqliteRepository, TaskRepository},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wbs_core::error::CoreError> {
//!     let pool = db::establish_connection("wbs.db").await?;
//!     let repo = SqliteRepository::new(pool, EngineConfig::default());
//!
//!     let project = repo.add_project("Tower A".to_string(), None).await?;
//!     let building = repo
//!         .create_task(NewTaskData {
//!             project_id: project.id,
//!             name: "Block 1".to_string(),
//!             level: TaskLevel::Building,
//!             ..Default::default()
//!         })
//!         .await?;
//!     repo.create_task(NewTaskData {
//!         project_id: project.id,
//!         parent_id: Some(building.id),
//!         name: "Foundations".to_string(),
//!         start_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 1),
//!         end_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 20),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//!     // Block 1 is now a summary spanning 2026-03-01..2026-03-20
//!     Ok(())
//! }
//! ```

pub mod arena;
pub mod db;
pub mod error;
pub mod models;
pub mod propagation;
pub mod repository;
pub mod rollup;
pub mod summary;
pub mod tree;
pub mod validation;
