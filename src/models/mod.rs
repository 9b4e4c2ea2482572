pub mod project;

pub use project::{DosStatus, PauseReason, Project, RunMethod, Step};
