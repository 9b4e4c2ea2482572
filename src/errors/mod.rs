pub mod types;

pub use types::PatrolError;
