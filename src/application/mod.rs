//! Application services layer.

pub mod context;
pub mod error;
pub mod relations;
pub mod repos;
