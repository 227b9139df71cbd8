//! Relation store with read-through, write-invalidate caching of the
//! follower and subscriber views of each user.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
