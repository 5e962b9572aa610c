//! Route tables, merged by [`crate::app`]

pub mod cache;
pub mod health;
pub mod songs;
