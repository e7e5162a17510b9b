//! Database models.

pub mod package;
