//! Package format layouts.

pub mod maven;
