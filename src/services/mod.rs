// src/services/mod.rs

pub mod analytics;
pub mod diagnostics;
pub mod questions;
pub mod session;
pub mod stats;
