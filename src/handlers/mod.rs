// src/handlers/mod.rs

pub mod admin;
pub mod diagnostics;
pub mod profile;
pub mod questions;
pub mod quiz;
