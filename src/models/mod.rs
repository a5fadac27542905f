// src/models/mod.rs

pub mod diagnostics;
pub mod question;
pub mod session;
pub mod user;
