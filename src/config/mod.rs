// src/config/mod.rs
pub mod auth;

pub use auth::{Capability, Credentials};
