//! # Yard Core
//!
//! Core modules shared by the yard map crates.

mod error;
mod provider;

pub use crate::error::*;
pub use crate::provider::*;
