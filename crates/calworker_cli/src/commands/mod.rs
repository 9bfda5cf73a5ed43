//! CLI command implementations.

pub mod accounts;
pub mod echo;
pub mod sync;
