// Core modules implementing the crate-wide error model.
pub mod error;
