//! CLI module for recruitrag
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{Args, Commands, SingleMethod, Verbosity};
