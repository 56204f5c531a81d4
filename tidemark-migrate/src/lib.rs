//! Tidemark Migration Library
//!
//! Argument parsing, settings merging and console output for the
//! `tidemark-migrate` binary (main.rs).

pub mod cli;
pub mod commands;
pub mod interrupt;
