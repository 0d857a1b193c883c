//! `stride` - Import normalization and sprint statistics for issue-tracker exports
//!
//! This crate provides the core functionality for the `stride` CLI tool,
//! which reconciles CSV exports from an external issue tracker against a
//! local SQLite store of four issue-type tables.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (CanonicalTicket, batches, result payloads)
//! - [`normalize`] - Per-issue-type CSV row normalization
//! - [`import`] - Natural-key matching, preview, and batch commit
//! - [`sprint`] - Cross-table sprint statistics
//! - [`storage`] - `SQLite` database layer
//! - [`config`] - Workspace discovery and configuration
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod import;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod sprint;
pub mod storage;

pub use error::{Result, StrideError};
