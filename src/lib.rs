//! # collector-harness
//!
//! An end-to-end harness for remote forensic artifact collection: it builds
//! single-artifact collector executables via an external build tool, pushes
//! them to a remote Windows host over SSH, executes them, verifies every
//! transfer and run, pulls back the collection bundles, and normalizes the
//! results into validated newline-delimited JSON.
//!
//! ## Overview
//!
//! A run moves through two phases:
//!
//! 1. **Orchestration** ([`batch`]): for each requested artifact, generate
//!    a collection spec from a template ([`spec`]), build a collector
//!    ([`builder`]), push it with size and hash verification, execute it
//!    remotely, and confirm a clean shutdown ([`remote`]). Artifacts run
//!    sequentially and independently.
//! 2. **Normalization** ([`pipeline`]): extract each pulled zip bundle,
//!    restore escaped filenames, enrich records with host identity and a
//!    source type, add epoch timestamp siblings, and validate the final
//!    records against the required schema.
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`models`]: Core data models shared across the harness
//! - [`config`]: Harness configuration and remote credentials
//! - [`constants`]: Contract surface shared by orchestrator and pipeline
//! - [`spec`]: Collection-spec assembly from templates
//! - [`builder`]: External build tool invocation
//! - [`remote`]: SSH shell, file transfer, execution and bundle retrieval
//! - [`pipeline`]: Bundle extraction and record normalization
//! - [`batch`]: Batch coordination, status reporting and statistics
//! - [`utils`]: Hashing and filesystem helpers

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models shared across the harness
pub mod models;

/// Harness configuration and remote credentials
pub mod config;

/// Contract surface shared by the orchestrator and the pipeline
pub mod constants;

/// Collection-spec assembly from templates
pub mod spec;

/// External build tool invocation
pub mod builder;

/// Remote shell, file transfer, execution and bundle retrieval
pub mod remote;

/// Bundle extraction and record normalization
pub mod pipeline;

/// Batch coordination, status reporting and statistics
pub mod batch;

/// Hashing and filesystem helpers
pub mod utils;
