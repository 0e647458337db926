//! # Ouroboros Core
//!
//! An OpenAPI 3.1 driven mock serving and specification synchronization
//! engine, built on `may`/`may_minihttp` coroutines.
//!
//! ## Overview
//!
//! Two subsystems share one spec document:
//!
//! - **Mock Serving Engine** ([`mock`]) — matches incoming requests against
//!   registered endpoints, validates them, and synthesizes response bodies
//!   from the endpoint's schema, optionally merged with the parsed request
//!   body.
//! - **Specification Synchronization Engine** ([`spec::sync`]) — reconciles
//!   the on-disk spec against a spec scanned from the running codebase at
//!   startup, marking `x-ouroboros-diff`/`x-ouroboros-progress` as it goes.
//!
//! ## Request flow
//!
//! ```text
//! HTTP request -> Mock Registry lookup -> Request Filter (body parse)
//!              -> Validation Pipeline -> Response Builder (synth + merge) -> wire
//! ```
//!
//! ## Startup flow
//!
//! ```text
//! file spec -> Spec Loader -> SpecDoc
//! scanned spec (caller-provided) -----+
//!                                      v
//!                              Sync Pipeline -> mutated SpecDoc -> Spec Loader writes back
//! ```

pub mod cli;
pub mod error;
pub mod ids;
pub mod mock;
pub mod runtime_config;
pub mod server;
pub mod spec;

pub use error::{OuroborosError, Result};
