//! # Server Module
//!
//! HTTP server bootstrap on `may`/`may_minihttp`: a coroutine-per-connection
//! model matching the reference server's own runtime, driving requests
//! through the Mock Registry, Request Filter, and Response Builder.

pub mod http_server;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use service::AppService;
