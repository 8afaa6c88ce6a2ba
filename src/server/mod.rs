//! HTTP server.
//!
//! - [`routes`]: Request/response types and route handlers
//! - [`page`]: Static landing page

pub mod page;
pub mod routes;
