//! HTTP layer: router, static client bundle and cross-origin policy

pub mod middleware;
pub mod routes;

pub use routes::build_router;
