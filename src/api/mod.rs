//! HTTP surface in front of the core (`spec.md` §6).

mod routes;

pub use routes::{build_router, AppState};
