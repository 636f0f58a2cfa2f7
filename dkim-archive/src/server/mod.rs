//! HTTP surface: the bearer protected batch update route and a liveness route.

mod app;
mod app_state;
mod auth;
mod http_error;
mod routes;
mod trace;

pub use app::{DkimArchiveServer, ServerBuildError};
