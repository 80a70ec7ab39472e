#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Shell session proxy: records what an interactive shell shows on screen.

mod app;
mod common;
mod infra;

pub use app::Application;
pub use common::ProxyError;
pub use infra::proxy::ProxyConfig;
pub use infra::proxy::ProxyDriver;
pub use infra::proxy::ProxyOutcome;
pub use infra::terminal::NativePtySpawner;
pub use infra::terminal::ShellSpawner;
