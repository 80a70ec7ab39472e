//! Proxy-side infrastructure: singleton lock, session paths, bounded
//! transcript, and the session driver.

mod config;
mod driver;
mod file_lock;
pub mod session;
mod transcript;

pub use config::DEFAULT_MAX_LINES;
pub use config::ProxyConfig;
pub use driver::PROXY_ACTIVE_ENV;
pub use driver::ProxyDriver;
pub use driver::ProxyOutcome;
pub use file_lock::ProcessLock;
pub use transcript::TranscriptWriter;
