//! Terminal-side infrastructure: PTY plumbing, raw mode, output
//! normalization.

mod error;
mod normalize;
mod pty;
mod raw_mode;

pub use error::PtyError;
pub use normalize::normalize;
pub use pty::NativePtySpawner;
pub use pty::PtyResizer;
pub use pty::PtySession;
pub use pty::ShellSpawner;
pub use raw_mode::RawModeGuard;
pub use raw_mode::window_size;
