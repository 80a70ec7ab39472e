//! PTY allocation and shell spawning.

use std::io;
use std::io::Read;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

use portable_pty::Child;
use portable_pty::CommandBuilder;
use portable_pty::ExitStatus;
use portable_pty::MasterPty;
use portable_pty::PtySize;
use portable_pty::native_pty_system;

use crate::common::mutex_lock_or_recover;
use crate::infra::terminal::PtyError;

/// Strategy for starting the shell under a pseudo-terminal. Injected into
/// the driver so tests can substitute a failing implementation.
pub trait ShellSpawner {
    fn spawn(
        &self,
        shell: &str,
        env: &[(String, String)],
        size: PtySize,
    ) -> Result<PtySession, PtyError>;
}

/// Production spawner backed by the operating system's PTY device pair.
pub struct NativePtySpawner;

impl ShellSpawner for NativePtySpawner {
    fn spawn(
        &self,
        shell: &str,
        env: &[(String, String)],
        size: PtySize,
    ) -> Result<PtySession, PtyError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(size)
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let mut cmd = CommandBuilder::new(shell);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| PtyError::Spawn {
            command: shell.to_string(),
            reason: e.to_string(),
        })?;
        // The child holds the only remaining slave handle after this; its
        // exit is what turns into EOF on the master side.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Open(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Open(e.to_string()))?;

        Ok(PtySession {
            master: Arc::new(Mutex::new(pair.master)),
            child,
            reader: Some(reader),
            writer: Some(writer),
        })
    }
}

/// One spawned shell attached to a PTY. The reader and writer halves are
/// taken out by the copy tasks; the master stays behind for resizing.
pub struct PtySession {
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
    child: Box<dyn Child + Send + Sync>,
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<Box<dyn Write + Send>>,
}

impl PtySession {
    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    pub fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    pub fn take_writer(&mut self) -> Option<Box<dyn Write + Send>> {
        self.writer.take()
    }

    /// Shared resize handle, usable from the signal-relay thread.
    pub fn resizer(&self) -> PtyResizer {
        PtyResizer {
            master: Arc::clone(&self.master),
        }
    }

    /// Blocks until the child has been reaped.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }
}

#[derive(Clone)]
pub struct PtyResizer {
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
}

impl PtyResizer {
    pub fn resize(&self, size: PtySize) -> Result<(), PtyError> {
        let master = mutex_lock_or_recover(&self.master);
        master
            .resize(size)
            .map_err(|e| PtyError::Resize(e.to_string()))
    }
}
