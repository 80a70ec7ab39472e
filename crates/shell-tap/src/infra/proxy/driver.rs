//! PTY session driver: wires the shell, the real terminal, and the
//! transcript together for the lifetime of one proxy invocation.

use std::env;
use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::IsTerminal;
use std::io::Read;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel as channel;
use portable_pty::PtySize;
use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGTERM;
use signal_hook::consts::SIGWINCH;
use signal_hook::iterator::Signals;
use signal_hook::iterator::backend::Handle;
use tracing::debug;
use tracing::warn;

use crate::common::ProxyError;
use crate::infra::proxy::ProcessLock;
use crate::infra::proxy::ProxyConfig;
use crate::infra::proxy::TranscriptWriter;
use crate::infra::proxy::session;
use crate::infra::terminal::PtyResizer;
use crate::infra::terminal::RawModeGuard;
use crate::infra::terminal::ShellSpawner;
use crate::infra::terminal::window_size;

/// Environment variable marking an active proxy; a proxy started from
/// inside another proxy's shell sees it and backs out.
pub const PROXY_ACTIVE_ENV: &str = "SHELL_TAP_PROXY_ACTIVE";

const COPY_BUF_SIZE: usize = 8192;

const FALLBACK_PTY_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 80,
    pixel_width: 0,
    pixel_height: 0,
};

/// How a proxy invocation ended. Every variant is a success from the
/// caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyOutcome {
    /// The shell exited and the pty drained.
    Completed,
    /// A termination signal cut the session short.
    Interrupted,
    /// Another proxy already wraps this shell; nothing was done.
    AlreadyActive,
}

pub struct ProxyDriver<S: ShellSpawner> {
    spawner: S,
    config: ProxyConfig,
}

impl<S: ShellSpawner> ProxyDriver<S> {
    pub fn new(spawner: S, config: ProxyConfig) -> Self {
        Self { spawner, config }
    }

    /// Runs the proxy against the real stdin/stdout, with raw mode and
    /// resize relaying when stdin is a terminal.
    pub fn run(&self) -> Result<ProxyOutcome, ProxyError> {
        let stdin = io::stdin();
        let tty_fd = stdin.is_terminal().then(|| stdin.as_raw_fd());
        self.run_with_io(Box::new(stdin), Box::new(io::stdout()), tty_fd)
    }

    /// Same as [`Self::run`] with injected endpoints; `tty_fd` names the
    /// controlling terminal when there is one.
    pub fn run_with_io(
        &self,
        stdin: Box<dyn Read + Send>,
        stdout: Box<dyn Write + Send>,
        tty_fd: Option<RawFd>,
    ) -> Result<ProxyOutcome, ProxyError> {
        if let Ok(holder) = env::var(PROXY_ACTIVE_ENV) {
            if !holder.is_empty() {
                debug!(
                    existing_proxy_pid = %holder,
                    "Already inside a proxy session; not nesting"
                );
                return Ok(ProxyOutcome::AlreadyActive);
            }
        }

        let session_log =
            session::derive_sibling_path(self.config.log_file(), self.config.session_id());
        let session_lock = session::derive_sibling_path(
            &session::lock_path_for(self.config.log_file()),
            self.config.session_id(),
        );

        // Resources are bound in acquisition order; drops run in reverse,
        // which is the release order the teardown requires: terminal mode,
        // signal relays, pty, log file, lock.
        let _lock = ProcessLock::acquire(&session_lock)?;

        match session::purge_stale_logs(self.config.log_file(), self.config.log_max_age()) {
            Ok(removed) if removed > 0 => debug!(removed, "Purged stale session logs"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to purge stale session logs"),
        }

        // Each invocation starts a fresh transcript.
        if session_log.exists() {
            if let Err(e) = fs::remove_file(&session_log) {
                warn!(
                    path = %session_log.display(),
                    error = %e,
                    "Failed to delete previous session log"
                );
            }
        }
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&session_log)
            .map_err(|e| ProxyError::LogOpen {
                path: session_log.clone(),
                source: e,
            })?;
        let transcript = Arc::new(TranscriptWriter::new(log_file, self.config.max_lines()));

        debug!(
            log_file = %session_log.display(),
            lock_file = %session_lock.display(),
            session_id = self.config.session_id(),
            pid = std::process::id(),
            "Starting shell proxy"
        );

        let initial_size = tty_fd
            .and_then(|fd| window_size(fd).ok())
            .unwrap_or(FALLBACK_PTY_SIZE);
        let child_env = [
            (
                session::SESSION_ID_ENV.to_string(),
                self.config.session_id().to_string(),
            ),
            (
                PROXY_ACTIVE_ENV.to_string(),
                std::process::id().to_string(),
            ),
        ];
        let mut pty = self
            .spawner
            .spawn(self.config.shell(), &child_env, initial_size)
            .map_err(|e| ProxyError::Spawn(e.to_string()))?;
        debug!(shell = self.config.shell(), child_pid = ?pty.pid(), "Shell spawned under pty");

        let _resize_relay = match tty_fd {
            Some(fd) => Some(ResizeRelay::start(fd, pty.resizer())?),
            None => None,
        };

        let (_term_watch, term_rx) = TerminationWatcher::start()?;

        let _raw_mode = match tty_fd {
            Some(fd) => Some(RawModeGuard::enable(fd).map_err(|e| {
                ProxyError::Terminal(format!("failed to set raw mode: {e}"))
            })?),
            None => {
                debug!("stdin is not a terminal; leaving terminal mode untouched");
                None
            }
        };

        let pty_writer = pty
            .take_writer()
            .ok_or_else(|| ProxyError::Terminal("pty writer unavailable".to_string()))?;
        let pty_reader = pty
            .take_reader()
            .ok_or_else(|| ProxyError::Terminal("pty reader unavailable".to_string()))?;

        let (done_tx, done_rx) = channel::bounded(1);
        spawn_stdin_copy(stdin, pty_writer);
        spawn_output_copy(pty_reader, stdout, Arc::clone(&transcript), done_tx);

        // Natural completion races the termination signal; either one is a
        // normal shutdown.
        let outcome = channel::select! {
            recv(done_rx) -> _ => {
                debug!("PTY session completed");
                ProxyOutcome::Completed
            }
            recv(term_rx) -> sig => {
                debug!(signal = ?sig.ok(), "Received termination signal; shutting down");
                ProxyOutcome::Interrupted
            }
        };

        match pty.wait() {
            Ok(status) => debug!(success = status.success(), "Shell process reaped"),
            Err(e) => warn!(error = %e, "Failed to reap shell process"),
        }

        Ok(outcome)
    }
}

/// Propagates the terminal size to the pty: once at startup and again on
/// every SIGWINCH. Size errors are logged and never fatal.
struct ResizeRelay {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl ResizeRelay {
    fn start(fd: RawFd, resizer: PtyResizer) -> Result<Self, ProxyError> {
        relay_size(fd, &resizer);

        let mut signals =
            Signals::new([SIGWINCH]).map_err(|e| ProxyError::SignalSetup(e.to_string()))?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("winch-relay".to_string())
            .spawn(move || {
                for _ in signals.forever() {
                    relay_size(fd, &resizer);
                }
            })
            .map_err(|e| {
                ProxyError::SignalSetup(format!("failed to spawn resize relay: {e}"))
            })?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for ResizeRelay {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn relay_size(fd: RawFd, resizer: &PtyResizer) {
    match window_size(fd) {
        Ok(size) => {
            if let Err(e) = resizer.resize(size) {
                warn!(error = %e, "Failed to propagate terminal size to pty");
            }
        }
        Err(e) => warn!(error = %e, "Failed to query terminal size"),
    }
}

/// Waits for the first SIGINT or SIGTERM and forwards it over a channel.
struct TerminationWatcher {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl TerminationWatcher {
    fn start() -> Result<(Self, channel::Receiver<i32>), ProxyError> {
        let mut signals = Signals::new([SIGINT, SIGTERM])
            .map_err(|e| ProxyError::SignalSetup(e.to_string()))?;
        let handle = signals.handle();
        let (tx, rx) = channel::bounded(1);
        let thread = thread::Builder::new()
            .name("term-watch".to_string())
            .spawn(move || {
                if let Some(sig) = signals.forever().next() {
                    let _ = tx.send(sig);
                }
            })
            .map_err(|e| {
                ProxyError::SignalSetup(format!("failed to spawn signal watcher: {e}"))
            })?;

        Ok((
            Self {
                handle,
                thread: Some(thread),
            },
            rx,
        ))
    }
}

impl Drop for TerminationWatcher {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Copies the user's keystrokes into the pty. Deliberately detached: the
/// blocking stdin read cannot be cancelled and is abandoned when the proxy
/// exits.
fn spawn_stdin_copy(mut stdin: Box<dyn Read + Send>, mut pty_writer: Box<dyn Write + Send>) {
    let spawned = thread::Builder::new()
        .name("stdin-copy".to_string())
        .spawn(move || {
            let mut buf = [0u8; COPY_BUF_SIZE];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Err(e) = pty_writer
                            .write_all(&buf[..n])
                            .and_then(|()| pty_writer.flush())
                        {
                            debug!(error = %e, "Error copying stdin to pty");
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!(error = %e, "Error reading stdin");
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to spawn stdin copy thread");
    }
}

/// Tees pty output to the real terminal and the transcript, then signals
/// completion. A transcript failure never takes down the interactive
/// session; a terminal write failure ends the loop.
fn spawn_output_copy(
    mut pty_reader: Box<dyn Read + Send>,
    mut stdout: Box<dyn Write + Send>,
    transcript: Arc<TranscriptWriter>,
    done: channel::Sender<()>,
) {
    let fallback = done.clone();
    let spawned = thread::Builder::new()
        .name("pty-copy".to_string())
        .spawn(move || {
            let mut buf = [0u8; COPY_BUF_SIZE];
            loop {
                match pty_reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Err(e) =
                            stdout.write_all(&buf[..n]).and_then(|()| stdout.flush())
                        {
                            debug!(error = %e, "Error copying pty output to terminal");
                            break;
                        }
                        if let Err(e) = transcript.write(&buf[..n]) {
                            warn!(error = %e, "Failed to update session transcript");
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    // EIO is how the pty reports EOF once the shell side is
                    // gone.
                    Err(e) => {
                        debug!(error = %e, "PTY read ended");
                        break;
                    }
                }
            }
            let _ = done.send(());
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to spawn pty copy thread");
        let _ = fallback.send(());
    }
}
