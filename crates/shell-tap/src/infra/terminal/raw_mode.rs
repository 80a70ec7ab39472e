//! Controlling-terminal raw mode and window-size queries.

use std::io;
use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;

use portable_pty::PtySize;

/// Switches the terminal on `fd` into raw mode for the lifetime of the
/// guard; the saved settings are restored on drop.
pub struct RawModeGuard {
    fd: RawFd,
    saved: libc::termios,
}

impl RawModeGuard {
    pub fn enable(fd: RawFd) -> io::Result<Self> {
        let mut saved = MaybeUninit::<libc::termios>::uninit();
        // SAFETY: `fd` is a valid descriptor owned by the caller and `saved`
        // is sized for the termios struct the kernel fills in.
        let rc = unsafe { libc::tcgetattr(fd, saved.as_mut_ptr()) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: tcgetattr succeeded, so `saved` is initialized.
        let saved = unsafe { saved.assume_init() };

        let mut raw = saved;
        // SAFETY: `raw` is a valid termios obtained above.
        unsafe { libc::cfmakeraw(&mut raw) };
        // SAFETY: same fd; `raw` is fully initialized.
        let rc = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { fd, saved })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // SAFETY: restores the termios captured in `enable` on the same fd.
        unsafe {
            libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved);
        }
    }
}

/// Current window size of the terminal on `fd`.
pub fn window_size(fd: RawFd) -> io::Result<PtySize> {
    let mut ws = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // SAFETY: TIOCGWINSZ writes a winsize struct through the pointer.
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(PtySize {
        rows: ws.ws_row,
        cols: ws.ws_col,
        pixel_width: ws.ws_xpixel,
        pixel_height: ws.ws_ypixel,
    })
}
