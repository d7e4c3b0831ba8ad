//! Named pipe channels
//!
//! FIFOs are created with `mkfifo` and turned into tokio pipe ends once both
//! sides are connected. Opening a FIFO is a rendezvous: a reader waits for a
//! writer and the other way round.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::sys::stat::Mode;
use tokio::io::Interest;
use tokio::net::unix::pipe;

use super::{Channels, ReplyWriter};

/// Poll interval while waiting for a FIFO reader to appear
const WRITER_RETRY: Duration = Duration::from_millis(5);

/// Channels backed by POSIX named pipes
#[derive(Debug, Clone)]
pub struct FifoChannels {
    open_timeout: Duration,
}

impl Default for FifoChannels {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl FifoChannels {
    /// Create FIFO channels that give up on an absent peer after `open_timeout`
    pub fn new(open_timeout: Duration) -> Self {
        Self { open_timeout }
    }

    /// Open the administrative FIFO
    ///
    /// The broker also holds a write end, so the stream does not hit EOF
    /// every time a client closes its side after sending a request.
    pub fn open_admin(path: &Path) -> io::Result<pipe::Receiver> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        pipe::Receiver::from_file(file)
    }
}

impl Channels for FifoChannels {
    type Reader = pipe::Receiver;
    type Writer = pipe::Sender;

    async fn open_reader(&self, path: &str) -> io::Result<pipe::Receiver> {
        let path = PathBuf::from(path);
        let opener = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || OpenOptions::new().read(true).open(path))
        };

        match tokio::time::timeout(self.open_timeout, opener).await {
            Ok(joined) => {
                let file = joined.map_err(io::Error::other)??;
                pipe::Receiver::from_file(file)
            }
            Err(_) => {
                // Release the blocked open() by briefly playing the writer
                let _ = OpenOptions::new()
                    .write(true)
                    .custom_flags(nix::libc::O_NONBLOCK)
                    .open(&path);
                Err(timed_out(&path))
            }
        }
    }

    async fn open_writer(&self, path: &str) -> io::Result<pipe::Sender> {
        let path = Path::new(path);
        let deadline = Instant::now() + self.open_timeout;

        loop {
            // Non-blocking open fails with ENXIO until a reader is present
            match OpenOptions::new()
                .write(true)
                .custom_flags(nix::libc::O_NONBLOCK)
                .open(path)
            {
                Ok(file) => return pipe::Sender::from_file(file),
                Err(e) if e.raw_os_error() == Some(nix::libc::ENXIO) => {
                    if Instant::now() >= deadline {
                        return Err(timed_out(path));
                    }
                    tokio::time::sleep(WRITER_RETRY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl ReplyWriter for pipe::Sender {
    async fn closed(&mut self) {
        // A FIFO writer reports an error condition once no reader is left
        let _ = self.ready(Interest::ERROR).await;
    }
}

/// Create a FIFO at `path`, replacing whatever file is there
pub fn create_fifo(path: &Path) -> io::Result<()> {
    remove_fifo(path)?;
    nix::unistd::mkfifo(path, Mode::from_bits_truncate(0o640)).map_err(io::Error::from)
}

/// Delete the FIFO at `path`; a missing file is not an error
pub fn remove_fifo(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn timed_out(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("no peer opened {}", path.display()),
    )
}
