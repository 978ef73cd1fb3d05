//! DCC SEND receiver.
//!
//! A transfer has two phases. [`prepare`] runs on the IRC session: it looks
//! at the destination file and, for a partial file, performs the
//! `DCC RESUME` handshake. [`PendingTransfer::run`] then only needs the data
//! socket, so the session owner can move on to the next request while bytes
//! are streamed to disk.

use std::io::SeekFrom;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use super::DccError;
use crate::irc::IrcSession;
use crate::xdcc::{DccOffer, negotiate_resume};

/// Size of the fixed receive buffer.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default bound for the bot's `DCC ACCEPT`.
pub const DEFAULT_RESUME_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound between two reads on the data socket.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default bound for opening the data socket.
pub const DEFAULT_DATA_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Progress callbacks, keyed by destination path.
pub trait TransferObserver: Send + Sync {
    /// The data connection is open; `offset` bytes were already on disk.
    fn started(&self, _destination: &Path, _offset: u64, _total: u64) {}

    /// `received` bytes of `total` are now on disk.
    fn advanced(&self, _destination: &Path, _received: u64, _total: u64) {}

    /// The transfer reached a terminal state.
    fn finished(&self, _destination: &Path, _complete: bool) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// Timeouts applied while streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    /// Bound for opening the data socket.
    pub connect_timeout: Duration,
    /// Bound between two successful reads.
    pub idle_timeout: Duration,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_DATA_CONNECT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Outcome of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Final file path.
    pub path: PathBuf,
    /// Size of the file on disk.
    pub bytes: u64,
    /// Offset the transfer continued from, if it was resumed.
    pub resumed_from: Option<u64>,
    /// True when the file was already complete and nothing was transferred.
    pub already_present: bool,
}

/// Result of [`prepare`].
#[derive(Debug)]
pub enum PreparedTransfer {
    /// The destination already holds the whole file.
    AlreadyComplete(TransferReport),
    /// Bytes still have to be received.
    Pending(PendingTransfer),
}

/// A transfer whose start offset is settled.
#[derive(Debug, Clone)]
pub struct PendingTransfer {
    offer: DccOffer,
    destination: PathBuf,
    offset: u64,
}

/// Bytes received so far plus the open destination file. Owned by the
/// receive loop for the lifetime of one transfer.
#[derive(Debug)]
pub struct TransferProgress {
    /// Bytes on disk, including a resumed prefix.
    pub received: u64,
    /// Announced size.
    pub total: u64,
    file: BufWriter<File>,
}

/// Decides where the transfer of `offer` into `destination` starts.
///
/// - destination size equals the announced size: nothing to do
/// - smaller partial file: `DCC RESUME` at its size, falling back to a
///   fresh transfer when the bot does not confirm within `resume_timeout`
/// - otherwise: fresh transfer, overwriting
///
/// # Errors
///
/// [`DccError::Io`] when the destination cannot be inspected and
/// [`DccError::Negotiation`] when the session fails during the handshake.
#[instrument(skip(session, offer, resume_timeout), fields(file = %destination.display()))]
pub async fn prepare(
    session: &mut IrcSession,
    bot: &str,
    offer: DccOffer,
    destination: &Path,
    resume_timeout: Duration,
) -> Result<PreparedTransfer, DccError> {
    let existing = existing_size(destination).await?;

    match existing {
        Some(size) if size == offer.size => {
            info!(bytes = size, "file already complete, skipping transfer");
            Ok(PreparedTransfer::AlreadyComplete(TransferReport {
                path: destination.to_path_buf(),
                bytes: size,
                resumed_from: None,
                already_present: true,
            }))
        }
        Some(size) if size > 0 && size < offer.size => {
            let accepted = negotiate_resume(session, bot, &offer, size, resume_timeout).await?;
            let offset = if accepted {
                size
            } else {
                warn!(existing = size, "resume not confirmed, restarting from zero");
                0
            };
            Ok(PreparedTransfer::Pending(PendingTransfer {
                offer,
                destination: destination.to_path_buf(),
                offset,
            }))
        }
        other => {
            if let Some(size) = other.filter(|size| *size > offer.size) {
                warn!(
                    existing = size,
                    announced = offer.size,
                    "existing file is larger than the offer, overwriting"
                );
            }
            Ok(PreparedTransfer::Pending(PendingTransfer::fresh(
                offer,
                destination,
            )))
        }
    }
}

async fn existing_size(path: &Path) -> Result<Option<u64>, DccError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Err(DccError::io(
            path,
            std::io::Error::other("destination exists and is not a regular file"),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DccError::io(path, e)),
    }
}

impl PendingTransfer {
    /// A transfer from offset zero that overwrites `destination`.
    #[must_use]
    pub fn fresh(offer: DccOffer, destination: &Path) -> Self {
        Self {
            offer,
            destination: destination.to_path_buf(),
            offset: 0,
        }
    }

    /// Offset the transfer starts from.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Destination path.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Connects to the peer and streams the remaining bytes to disk.
    ///
    /// The destination file is flushed and kept on every exit path.
    ///
    /// # Errors
    ///
    /// [`DccError::Connect`], [`DccError::Io`], [`DccError::Truncated`] or
    /// [`DccError::Stalled`].
    #[instrument(
        skip_all,
        fields(file = %self.destination.display(), offset = self.offset, total = self.offer.size)
    )]
    pub async fn run(
        self,
        observer: Arc<dyn TransferObserver>,
        limits: TransferLimits,
    ) -> Result<TransferReport, DccError> {
        let address = SocketAddr::new(self.offer.address, self.offer.port);
        let mut stream = tokio::time::timeout(limits.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| DccError::Connect {
                address,
                source: std::io::ErrorKind::TimedOut.into(),
            })?
            .map_err(|source| DccError::Connect { address, source })?;
        debug!(%address, "data connection open");

        let file = self.open_destination().await?;
        let mut progress = TransferProgress {
            received: self.offset,
            total: self.offer.size,
            file: BufWriter::new(file),
        };
        observer.started(&self.destination, self.offset, self.offer.size);

        let received = receive(
            &mut stream,
            &mut progress,
            observer.as_ref(),
            &self.destination,
            limits.idle_timeout,
        )
        .await;
        let flushed = progress
            .file
            .flush()
            .await
            .map_err(|e| DccError::io(&self.destination, e));
        let outcome = received.and(flushed);
        observer.finished(&self.destination, outcome.is_ok());
        outcome?;

        info!(bytes = progress.received, resumed = self.offset > 0, "transfer complete");
        Ok(TransferReport {
            path: self.destination,
            bytes: progress.received,
            resumed_from: (self.offset > 0).then_some(self.offset),
            already_present: false,
        })
    }

    async fn open_destination(&self) -> Result<File, DccError> {
        let io_error = |e| DccError::io(&self.destination, e);
        if let Some(parent) = self.destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        if self.offset == 0 {
            return File::create(&self.destination).await.map_err(io_error);
        }
        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.destination)
            .await
            .map_err(io_error)?;
        file.set_len(self.offset).await.map_err(io_error)?;
        file.seek(SeekFrom::End(0)).await.map_err(io_error)?;
        Ok(file)
    }
}

async fn receive(
    stream: &mut TcpStream,
    progress: &mut TransferProgress,
    observer: &dyn TransferObserver,
    destination: &Path,
    idle: Duration,
) -> Result<(), DccError> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    while progress.received < progress.total {
        let read = match tokio::time::timeout(idle, stream.read(&mut buf)).await {
            Err(_) => {
                return Err(DccError::Stalled {
                    path: destination.to_path_buf(),
                    received: progress.received,
                    expected: progress.total,
                    idle_secs: idle.as_secs(),
                });
            }
            Ok(Err(e)) => {
                warn!(error = %e, "data connection failed");
                0
            }
            Ok(Ok(n)) => n,
        };
        if read == 0 {
            return Err(DccError::Truncated {
                path: destination.to_path_buf(),
                received: progress.received,
                expected: progress.total,
            });
        }

        let remaining = progress.total - progress.received;
        let take = usize::try_from(remaining).map_or(read, |r| read.min(r));
        if take < read {
            warn!(extra = read - take, "peer sent more than the announced size");
        }
        progress
            .file
            .write_all(&buf[..take])
            .await
            .map_err(|e| DccError::io(destination, e))?;
        progress.received += take as u64;

        if let Err(e) = stream.write_all(&ack_bytes(progress.received)).await {
            debug!(error = %e, "could not send DCC acknowledgement");
        }
        observer.advanced(destination, progress.received, progress.total);
    }
    Ok(())
}

/// Classic DCC acknowledgement: the low 32 bits of the position, big-endian.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn ack_bytes(position: u64) -> [u8; 4] {
    (position as u32).to_be_bytes()
}
