//! DCC transfer engine: resume negotiation and streaming receive.

mod engine;
mod error;

pub use engine::{
    DEFAULT_DATA_CONNECT_TIMEOUT, DEFAULT_IDLE_TIMEOUT, DEFAULT_RESUME_TIMEOUT, NoopObserver,
    PendingTransfer, PreparedTransfer, READ_BUFFER_SIZE, TransferLimits, TransferObserver,
    TransferProgress, TransferReport, ack_bytes, prepare,
};
pub use error::DccError;
