//! Service modules for the ingest pipeline
//!
//! One service per core operation: presign issuance, upload receipt,
//! recording registration, status projection, batch deletion, plus the
//! optional expiry sweep.

pub mod deleter;
pub mod presign;
pub mod reaper;
pub mod registrar;
pub mod status;
pub mod upload;

pub use deleter::BatchDeleter;
pub use presign::{IssuedSlot, PresignIssuer, PresignOutcome, SlotRequest};
pub use registrar::{RecordingInput, RecordingRegistrar, RegisterOutcome};
pub use reaper::spawn_expiry_reaper;
pub use status::{BatchStatus, BatchStatusReader, BatchView, RecordingView};
pub use upload::{UploadOutcome, UploadReceiver};
