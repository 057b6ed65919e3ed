//! Emulated filesystem over a Bunny storage zone
//!
//! ## Architecture
//!
//! - `transport` - Raw request traits (`StorageTransport`, `CdnTransport`)
//! - `bunny` - reqwest clients for the storage zone and pull zone
//! - `memory` - In-process zone and CDN for local runs and tests
//! - `paths` - Path normalization, content types, cache policies
//! - `verify` - Verify-after-write HEAD polling with backoff
//! - `objects` / `directory` - Upload, download, delete, list, folder markers
//! - `rename` - Copy-verify-delete rename and move
//! - `cdn` - Edge cache status and purge
//!
//! Transports never interpret status codes; everything above them does.

pub mod bunny;
pub mod cdn;
pub mod directory;
pub mod error;
pub mod memory;
pub mod objects;
pub mod paths;
pub mod rename;
pub mod transport;
pub mod types;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use bunny::{BunnyCdnClient, BunnyStorageClient, storage_endpoint_for_region};
pub use cdn::CacheControl;
pub use error::StorageError;
pub use memory::{Fault, MemoryCdn, MemoryStorage};
pub use objects::{ObjectStore, UploadReceipt};
pub use rename::{CopyPolicy, RenameEngine, TransferOutcome, TransferPhase};
pub use transport::{CdnTransport, ObjectHeaders, RawResponse, StorageTransport};
pub use types::{CacheStatus, StorageObject};
pub use verify::{BackoffPolicy, Sleeper, TokioSleeper, Verifier};
