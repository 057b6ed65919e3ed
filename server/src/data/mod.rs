//! Data layer
//!
//! - `storage` - Storage zone transports, object operations, folder emulation,
//!   rename/move and CDN cache control
//! - `files` - Request-level file service returning `OperationResult`

pub mod files;
pub mod storage;

pub use files::{FailureKind, FileService, OperationResult};
