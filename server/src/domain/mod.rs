//! Domain logic on top of the storage layer
//!
//! - `folders` - Client name to top-level folder resolution

pub mod folders;

pub use folders::{ClientFolderResolver, Clock, SystemClock};
