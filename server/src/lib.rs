//! filedeck server
//!
//! Document manager backend that emulates filesystem operations (rename,
//! move, recursive delete, directories) on top of a Bunny.net storage zone
//! fronted by a pull-zone CDN.

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
