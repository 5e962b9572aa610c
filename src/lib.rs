//! Song library facade crate.
//!
//! Re-exports the workspace crates so an embedding application can depend on
//! `song-library` alone. The HTTP server lives in the `song-server` binary.

pub use core_library as library;
pub use core_metadata as metadata;
pub use core_runtime as runtime;
pub use core_service as service;

pub use core_service::{bootstrap, Core, CoreError, SongService, SongUpdate};
