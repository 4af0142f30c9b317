//! Repository implementations.
//!
//! - `local`: in-memory table store, used by the CLI and in tests

pub mod local;

pub use local::LocalRepository;
