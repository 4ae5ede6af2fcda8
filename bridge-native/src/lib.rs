//! # Native Bridge Implementations
//!
//! Concrete adapters for the `bridge-traits` seams on native hosts
//! (desktop and mobile shells embedding the core):
//!
//! - [`ReqwestHttpClient`](http::ReqwestHttpClient) - HTTP with retry and
//!   chunked downloads via reqwest
//! - [`TokioFileSystem`](filesystem::TokioFileSystem) - async file I/O in
//!   platform app directories
//! - [`JsonFileSettingsStore`](settings::JsonFileSettingsStore) - key-value
//!   preferences persisted as one JSON document

pub mod filesystem;
pub mod http;
pub mod settings;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use settings::JsonFileSettingsStore;
