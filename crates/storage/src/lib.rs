//! Storage abstractions for the VPTS services.
//!
//! Provides a bucket-scoped client over S3 or an in-memory store.

pub mod object_store;

pub use self::object_store::{ObjectEntry, ObjectStorage, ObjectStorageConfig};
