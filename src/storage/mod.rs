//! Storage layer for rentdb
//!
//! Handles reading, committing and serializing writes to JSON collection files.

pub mod collection;
pub mod ids;
pub mod persist;
pub mod record;
pub mod serializer;
