//! Storage abstractions for service layer
//!
//! Contains the record gateway seam and its JSON file implementation used
//! to checkpoint a whole collection after every mutation.

pub mod gateway;
pub mod json_file;

pub use gateway::RecordGateway;
pub use json_file::JsonFileGateway;
