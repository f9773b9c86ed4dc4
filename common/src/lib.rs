//! Data model shared by every layer of the student batch upload pipeline.
//!
//! Everything in here is plain serde data: the rows parsed from an upload
//! file, the batch and reference entities owned by the batch-management
//! backend, and the request/response payloads exchanged with it.

pub mod model;
pub mod requests;
pub mod responses;
