//! Student batch upload pipeline.
//!
//! A roster file goes through four stages, strictly in order:
//!
//! 1. [`intake`] reads the user-supplied file (CSV or XLSX).
//! 2. [`parser`] maps the header and turns each non-empty line into an
//!    [`UploadRow`](common::model::upload_row::UploadRow).
//! 3. [`validator`] runs the advisory client checks, then merges the
//!    authoritative result of the backend validation endpoint.
//! 4. [`committer`] creates the batch with the committable rows and hands the
//!    generated credentials to [`export`].
//!
//! [`workflow`] sequences the stages for one upload, [`board`] keeps the
//! fetched batch list, and [`api`] is the only module that talks HTTP.

pub mod api;
pub mod board;
pub mod committer;
pub mod config;
pub mod export;
pub mod intake;
pub mod parser;
pub mod session;
pub mod validator;
pub mod workflow;
