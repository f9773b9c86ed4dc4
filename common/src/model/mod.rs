pub mod batch;
pub mod credential;
pub mod failure;
pub mod id;
pub mod upload_row;
