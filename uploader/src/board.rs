//! Locally cached list of batches.
//!
//! The board only changes after the backend has confirmed an operation. A
//! failed refresh, rename or delete leaves the previously fetched list
//! exactly as it was.

use crate::api::{ApiError, BatchApi};
use crate::committer::FormError;
use common::model::batch::Batch;
use common::model::id::Id;
use common::requests::UpdateBatchRequest;
use displaydoc::Display;
use log::{info, warn};
use std::error::Error as StdError;

#[derive(Debug, Display)]
pub enum BoardError {
    /// {0}
    Form(FormError),
    /// {0}
    Api(ApiError),
}

impl StdError for BoardError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            BoardError::Form(e) => Some(e),
            BoardError::Api(e) => Some(e),
        }
    }
}

impl From<ApiError> for BoardError {
    fn from(error: ApiError) -> Self {
        BoardError::Api(error)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchBoard {
    batches: Vec<Batch>,
}

impl BatchBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn get(&self, id: &Id) -> Option<&Batch> {
        self.batches.iter().find(|b| &b.id == id)
    }

    pub async fn refresh<A: BatchApi>(&mut self, api: &A) -> Result<(), ApiError> {
        match api.list_batches().await {
            Ok(batches) => {
                self.batches = batches;
                Ok(())
            }
            Err(e) => {
                warn!("could not refresh batches, keeping {} cached: {}", self.batches.len(), e);
                Err(e)
            }
        }
    }

    /// Inserts or replaces a batch the backend just returned.
    pub fn upsert(&mut self, batch: Batch) {
        match self.batches.iter_mut().find(|b| b.id == batch.id) {
            Some(existing) => *existing = batch,
            None => self.batches.push(batch),
        }
    }

    pub async fn rename<A: BatchApi>(
        &mut self,
        api: &A,
        id: &Id,
        name: &str,
    ) -> Result<(), BoardError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::Form(FormError::MissingName));
        }
        let updated = api
            .update_batch(id, &UpdateBatchRequest::rename(name))
            .await?;
        match updated {
            Some(batch) => self.upsert(batch),
            None => {
                if let Some(batch) = self.batches.iter_mut().find(|b| &b.id == id) {
                    batch.name = name.to_string();
                }
            }
        }
        info!("renamed batch {} to \"{}\"", id, name);
        Ok(())
    }

    /// Deletes a batch on the backend, then drops it from the board.
    pub async fn delete<A: BatchApi>(&mut self, api: &A, id: &Id) -> Result<(), ApiError> {
        api.delete_batch(id).await?;
        self.batches.retain(|b| &b.id != id);
        info!("deleted batch {}", id);
        Ok(())
    }
}
