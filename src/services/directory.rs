use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::core::ranking::{RankingPipeline, RankingResult};
use crate::error::OccupancyError;
use crate::models::{FilterCriteria, GeoPoint, NewShelter, Shelter, ShelterPatch};
use crate::services::cache::{CacheKey, DirectoryCache};
use crate::services::store::OccupancyStore;

/// Shelter directory: search over a snapshot plus operator edits.
///
/// Reads go through the optional cache. Every successful edit drops the
/// cached snapshot so the next read sees the store.
#[derive(Clone)]
pub struct ShelterDirectory {
    store: Arc<dyn OccupancyStore>,
    cache: Option<Arc<DirectoryCache>>,
    pipeline: RankingPipeline,
}

impl ShelterDirectory {
    pub fn new(
        store: Arc<dyn OccupancyStore>,
        cache: Option<Arc<DirectoryCache>>,
        pipeline: RankingPipeline,
    ) -> Self {
        Self {
            store,
            cache,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> RankingPipeline {
        self.pipeline
    }

    /// Rank a snapshot for a searcher.
    ///
    /// `shelters` is a caller-supplied snapshot; the stored directory is used
    /// when it is `None`.
    pub async fn search(
        &self,
        criteria: &FilterCriteria,
        location: Option<GeoPoint>,
        shelters: Option<Vec<Shelter>>,
    ) -> Result<RankingResult, OccupancyError> {
        let snapshot = match shelters {
            Some(supplied) => supplied,
            None => self.list().await?,
        };

        let result = self.pipeline.rank(snapshot, criteria, location);
        tracing::debug!(
            "Ranked {} shelters, {} matches",
            result.summary.total_shelters,
            result.summary.matching_shelters
        );
        Ok(result)
    }

    /// All shelters, ordered by title
    pub async fn list(&self) -> Result<Vec<Shelter>, OccupancyError> {
        let key = CacheKey::directory();
        if let Some(cache) = &self.cache {
            if let Ok(shelters) = cache.get::<Vec<Shelter>>(&key).await {
                return Ok(shelters);
            }
        }

        // Taken before the load so an edit racing with it wins
        let generation = self.cache.as_ref().map(|c| c.generation());
        let shelters = self.store.list_shelters().await?;

        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            if let Err(e) = cache.set_if_current(&key, &shelters, generation).await {
                tracing::warn!("Failed to cache shelter directory: {}", e);
            }
        }

        Ok(shelters)
    }

    pub async fn get(&self, id: Uuid) -> Result<Shelter, OccupancyError> {
        let key = CacheKey::shelter(id);
        if let Some(cache) = &self.cache {
            if let Ok(shelter) = cache.get::<Shelter>(&key).await {
                return Ok(shelter);
            }
        }

        let generation = self.cache.as_ref().map(|c| c.generation());
        let shelter = self
            .store
            .get_shelter(id)
            .await?
            .ok_or_else(|| OccupancyError::shelter_not_found(id))?;

        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            if let Err(e) = cache.set_if_current(&key, &shelter, generation).await {
                tracing::warn!("Failed to cache shelter {}: {}", id, e);
            }
        }

        Ok(shelter)
    }

    pub async fn create_shelter(&self, fields: NewShelter) -> Result<Shelter, OccupancyError> {
        fields.validate()?;

        let shelter = self.store.create_shelter(fields).await?;
        self.invalidate(shelter.id).await;

        tracing::info!("Created shelter {} ({})", shelter.id, shelter.title);
        Ok(shelter)
    }

    /// Create the shelter with this id or replace its operator fields
    pub async fn upsert_shelter(&self, id: Uuid, fields: NewShelter) -> Result<Shelter, OccupancyError> {
        fields.validate()?;

        let shelter = self.store.upsert_shelter(id, fields).await?;
        self.invalidate(id).await;

        tracing::info!("Saved shelter {} ({})", id, shelter.title);
        Ok(shelter)
    }

    pub async fn update_shelter(&self, id: Uuid, patch: ShelterPatch) -> Result<Shelter, OccupancyError> {
        let shelter = self.store.update_shelter(id, patch).await?;
        self.invalidate(id).await;

        tracing::info!(
            "Updated shelter {}: {} of {} beds open",
            id,
            shelter.open_beds,
            shelter.total_beds
        );
        Ok(shelter)
    }

    /// Recompute open beds from the ledger
    pub async fn reconcile(&self, id: Uuid) -> Result<Shelter, OccupancyError> {
        let before = self.store.get_shelter(id).await?.map(|s| s.open_beds);
        let shelter = self.store.reconcile_shelter(id).await?;
        self.invalidate(id).await;

        if before != Some(shelter.open_beds) {
            tracing::warn!(
                "Reconciled shelter {}: open beds {:?} -> {}",
                id,
                before,
                shelter.open_beds
            );
        }
        Ok(shelter)
    }

    /// Drop cached copies of a shelter and of the snapshot
    pub async fn invalidate(&self, shelter_id: Uuid) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.invalidate_shelter(shelter_id).await {
                tracing::warn!("Failed to invalidate cache for shelter {}: {}", shelter_id, e);
            }
        }
    }
}
