//! Executive profile service

use crate::db::repositories::ExecutiveRepository;
use crate::models::{CreateExecutiveInput, Executive, UpdateExecutiveInput};
use crate::relay::{Action, EventRelay, Resource};
use crate::services::content::{merge_optional, merge_required, normalize_optional, ContentError, FieldErrors};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 100;
const MAX_BIO_LEN: usize = 4000;

pub struct ExecutiveService {
    repo: Arc<dyn ExecutiveRepository>,
    relay: EventRelay,
}

impl ExecutiveService {
    pub fn new(repo: Arc<dyn ExecutiveRepository>, relay: EventRelay) -> Self {
        Self { repo, relay }
    }

    fn validate(
        name: Option<&str>,
        title: Option<&str>,
        bio: Option<&str>,
        photo: Option<&str>,
    ) -> Result<(), ContentError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = name {
            errors.required("name", name, MAX_NAME_LEN);
        }
        if let Some(title) = title {
            errors.required("title", title, MAX_NAME_LEN);
        }
        if let Some(bio) = bio {
            errors.max_len("bio", bio, MAX_BIO_LEN);
        }
        errors.url("photo", photo);
        errors.into_result()
    }

    pub async fn create(&self, input: CreateExecutiveInput) -> Result<Executive, ContentError> {
        Self::validate(
            Some(&input.name),
            Some(&input.title),
            input.bio.as_deref(),
            input.photo.as_deref(),
        )?;

        let now = Utc::now();
        let executive = Executive {
            id: 0,
            name: input.name.trim().to_string(),
            title: input.title.trim().to_string(),
            bio: normalize_optional(input.bio),
            photo: normalize_optional(input.photo),
            display_order: input.display_order,
            active: input.active,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&executive)
            .await
            .context("Failed to create executive")?;
        tracing::info!(id = created.id, "Executive created");
        self.relay.emit(Resource::Executive, Action::Created, created.id);
        Ok(created)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateExecutiveInput,
    ) -> Result<Executive, ContentError> {
        let mut executive = self.get(id).await?;
        Self::validate(
            input.name.as_deref(),
            input.title.as_deref(),
            input.bio.as_deref(),
            input.photo.as_deref(),
        )?;

        merge_required(&mut executive.name, input.name);
        merge_required(&mut executive.title, input.title);
        merge_optional(&mut executive.bio, input.bio);
        merge_optional(&mut executive.photo, input.photo);
        if let Some(order) = input.display_order {
            executive.display_order = order;
        }
        if let Some(active) = input.active {
            executive.active = active;
        }

        let updated = self
            .repo
            .update(&executive)
            .await
            .context("Failed to update executive")?;
        self.relay.emit(Resource::Executive, Action::Updated, id);
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentError> {
        self.get(id).await?;
        self.repo.delete(id).await.context("Failed to delete executive")?;
        tracing::info!(id, "Executive deleted");
        self.relay.emit(Resource::Executive, Action::Deleted, id);
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Executive, ContentError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get executive")?
            .ok_or_else(|| ContentError::NotFound("Executive".to_string()))
    }

    pub async fn list_active(&self) -> Result<Vec<Executive>, ContentError> {
        Ok(self.repo.list(true).await.context("Failed to list executives")?)
    }

    pub async fn list_all(&self) -> Result<Vec<Executive>, ContentError> {
        Ok(self.repo.list(false).await.context("Failed to list executives")?)
    }
}
