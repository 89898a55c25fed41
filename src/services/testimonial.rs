//! Testimonial service
//!
//! Ratings are optional; when present they must be within 1..=5. An update
//! with `rating: 0` removes the rating.

use crate::db::repositories::TestimonialRepository;
use crate::models::{CreateTestimonialInput, Testimonial, UpdateTestimonialInput};
use crate::relay::{Action, EventRelay, Resource};
use crate::services::content::{merge_optional, merge_required, normalize_optional, ContentError, FieldErrors};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 100;
const MAX_CONTENT_LEN: usize = 2000;

pub struct TestimonialService {
    repo: Arc<dyn TestimonialRepository>,
    relay: EventRelay,
}

impl TestimonialService {
    pub fn new(repo: Arc<dyn TestimonialRepository>, relay: EventRelay) -> Self {
        Self { repo, relay }
    }

    pub async fn create(&self, input: CreateTestimonialInput) -> Result<Testimonial, ContentError> {
        let mut errors = FieldErrors::new();
        errors.required("author_name", &input.author_name, MAX_NAME_LEN);
        errors.required("content", &input.content, MAX_CONTENT_LEN);
        for (field, value) in [("author_title", &input.author_title), ("company", &input.company)] {
            if let Some(value) = value {
                errors.max_len(field, value, MAX_NAME_LEN);
            }
        }
        errors.url("avatar", input.avatar.as_deref());
        errors.rating(input.rating);
        errors.into_result()?;

        let now = Utc::now();
        let testimonial = Testimonial {
            id: 0,
            author_name: input.author_name.trim().to_string(),
            author_title: normalize_optional(input.author_title),
            company: normalize_optional(input.company),
            content: input.content.trim().to_string(),
            avatar: normalize_optional(input.avatar),
            rating: input.rating,
            display_order: input.display_order,
            active: input.active,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&testimonial)
            .await
            .context("Failed to create testimonial")?;
        tracing::info!(id = created.id, "Testimonial created");
        self.relay.emit(Resource::Testimonial, Action::Created, created.id);
        Ok(created)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateTestimonialInput,
    ) -> Result<Testimonial, ContentError> {
        let mut testimonial = self.get(id).await?;

        let mut errors = FieldErrors::new();
        if let Some(ref name) = input.author_name {
            errors.required("author_name", name, MAX_NAME_LEN);
        }
        if let Some(ref content) = input.content {
            errors.required("content", content, MAX_CONTENT_LEN);
        }
        for (field, value) in [("author_title", &input.author_title), ("company", &input.company)] {
            if let Some(value) = value {
                errors.max_len(field, value, MAX_NAME_LEN);
            }
        }
        errors.url("avatar", input.avatar.as_deref());
        errors.rating(input.rating.filter(|r| *r != 0));
        errors.into_result()?;

        merge_required(&mut testimonial.author_name, input.author_name);
        merge_required(&mut testimonial.content, input.content);
        merge_optional(&mut testimonial.author_title, input.author_title);
        merge_optional(&mut testimonial.company, input.company);
        merge_optional(&mut testimonial.avatar, input.avatar);
        if let Some(rating) = input.rating {
            testimonial.rating = (rating != 0).then_some(rating);
        }
        if let Some(order) = input.display_order {
            testimonial.display_order = order;
        }
        if let Some(active) = input.active {
            testimonial.active = active;
        }

        let updated = self
            .repo
            .update(&testimonial)
            .await
            .context("Failed to update testimonial")?;
        self.relay.emit(Resource::Testimonial, Action::Updated, id);
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentError> {
        self.get(id).await?;
        self.repo
            .delete(id)
            .await
            .context("Failed to delete testimonial")?;
        tracing::info!(id, "Testimonial deleted");
        self.relay.emit(Resource::Testimonial, Action::Deleted, id);
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Testimonial, ContentError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get testimonial")?
            .ok_or_else(|| ContentError::NotFound("Testimonial".to_string()))
    }

    pub async fn list_active(&self) -> Result<Vec<Testimonial>, ContentError> {
        Ok(self.repo.list(true).await.context("Failed to list testimonials")?)
    }

    pub async fn list_all(&self) -> Result<Vec<Testimonial>, ContentError> {
        Ok(self.repo.list(false).await.context("Failed to list testimonials")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxTestimonialRepository;
    use crate::db::{create_test_pool, migrations::run_migrations};

    async fn setup() -> TestimonialService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        TestimonialService::new(SqlxTestimonialRepository::boxed(pool), EventRelay::new())
    }

    #[tokio::test]
    async fn test_rating_bounds() {
        let service = setup().await;

        for bad in [0, 6, -1] {
            let mut input = CreateTestimonialInput::new("Peter", "Great work");
            input.rating = Some(bad);
            assert!(
                matches!(service.create(input).await, Err(ContentError::Validation(_))),
                "rating {} should be rejected",
                bad
            );
        }

        for good in [1, 5] {
            let mut input = CreateTestimonialInput::new("Peter", "Great work");
            input.rating = Some(good);
            assert_eq!(service.create(input).await.unwrap().rating, Some(good));
        }
    }

    #[tokio::test]
    async fn test_update_clears_rating_with_zero() {
        let service = setup().await;
        let mut input = CreateTestimonialInput::new("Milton", "Loved the stapler");
        input.rating = Some(4);
        input.company = Some("Initech".to_string());
        let created = service.create(input).await.unwrap();

        let updated = service
            .update(
                created.id,
                UpdateTestimonialInput {
                    rating: Some(0),
                    company: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.rating, None);
        assert_eq!(updated.company, None);
        assert_eq!(updated.author_name, "Milton");

        let invalid = service
            .update(
                created.id,
                UpdateTestimonialInput {
                    rating: Some(9),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(invalid, Err(ContentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_active_filter() {
        let service = setup().await;
        let mut hidden = CreateTestimonialInput::new("Hidden", "x");
        hidden.active = false;
        service.create(hidden).await.unwrap();
        service.create(CreateTestimonialInput::new("Shown", "y")).await.unwrap();

        let active = service.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].author_name, "Shown");
        assert_eq!(service.list_all().await.unwrap().len(), 2);
    }
}
