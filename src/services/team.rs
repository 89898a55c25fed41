//! Team member service

use crate::db::repositories::TeamMemberRepository;
use crate::models::{CreateTeamMemberInput, TeamMember, UpdateTeamMemberInput};
use crate::relay::{Action, EventRelay, Resource};
use crate::services::content::{merge_optional, merge_required, normalize_optional, ContentError, FieldErrors};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 100;
const MAX_BIO_LEN: usize = 2000;

pub struct TeamService {
    repo: Arc<dyn TeamMemberRepository>,
    relay: EventRelay,
}

impl TeamService {
    pub fn new(repo: Arc<dyn TeamMemberRepository>, relay: EventRelay) -> Self {
        Self { repo, relay }
    }

    pub async fn create(&self, input: CreateTeamMemberInput) -> Result<TeamMember, ContentError> {
        let mut errors = FieldErrors::new();
        errors.required("name", &input.name, MAX_NAME_LEN);
        errors.required("position", &input.position, MAX_NAME_LEN);
        if let Some(ref bio) = input.bio {
            errors.max_len("bio", bio, MAX_BIO_LEN);
        }
        errors.url("photo", input.photo.as_deref());
        errors.url("linkedin_url", input.linkedin_url.as_deref());
        errors.into_result()?;

        let now = Utc::now();
        let member = TeamMember {
            id: 0,
            name: input.name.trim().to_string(),
            position: input.position.trim().to_string(),
            bio: normalize_optional(input.bio),
            photo: normalize_optional(input.photo),
            linkedin_url: normalize_optional(input.linkedin_url),
            display_order: input.display_order,
            active: input.active,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&member)
            .await
            .context("Failed to create team member")?;
        tracing::info!(id = created.id, "Team member created");
        self.relay.emit(Resource::Team, Action::Created, created.id);
        Ok(created)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateTeamMemberInput,
    ) -> Result<TeamMember, ContentError> {
        let mut member = self.get(id).await?;

        let mut errors = FieldErrors::new();
        if let Some(ref name) = input.name {
            errors.required("name", name, MAX_NAME_LEN);
        }
        if let Some(ref position) = input.position {
            errors.required("position", position, MAX_NAME_LEN);
        }
        if let Some(ref bio) = input.bio {
            errors.max_len("bio", bio, MAX_BIO_LEN);
        }
        errors.url("photo", input.photo.as_deref());
        errors.url("linkedin_url", input.linkedin_url.as_deref());
        errors.into_result()?;

        merge_required(&mut member.name, input.name);
        merge_required(&mut member.position, input.position);
        merge_optional(&mut member.bio, input.bio);
        merge_optional(&mut member.photo, input.photo);
        merge_optional(&mut member.linkedin_url, input.linkedin_url);
        if let Some(order) = input.display_order {
            member.display_order = order;
        }
        if let Some(active) = input.active {
            member.active = active;
        }

        let updated = self
            .repo
            .update(&member)
            .await
            .context("Failed to update team member")?;
        self.relay.emit(Resource::Team, Action::Updated, id);
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentError> {
        self.get(id).await?;
        self.repo
            .delete(id)
            .await
            .context("Failed to delete team member")?;
        tracing::info!(id, "Team member deleted");
        self.relay.emit(Resource::Team, Action::Deleted, id);
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<TeamMember, ContentError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get team member")?
            .ok_or_else(|| ContentError::NotFound("Team member".to_string()))
    }

    pub async fn list_active(&self) -> Result<Vec<TeamMember>, ContentError> {
        Ok(self
            .repo
            .list(true)
            .await
            .context("Failed to list team members")?)
    }

    pub async fn list_all(&self) -> Result<Vec<TeamMember>, ContentError> {
        Ok(self
            .repo
            .list(false)
            .await
            .context("Failed to list team members")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxTeamMemberRepository;
    use crate::db::{create_test_pool, migrations::run_migrations};

    async fn setup() -> (TeamService, EventRelay) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let relay = EventRelay::new();
        (
            TeamService::new(SqlxTeamMemberRepository::boxed(pool), relay.clone()),
            relay,
        )
    }

    #[tokio::test]
    async fn test_create_trims_and_publishes() {
        let (service, relay) = setup().await;
        let mut events = relay.subscribe();

        let mut input = CreateTeamMemberInput::new("  Ada Lovelace ", "Engineer");
        input.bio = Some("   ".to_string());
        input.linkedin_url = Some("https://linkedin.com/in/ada".to_string());
        let member = service.create(input).await.unwrap();

        assert_eq!(member.name, "Ada Lovelace");
        assert!(member.bio.is_none());
        assert!(member.active);
        let event = events.recv().await.unwrap();
        assert_eq!(event.event, "team:created");
        assert_eq!(event.id, member.id);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (service, _) = setup().await;
        let mut input = CreateTeamMemberInput::new("", "");
        input.photo = Some("file:///etc/passwd".to_string());

        match service.create(input).await {
            Err(ContentError::Validation(messages)) => {
                assert!(messages.contains(&"name is required".to_string()));
                assert!(messages.contains(&"position is required".to_string()));
                assert_eq!(messages.len(), 3);
            }
            other => panic!("expected validation error, got {:?}", other.map(|m| m.id)),
        }
    }

    #[tokio::test]
    async fn test_update_and_active_listing() {
        let (service, _) = setup().await;
        let member = service.create(CreateTeamMemberInput::new("Grace", "Admiral")).await.unwrap();

        let updated = service
            .update(
                member.id,
                UpdateTeamMemberInput {
                    active: Some(false),
                    display_order: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.position, "Admiral");
        assert_eq!(updated.display_order, 5);

        assert!(service.list_active().await.unwrap().is_empty());
        assert_eq!(service.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_member() {
        let (service, _) = setup().await;
        assert!(matches!(service.get(42).await, Err(ContentError::NotFound(_))));
        assert!(matches!(
            service.update(42, UpdateTeamMemberInput::default()).await,
            Err(ContentError::NotFound(_))
        ));
        assert!(matches!(service.delete(42).await, Err(ContentError::NotFound(_))));
    }
}
