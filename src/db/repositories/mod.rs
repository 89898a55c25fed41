//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations for a single entity.

pub mod blog_post;
pub mod executive;
pub mod refresh_token;
pub mod team_member;
pub mod testimonial;
pub mod user;

pub use blog_post::{BlogPostRepository, SqlxBlogPostRepository};
pub use executive::{ExecutiveRepository, SqlxExecutiveRepository};
pub use refresh_token::{RefreshTokenRepository, SqlxRefreshTokenRepository};
pub use team_member::{SqlxTeamMemberRepository, TeamMemberRepository};
pub use testimonial::{SqlxTestimonialRepository, TestimonialRepository};
pub use user::{SqlxUserRepository, UserRepository};
