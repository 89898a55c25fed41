//! Data models
//!
//! Database entities and the input types the services accept.

mod blog_post;
mod executive;
mod refresh_token;
mod team_member;
mod testimonial;
mod user;

pub use blog_post::{BlogPost, CreateBlogPostInput, ListParams, PagedResult, UpdateBlogPostInput};
pub use executive::{CreateExecutiveInput, Executive, UpdateExecutiveInput};
pub use refresh_token::RefreshToken;
pub use team_member::{CreateTeamMemberInput, TeamMember, UpdateTeamMemberInput};
pub use testimonial::{CreateTestimonialInput, Testimonial, UpdateTestimonialInput};
pub use user::{OtpPurpose, User, UserRole};
