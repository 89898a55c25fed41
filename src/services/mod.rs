//! Services layer - Business logic
//!
//! Services implement the business rules on top of the repositories:
//! - Account lifecycle, tokens and OTP delivery (`auth`)
//! - Validated CRUD for the site content (`blog`, `team`, `executive`, `testimonial`)
//! - Relay events after every content mutation

pub mod auth;
pub mod blog;
pub mod content;
pub mod email;
pub mod executive;
pub mod markdown;
pub mod otp;
pub mod password;
pub mod rate_limiter;
pub mod slug;
pub mod team;
pub mod testimonial;
pub mod token;

pub use auth::{AuthService, AuthServiceError, AuthTokens};
pub use blog::BlogService;
pub use content::ContentError;
pub use email::{mailer_from_config, EmailService, Mailer};
pub use executive::ExecutiveService;
pub use markdown::MarkdownRenderer;
pub use password::{hash_password, verify_password};
pub use rate_limiter::AuthRateLimiter;
pub use slug::generate_slug;
pub use team::TeamService;
pub use testimonial::TestimonialService;
pub use token::{Claims, TokenService};
