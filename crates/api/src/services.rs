//! Use cases and external service abstractions.
//!
//! ## Services
//!
//! - **accounts** - Email/password signup, login and profile edits
//! - **articles** - Author-facing edit/publish/withdraw/detail, reader reads and likes
//! - **article_sync** - Keeps the reader store and read caches in step with the author store
//! - **cache_primer** - Bounded background queue for best-effort cache writes
//! - **interactive** - Read and like counters
//! - **codes** - One-time SMS codes (issue and verify)
//! - **sms** - SMS senders: HTTP gateway, failover ring, rate-limited wrapper
//! - **auth** - Signed session tokens
//!
//! ## Usage in Handlers
//!
//! Services are accessed via `AppState`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let id = state.articles.publish(draft).await?;
//!     state.codes.send(LOGIN_BIZ, &phone_number).await?;
//!     let token = state.tokens.issue(user.id)?;
//! }
//! ```

mod accounts;
mod article_sync;
mod articles;
mod auth;
mod cache_primer;
mod codes;
mod interactive;
pub mod sms;

pub use accounts::{AccountError, AccountService};
pub use article_sync::{ArticleError, ArticleSynchronizer};
pub use articles::{ArticleDraft, ArticleService};
pub use auth::{HmacTokenService, TokenService};
pub use cache_primer::CachePrimer;
pub use codes::{CodeError, CodeService, LOGIN_BIZ};
pub use interactive::InteractiveService;
pub use sms::{
    FailoverSender, HttpSmsSender, LogSmsSender, MessageArg, RateLimitedSender, SmsError,
    SmsSender,
};

#[cfg(test)]
pub use auth::MockTokenService;
#[cfg(test)]
pub use sms::MockSmsSender;
