//! Shared API request/response types used by the API server and its clients.

use garde::Validate;
use serde::{Deserialize, Serialize};

/// Longest title the author store accepts.
pub const MAX_TITLE_LEN: usize = 1024;
/// Largest page a listing request may ask for. Matches the size of the cached hot list.
pub const MAX_PAGE_SIZE: i64 = 100;
/// Deepest offset a listing request may start at.
pub const MAX_LIST_OFFSET: i64 = 100_000;
/// Longest nickname a profile may carry.
pub const MAX_NICKNAME_LEN: usize = 64;
/// Shortest password accepted at signup.
pub const MIN_PASSWORD_LEN: usize = 8;
/// Symbols a password may contain; at least one is required.
pub const PASSWORD_SYMBOLS: &str = "$@!%*#?&";

/// Save an article draft. `id == 0` creates a new article.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct EditArticlePayload {
    #[garde(range(min = 0))]
    #[serde(default)]
    pub id: i64,
    #[garde(length(max = MAX_TITLE_LEN))]
    #[serde(default)]
    pub title: String,
    #[garde(skip)]
    #[serde(default)]
    pub content: String,
}

/// Publish an article. `id == 0` creates and publishes in one step.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PublishArticlePayload {
    #[garde(range(min = 0))]
    #[serde(default)]
    pub id: i64,
    #[garde(length(max = MAX_TITLE_LEN))]
    #[serde(default)]
    pub title: String,
    #[garde(skip)]
    #[serde(default)]
    pub content: String,
}

/// Returned after an article is saved or published.
#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleSavedResponse {
    pub id: i64,
}

/// Hide a published article from readers.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct WithdrawArticlePayload {
    #[garde(range(min = 1))]
    pub id: i64,
}

/// Page through published articles, optionally for a single author.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ListArticlesQuery {
    #[garde(range(min = 1))]
    #[serde(default)]
    pub author_id: Option<i64>,
    #[garde(range(min = 0, max = MAX_LIST_OFFSET))]
    #[serde(default)]
    pub offset: i64,
    #[garde(range(min = 1, max = MAX_PAGE_SIZE))]
    #[serde(default = "default_page_size")]
    pub limit: i64,
}

fn default_page_size() -> i64 {
    20
}

/// Like (`like: true`) or unlike a published article.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LikeArticlePayload {
    #[garde(range(min = 1))]
    pub id: i64,
    #[garde(skip)]
    pub like: bool,
}

/// Outcome of a like request. `changed` is false when the article was
/// already in the requested state.
#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub id: i64,
    pub liked: bool,
    pub changed: bool,
}

/// Article entry in a listing. Content is reduced to an abstract.
#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub status: u8,
    pub author_id: i64,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Full article returned by the detail endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub status: u8,
    pub author_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A published article as readers see it, with its counters.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublishedArticleResponse {
    #[serde(flatten)]
    pub article: ArticleDetail,
    pub read_cnt: i64,
    pub like_cnt: i64,
}

/// Request a login code by SMS.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SendLoginCodePayload {
    #[garde(pattern(r"^\+?[0-9]{6,15}$"))]
    pub phone_number: String,
}

/// Log in with the code received by SMS.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginSmsPayload {
    #[garde(pattern(r"^\+?[0-9]{6,15}$"))]
    pub phone_number: String,
    #[garde(length(min = 6, max = 6), pattern(r"^[0-9]+$"))]
    pub code: String,
}

/// Returned after a successful login. The token goes in `Authorization: Bearer`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub token: String,
}

/// Create an email and password account.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SignupPayload {
    #[garde(email)]
    pub email: String,
    #[garde(length(max = MAX_NICKNAME_LEN))]
    #[serde(default)]
    pub nickname: String,
    #[garde(custom(strong_password))]
    pub password: String,
    #[garde(skip)]
    pub confirm_password: String,
}

/// At least eight characters drawn from letters, digits and
/// [`PASSWORD_SYMBOLS`], with at least one of each.
fn strong_password(value: &str, _: &()) -> garde::Result {
    let is_symbol = |c: char| PASSWORD_SYMBOLS.contains(c);

    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(garde::Error::new("password is too short"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || is_symbol(c))
    {
        return Err(garde::Error::new("password contains unsupported characters"));
    }
    let has_letter = value.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    let has_symbol = value.chars().any(is_symbol);
    if !(has_letter && has_digit && has_symbol) {
        return Err(garde::Error::new(
            "password needs a letter, a digit and a symbol",
        ));
    }
    Ok(())
}

/// Log in with email and password.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PasswordLoginPayload {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 1))]
    pub password: String,
}

/// Change profile fields of the current user.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct EditProfilePayload {
    #[garde(length(min = 1, max = MAX_NICKNAME_LEN))]
    pub nickname: String,
}

/// Current user info.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: i64,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub nickname: String,
}
