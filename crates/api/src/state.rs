use std::sync::Arc;

use crate::{
    repos::Repos,
    services::{AccountService, ArticleService, CodeService, TokenService},
    stores::Stores,
};

#[derive(Clone)]
pub struct AppState {
    /// Database repositories.
    pub repos: Repos,
    /// Ephemeral stores (Redis).
    pub stores: Stores,
    /// Article use cases.
    pub articles: Arc<ArticleService>,
    /// Email/password accounts.
    pub accounts: Arc<AccountService>,
    /// SMS verification codes.
    pub codes: Arc<CodeService>,
    /// Session tokens.
    pub tokens: Arc<dyn TokenService>,
}
