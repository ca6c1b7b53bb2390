//! Article endpoints.
//!
//! Authors edit drafts, publish and withdraw; anyone can read what is
//! published, and signed-in users can like it.
//!
//! ## Endpoints
//!
//! - POST /articles/edit - Save a draft (author store only)
//! - POST /articles/publish - Publish to readers (retried up to three times)
//! - POST /articles/withdraw - Make a published article private
//! - GET /articles/detail/{id} - An article of the current author, any status
//! - GET /articles/pub/list - Published articles, newest first
//! - GET /articles/pub/{id} - A published article with its counters (counts a read)
//! - POST /articles/pub/like - Like or unlike a published article

use axum::{
    Json, Router, debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use garde::Validate;
use shared::api::{
    ArticleSavedResponse, ArticleSummary, EditArticlePayload, LikeArticlePayload, LikeResponse,
    ListArticlesQuery, PublishArticlePayload, PublishedArticleResponse, WithdrawArticlePayload,
};

use crate::{
    error::AppError, middleware::auth::AuthUser, services::ArticleDraft, state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/edit", post(edit_article))
        .route("/publish", post(publish_article))
        .route("/withdraw", post(withdraw_article))
        .route("/detail/{id}", get(get_article))
        .route("/pub/list", get(list_published))
        .route("/pub/like", post(like_article))
        .route("/pub/{id}", get(get_published))
}

/// Payload id 0 means "new article".
fn draft(id: i64, title: String, content: String, author_id: i64) -> ArticleDraft {
    ArticleDraft {
        id: (id > 0).then_some(id),
        title,
        content,
        author_id,
    }
}

#[debug_handler]
async fn edit_article(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<EditArticlePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let id = state
        .articles
        .edit(draft(payload.id, payload.title, payload.content, user.id))
        .await
        .map_err(AppError::article)?;

    Ok(Json(ArticleSavedResponse { id }))
}

#[debug_handler]
async fn publish_article(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PublishArticlePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let id = state
        .articles
        .publish(draft(payload.id, payload.title, payload.content, user.id))
        .await
        .map_err(AppError::article)?;

    tracing::info!(article_id = id, author_id = user.id, "article published");
    Ok(Json(ArticleSavedResponse { id }))
}

async fn withdraw_article(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<WithdrawArticlePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state
        .articles
        .withdraw(payload.id, user.id)
        .await
        .map_err(AppError::article)?;

    tracing::info!(article_id = payload.id, author_id = user.id, "article withdrawn");
    Ok(StatusCode::OK)
}

async fn get_article(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let article = state
        .articles
        .detail(id, user.id)
        .await
        .map_err(AppError::article)?;

    Ok(Json(article.to_detail()))
}

async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<ListArticlesQuery>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let articles = state
        .articles
        .list_published(query.author_id, query.offset, query.limit)
        .await
        .map_err(AppError::article)?;

    let summaries: Vec<ArticleSummary> = articles.iter().map(|a| a.to_summary()).collect();
    Ok(Json(summaries))
}

async fn get_published(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let (article, stats) = state
        .articles
        .published_detail(id)
        .await
        .map_err(AppError::article)?;

    Ok(Json(PublishedArticleResponse {
        article: article.to_detail(),
        read_cnt: stats.read_cnt,
        like_cnt: stats.like_cnt,
    }))
}

#[debug_handler]
async fn like_article(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<LikeArticlePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let changed = state
        .articles
        .like(user.id, payload.id, payload.like)
        .await
        .map_err(AppError::article)?;

    Ok(Json(LikeResponse {
        id: payload.id,
        liked: payload.like,
        changed,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use shared::api::ArticleDetail;
    use tower::ServiceExt;

    use super::*;
    use crate::models::ArticleStatus;
    use crate::test_utils::{MemoryArticleStore, MemoryCache, TestStateBuilder};

    async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn publish_payload(id: i64, title: &str) -> Json<PublishArticlePayload> {
        Json(PublishArticlePayload {
            id,
            title: title.into(),
            content: "body".into(),
        })
    }

    #[tokio::test]
    async fn edit_returns_new_id() {
        let state = TestStateBuilder::new().build();

        let response = edit_article(
            AuthUser { id: 42 },
            State(state.clone()),
            Json(EditArticlePayload {
                id: 0,
                title: String::new(),
                content: "draft".into(),
            }),
        )
        .await
        .unwrap()
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let saved: ArticleSavedResponse = json_body(response).await;
        let article = state.articles.detail(saved.id, 42).await.unwrap();
        assert_eq!(article.title, "Untitled");
        assert_eq!(article.status, ArticleStatus::Unpublished);
    }

    #[tokio::test]
    async fn edit_rejects_overlong_title() {
        let state = TestStateBuilder::new().build();

        let result = edit_article(
            AuthUser { id: 42 },
            State(state),
            Json(EditArticlePayload {
                id: 0,
                title: "x".repeat(1025),
                content: String::new(),
            }),
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn publish_then_public_read() {
        let state = TestStateBuilder::new().build();

        let response = publish_article(AuthUser { id: 42 }, State(state.clone()), publish_payload(0, "T"))
            .await
            .unwrap()
            .into_response();
        let saved: ArticleSavedResponse = json_body(response).await;

        let response = get_published(State(state), Path(saved.id))
            .await
            .unwrap()
            .into_response();
        let detail: PublishedArticleResponse = json_body(response).await;
        assert_eq!(detail.article.title, "T");
        assert_eq!(detail.article.status, 2);
        assert_eq!(detail.read_cnt, 1);
    }

    #[tokio::test]
    async fn publish_of_foreign_article_is_404() {
        let state = TestStateBuilder::new().build();
        let response = publish_article(AuthUser { id: 42 }, State(state.clone()), publish_payload(0, "T"))
            .await
            .unwrap()
            .into_response();
        let saved: ArticleSavedResponse = json_body(response).await;

        let result = publish_article(
            AuthUser { id: 7 },
            State(state),
            publish_payload(saved.id, "hijack"),
        )
        .await;

        assert!(matches!(
            result,
            Err(AppError::External(StatusCode::NOT_FOUND, _))
        ));
    }

    #[tokio::test]
    async fn withdraw_hides_from_public_but_not_author() {
        let state = TestStateBuilder::new().build();
        let id = state
            .articles
            .publish(draft(0, "T".into(), "body".into(), 42))
            .await
            .unwrap();

        withdraw_article(
            AuthUser { id: 42 },
            State(state.clone()),
            Json(WithdrawArticlePayload { id }),
        )
        .await
        .unwrap();

        assert!(matches!(
            get_published(State(state.clone()), Path(id)).await,
            Err(AppError::External(StatusCode::NOT_FOUND, _))
        ));
        let response = get_article(AuthUser { id: 42 }, State(state), Path(id))
            .await
            .unwrap()
            .into_response();
        let detail: ArticleDetail = json_body(response).await;
        assert_eq!(detail.status, 3);
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let state = TestStateBuilder::new().build();
        for title in ["first", "second"] {
            state
                .articles
                .publish(draft(0, title.into(), "body".into(), 42))
                .await
                .unwrap();
        }

        let response = list_published(
            State(state),
            Query(ListArticlesQuery {
                author_id: None,
                offset: 0,
                limit: 10,
            }),
        )
        .await
        .unwrap()
        .into_response();

        let summaries: Vec<serde_json::Value> = json_body(response).await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0]["title"], "second");
        assert_eq!(summaries[0]["abstract"], "body");
    }

    #[tokio::test]
    async fn list_rejects_oversized_page() {
        let state = TestStateBuilder::new().build();

        let result = list_published(
            State(state),
            Query(ListArticlesQuery {
                author_id: None,
                offset: 0,
                limit: 101,
            }),
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn list_fails_when_hot_list_cache_is_down() {
        let cache = Arc::new(MemoryCache::new());
        let store = Arc::new(MemoryArticleStore::new());
        let state = TestStateBuilder::new()
            .with_cache(cache.clone())
            .with_article_store(store.clone())
            .build();
        cache.set_unavailable(true);

        let result = list_published(
            State(state),
            Query(ListArticlesQuery {
                author_id: None,
                offset: 0,
                limit: 10,
            }),
        )
        .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn routes_require_auth_for_author_endpoints() {
        let app = router().with_state(TestStateBuilder::new().build());

        let response = app
            .oneshot(
                Request::post("/publish")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"id":0,"title":"T","content":"c"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn like_shows_up_in_public_read() {
        let state = TestStateBuilder::new().build();
        let id = state
            .articles
            .publish(draft(0, "T".into(), "body".into(), 42))
            .await
            .unwrap();

        for expected in [true, false] {
            let response = like_article(
                AuthUser { id: 7 },
                State(state.clone()),
                Json(LikeArticlePayload { id, like: true }),
            )
            .await
            .unwrap()
            .into_response();
            let like: LikeResponse = json_body(response).await;
            assert_eq!(like.changed, expected);
        }

        let response = get_published(State(state), Path(id))
            .await
            .unwrap()
            .into_response();
        let detail: PublishedArticleResponse = json_body(response).await;
        assert_eq!(detail.like_cnt, 1);
    }

    #[tokio::test]
    async fn like_of_missing_article_is_404() {
        let state = TestStateBuilder::new().build();

        let result = like_article(
            AuthUser { id: 7 },
            State(state),
            Json(LikeArticlePayload { id: 99, like: true }),
        )
        .await;

        assert!(matches!(
            result,
            Err(AppError::External(StatusCode::NOT_FOUND, _))
        ));
    }

    #[tokio::test]
    async fn like_route_requires_auth() {
        let app = router().with_state(TestStateBuilder::new().build());

        let response = app
            .oneshot(
                Request::post("/pub/like")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"id":1,"like":true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn public_list_route_rejects_huge_offset() {
        let app = router().with_state(TestStateBuilder::new().build());

        let response = app
            .oneshot(
                Request::get("/pub/list?offset=9223372036854775807&limit=20")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn public_list_route_parses_query() {
        let app = router().with_state(TestStateBuilder::new().build());

        let response = app
            .oneshot(
                Request::get("/pub/list?offset=0&limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
