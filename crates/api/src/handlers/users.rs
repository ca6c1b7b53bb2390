//! User accounts: passwordless SMS login, email and password accounts, profile.
//!
//! SMS flow:
//! 1. User requests a code via POST /users/login_sms/code/send with their phone number
//! 2. A 6-digit code is stored under `verify_code:login:{phone}` and texted to them
//! 3. User submits phone number + code to POST /users/login_sms
//! 4. The code is consumed; the user is found or created and gets a session token
//!
//! Security notes:
//! - One code per phone number per minute (cooldown enforced by the code store)
//! - Three wrong guesses burn the code
//! - A correct code works exactly once
//! - SMS volume is capped globally by the "sms:gateway" limiter
//!
//! Password accounts sign up at POST /users/signup and log in at
//! POST /users/login. Both login paths return the same session token.

use axum::{
    Json, Router, debug_handler,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use garde::Validate;
use shared::api::{
    EditProfilePayload, LoginResponse, LoginSmsPayload, PasswordLoginPayload, ProfileResponse,
    SendLoginCodePayload, SignupPayload,
};

use crate::{
    error::AppError, middleware::auth::AuthUser, models::User, services::LOGIN_BIZ,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login_sms/code/send", post(send_login_code))
        .route("/login_sms", post(login_sms))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/edit", post(edit_profile))
        .route("/profile", get(get_profile))
}

fn profile(user: User) -> ProfileResponse {
    ProfileResponse {
        user_id: user.id,
        phone_number: user.phone_number,
        email: user.email,
        nickname: user.nickname,
    }
}

#[debug_handler]
async fn send_login_code(
    State(state): State<AppState>,
    Json(payload): Json<SendLoginCodePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state
        .codes
        .send(LOGIN_BIZ, &payload.phone_number)
        .await
        .map_err(AppError::code)?;

    Ok(StatusCode::OK)
}

#[debug_handler]
async fn login_sms(
    State(state): State<AppState>,
    Json(payload): Json<LoginSmsPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state
        .codes
        .verify(LOGIN_BIZ, &payload.phone_number, &payload.code)
        .await
        .map_err(AppError::code)?;

    let user = state
        .repos
        .users
        .find_or_create_by_phone(&payload.phone_number)
        .await?;
    let token = state.tokens.issue(user.id)?;

    tracing::info!(user_id = user.id, "user logged in by sms");
    Ok(Json(LoginResponse {
        user_id: user.id,
        token,
    }))
}

async fn get_profile(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .repos
        .users
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "User not found"))?;

    Ok(Json(profile(user)))
}

#[debug_handler]
async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = state
        .accounts
        .signup(
            &payload.email,
            &payload.nickname,
            &payload.password,
            &payload.confirm_password,
        )
        .await
        .map_err(AppError::account)?;

    tracing::info!(user_id = user.id, "user signed up");
    Ok((StatusCode::CREATED, Json(profile(user))))
}

#[debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<PasswordLoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = state
        .accounts
        .login(&payload.email, &payload.password)
        .await
        .map_err(AppError::account)?;
    let token = state.tokens.issue(user.id)?;

    tracing::info!(user_id = user.id, "user logged in by password");
    Ok(Json(LoginResponse {
        user_id: user.id,
        token,
    }))
}

async fn edit_profile(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<EditProfilePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = state
        .accounts
        .edit_profile(user.id, &payload.nickname)
        .await
        .map_err(AppError::account)?;

    Ok(Json(profile(user)))
}
