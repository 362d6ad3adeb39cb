//! Authentication route handlers.
//!
//! Login and registration post to the backend; the returned bearer token is
//! stored in the session and the cart mirror is refreshed for the new user.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::filters;
use crate::middleware::{OptionalAuth, PageContext};
use crate::models::AuthSession;
use crate::routes::cart::safe_return_path;
use crate::routes::redirect_with_flash;
use crate::services::auth::{self, AuthError, AuthService};
use crate::services::cart::{self as carts, CartContext};
use crate::services::flash::Flash;
use crate::state::AppState;

/// Where to land after logging in when no `next` was given.
const AFTER_LOGIN: &str = "/dashboard";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// `?next=` on the login page.
#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
    pub username: String,
    pub email: String,
}

/// Store the new session and refresh the cart mirror for it.
async fn start_session(state: &AppState, session: &Session, auth: AuthSession) -> Option<AuthSession> {
    let auth = auth::login(session, auth.token, Some(auth.user)).await?;
    CartContext::new(state.backend(), session, Some(&auth))
        .fetch_cart()
        .await;
    Some(auth)
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
#[instrument(skip(ctx))]
pub async fn login_page(
    OptionalAuth(current): OptionalAuth,
    ctx: PageContext,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = safe_return_path(query.next.as_deref(), AFTER_LOGIN);
    if current.is_some() {
        return Redirect::to(&next).into_response();
    }
    LoginTemplate {
        ctx,
        email: String::new(),
        next,
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, ctx, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_return_path(form.next.as_deref(), AFTER_LOGIN);

    let failure = match AuthService::new(state.backend())
        .login(&form.email, &form.password)
        .await
    {
        Ok(auth) => match start_session(&state, &session, auth).await {
            Some(auth) => {
                tracing::info!(user_id = %auth.user.id, "User logged in");
                let welcome = format!("Welcome back, {}!", auth.user.display_name());
                return redirect_with_flash(&session, Flash::success(welcome), &next)
                    .await
                    .into_response();
            }
            None => AuthError::InvalidToken("session could not be stored".to_string()),
        },
        Err(e) => e,
    };

    tracing::warn!(error = %failure, "Login failed");
    ctx.flash_now(Flash::error(failure.user_message()));
    LoginTemplate {
        ctx,
        email: form.email,
        next,
    }
    .into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
#[instrument(skip(ctx))]
pub async fn register_page(OptionalAuth(current): OptionalAuth, ctx: PageContext) -> Response {
    if current.is_some() {
        return Redirect::to(AFTER_LOGIN).into_response();
    }
    RegisterTemplate {
        ctx,
        username: String::new(),
        email: String::new(),
    }
    .into_response()
}

/// Handle registration form submission.
#[instrument(skip(state, session, ctx, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
    Form(form): Form<RegisterForm>,
) -> Response {
    let failure = match AuthService::new(state.backend())
        .register(
            &form.username,
            &form.email,
            &form.password,
            &form.password_confirm,
        )
        .await
    {
        Ok(auth) => match start_session(&state, &session, auth).await {
            Some(auth) => {
                tracing::info!(user_id = %auth.user.id, "User registered");
                return redirect_with_flash(
                    &session,
                    Flash::success("Your account has been created"),
                    AFTER_LOGIN,
                )
                .await
                .into_response();
            }
            None => AuthError::InvalidToken("session could not be stored".to_string()),
        },
        Err(e) => e,
    };

    tracing::warn!(error = %failure, "Registration failed");
    ctx.flash_now(Flash::error(failure.user_message()));
    RegisterTemplate {
        ctx,
        username: form.username,
        email: form.email,
    }
    .into_response()
}

// =============================================================================
// Logout
// =============================================================================

/// Log out: drop the auth session and the cart mirror.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> impl IntoResponse {
    if let Err(e) = auth::logout(&session).await {
        tracing::error!(error = %e, "Failed to clear auth session");
    }
    carts::reset_mirror(&session).await;
    redirect_with_flash(&session, Flash::success("You have been logged out"), "/").await
}
