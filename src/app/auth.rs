use axum::Form;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

use super::AppState;

pub const TOKEN_COOKIE: &str = "token";
const ONE_YEAR_SECS: u64 = 365 * 24 * 60 * 60;
const CLEAR_TOKEN_COOKIE: &str = "token=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax";

const LOGIN_FORM: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>cellar</title></head>
  <body>
    <form method="post" action="/login">
      <label>Secret <input type="password" name="token" autofocus></label>
      <button type="submit">Sign in</button>
    </form>
  </body>
</html>
"#;

/// Everything but `/login` and `/healthz` needs a `token` cookie equal to the
/// server secret; anything else is sent to the login form with the cookie cleared.
pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if path.starts_with("/login") || path == "/healthz" {
        return next.run(request).await;
    }

    if cookie_value(request.headers(), TOKEN_COOKIE).as_deref() == Some(state.secret.as_ref()) {
        return next.run(request).await;
    }

    tracing::debug!(path, "unauthenticated request; redirecting to login");
    (
        [(header::SET_COOKIE, HeaderValue::from_static(CLEAR_TOKEN_COOKIE))],
        Redirect::temporary("/login"),
    )
        .into_response()
}

pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_owned())
}

pub async fn login_form() -> Html<&'static str> {
    Html(LOGIN_FORM)
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    token: String,
}

pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let token = form.token.trim();
    if token != state.secret.as_ref() {
        tracing::warn!("rejected login attempt");
        return (StatusCode::UNAUTHORIZED, Html(LOGIN_FORM)).into_response();
    }

    let cookie = format!("{TOKEN_COOKIE}={token}; Path=/; Max-Age={ONE_YEAR_SECS}; HttpOnly; SameSite=Lax");
    match HeaderValue::from_str(&cookie) {
        Ok(cookie) => ([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response(),
        Err(err) => {
            tracing::error!(?err, "secret cannot be stored in a cookie");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
