//! Bare HTML for the browser flow: the two forms and the protected home page.

use axum::{extract::Query, response::Html};
use serde::Deserialize;

use crate::auth::guard::CurrentUser;

#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    pub error: Option<String>,
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn error_banner(code: Option<&str>) -> String {
    let msg = match code {
        None => return String::new(),
        Some("invalid_input") => "Please check the form and try again.",
        Some("email_taken") => "That email is already registered.",
        Some("invalid_credentials") => "Invalid credentials.",
        Some("session_expired") => "Your session has expired.",
        Some(_) => "Something went wrong. Please try again.",
    };
    format!(r#"<p class="error">{msg}</p>"#)
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head><body>{body}</body></html>"
    ))
}

pub async fn signup_page(Query(q): Query<FormQuery>) -> Html<String> {
    layout(
        "Sign up",
        &format!(
            r#"<h1>Sign up</h1>{}
<form method="post" action="/auth/signup">
  <input name="fullname" placeholder="Full name" required>
  <input name="email" type="email" placeholder="Email" required>
  <input name="password" type="password" placeholder="Password" required>
  <button type="submit">Create account</button>
</form>
<a href="/auth/login">Log in</a>"#,
            error_banner(q.error.as_deref())
        ),
    )
}

pub async fn login_page(Query(q): Query<FormQuery>) -> Html<String> {
    layout(
        "Log in",
        &format!(
            r#"<h1>Log in</h1>{}
<form method="post" action="/auth/login">
  <input name="email" type="email" placeholder="Email" required>
  <input name="password" type="password" placeholder="Password" required>
  <button type="submit">Log in</button>
</form>
<a href="/auth/signup">Sign up</a>"#,
            error_banner(q.error.as_deref())
        ),
    )
}

pub async fn home(CurrentUser(session): CurrentUser) -> Html<String> {
    layout(
        "Home",
        &format!(
            r#"<h1>Welcome</h1><p>Signed in as {}</p><a href="/auth/logout">Log out</a>"#,
            escape(&session.email)
        ),
    )
}
