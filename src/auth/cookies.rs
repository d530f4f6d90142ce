use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use cookie::{Cookie, SameSite};

/// Attributes shared by the cookie that sets a session and the one that clears
/// it. Browsers only drop a cookie when these match.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: &'static str,
    pub secure: bool,
    pub max_age: Duration,
}

impl SessionCookie {
    fn base(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .build()
    }

    pub fn set(&self, value: &str) -> anyhow::Result<HeaderValue> {
        let mut cookie = self.base(value.to_string());
        cookie.set_max_age(cookie::time::Duration::seconds(self.max_age.as_secs() as i64));
        Ok(HeaderValue::from_str(&cookie.to_string())?)
    }

    pub fn clear(&self) -> anyhow::Result<HeaderValue> {
        let mut cookie = self.base(String::new());
        cookie.make_removal();
        Ok(HeaderValue::from_str(&cookie.to_string())?)
    }

    /// Value of this cookie in the request, if present and non-empty.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|raw| raw.split(';'))
            .filter_map(|part| Cookie::parse(part.trim()).ok())
            .find(|c| c.name() == self.name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }
}
