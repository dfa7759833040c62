//! Session cookie extractor
//!
//! Resolves the caller's session from the `Cookie` header, minting a new id
//! when needed. Handlers return the [`SessionCookie`] alongside their body so
//! a freshly issued id reaches the browser even when the call itself fails.

use axum::{
    extract::FromRequestParts,
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderValue,
    },
    response::{IntoResponseParts, ResponseParts},
};
use std::convert::Infallible;

use super::{ApiError, AppState};
use crate::cookies::{parse_cookies, session_cookie};

/// The resolved session of a request
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    set_cookie: Option<String>,
}

impl SessionContext {
    /// Resolve from a raw `Cookie` header value
    pub fn resolve(state: &AppState, cookie_header: Option<&str>) -> Result<Self, ApiError> {
        let name = &*state.cookie_name;
        let existing = cookie_header
            .map(parse_cookies)
            .and_then(|mut cookies| cookies.remove(name));
        let identity = state.store.get_or_create_session_id(existing.as_deref())?;
        let set_cookie = identity.issued.then(|| {
            session_cookie(
                name,
                &identity.session_id,
                state.store.cookie_max_age_secs(),
            )
        });
        Ok(Self {
            session_id: identity.session_id,
            set_cookie,
        })
    }

    /// Response part carrying `Set-Cookie` when the id was just issued
    pub fn cookie(&self) -> SessionCookie {
        SessionCookie(self.set_cookie.clone())
    }
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for SessionContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        let header = (!header.is_empty()).then_some(header);
        Self::resolve(state, header.as_deref())
    }
}

/// Optional `Set-Cookie` response part
#[derive(Debug, Clone, Default)]
pub struct SessionCookie(pub Option<String>);

impl IntoResponseParts for SessionCookie {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Some(value) = self.0.and_then(|c| HeaderValue::from_str(&c).ok()) {
            res.headers_mut().append(SET_COOKIE, value);
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support;

    #[test]
    fn test_new_visitor_gets_cookie() {
        let state = test_support::state();
        let ctx = SessionContext::resolve(&state, None).unwrap();
        let cookie = ctx.cookie().0.unwrap();
        assert!(cookie.starts_with(&format!("sid={}", ctx.session_id)));
        assert!(cookie.contains("Max-Age=86400"));
    }

    #[test]
    fn test_returning_visitor_keeps_id() {
        let state = test_support::state();
        let first = SessionContext::resolve(&state, None).unwrap();
        let header = format!("theme=dark; sid={}", first.session_id);
        let again = SessionContext::resolve(&state, Some(&header)).unwrap();
        assert_eq!(again.session_id, first.session_id);
        assert!(again.cookie().0.is_none());
    }
}
