pub mod password;
pub mod token;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};

use crate::{auth::token::TokenService, error::ApiError, models::User, repository::RepositoryState};

pub use token::{Claims, TokenConfig};

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Handlers take this as
/// an argument to require a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

/// AuthUser Extractor Implementation
///
/// 1. Reads `Authorization: Bearer <token>` (scheme matched case-insensitively).
/// 2. Validates signature and expiry through the `TokenService`.
/// 3. Loads the subject from the User Directory, so a token for an account
///    that no longer exists is refused.
///
/// Rejection: `ApiError::Unauthorized` (401) on any failure. The token itself
/// is never logged.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let tokens = TokenService::from_ref(state);

        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let user_id = tokens
            .validate(token)
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        let user = repo
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| {
                tracing::debug!(%user_id, "token subject no longer exists");
                ApiError::Unauthorized("Invalid or expired token".to_string())
            })?;

        Ok(AuthUser { user })
    }
}

/// Extracts the credential from an `Authorization: Bearer` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("BEARER abc")), Some("abc"));
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_ignored() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
