//! Bearer-token identity. Tokens are issued by an external identity provider
//! sharing the HS256 secret; this service only verifies them.

use crate::{errors::AppError, state::AppState};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

#[derive(Clone)]
pub struct AuthKeys {
    decoding: DecodingKey,
    validation: Validation,
}

impl AuthKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    pub fn verify(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .ok()
            .map(|data| data.claims)
    }

    #[cfg(test)]
    pub fn issue(secret: &str, sub: Uuid, email: Option<&str>) -> String {
        use jsonwebtoken::{EncodingKey, Header, encode};

        let claims = Claims {
            sub,
            email: email.map(str::to_string),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }
}

/// The authenticated caller, passed explicitly into every service call.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub email: Option<String>,
}

/// `Ok(None)` when no Authorization header is present; a header that is
/// present but not a valid bearer token is always an error.
fn actor_from_parts(parts: &Parts, keys: &AuthKeys) -> Result<Option<Actor>, AppError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(AppError::unauthorized)?;
    let claims = keys.verify(token.trim()).ok_or_else(AppError::unauthorized)?;
    Ok(Some(Actor {
        id: claims.sub,
        email: claims.email,
    }))
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        actor_from_parts(parts, &state.auth)?.ok_or_else(AppError::unauthorized)
    }
}

impl OptionalFromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        actor_from_parts(parts, &state.auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SECRET;

    #[test]
    fn verifies_own_tokens_only() {
        let keys = AuthKeys::from_secret(SECRET);
        let id = Uuid::new_v4();

        let claims = keys.verify(&AuthKeys::issue(SECRET, id, Some("a@b.c"))).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email.as_deref(), Some("a@b.c"));

        assert!(keys.verify(&AuthKeys::issue("other-secret", id, None)).is_none());
        assert!(keys.verify("not-a-token").is_none());
    }

    #[test]
    fn header_parsing() {
        let keys = AuthKeys::from_secret(SECRET);
        let id = Uuid::new_v4();
        let parts_with = |value: Option<String>| {
            let mut builder = axum::http::Request::builder();
            if let Some(value) = value {
                builder = builder.header(header::AUTHORIZATION, value);
            }
            builder.body(()).unwrap().into_parts().0
        };

        assert!(actor_from_parts(&parts_with(None), &keys).unwrap().is_none());

        let token = AuthKeys::issue(SECRET, id, None);
        let actor = actor_from_parts(&parts_with(Some(format!("Bearer {token}"))), &keys)
            .unwrap()
            .unwrap();
        assert_eq!(actor.id, id);

        for bad in [token.clone(), "Bearer nope".to_string()] {
            let err = actor_from_parts(&parts_with(Some(bad)), &keys).unwrap_err();
            assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
        }
    }
}
