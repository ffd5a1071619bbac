use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use std::collections::HashSet;

use crate::config::Permission;
use crate::web::api::error::ApiError;
use crate::web::AppState;

/// The API key a request was made with.
pub struct ApiCaller {
    pub name: String,
    permissions: HashSet<Permission>,
}

impl ApiCaller {
    /// Fails with 403 naming the permission the key lacks.
    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if self.permissions.contains(&permission) {
            return Ok(());
        }
        log::warn!("API key {} lacks the {} permission", self.name, permission);
        Err(ApiError::MissingPermission(permission))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(ApiError::Unauthorized("missing_api_key"))?;

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthorized("malformed_authorization"))
}

impl FromRequestParts<AppState> for ApiCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let key = state
            .config
            .find_api_key(token)
            .ok_or(ApiError::Unauthorized("unknown_api_key"))?;

        Ok(ApiCaller {
            name: key.name.clone(),
            permissions: key.permissions.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/reporter/status");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).expect("request").into_parts().0
    }

    fn reason(result: Result<&str, ApiError>) -> &'static str {
        match result {
            Err(ApiError::Unauthorized(reason)) => reason,
            _ => panic!("expected an unauthorized rejection"),
        }
    }

    #[test]
    fn extracts_bearer_token() {
        let parts = parts(Some("Bearer  phone-key "));
        assert_eq!(bearer_token(&parts).ok(), Some("phone-key"));
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        assert_eq!(reason(bearer_token(&parts(None))), "missing_api_key");
        assert_eq!(
            reason(bearer_token(&parts(Some("Basic dXNlcjpwYXNz")))),
            "malformed_authorization"
        );
        assert_eq!(
            reason(bearer_token(&parts(Some("Bearer ")))),
            "malformed_authorization"
        );
    }

    #[test]
    fn require_names_missing_permission() {
        let caller = ApiCaller {
            name: "dashboard".to_string(),
            permissions: HashSet::from([Permission::ViewStatus]),
        };
        assert!(caller.require(Permission::ViewStatus).is_ok());
        assert!(matches!(
            caller.require(Permission::PushLocation),
            Err(ApiError::MissingPermission(Permission::PushLocation))
        ));
    }
}
