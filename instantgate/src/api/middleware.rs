//! Request middleware.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::error::ApiError;
use super::AppState;
use crate::security::extract_bearer_token;

/// Bearer-token authentication.
///
/// With `security.require_auth` on, a missing or invalid token terminates
/// the request with 401. Otherwise tokens are validated opportunistically:
/// valid claims are attached to the request, anything else passes through
/// anonymously. Validated claims are stored in request extensions for
/// downstream handlers.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers()).map(str::to_string);

    match token {
        None => {
            if state.require_auth {
                return Err(ApiError::Unauthorized("missing bearer token".to_string()));
            }
        }
        Some(token) => match state.jwt.validate_token(&token) {
            Ok(claims) => {
                request.extensions_mut().insert(claims);
            }
            Err(err) => {
                if state.require_auth {
                    return Err(ApiError::from(err));
                }
                tracing::debug!(error = %err, "ignoring invalid token on optional-auth route");
            }
        },
    }

    Ok(next.run(request).await)
}
