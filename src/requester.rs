use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};

use crate::{error::AppError, models::SellerRef};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// The user a request acts for, taken from the `X-User-Id` header.
///
/// This identifies, it does not authenticate: whoever sets the header is
/// trusted. Handlers that mutate per-user data take it as an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub user_id: String,
    pub display_name: Option<String>,
}

impl Requester {
    pub fn as_seller(&self) -> SellerRef {
        SellerRef {
            id: self.user_id.clone(),
            name: self.display_name.clone(),
        }
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(user_id) = header_value(parts, USER_ID_HEADER) else {
            tracing::warn!("Request without {} header", USER_ID_HEADER);
            return Err(AppError::Unauthorized(
                "Missing X-User-Id header".to_string(),
            ));
        };
        Ok(Requester {
            user_id,
            display_name: header_value(parts, USER_NAME_HEADER),
        })
    }
}
