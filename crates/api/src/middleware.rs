use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use folio_core::UserId;

use crate::context::UserContext;

/// Header carrying the authenticated user id, set by the identity layer in
/// front of this service.
pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn identity_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let user_id = extract_user_id(req.headers())?;
    req.extensions_mut().insert(UserContext::new(user_id));
    Ok(next.run(req).await)
}

fn extract_user_id(headers: &HeaderMap) -> Result<UserId, StatusCode> {
    let header = headers
        .get(USER_ID_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    header.trim().parse().map_err(|_| StatusCode::UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn user_id_header_must_be_a_uuid() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_user_id(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("alice"));
        assert_eq!(extract_user_id(&headers), Err(StatusCode::UNAUTHORIZED));

        let id = UserId::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(extract_user_id(&headers), Ok(id));
    }
}
