//! Request body extractors.

use axum::{
    Form, Json,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Body accepted either as JSON or as an urlencoded form.
///
/// Browser forms and `fetch` calls hit the same panel endpoints, so the
/// `Content-Type` header decides how the body is read.
#[derive(Debug, Clone)]
pub struct JsonOrForm<T>(pub T);

impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(value))
        }
    }
}

/// Trimmed value, `None` when missing or blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Login {
        email: String,
    }

    async fn extract(content_type: &str, body: &'static str) -> Result<Login, AppError> {
        let req = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        JsonOrForm::<Login>::from_request(req, &()).await.map(|j| j.0)
    }

    #[tokio::test]
    async fn test_json_and_form_bodies() {
        let json = extract("application/json", r#"{"email":"a@b.com"}"#).await.unwrap();
        assert_eq!(json.email, "a@b.com");

        let form = extract("application/x-www-form-urlencoded", "email=c%40d.com")
            .await
            .unwrap();
        assert_eq!(form.email, "c@d.com");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let err = extract("application/json", "{not json").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  x ")), Some("x"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
