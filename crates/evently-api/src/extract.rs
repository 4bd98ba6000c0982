//! Request extractors that reject with the API error body

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use evently_core::Paging;
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

/// JSON body that is deserialized and then checked with `validator`
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Parse a UUID path segment
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("invalid {what} id '{raw}'")))
}

/// Listing query parameters. Kept as text so malformed numbers produce
/// the API's own 400 body.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number
    pub page: Option<String>,
    /// Items per page (max 50, default 50)
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

impl PageParams {
    pub fn paging(&self) -> Result<Paging, AppError> {
        Ok(Paging::new(
            parse_int(self.page.as_deref(), "page")?,
            parse_int(self.page_size.as_deref(), "pageSize")?,
        ))
    }
}

fn parse_int(raw: Option<&str>, name: &str) -> Result<Option<i64>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("{name} must be an integer"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evently_core::MAX_PAGE_SIZE;

    fn params(page: Option<&str>, size: Option<&str>) -> PageParams {
        PageParams {
            page: page.map(str::to_string),
            page_size: size.map(str::to_string),
        }
    }

    #[test]
    fn test_paging_from_params() {
        let paging = params(Some("3"), Some("10")).paging().unwrap();
        assert_eq!(paging.offset(), 20);

        let paging = params(None, Some("200")).paging().unwrap();
        assert_eq!(paging.limit(), MAX_PAGE_SIZE);

        let paging = params(Some("-4"), None).paging().unwrap();
        assert_eq!(paging.page(), 1);
        assert_eq!(paging.offset(), 0);
    }

    #[test]
    fn test_non_integer_params_rejected() {
        assert!(matches!(
            params(Some("two"), None).paging(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            params(None, Some("1.5")).paging(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "event").unwrap(), id);
        assert!(parse_id("not-a-uuid", "event").is_err());
    }
}
