//! `Range: items=start-end` request parsing and `Content-Range` responses.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

pub static X_TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");

/// Inclusive item window requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: i64,
    pub end: i64,
}

impl Default for PageRange {
    fn default() -> Self {
        Self {
            start: 0,
            end: DEFAULT_PAGE_SIZE - 1,
        }
    }
}

impl PageRange {
    /// Parse `items=<start>-<end>`; the window is capped at `MAX_PAGE_SIZE` items.
    pub fn parse(value: &str) -> Result<Self, ApiError> {
        let invalid = || ApiError::bad_request("Invalid Range header, expected items=<start>-<end>");

        let spec = value.trim().strip_prefix("items=").ok_or_else(invalid)?;
        let (start, end) = spec.split_once('-').ok_or_else(invalid)?;
        let start: i64 = start.trim().parse().map_err(|_| invalid())?;
        let end: i64 = end.trim().parse().map_err(|_| invalid())?;

        if start < 0 || end < start {
            return Err(invalid());
        }

        Ok(Self {
            start,
            end: end.min(start.saturating_add(MAX_PAGE_SIZE - 1)),
        })
    }

    pub fn offset(&self) -> i64 {
        self.start
    }

    pub fn limit(&self) -> i64 {
        self.end - self.start + 1
    }

    /// `items start-end/total` for the rows actually returned.
    pub fn content_range(&self, returned: usize, total: i64) -> String {
        if returned == 0 {
            format!("items */{}", total)
        } else {
            let last = self.start.saturating_add(returned as i64 - 1);
            format!("items {}-{}/{}", self.start, last, total)
        }
    }
}

impl<S> FromRequestParts<S> for PageRange
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(header::RANGE) {
            None => Ok(PageRange::default()),
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| ApiError::bad_request("Invalid Range header"))?;
                PageRange::parse(value)
            }
        }
    }
}

/// A page of items plus the pagination headers describing it.
#[derive(Debug)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub range: PageRange,
    pub total: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, range: PageRange, total: i64) -> Self {
        Self {
            items,
            range,
            total,
        }
    }

    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.range.content_range(self.items.len(), self.total)) {
            headers.insert(header::CONTENT_RANGE, value);
        }
        headers.insert(X_TOTAL_COUNT.clone(), HeaderValue::from(self.total));
        headers
    }
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        let headers = self.headers();
        (StatusCode::OK, headers, Json(self.items)).into_response()
    }
}
