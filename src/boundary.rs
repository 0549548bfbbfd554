//! What an API handler needs to talk to the store: turning raw query parameters into a [`Cursor`], conditional GET,
//! and mapping store errors onto response statuses.
use serde::Deserialize;
use serde::Serialize;

use crate::cursor::Cursor;
use crate::cursor::DEFAULT_PER_PAGE;
use crate::cursor::MAX_OFFSET;
use crate::cursor::MAX_PER_PAGE;
use crate::entity::StoreEntity;
use crate::error::ErrorKind;
use crate::error::StoreError;
use crate::error::StoreResult;
use crate::list::EntityList;

/// Cursor parameters as they arrive with a request, still unparsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorParams {
    pub page:     Option<String>,
    pub per_page: Option<String>,
    pub since:    Option<String>,
    pub after:    Option<String>,
    pub before:   Option<String>,
}

impl CursorParams {
    pub fn parse(&self) -> StoreResult<Cursor> {
        self.parse_with_max(MAX_PER_PAGE)
    }

    pub fn parse_with_max(&self, max_per_page: u64) -> StoreResult<Cursor> {
        let since = match non_empty(&self.since) {
            Some(raw) => Some(
                raw.parse::<i64>()
                    .ok()
                    .filter(|v| *v >= 0)
                    .ok_or_else(|| StoreError::bad_cursor("since", format!("'{raw}' is not a timestamp")))?,
            ),
            None => None,
        };

        let page = match non_empty(&self.page) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| StoreError::bad_cursor("page", format!("'{raw}' is not a page number")))?,
            None => 0,
        };

        let per_page = match non_empty(&self.per_page) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|v| (1..=max_per_page).contains(v))
                .ok_or_else(|| StoreError::bad_cursor("per_page", format!("'{raw}' is not within 1..={max_per_page}")))?,
            None => DEFAULT_PER_PAGE.min(max_per_page),
        };

        if page.checked_mul(per_page).filter(|offset| *offset <= MAX_OFFSET).is_none() {
            return Err(StoreError::bad_cursor("page", format!("page {page} of {per_page} is out of range")));
        }

        let after = anchor("after", &self.after)?;
        let before = anchor("before", &self.before)?;

        Ok(Cursor::select(since, after, before, page, per_page))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn anchor(param: &'static str, value: &Option<String>) -> StoreResult<Option<String>> {
    match non_empty(value) {
        Some(raw) if crate::entity::is_valid_id(raw) => Ok(Some(raw.to_string())),
        Some(raw) => Err(StoreError::bad_cursor(param, format!("'{raw}' is not an id"))),
        None => Ok(None),
    }
}

/// Anything the boundary can compute an ETag for.
pub trait Etagged {
    fn etag(&self) -> String;
}

impl<T: StoreEntity> Etagged for EntityList<T> {
    fn etag(&self) -> String {
        EntityList::etag(self)
    }
}

impl<T: StoreEntity> Etagged for T {
    fn etag(&self) -> String {
        StoreEntity::etag(self)
    }
}

/// Outcome of a conditional GET. Both variants carry the tag to send back in the `ETag` header.
#[derive(Debug, PartialEq)]
pub enum Conditional<'a, T> {
    NotModified { etag: String },
    Modified { etag: String, body: &'a T },
}

impl<T> Conditional<'_, T> {
    pub fn etag(&self) -> &str {
        match self {
            Self::NotModified { etag } | Self::Modified { etag, .. } => etag,
        }
    }

    pub fn is_modified(&self) -> bool {
        matches!(self, Self::Modified { .. })
    }
}

/// Compare the client's `If-None-Match` token against a freshly computed tag.
pub fn conditional<'a, T: Etagged>(if_none_match: Option<&str>, value: &'a T) -> Conditional<'a, T> {
    let etag = value.etag();
    match if_none_match.map(|t| t.trim().trim_matches('"')) {
        Some(token) if token == etag => Conditional::NotModified { etag },
        _ => Conditional::Modified { etag, body: value },
    }
}

pub fn http_status(err: &StoreError) -> u16 {
    match err.kind() {
        ErrorKind::NotFound => 404,
        ErrorKind::Validation | ErrorKind::BadCursor => 400,
        ErrorKind::Conflict => 409,
        ErrorKind::Internal => 500,
    }
}

/// Error payload safe to send to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub id:          String,
    pub message:     String,
    pub status_code: u16,
}

impl From<&StoreError> for ErrorBody {
    fn from(err: &StoreError) -> Self {
        Self {
            id:          err.code(),
            message:     err.to_string(),
            status_code: http_status(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::new_id;
    use crate::entity::Product;

    fn params(pairs: &[(&str, &str)]) -> CursorParams {
        let mut p = CursorParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "page" => p.page = v,
                "per_page" => p.per_page = v,
                "since" => p.since = v,
                "after" => p.after = v,
                "before" => p.before = v,
                _ => unreachable!(),
            }
        }
        p
    }

    #[test]
    fn defaults_to_first_page() {
        assert_eq!(CursorParams::default().parse().unwrap(), Cursor::page(0, DEFAULT_PER_PAGE));
    }

    #[test]
    fn since_wins_over_anchors() {
        let a = new_id();
        let b = new_id();
        let cursor = params(&[("since", "1700"), ("after", &a), ("before", &b)]).parse().unwrap();
        assert_eq!(cursor, Cursor::since(1700));

        let cursor = params(&[("after", &a), ("before", &b), ("page", "1"), ("per_page", "5")])
            .parse()
            .unwrap();
        assert_eq!(cursor, Cursor::after(a, 1, 5));
    }

    #[test]
    fn malformed_values_are_bad_cursors() {
        for (k, v) in [("since", "yesterday"), ("since", "-1"), ("page", "x"), ("per_page", "0"), ("after", "nope")] {
            let err = params(&[(k, v)]).parse().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadCursor, "{k}={v}");
            assert_eq!(http_status(&err), 400);
        }
        let err = params(&[("per_page", "201")]).parse().unwrap_err();
        assert_eq!(err.code(), "store.cursor.per_page.invalid");
    }

    #[test]
    fn page_past_the_last_offset_is_refused() {
        let huge = u64::MAX.to_string();
        let err = params(&[("page", &huge)]).parse().unwrap_err();
        assert_eq!(err.code(), "store.cursor.page.invalid");

        // Fits in u64 but not in a signed SQL offset.
        let err = params(&[("page", &(MAX_OFFSET / 2 + 1).to_string()), ("per_page", "2")])
            .parse()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadCursor);

        let last = (MAX_OFFSET / 2).to_string();
        let cursor = params(&[("page", &last), ("per_page", "2")]).parse().unwrap();
        assert_eq!(cursor.offset(), Some(MAX_OFFSET - 1));
    }

    #[test]
    fn conditional_get_matches_tag() {
        let mut product = Product::new("Lamp", 10.0);
        product.id = new_id();
        product.update_at = 42;
        let tag = StoreEntity::etag(&product);

        let outcome = conditional(Some(&format!("\"{tag}\"")), &product);
        assert_eq!(outcome, Conditional::NotModified { etag: tag.clone() });

        let outcome = conditional(Some("stale"), &product);
        assert!(outcome.is_modified());
        assert_eq!(outcome.etag(), tag);

        let list = EntityList::from_ordered([product]);
        let outcome = conditional(None, &list);
        assert_eq!(outcome.etag(), list.etag());
    }

    #[test]
    fn statuses() {
        assert_eq!(http_status(&StoreError::not_found("product", "x")), 404);
        assert_eq!(http_status(&StoreError::conflict("product", "x")), 409);
        assert_eq!(http_status(&StoreError::internal("store.db")), 500);
        let body = ErrorBody::from(&StoreError::validation("order", "quantity must be positive"));
        assert_eq!(body.id, "store.order.invalid");
        assert_eq!(body.status_code, 400);
    }
}
