//! Retrieval modes shared by every listable store.
use serde::Deserialize;
use serde::Serialize;

/// Default page size when the caller does not give one.
pub const DEFAULT_PER_PAGE: u64 = 60;

/// Upper bound for a page size unless configured otherwise.
pub const MAX_PER_PAGE: u64 = 200;

/// Largest row offset a query can skip: SQL offsets are signed 64-bit integers.
pub const MAX_OFFSET: u64 = i64::MAX as u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum Cursor {
    /// Default order (`update_at DESC, id DESC`), skip `offset`, take `limit`.
    Page { offset: u64, limit: u64 },
    /// Every row updated strictly after `since`, oldest change first.
    Since { since: i64 },
    /// Rows created strictly after the anchor, ascending.
    After { anchor: String, offset: u64, limit: u64 },
    /// Rows created strictly before the anchor, returned in ascending order too.
    Before { anchor: String, offset: u64, limit: u64 },
}

impl Cursor {
    /// Page number `page` of size `per_page`.
    pub fn page(page: u64, per_page: u64) -> Self {
        Self::Page {
            offset: page.saturating_mul(per_page),
            limit:  per_page,
        }
    }

    pub fn since(since: i64) -> Self {
        Self::Since { since }
    }

    pub fn after(anchor: impl Into<String>, page: u64, per_page: u64) -> Self {
        Self::After {
            anchor: anchor.into(),
            offset: page.saturating_mul(per_page),
            limit:  per_page,
        }
    }

    pub fn before(anchor: impl Into<String>, page: u64, per_page: u64) -> Self {
        Self::Before {
            anchor: anchor.into(),
            offset: page.saturating_mul(per_page),
            limit:  per_page,
        }
    }

    /// Pick the mode from whatever cursor parameters are present: `since`, then `after`, then `before`, then a plain
    /// page.
    pub fn select(since: Option<i64>, after: Option<String>, before: Option<String>, page: u64, per_page: u64) -> Self {
        if let Some(since) = since {
            Self::since(since)
        }
        else if let Some(anchor) = after {
            Self::after(anchor, page, per_page)
        }
        else if let Some(anchor) = before {
            Self::before(anchor, page, per_page)
        }
        else {
            Self::page(page, per_page)
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Page { .. } => "page",
            Self::Since { .. } => "since",
            Self::After { .. } => "after",
            Self::Before { .. } => "before",
        }
    }

    /// Rows skipped before the page starts, if the mode pages.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Page { offset, .. } | Self::After { offset, .. } | Self::Before { offset, .. } => Some(*offset),
            Self::Since { .. } => None,
        }
    }

    /// The page size, if the mode has one.
    pub fn limit(&self) -> Option<u64> {
        match self {
            Self::Page { limit, .. } | Self::After { limit, .. } | Self::Before { limit, .. } => Some(*limit),
            Self::Since { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_since_after_before_page() {
        let all = Cursor::select(Some(5), Some("a".into()), Some("b".into()), 1, 10);
        assert_eq!(all, Cursor::since(5));

        let no_since = Cursor::select(None, Some("a".into()), Some("b".into()), 1, 10);
        assert_eq!(no_since, Cursor::after("a", 1, 10));

        let only_before = Cursor::select(None, None, Some("b".into()), 2, 10);
        assert_eq!(
            only_before,
            Cursor::Before {
                anchor: "b".into(),
                offset: 20,
                limit:  10,
            }
        );

        assert_eq!(Cursor::select(None, None, None, 3, 7), Cursor::Page { offset: 21, limit: 7 });
    }

    #[test]
    fn since_has_no_limit() {
        assert_eq!(Cursor::since(1).limit(), None);
        assert_eq!(Cursor::page(0, 9).limit(), Some(9));
        assert_eq!(Cursor::since(1).offset(), None);
    }

    #[test]
    fn offset_saturates() {
        assert_eq!(Cursor::page(3, 7).offset(), Some(21));
        assert_eq!(Cursor::before("a", u64::MAX, 60).offset(), Some(u64::MAX));
    }
}
