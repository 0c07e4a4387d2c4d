//! # Offset Pagination
//!
//! `list` operations never materialize an unbounded result. Callers walk a
//! collection page by page: each [`Page`] carries the offset of the next page,
//! or `None` once the collection is exhausted. A walk can be resumed from any
//! offset the caller kept.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A request for one page of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    offset: u64,
    limit: u32,
}

impl PageRequest {
    /// Page size used when the caller does not supply one.
    pub const DEFAULT_LIMIT: u32 = 20;
    /// Largest page a caller may request.
    pub const MAX_LIMIT: u32 = 100;

    /// Build a page request, rejecting a zero or oversized limit.
    pub fn new(offset: u64, limit: u32) -> Result<Self, ValidationError> {
        if limit == 0 {
            return Err(ValidationError::Pagination(
                "limit must be at least 1".to_string(),
            ));
        }
        if limit > Self::MAX_LIMIT {
            return Err(ValidationError::Pagination(format!(
                "limit must be at most {}, got {limit}",
                Self::MAX_LIMIT
            )));
        }
        if offset > i64::MAX as u64 {
            return Err(ValidationError::Pagination(format!(
                "offset {offset} is out of range"
            )));
        }
        Ok(Self { offset, limit })
    }

    /// Build a page request from optional query parameters.
    pub fn from_query(offset: Option<u64>, limit: Option<u32>) -> Result<Self, ValidationError> {
        Self::new(offset.unwrap_or(0), limit.unwrap_or(Self::DEFAULT_LIMIT))
    }

    /// The first page with the default page size.
    pub fn first() -> Self {
        Self {
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    /// Zero-based index of the first item on this page.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Maximum number of items on this page.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of rows a backend should fetch: one beyond the limit, so the
    /// presence of a following page is known without a separate count query.
    pub fn probe_limit(&self) -> u64 {
        u64::from(self.limit) + 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page, in the collection's stable order.
    pub items: Vec<T>,
    /// Offset of the following page, or `None` when this is the last page.
    pub next_offset: Option<u64>,
}

impl<T> Page<T> {
    /// An empty, final page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_offset: None,
        }
    }

    /// Assemble a page from a probe fetch of up to `request.probe_limit()`
    /// items. The extra item, if present, is discarded and only signals that
    /// another page follows.
    pub fn from_probe(mut items: Vec<T>, request: PageRequest) -> Self {
        let limit = request.limit() as usize;
        let next_offset = if items.len() > limit {
            items.truncate(limit);
            Some(request.offset() + limit as u64)
        } else {
            None
        };
        Self { items, next_offset }
    }

    /// Whether another page follows this one.
    pub fn has_more(&self) -> bool {
        self.next_offset.is_some()
    }

    /// Transform every item, keeping the pagination cursor.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_offset: self.next_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_limit_rejected() {
        assert!(PageRequest::new(0, 0).is_err());
    }

    #[test]
    fn oversized_limit_rejected() {
        let err = PageRequest::new(0, PageRequest::MAX_LIMIT + 1).unwrap_err();
        assert!(err.to_string().contains("at most"));
    }

    #[test]
    fn query_defaults_apply() {
        let req = PageRequest::from_query(None, None).unwrap();
        assert_eq!(req.offset(), 0);
        assert_eq!(req.limit(), PageRequest::DEFAULT_LIMIT);
    }

    #[test]
    fn probe_with_extra_item_yields_next_offset() {
        let req = PageRequest::new(10, 3).unwrap();
        let page = Page::from_probe(vec![1, 2, 3, 4], req);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.next_offset, Some(13));
    }

    #[test]
    fn short_probe_is_last_page() {
        let req = PageRequest::new(0, 5).unwrap();
        let page = Page::from_probe(vec![1, 2], req);
        assert!(!page.has_more());
        assert_eq!(page.items.len(), 2);
    }

    proptest! {
        #[test]
        fn walking_pages_visits_every_item_once(total in 0usize..250, limit in 1u32..=PageRequest::MAX_LIMIT) {
            let data: Vec<usize> = (0..total).collect();
            let mut seen = Vec::new();
            let mut offset = 0u64;
            loop {
                let req = PageRequest::new(offset, limit).unwrap();
                let start = req.offset() as usize;
                let end = (start + req.probe_limit() as usize).min(data.len());
                let probe = data.get(start..end).map(<[usize]>::to_vec).unwrap_or_default();
                let page = Page::from_probe(probe, req);
                prop_assert!(page.items.len() <= limit as usize);
                seen.extend(page.items);
                match page.next_offset {
                    Some(next) => offset = next,
                    None => break,
                }
            }
            prop_assert_eq!(seen, data);
        }
    }
}
