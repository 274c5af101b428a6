//! Cursor pagination for provider list endpoints.
//!
//! Capability list calls return one [`Page`] at a time; [`collect_pages`]
//! drives them to exhaustion. Stopping a page short would make the verifier
//! report a false clean result.

use std::collections::HashSet;
use std::future::Future;

use crate::error::{ApiError, ApiResult};

/// Upper bound on pages fetched from a single listing.
pub const MAX_PAGES: usize = 10_000;

/// One page of a provider listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque cursor for the next page; `None` on the last page.
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// The final page of a listing.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    /// A page followed by more.
    pub fn with_next(items: Vec<T>, next: impl Into<String>) -> Self {
        Self {
            items,
            next: Some(next.into()),
        }
    }
}

/// Fetch every page of a listing, feeding each cursor back into `fetch`.
///
/// Fails instead of looping forever when a provider repeats a cursor.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> ApiResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = ApiResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let page = fetch(cursor.take()).await?;
        items.extend(page.items);

        match page.next {
            Some(next) => {
                if !seen.insert(next.clone()) {
                    return Err(ApiError::invalid_response(format!(
                        "pagination cursor repeated: {next}"
                    )));
                }
                cursor = Some(next);
            }
            None => return Ok(items),
        }
    }

    Err(ApiError::invalid_response(format!(
        "pagination did not finish within {MAX_PAGES} pages"
    )))
}
