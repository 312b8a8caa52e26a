//! Windowing over ordered collections
//!
//! The current page travels in the token as the flat integer field `pg`.
//! Requests outside `[1, page_count]` clamp instead of failing: a stale "next"
//! click after the collection shrank is an expected race.

use crate::token::{encode, Base, StepState, TokenError};

/// Token field holding the 1-based page number
pub const PAGE_KEY: &str = "pg";

#[derive(Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// 1-based, already clamped
    pub page: usize,
    pub page_count: usize,
}

impl<T> Page<'_, T> {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }
}

/// Slice out one page of `items`.
///
/// The last page is back-filled so it always shows a full window when the
/// collection has at least `page_size` items. An empty collection has one
/// empty page.
///
/// Back-filling makes the last two pages overlap when the length is not a
/// multiple of `page_size`: with 23 items and a page size of 5, page 4 holds
/// items 16 to 20 and page 5 holds items 19 to 23. Callers that act per page
/// must expect an item to appear on two pages.
pub fn paginate<T>(items: &[T], page_size: usize, page: i64) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let page_count = items.len().div_ceil(page_size).max(1);
    let page = usize::try_from(page).unwrap_or(1).clamp(1, page_count);

    let start = if page == page_count {
        items.len().saturating_sub(page_size)
    } else {
        (page - 1) * page_size
    };
    let end = (start + page_size).min(items.len());

    Page {
        items: &items[start..end],
        page,
        page_count,
    }
}

/// Page number carried by `state`, defaulting to the first page.
pub fn current_page(state: &StepState) -> i64 {
    state.get_i64(PAGE_KEY).unwrap_or(1)
}

/// Tokens for the previous/next page controls, re-encoding `state` with a new
/// page number. `None` where there is no such page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTokens {
    pub prev: Option<String>,
    pub next: Option<String>,
}

pub fn page_tokens<T>(
    base: &Base,
    state: &StepState,
    page: &Page<'_, T>,
) -> Result<PageTokens, TokenError> {
    let token_for = |n: usize| {
        let n = i64::try_from(n).unwrap_or(i64::MAX);
        encode(base, &state.clone().with(PAGE_KEY, n))
    };
    Ok(PageTokens {
        prev: page.has_prev().then(|| token_for(page.page - 1)).transpose()?,
        next: page.has_next().then(|| token_for(page.page + 1)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::decode;

    #[test]
    fn stale_page_clamps_to_last() {
        let items: Vec<u32> = (1..=23).collect();
        let page = paginate(&items, 5, 99);
        assert_eq!(page.page_count, 5);
        assert_eq!(page.page, 5);
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items.last(), Some(&23));
    }

    #[test]
    fn zero_and_negative_pages_clamp_to_first() {
        let items: Vec<u32> = (1..=23).collect();
        assert_eq!(paginate(&items, 5, 0).items, &[1, 2, 3, 4, 5]);
        assert_eq!(paginate(&items, 5, -4).page, 1);
    }

    #[test]
    fn middle_pages_are_contiguous() {
        let items: Vec<u32> = (1..=23).collect();
        assert_eq!(paginate(&items, 5, 2).items, &[6, 7, 8, 9, 10]);
        assert_eq!(paginate(&items, 5, 4).items, &[16, 17, 18, 19, 20]);
    }

    #[test]
    fn back_filled_last_page_overlaps_previous() {
        let items: Vec<u32> = (1..=23).collect();
        assert_eq!(paginate(&items, 5, 4).items, &[16, 17, 18, 19, 20]);
        assert_eq!(paginate(&items, 5, 5).items, &[19, 20, 21, 22, 23]);
    }

    #[test]
    fn empty_collection_has_one_empty_page() {
        let items: Vec<u32> = Vec::new();
        let page = paginate(&items, 10, 3);
        assert_eq!(page.page_count, 1);
        assert_eq!(page.page, 1);
        assert!(page.items.is_empty());
        assert!(!page.has_prev());
        assert!(!page.has_next());
    }

    #[test]
    fn short_collection_fits_one_page() {
        let items = [1, 2, 3];
        let page = paginate(&items, 10, 1);
        assert_eq!(page.items, &[1, 2, 3]);
        assert_eq!(page.page_count, 1);
    }

    #[test]
    fn page_tokens_carry_neighbouring_pages() {
        let items: Vec<u32> = (1..=23).collect();
        let base = Base::button("roles", "preview");
        let state = StepState::new().with("m", "empty");
        let page = paginate(&items, 5, 2);

        let tokens = page_tokens(&base, &state, &page).unwrap();
        let prev = decode(&tokens.prev.unwrap()).unwrap();
        let next = decode(&tokens.next.unwrap()).unwrap();
        assert_eq!(current_page(&prev.state), 1);
        assert_eq!(current_page(&next.state), 3);
        assert_eq!(next.state.get_str("m"), Some("empty"));

        let first = paginate(&items, 5, 1);
        assert!(page_tokens(&base, &state, &first).unwrap().prev.is_none());
    }
}
