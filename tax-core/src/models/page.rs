use serde::{Deserialize, Serialize};

/// One page of results plus the metadata of the underlying query.
///
/// `total_elements` and `total_pages` always describe the stored rows, even
/// when `items` has been filtered after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_no: u32,
    pub page_size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
    pub is_last: bool,
}

impl<T> Page<T> {
    /// Build page metadata for a zero-based `page_no` out of `total_elements`
    /// stored rows.
    pub fn new(
        items: Vec<T>,
        page_no: u32,
        page_size: u32,
        total_elements: u64,
    ) -> Self {
        let total_pages = total_pages(total_elements, page_size);
        Self {
            items,
            page_no,
            page_size,
            total_elements,
            total_pages,
            is_last: u64::from(page_no) + 1 >= u64::from(total_pages),
        }
    }

    /// Replace the items while keeping the original page metadata.
    pub fn map_items<U>(
        self,
        items: Vec<U>,
    ) -> Page<U> {
        Page {
            items,
            page_no: self.page_no,
            page_size: self.page_size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            is_last: self.is_last,
        }
    }
}

fn total_pages(
    total_elements: u64,
    page_size: u32,
) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_elements.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<()> = Page::new(vec![], 0, 10, 21);

        assert_eq!(page.total_pages, 3);
        assert!(!page.is_last);
    }

    #[test]
    fn exact_multiple_has_no_extra_page() {
        let page: Page<()> = Page::new(vec![], 1, 10, 20);

        assert_eq!(page.total_pages, 2);
        assert!(page.is_last);
    }

    #[test]
    fn empty_result_is_last_page() {
        let page: Page<()> = Page::new(vec![], 0, 10, 0);

        assert_eq!(page.total_pages, 0);
        assert!(page.is_last);
    }

    #[test]
    fn page_past_the_end_is_last() {
        let page: Page<()> = Page::new(vec![], 7, 5, 6);

        assert_eq!(page.total_pages, 2);
        assert!(page.is_last);
    }

    #[test]
    fn map_items_keeps_metadata() {
        let page = Page::new(vec![1, 2, 3], 0, 3, 9);

        let mapped = page.map_items(vec!["one"]);

        assert_eq!(mapped.items, vec!["one"]);
        assert_eq!(mapped.total_elements, 9);
        assert_eq!(mapped.total_pages, 3);
        assert!(!mapped.is_last);
    }
}
