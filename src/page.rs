//! Page requests and page results
//!
//! `PageLink` is what a table asks for, `PageData<T>` is what a fetcher
//! returns. `PageLink::filter_data` pages an in-memory list the same way the
//! server does (text search, sort, slice).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOrder {
    pub property: String,
    #[serde(default)]
    pub direction: Direction,
}

impl SortOrder {
    pub fn new(property: impl Into<String>, direction: Direction) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }
}

/// Page request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLink {
    pub page: usize,
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl PageLink {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 0,
            page_size,
            text_search: None,
            sort_order: None,
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn with_text_search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text_search = (!text.trim().is_empty()).then_some(text);
        self
    }

    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    /// Same request, next page
    pub fn next_page_link(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }

    /// Page an in-memory list.
    ///
    /// `search_text` extracts the text matched (case-insensitively) against
    /// `text_search`; `sort_key` compares two items on a sort property.
    pub fn filter_data<T, S, K>(&self, items: &[T], search_text: S, sort_key: K) -> PageData<T>
    where
        T: Clone,
        S: Fn(&T) -> String,
        K: Fn(&T, &T, &str) -> Ordering,
    {
        let needle = self
            .text_search
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());

        let mut matched: Vec<T> = items
            .iter()
            .filter(|item| match &needle {
                Some(needle) => search_text(item).to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        if let Some(order) = &self.sort_order {
            matched.sort_by(|a, b| {
                let ord = sort_key(a, b, &order.property);
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        let total_elements = matched.len();
        if self.page_size == 0 {
            return PageData {
                data: Vec::new(),
                total_pages: 0,
                total_elements,
                has_next: false,
            };
        }
        let total_pages = total_elements.div_ceil(self.page_size);
        let start = self.page.saturating_mul(self.page_size).min(total_elements);
        let end = start.saturating_add(self.page_size).min(total_elements);

        PageData {
            data: matched[start..end].to_vec(),
            total_pages,
            total_elements,
            has_next: end < total_elements,
        }
    }
}

/// Page result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData<T> {
    pub data: Vec<T>,
    pub total_pages: usize,
    pub total_elements: usize,
    pub has_next: bool,
}

impl<T> PageData<T> {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            total_pages: 0,
            total_elements: 0,
            has_next: false,
        }
    }

    /// Page metadata without the items
    pub fn meta(&self) -> PageMeta {
        PageMeta {
            total_pages: self.total_pages,
            total_elements: self.total_elements,
            has_next: self.has_next,
        }
    }

    pub fn into_parts(self) -> (Vec<T>, PageMeta) {
        let meta = self.meta();
        (self.data, meta)
    }
}

impl<T> Default for PageData<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// `PageData` minus `data`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_pages: usize,
    pub total_elements: usize,
    pub has_next: bool,
}
