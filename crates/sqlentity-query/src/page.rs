//! Sorting and pagination.

use serde::{Deserialize, Serialize};
use sqlentity_core::error::BuilderErrorKind;
use sqlentity_core::{Error, Result};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    column: String,
    direction: OrderDirection,
}

impl Order {
    /// Create an ascending order by term.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order by term.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    pub fn is_ascending(&self) -> bool {
        self.direction == OrderDirection::Asc
    }

    /// Generate SQL for this term.
    pub fn to_sql(&self) -> String {
        let mut sql = self.column.clone();
        sql.push_str(match self.direction {
            OrderDirection::Asc => " ASC",
            OrderDirection::Desc => " DESC",
        });
        sql
    }
}

/// An ordered list of ORDER BY terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    /// Sort by the given terms, in order. At least one term is required.
    pub fn by(orders: Vec<Order>) -> Result<Self> {
        if orders.is_empty() {
            return Err(Error::builder(
                BuilderErrorKind::InvalidArgument,
                "sort requires at least one order",
            ));
        }
        Ok(Self { orders })
    }

    pub fn unsorted() -> Self {
        Self::default()
    }

    /// Append a term.
    pub fn and(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_sorted(&self) -> bool {
        !self.orders.is_empty()
    }
}

/// A 1-indexed page request.
///
/// Deserialized requests go through the same checks as [`PageRequest::of`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PageRequestParts")]
pub struct PageRequest {
    page: u64,
    size: u64,
    sort: Sort,
}

#[derive(Deserialize)]
struct PageRequestParts {
    page: u64,
    size: u64,
    #[serde(default)]
    sort: Sort,
}

impl TryFrom<PageRequestParts> for PageRequest {
    type Error = Error;

    fn try_from(parts: PageRequestParts) -> Result<Self> {
        Ok(Self::of(parts.page, parts.size)?.with_sort(parts.sort))
    }
}

impl PageRequest {
    /// Page `page` (starting at 1) of `size` rows.
    pub fn of(page: u64, size: u64) -> Result<Self> {
        if page < 1 {
            return Err(Error::builder(
                BuilderErrorKind::InvalidArgument,
                "page number must be at least 1",
            ));
        }
        if size < 1 {
            return Err(Error::builder(
                BuilderErrorKind::InvalidArgument,
                "page size must be at least 1",
            ));
        }
        Ok(Self {
            page,
            size,
            sort: Sort::unsorted(),
        })
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Rows skipped before this page, saturating at `u64::MAX`.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }

    /// The following page, same size and sort.
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    content: Vec<T>,
    total_elements: u64,
    request: PageRequest,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: u64, request: PageRequest) -> Self {
        Self {
            content,
            total_elements,
            request,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// 1-indexed page number.
    pub fn number(&self) -> u64 {
        self.request.page
    }

    pub fn total_pages(&self) -> u64 {
        match self.request.size {
            0 => 0,
            size => self.total_elements.div_ceil(size),
        }
    }

    pub fn is_first(&self) -> bool {
        self.request.page == 1
    }

    pub fn is_last(&self) -> bool {
        self.request.page >= self.total_pages()
    }

    pub fn has_next(&self) -> bool {
        self.request.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.request.page > 1
    }

    /// Convert the content, keeping the paging information.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            request: self.request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_three_of_twenty_five() {
        let request = PageRequest::of(3, 10).unwrap();
        assert_eq!(request.offset(), 20);
        let page = Page::new(vec![21, 22, 23, 24, 25], 25, request);
        assert_eq!(page.total_pages(), 3);
        assert!(page.is_last());
        assert!(!page.has_next());
        assert!(page.has_previous());
        assert!(!page.is_first());
    }

    #[test]
    fn empty_result_is_a_single_last_page() {
        let page: Page<i32> = Page::new(Vec::new(), 0, PageRequest::of(1, 5).unwrap());
        assert_eq!(page.total_pages(), 0);
        assert!(page.is_first());
        assert!(page.is_last());
    }

    #[test]
    fn invalid_requests() {
        assert_eq!(
            PageRequest::of(0, 10).unwrap_err().builder_kind(),
            Some(BuilderErrorKind::InvalidArgument)
        );
        assert!(PageRequest::of(1, 0).is_err());
        assert!(Sort::by(Vec::new()).is_err());
    }

    #[test]
    fn map_keeps_paging() {
        let request = PageRequest::of(1, 2)
            .unwrap()
            .with_sort(Sort::by(vec![Order::desc("age")]).unwrap().and(Order::asc("name")));
        let page = Page::new(vec![1, 2], 5, request).map(|n| n.to_string());
        assert_eq!(page.content(), &["1".to_string(), "2".to_string()]);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert_eq!(page.request().next().offset(), 2);
        let terms: Vec<_> = page.request().sort().orders().iter().map(Order::to_sql).collect();
        assert_eq!(terms, vec!["age DESC", "name ASC"]);
    }

    #[test]
    fn serializes_requests() {
        let request = PageRequest::of(2, 10).unwrap().with_sort(Sort::unsorted().and(Order::asc("id")));
        let json = serde_json::to_string(&request).unwrap();
        let back: PageRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn deserializing_checks_bounds() {
        let zero_page = serde_json::from_str::<PageRequest>(
            r#"{"page":0,"size":10,"sort":{"orders":[]}}"#,
        );
        assert!(zero_page.unwrap_err().to_string().contains("page number"));

        let zero_size = serde_json::from_str::<Page<i32>>(
            r#"{"content":[],"total_elements":4,"request":{"page":1,"size":0}}"#,
        );
        assert!(zero_size.unwrap_err().to_string().contains("page size"));

        let unsorted: PageRequest = serde_json::from_str(r#"{"page":2,"size":5}"#).unwrap();
        assert_eq!(unsorted, PageRequest::of(2, 5).unwrap());
    }

    #[test]
    fn huge_pages_saturate() {
        let request = PageRequest::of(u64::MAX, 2).unwrap();
        assert_eq!(request.offset(), u64::MAX);
        assert_eq!(request.next().page(), u64::MAX);
        let page: Page<i32> = Page::new(Vec::new(), u64::MAX, PageRequest::of(1, 1).unwrap());
        assert_eq!(page.total_pages(), u64::MAX);
        assert!(page.has_next());
    }
}
