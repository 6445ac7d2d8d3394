use serde::{Deserialize, Serialize};

/// Uniform wrapper around every backend response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

fn default_success() -> bool {
    true
}

impl<T> ApiEnvelope<T> {
    pub fn pagination(&self) -> Option<Pagination> {
        if self.page.is_none() && self.total.is_none() && self.total_pages.is_none() {
            return None;
        }

        Some(Pagination {
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(0),
            total: self.total.unwrap_or(0),
            total_pages: self.total_pages.unwrap_or(1).max(1),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn single(len: usize) -> Self {
        Self {
            page: 1,
            limit: len as u32,
            total: len as u64,
            total_pages: 1,
        }
    }
}

/// An envelope with `data` unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub message: Option<String>,
    pub data: T,
    pub pagination: Option<Pagination>,
}

/// One page of a list resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.pagination.page < self.pagination.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.pagination.page > 1
    }
}

impl<T> From<ApiResponse<Vec<T>>> for Page<T> {
    fn from(response: ApiResponse<Vec<T>>) -> Self {
        let pagination = response
            .pagination
            .unwrap_or_else(|| Pagination::single(response.data.len()));

        Page {
            items: response.data,
            pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_with_pagination() {
        let envelope: ApiEnvelope<Vec<String>> = serde_json::from_value(json!({
            "success": true,
            "statusCode": 200,
            "message": "Doctors retrieved",
            "data": ["a", "b"],
            "page": 2,
            "limit": 6,
            "total": 8,
            "totalPages": 2
        }))
        .unwrap();

        let pagination = envelope.pagination().unwrap();
        assert_eq!(pagination.page, 2);
        assert_eq!(pagination.total_pages, 2);
        assert_eq!(envelope.data.unwrap().len(), 2);
    }

    #[test]
    fn test_envelope_without_pagination() {
        let envelope: ApiEnvelope<Vec<String>> = serde_json::from_value(json!({
            "success": true,
            "statusCode": 200,
            "message": "ok",
            "data": []
        }))
        .unwrap();

        assert!(envelope.pagination().is_none());
    }

    #[test]
    fn test_page_navigation() {
        let page = Page {
            items: vec![1, 2, 3],
            pagination: Pagination {
                page: 1,
                limit: 3,
                total: 7,
                total_pages: 3,
            },
        };
        assert!(page.has_next());
        assert!(!page.has_previous());
    }
}
