use axum::Json;
use serde::Serialize;

use hearth_store::app_config::BusinessRules;

/// Standard success envelope: `{status, message, data}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn success<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        status: "success",
        message: "success".into(),
        data: Some(data),
    })
}

pub fn success_with_message<T: Serialize>(data: T, message: &str) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        status: "success",
        message: message.into(),
        data: Some(data),
    })
}

pub fn message_only(message: &str) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        status: "success",
        message: message.into(),
        data: None,
    })
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(total: u64, page: u32, per_page: u32) -> Self {
        Self {
            total,
            per_page,
            current_page: page,
            total_pages: total.div_ceil(u64::from(per_page.max(1))),
        }
    }
}

/// List envelope: `{data, pagination}`.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

pub fn paginated<T: Serialize>(
    items: Vec<T>,
    total: u64,
    page: u32,
    per_page: u32,
) -> Json<Paginated<T>> {
    Json(Paginated {
        data: items,
        pagination: Pagination::new(total, page, per_page),
    })
}

/// Common `?page=&per_page=` query parameters.
#[derive(Debug, serde::Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    /// Clamp to the configured defaults: page >= 1, per_page within
    /// [1, max_page_size].
    pub fn clamp(&self, rules: &BusinessRules) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(rules.default_page_size)
            .clamp(1, rules.max_page_size);
        (page, per_page)
    }
}
