use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub current_page: Option<i64>,
    pub items_per_page: Option<i64>,
    pub total_items: Option<i64>,
    pub total_pages: Option<i64>,
    pub has_next_page: Option<bool>,
    pub has_prev_page: Option<bool>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        let pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };
        Self {
            current_page: Some(page),
            items_per_page: Some(per_page),
            total_items: Some(total),
            total_pages: Some(pages),
            has_next_page: Some(page < pages),
            has_prev_page: Some(page > 1),
        }
    }

    pub fn empty() -> Self {
        Self {
            current_page: None,
            items_per_page: None,
            total_items: None,
            total_pages: None,
            has_next_page: None,
            has_prev_page: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_pagination_math() {
        let meta = Meta::new(2, 10, 35);
        assert_eq!(meta.total_pages, Some(4));
        assert_eq!(meta.has_next_page, Some(true));
        assert_eq!(meta.has_prev_page, Some(true));

        let last = Meta::new(4, 10, 35);
        assert_eq!(last.has_next_page, Some(false));

        let first = Meta::new(1, 10, 5);
        assert_eq!(first.total_pages, Some(1));
        assert_eq!(first.has_prev_page, Some(false));
    }
}
