use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * limit;
        (page, limit, offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Unknown values fall back to the default instead of rejecting
    /// the request.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSortBy {
    CreatedAt,
    Name,
    Price,
    Category,
    InStock,
}

impl ProductSortBy {
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            Some("name") => ProductSortBy::Name,
            Some("price") => ProductSortBy::Price,
            Some("category") => ProductSortBy::Category,
            Some("inStock") => ProductSortBy::InStock,
            _ => ProductSortBy::CreatedAt,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub is_new: Option<bool>,
    pub is_budget: Option<bool>,
    pub has_discount: Option<bool>,
    pub is_active: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ShowcaseQuery {
    pub limit: Option<i64>,
}

impl ShowcaseQuery {
    pub fn limit_or(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, 100)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TopBuyersQuery {
    pub limit: Option<i64>,
    pub period: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TotalSumQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub exclude_cancelled: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PeriodQuery {
    pub period: Option<String>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_and_offsets() {
        let p = Pagination {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(p.normalize(), (3, 10, 20));

        let p = Pagination {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(p.normalize(), (1, 100, 0));

        let p = Pagination::default();
        assert_eq!(p.normalize(), (1, 20, 0));
    }

    #[test]
    fn showcase_limit_is_bounded() {
        assert_eq!(ShowcaseQuery { limit: None }.limit_or(8), 8);
        assert_eq!(ShowcaseQuery { limit: Some(3) }.limit_or(8), 3);
        assert_eq!(ShowcaseQuery { limit: Some(0) }.limit_or(8), 1);
        assert_eq!(ShowcaseQuery { limit: Some(5000) }.limit_or(8), 100);
    }

    #[test]
    fn unknown_sort_fields_fall_back_quietly() {
        assert_eq!(
            ProductSortBy::parse_lenient(Some("price")),
            ProductSortBy::Price
        );
        assert_eq!(
            ProductSortBy::parse_lenient(Some("dropTables")),
            ProductSortBy::CreatedAt
        );
        assert_eq!(ProductSortBy::parse_lenient(None), ProductSortBy::CreatedAt);

        assert_eq!(SortOrder::parse_lenient(Some("ASC")), SortOrder::Asc);
        assert_eq!(SortOrder::parse_lenient(Some("sideways")), SortOrder::Desc);
    }
}
