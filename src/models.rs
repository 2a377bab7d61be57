use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PagerError;

/// Catalog row, read-only for this crate / 目录条目（只读）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: i64,
    pub name: String,
    /// Unix milliseconds / 创建时间（毫秒）
    pub created_at: i64,
    pub popularity: i64,
    pub price: f64,
    pub set_id: Option<i64>,
    pub style_id: Option<i64>,
    pub user_id: Option<i64>,
    pub is_active: bool,
    pub is_deleted: bool,
}

impl CatalogItem {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created_at).single()
    }

    pub fn is_free(&self) -> bool {
        self.price == 0.0
    }
}

/// Stored column usable as a keyset sort key / 可排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    CreatedAt,
    Popularity,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "c.created_at",
            SortField::Popularity => "c.popularity",
        }
    }

    pub fn value_of(self, item: &CatalogItem) -> i64 {
        match self {
            SortField::CreatedAt => item.created_at,
            SortField::Popularity => item.popularity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Comparison that selects rows strictly after the boundary
    pub fn after_op(self) -> &'static str {
        match self {
            SortDirection::Asc => ">",
            SortDirection::Desc => "<",
        }
    }
}

impl FromStr for SortDirection {
    type Err = PagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(PagerError::validation(format!("unrecognized sortOrder '{}'", other))),
        }
    }
}

/// Requested ordering key / 排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    CreatedAt,
    Popularity,
    Relevance,
}

impl SortBy {
    pub fn field(self) -> Option<SortField> {
        match self {
            SortBy::CreatedAt => Some(SortField::CreatedAt),
            SortBy::Popularity => Some(SortField::Popularity),
            SortBy::Relevance => None,
        }
    }
}

impl Default for SortBy {
    fn default() -> Self {
        SortBy::CreatedAt
    }
}

impl FromStr for SortBy {
    type Err = PagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" => Ok(SortBy::CreatedAt),
            "popularity" => Ok(SortBy::Popularity),
            "relevance" => Ok(SortBy::Relevance),
            other => Err(PagerError::validation(format!("unrecognized sortBy '{}'", other))),
        }
    }
}

/// Tag carried inside every cursor token / 游标模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    Field,
    Relevance,
}

impl fmt::Display for CursorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorMode::Field => write!(f, "field"),
            CursorMode::Relevance => write!(f, "relevance"),
        }
    }
}
