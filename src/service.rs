//! Search facade / 搜索门面
//!
//! Maps named search intents onto (filters, sortBy, sortOrder) and forwards
//! to the paginator. Holds no state of its own.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::error::{PagerError, Result};
use crate::models::{SortBy, SortDirection};
use crate::pagination::{EntityWrapper, FacetMap, Page, PageRequest, Paginator, PriceTier, RawRows};

/// Named search intent / 搜索排序意图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSort {
    #[default]
    Newest,
    Bestseller,
    Relevance,
}

/// Search request / 搜索请求
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchParams {
    pub price: Option<PriceTier>,
    pub tag_ids: Option<Vec<i64>>,
    pub style_id: Option<i64>,
    pub user_id: Option<i64>,
    pub set_id: Option<i64>,
    pub family_id: Option<i64>,
    pub search_term: Option<String>,
    /// Ranked ids for relevance, otherwise a plain allow-list
    pub ids: Option<Vec<i64>>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub sort: SearchSort,
}

impl SearchParams {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| PagerError::validation(format!("invalid search params: {}", e)))
    }

    /// Translate the intent into a paginator request
    pub fn to_request(&self) -> PageRequest {
        let mut filters = FacetMap {
            price: self.price,
            tag_ids: self.tag_ids.clone(),
            style_id: self.style_id,
            user_id: self.user_id,
            set_id: self.set_id,
            family_id: self.family_id,
            search_term: self.search_term.clone(),
            ..Default::default()
        };

        let sort = match (self.sort, &self.ids) {
            (SearchSort::Relevance, None) => {
                tracing::debug!("Relevance search without ranked ids, falling back to newest");
                SearchSort::Newest
            }
            (sort, _) => sort,
        };

        let (sort_by, sort_order) = match sort {
            SearchSort::Newest => {
                filters.ids = self.ids.clone();
                (SortBy::CreatedAt, SortDirection::Desc)
            }
            SearchSort::Bestseller => {
                filters.ids = self.ids.clone();
                (SortBy::Popularity, SortDirection::Desc)
            }
            SearchSort::Relevance => {
                filters.ids_order = self.ids.clone();
                (SortBy::Relevance, SortDirection::Asc)
            }
        };

        PageRequest {
            filters,
            cursor: self.cursor.clone(),
            limit: self.limit,
            sort_by,
            sort_order,
            ..Default::default()
        }
    }
}

/// Catalog search service / 目录搜索服务
#[derive(Debug, Clone)]
pub struct CatalogService<W = RawRows> {
    paginator: Paginator<W>,
}

impl<W: EntityWrapper> CatalogService<W> {
    pub fn new(paginator: Paginator<W>) -> Self {
        Self { paginator }
    }

    pub async fn search(&self, params: &SearchParams) -> Result<Page<W::Entity>> {
        self.paginator.cursor_paginate(&params.to_request()).await
    }

    /// Same as `search`, on a caller-owned connection or transaction
    pub async fn search_in(&self, conn: &mut SqliteConnection, params: &SearchParams) -> Result<Page<W::Entity>> {
        self.paginator.cursor_paginate_in(conn, &params.to_request()).await
    }
}
