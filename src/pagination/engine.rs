//! Page assembly / 分页查询执行
//!
//! One call = one bounded fetch of `limit + 1` rows (plus an optional COUNT
//! when the caller asks for a total). Nothing is cached between calls; the
//! position lives entirely in the cursor token.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::cursor::{Boundary, CursorCodec};
use super::filter::{CompiledFilter, FacetMap, FilterCompiler, WhereClause};
use super::sort::{RankedRow, SortStrategy};
use crate::config::PaginationConfig;
use crate::error::{PagerError, Result};
use crate::models::{CatalogItem, SortBy, SortDirection};

const ITEM_COLUMNS: &str =
    "c.id, c.name, c.created_at, c.popularity, c.price, c.set_id, c.style_id, c.user_id, c.is_active, c.is_deleted";

/// Page metadata / 分页信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    /// Only filled when `include_total_count` was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
}

/// One page of results / 一页结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub results: Vec<T>,
    pub page_info: PageInfo,
}

impl<T> Page<T> {
    pub fn empty(has_previous_page: bool, total_count: Option<i64>) -> Self {
        Self {
            results: Vec::new(),
            page_info: PageInfo {
                has_next_page: false,
                has_previous_page,
                start_cursor: None,
                end_cursor: None,
                total_count,
            },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            results: self.results.into_iter().map(f).collect(),
            page_info: self.page_info,
        }
    }
}

/// Turns raw rows into the caller's entity type / 实体包装
pub trait EntityWrapper: Send + Sync {
    type Entity;

    fn wrap(&self, item: CatalogItem) -> Self::Entity;
}

/// Identity wrapper: pages of plain `CatalogItem`s
#[derive(Debug, Clone, Copy, Default)]
pub struct RawRows;

impl EntityWrapper for RawRows {
    type Entity = CatalogItem;

    fn wrap(&self, item: CatalogItem) -> CatalogItem {
        item
    }
}

/// Adapts a closure into an `EntityWrapper`
#[derive(Debug, Clone, Copy)]
pub struct WrapWith<F>(pub F);

impl<F, T> EntityWrapper for WrapWith<F>
where
    F: Fn(CatalogItem) -> T + Send + Sync,
{
    type Entity = T;

    fn wrap(&self, item: CatalogItem) -> T {
        (self.0)(item)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOptions {
    pub include_total_count: bool,
}

/// Arguments of one pagination call / 分页请求
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    pub filters: FacetMap,
    /// `None` means first page
    pub cursor: Option<String>,
    /// `None` means the configured default
    pub limit: Option<i64>,
    pub sort_by: SortBy,
    /// Ignored in relevance mode
    pub sort_order: SortDirection,
    pub options: PageOptions,
}

impl PageRequest {
    pub fn new(filters: FacetMap) -> Self {
        Self { filters, ..Default::default() }
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sorted(mut self, sort_by: SortBy, sort_order: SortDirection) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self
    }

    pub fn include_total_count(mut self, enabled: bool) -> Self {
        self.options.include_total_count = enabled;
        self
    }
}

/// Keyset pagination engine / 游标分页引擎
#[derive(Debug, Clone)]
pub struct Paginator<W = RawRows> {
    pool: SqlitePool,
    config: PaginationConfig,
    wrapper: W,
}

impl Paginator<RawRows> {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_config(pool, PaginationConfig::default())
    }

    pub fn with_config(pool: SqlitePool, config: PaginationConfig) -> Self {
        Self { pool, config, wrapper: RawRows }
    }

    /// Use the pagination section of the global config
    pub fn from_global_config(pool: SqlitePool) -> Self {
        Self::with_config(pool, crate::config::config().pagination)
    }
}

impl<W: EntityWrapper> Paginator<W> {
    pub fn with_wrapper<V: EntityWrapper>(self, wrapper: V) -> Paginator<V> {
        Paginator { pool: self.pool, config: self.config, wrapper }
    }

    /// `None` -> default, `<= 0` -> error, above the cap -> cap
    pub fn resolve_limit(&self, limit: Option<i64>) -> Result<i64> {
        let max = self.config.effective_max_limit();
        match limit {
            None => Ok(self.config.default_limit.clamp(1, max)),
            Some(l) if l <= 0 => Err(PagerError::validation(format!("limit must be positive, got {}", l))),
            Some(l) => Ok(l.min(max)),
        }
    }

    /// Paginate on a pooled connection / 使用连接池执行分页
    pub async fn cursor_paginate(&self, req: &PageRequest) -> Result<Page<W::Entity>> {
        let mut conn = self.pool.acquire().await?;
        self.cursor_paginate_in(&mut *conn, req).await
    }

    /// Paginate on a caller-owned connection or transaction (`&mut *tx`)
    pub async fn cursor_paginate_in(&self, conn: &mut SqliteConnection, req: &PageRequest) -> Result<Page<W::Entity>> {
        let filter = FilterCompiler::compile(&req.filters);
        let strategy = SortStrategy::resolve(req.sort_by, req.sort_order, &filter)?;
        let codec = CursorCodec::new(&format!("{}|{}", filter.scope_key(strategy.mode()), strategy.scope_key()));

        let boundary = match req.cursor.as_deref() {
            Some(token) => {
                let decoded = codec
                    .decode(token, strategy.mode())
                    .and_then(|b| strategy.check_boundary(b));
                if let Err(e) = &decoded {
                    tracing::warn!("Rejected cursor for {} mode: {}", strategy.mode(), e);
                }
                Some(decoded?)
            }
            None => None,
        };
        let limit = self.resolve_limit(req.limit)?;
        let has_previous_page = req.cursor.is_some();

        if strategy.is_trivially_empty() {
            tracing::debug!("Empty relevance ranking, skipping fetch");
            let total = req.options.include_total_count.then_some(0);
            return Ok(Page::empty(has_previous_page, total));
        }

        let mut qb = build_select(&filter, &strategy, boundary.as_ref(), limit + 1);
        let mut rows: Vec<RankedRow> = qb.build_query_as::<RankedRow>().fetch_all(&mut *conn).await?;

        let has_next_page = rows.len() as i64 > limit;
        rows.truncate(limit as usize);

        let start_cursor = rows.first().map(|row| codec.encode(&strategy.boundary_of(row)));
        let end_cursor = rows.last().map(|row| codec.encode(&strategy.boundary_of(row)));

        let total_count = if req.options.include_total_count {
            Some(count_matching(conn, &filter, &strategy).await?)
        } else {
            None
        };

        tracing::debug!(
            "Page fetched: mode={}, limit={}, rows={}, has_next={}, has_prev={}",
            strategy.mode(),
            limit,
            rows.len(),
            has_next_page,
            has_previous_page
        );

        let page = Page {
            results: rows,
            page_info: PageInfo {
                has_next_page,
                has_previous_page,
                start_cursor,
                end_cursor,
                total_count,
            },
        };
        Ok(page.map(|row| self.wrapper.wrap(row.item)))
    }
}

fn build_select<'args>(
    filter: &CompiledFilter,
    strategy: &SortStrategy,
    boundary: Option<&Boundary>,
    fetch: i64,
) -> QueryBuilder<'args, Sqlite> {
    let mut qb = QueryBuilder::new("");
    strategy.push_prelude(&mut qb);
    qb.push(format!("SELECT {}, {} AS rank_pos FROM catalog_items c", ITEM_COLUMNS, strategy.rank_column()));
    strategy.push_join(&mut qb);

    let mut w = WhereClause::new(&mut qb);
    filter.push_conditions(&mut w, strategy.needs_id_restriction());
    if let Some(b) = boundary {
        strategy.push_boundary(&mut w, b);
    }

    strategy.push_order_by(&mut qb);
    qb.push(" LIMIT ").push_bind(fetch);
    qb
}

/// Rows matching the filters, ignoring the cursor boundary
async fn count_matching(conn: &mut SqliteConnection, filter: &CompiledFilter, strategy: &SortStrategy) -> Result<i64> {
    let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("");
    strategy.push_prelude(&mut qb);
    qb.push("SELECT COUNT(*) FROM catalog_items c");
    strategy.push_join(&mut qb);
    let mut w = WhereClause::new(&mut qb);
    filter.push_conditions(&mut w, strategy.needs_id_restriction());

    let (total,): (i64,) = qb.build_query_as::<(i64,)>().fetch_one(&mut *conn).await?;
    Ok(total)
}
