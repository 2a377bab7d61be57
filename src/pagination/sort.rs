//! Sort strategies / 排序策略
//!
//! Two orderings share one interface: a stored column with an id tie-break,
//! or the position of each id inside a caller-supplied ranking. Each variant
//! owns its ORDER BY, its boundary predicate and the boundary it mints for a
//! row, so a new mode cannot be added without all three.

use sqlx::{QueryBuilder, Sqlite};

use super::cursor::Boundary;
use super::filter::{CompiledFilter, WhereClause};
use crate::error::{PagerError, Result};
use crate::models::{CatalogItem, CursorMode, SortBy, SortDirection, SortField};

/// Fetched row plus its relevance position (always 0 in field mode)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RankedRow {
    #[sqlx(flatten)]
    pub item: CatalogItem,
    pub rank_pos: i64,
}

/// Order by a stored column, then by id / 按字段排序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSort {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Order by position in an external ranking / 按外部相关性排序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceSort {
    pub ordered_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortStrategy {
    Field(FieldSort),
    Relevance(RelevanceSort),
}

impl SortStrategy {
    /// Pick the strategy for a request. Relevance takes its ranking from `idsOrder`.
    pub fn resolve(sort_by: SortBy, direction: SortDirection, filter: &CompiledFilter) -> Result<Self> {
        match sort_by.field() {
            Some(field) => Ok(SortStrategy::Field(FieldSort { field, direction })),
            None => {
                let ordered_ids = filter
                    .ordered_ids()
                    .ok_or_else(|| PagerError::validation("sortBy 'relevance' requires an idsOrder list"))?;
                Ok(SortStrategy::Relevance(RelevanceSort { ordered_ids: ordered_ids.to_vec() }))
            }
        }
    }

    pub fn mode(&self) -> CursorMode {
        match self {
            SortStrategy::Field(_) => CursorMode::Field,
            SortStrategy::Relevance(_) => CursorMode::Relevance,
        }
    }

    /// Stable description of the ordering, part of the cursor scope
    pub fn scope_key(&self) -> String {
        match self {
            SortStrategy::Field(s) => format!("field:{}:{}", s.field.column(), s.direction.sql()),
            SortStrategy::Relevance(_) => "relevance".to_string(),
        }
    }

    /// True when the result universe is empty before touching the store
    pub fn is_trivially_empty(&self) -> bool {
        matches!(self, SortStrategy::Relevance(r) if r.ordered_ids.is_empty())
    }

    /// Reject a decoded boundary that belongs to another ordering
    pub fn check_boundary(&self, boundary: Boundary) -> Result<Boundary> {
        match (self, boundary) {
            (SortStrategy::Field(s), Boundary::Field { field, direction, .. }) => {
                if s.field != field || s.direction != direction {
                    return Err(PagerError::invalid_cursor("cursor minted for a different sort"));
                }
                Ok(boundary)
            }
            (SortStrategy::Relevance(_), Boundary::Relevance { .. }) => Ok(boundary),
            _ => Err(PagerError::invalid_cursor("cursor mode does not match sort mode")),
        }
    }

    /// Leading CTE mapping id -> first position in the ranking
    pub fn push_prelude(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let SortStrategy::Relevance(r) = self {
            qb.push("WITH ranked(id, pos) AS (SELECT value, MIN(key) FROM json_each(");
            qb.push_bind(serde_json::Value::from(r.ordered_ids.clone()).to_string());
            qb.push(") GROUP BY value) ");
        }
    }

    pub fn rank_column(&self) -> &'static str {
        match self {
            SortStrategy::Field(_) => "0",
            SortStrategy::Relevance(_) => "r.pos",
        }
    }

    /// Relevance mode restricts the universe to the ranked ids via an inner join
    pub fn push_join(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let SortStrategy::Relevance(_) = self {
            qb.push(" JOIN ranked r ON r.id = c.id");
        }
    }

    /// Whether the filter's allow-list still has to be applied as `c.id IN (...)`
    pub fn needs_id_restriction(&self) -> bool {
        matches!(self, SortStrategy::Field(_))
    }

    /// Rows strictly after the boundary
    pub fn push_boundary(&self, w: &mut WhereClause<'_, '_>, boundary: &Boundary) {
        match (self, boundary) {
            (SortStrategy::Field(s), Boundary::Field { value, id, .. }) => {
                let qb = w.and();
                qb.push("(");
                qb.push(s.field.column());
                qb.push(", c.id) ");
                qb.push(s.direction.after_op());
                qb.push(" (");
                qb.push_bind(*value);
                qb.push(", ");
                qb.push_bind(*id);
                qb.push(")");
            }
            (SortStrategy::Relevance(_), Boundary::Relevance { position }) => {
                w.and().push("r.pos > ").push_bind(*position);
            }
            // check_boundary rules this out before query building
            _ => {}
        }
    }

    pub fn push_order_by(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            SortStrategy::Field(s) => {
                let dir = s.direction.sql();
                qb.push(format!(" ORDER BY {} {}, c.id {}", s.field.column(), dir, dir));
            }
            SortStrategy::Relevance(_) => {
                qb.push(" ORDER BY r.pos ASC");
            }
        }
    }

    /// Boundary minted for a fetched row
    pub fn boundary_of(&self, row: &RankedRow) -> Boundary {
        match self {
            SortStrategy::Field(s) => Boundary::Field {
                field: s.field,
                direction: s.direction,
                value: s.field.value_of(&row.item),
                id: row.item.id,
            },
            SortStrategy::Relevance(_) => Boundary::Relevance { position: row.rank_pos },
        }
    }
}
