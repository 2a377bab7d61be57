//! Facet filters / 过滤条件编译
//!
//! A `FacetMap` is the caller-facing bag of optional facets. `FilterCompiler`
//! turns it into a `CompiledFilter`: a closed list of typed `Facet`s plus an
//! optional identifier allow-list. Nothing here talks to the database; the
//! compiled filter only knows how to append its predicate to a query builder.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};

use crate::error::{PagerError, Result};
use crate::models::CursorMode;

/// Price tier facet / 价格档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Free,
    Premium,
    All,
}

/// Caller-supplied facets; unknown keys are rejected / 过滤参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FacetMap {
    pub price: Option<PriceTier>,
    pub tag_ids: Option<Vec<i64>>,
    pub style_id: Option<i64>,
    pub user_id: Option<i64>,
    pub set_id: Option<i64>,
    pub family_id: Option<i64>,
    pub search_term: Option<String>,
    /// Unordered identifier allow-list
    pub ids: Option<Vec<i64>>,
    /// Ordered identifier list; wins over `ids` when both are present
    pub ids_order: Option<Vec<i64>>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

impl FacetMap {
    /// Parse a JSON object of facets / 从JSON解析过滤参数
    pub fn from_json(value: Value) -> Result<Self> {
        if !value.is_object() && !value.is_null() {
            return Err(PagerError::validation("filters must be an object"));
        }
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| PagerError::validation(format!("invalid filters: {}", e)))
    }
}

/// One compiled facet. Each variant compiles to exactly one SQL condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "facet", content = "value", rename_all = "camelCase")]
pub enum Facet {
    Free,
    Premium,
    /// Membership in at least one tag
    AnyTag(Vec<i64>),
    Style(i64),
    User(i64),
    Set(i64),
    /// item -> owning set -> family
    Family(i64),
    /// Substring of the name; holds the lowercased term
    NameContains(String),
    Active(bool),
    Deleted(bool),
}

impl Facet {
    fn push_condition(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Facet::Free => {
                qb.push("c.price = 0");
            }
            Facet::Premium => {
                qb.push("c.price > 0");
            }
            Facet::AnyTag(tag_ids) => {
                qb.push("EXISTS (SELECT 1 FROM catalog_item_tags t WHERE t.item_id = c.id AND t.tag_id IN (SELECT value FROM json_each(");
                qb.push_bind(json_array(tag_ids));
                qb.push(")))");
            }
            Facet::Style(id) => {
                qb.push("c.style_id = ").push_bind(*id);
            }
            Facet::User(id) => {
                qb.push("c.user_id = ").push_bind(*id);
            }
            Facet::Set(id) => {
                qb.push("c.set_id = ").push_bind(*id);
            }
            Facet::Family(id) => {
                qb.push("c.set_id IN (SELECT s.id FROM catalog_sets s WHERE s.family_id = ");
                qb.push_bind(*id);
                qb.push(")");
            }
            Facet::NameContains(term) => {
                qb.push("c.name_lower LIKE ");
                qb.push_bind(like_pattern(term));
                qb.push(" ESCAPE '\\'");
            }
            Facet::Active(active) => {
                qb.push("c.is_active = ").push_bind(*active);
            }
            Facet::Deleted(deleted) => {
                qb.push("c.is_deleted = ").push_bind(*deleted);
            }
        }
    }
}

/// Identifier allow-list / 标识符白名单
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AllowList {
    Unordered(Vec<i64>),
    Ordered(Vec<i64>),
}

impl AllowList {
    pub fn ids(&self) -> &[i64] {
        match self {
            AllowList::Unordered(ids) | AllowList::Ordered(ids) => ids,
        }
    }
}

/// Conjunction of facets, ready to be appended to a WHERE clause
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    pub facets: Vec<Facet>,
    pub allow_list: Option<AllowList>,
}

impl CompiledFilter {
    /// Caller-ordered identifiers, if any
    pub fn ordered_ids(&self) -> Option<&[i64]> {
        match &self.allow_list {
            Some(AllowList::Ordered(ids)) => Some(ids),
            _ => None,
        }
    }

    /// Append every facet as an AND-ed condition.
    ///
    /// `restrict_ids` controls whether the allow-list is emitted as `c.id IN (...)`;
    /// relevance mode joins the ordered list instead.
    pub fn push_conditions(&self, w: &mut WhereClause<'_, '_>, restrict_ids: bool) {
        for facet in &self.facets {
            facet.push_condition(w.and());
        }
        if restrict_ids {
            if let Some(list) = &self.allow_list {
                let qb = w.and();
                qb.push("c.id IN (SELECT value FROM json_each(");
                qb.push_bind(json_array(list.ids()));
                qb.push("))");
            }
        }
    }

    /// Stable description of the result universe, used to scope cursors.
    ///
    /// In relevance mode the ordered list content is left out: the cursor holds
    /// a position in it and replaying the same list is the caller's job. In
    /// field mode the list is a plain allow-list and is scoped like `ids`.
    pub fn scope_key(&self, mode: CursorMode) -> String {
        let allow = match (&self.allow_list, mode) {
            (None, _) => Value::Null,
            (Some(AllowList::Unordered(ids)), _) => serde_json::json!({ "ids": ids }),
            (Some(AllowList::Ordered(_)), CursorMode::Relevance) => Value::String("idsOrder".to_string()),
            (Some(AllowList::Ordered(ids)), CursorMode::Field) => serde_json::json!({ "idsOrder": ids }),
        };
        serde_json::json!({ "facets": self.facets, "allow": allow }).to_string()
    }
}

/// Incremental `WHERE a AND b AND ...` writer over a query builder
pub struct WhereClause<'q, 'args> {
    qb: &'q mut QueryBuilder<'args, Sqlite>,
    started: bool,
}

impl<'q, 'args> WhereClause<'q, 'args> {
    pub fn new(qb: &'q mut QueryBuilder<'args, Sqlite>) -> Self {
        Self { qb, started: false }
    }

    /// Start the next condition and hand back the builder to write it
    pub fn and(&mut self) -> &mut QueryBuilder<'args, Sqlite> {
        if self.started {
            self.qb.push(" AND ");
        } else {
            self.qb.push(" WHERE ");
            self.started = true;
        }
        &mut *self.qb
    }
}

/// Compiles facet maps / 过滤条件编译器
pub struct FilterCompiler;

impl FilterCompiler {
    pub fn compile(map: &FacetMap) -> CompiledFilter {
        let mut facets = Vec::new();

        match map.price {
            Some(PriceTier::Free) => facets.push(Facet::Free),
            Some(PriceTier::Premium) => facets.push(Facet::Premium),
            Some(PriceTier::All) | None => {}
        }

        if let Some(tag_ids) = &map.tag_ids {
            if !tag_ids.is_empty() {
                facets.push(Facet::AnyTag(tag_ids.clone()));
            }
        }

        if let Some(id) = map.style_id {
            facets.push(Facet::Style(id));
        }
        if let Some(id) = map.user_id {
            facets.push(Facet::User(id));
        }
        if let Some(id) = map.set_id {
            facets.push(Facet::Set(id));
        }
        if let Some(id) = map.family_id {
            facets.push(Facet::Family(id));
        }

        if let Some(term) = &map.search_term {
            let term = term.trim();
            if !term.is_empty() {
                facets.push(Facet::NameContains(term.to_lowercase()));
            }
        }

        facets.push(Facet::Active(map.is_active.unwrap_or(true)));
        facets.push(Facet::Deleted(map.is_deleted.unwrap_or(false)));

        let allow_list = match (&map.ids_order, &map.ids) {
            (Some(ordered), _) => Some(AllowList::Ordered(ordered.clone())),
            (None, Some(ids)) => Some(AllowList::Unordered(ids.clone())),
            (None, None) => None,
        };

        CompiledFilter { facets, allow_list }
    }

    /// Parse and compile a raw JSON facet object
    pub fn compile_json(value: Value) -> Result<CompiledFilter> {
        let map = FacetMap::from_json(value)?;
        Ok(Self::compile(&map))
    }
}

fn json_array(ids: &[i64]) -> String {
    Value::from(ids.to_vec()).to_string()
}

/// `%term%` with LIKE wildcards escaped
fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn where_sql(filter: &CompiledFilter, restrict_ids: bool) -> String {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT c.id FROM catalog_items c");
        let mut w = WhereClause::new(&mut qb);
        filter.push_conditions(&mut w, restrict_ids);
        qb.sql().to_string()
    }

    #[test]
    fn test_defaults_active_not_deleted() {
        let filter = FilterCompiler::compile(&FacetMap::default());
        assert_eq!(filter.facets, vec![Facet::Active(true), Facet::Deleted(false)]);
        assert!(filter.allow_list.is_none());
    }

    #[test]
    fn test_price_tiers() {
        let free = FilterCompiler::compile_json(json!({ "price": "free" })).unwrap();
        assert!(free.facets.contains(&Facet::Free));

        let premium = FilterCompiler::compile_json(json!({ "price": "premium" })).unwrap();
        assert!(premium.facets.contains(&Facet::Premium));

        let all = FilterCompiler::compile_json(json!({ "price": "all" })).unwrap();
        assert_eq!(all.facets.len(), 2);
    }

    #[test]
    fn test_unknown_facet_rejected() {
        let err = FilterCompiler::compile_json(json!({ "styleid": 3 })).unwrap_err();
        assert!(err.is_validation());

        let err = FilterCompiler::compile_json(json!({ "price": "cheap" })).unwrap_err();
        assert!(err.is_validation());

        let err = FilterCompiler::compile_json(json!([1, 2])).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_ordered_ids_win_over_unordered() {
        let filter = FilterCompiler::compile_json(json!({ "ids": [1, 2], "idsOrder": [9, 8] })).unwrap();
        assert_eq!(filter.allow_list, Some(AllowList::Ordered(vec![9, 8])));
        assert_eq!(filter.ordered_ids(), Some(&[9, 8][..]));
    }

    #[test]
    fn test_overrides_and_blank_inputs() {
        let filter = FilterCompiler::compile_json(json!({
            "isActive": false,
            "isDeleted": true,
            "searchTerm": "   ",
            "tagIds": []
        }))
        .unwrap();
        assert_eq!(filter.facets, vec![Facet::Active(false), Facet::Deleted(true)]);
    }

    #[test]
    fn test_where_clause_sql() {
        let filter = FilterCompiler::compile_json(json!({
            "familyId": 4,
            "tagIds": [1, 2],
            "searchTerm": "arrow",
            "ids": [5]
        }))
        .unwrap();

        let sql = where_sql(&filter, true);
        assert!(sql.contains(" WHERE EXISTS (SELECT 1 FROM catalog_item_tags"));
        assert!(sql.contains("s.family_id = ?"));
        assert!(sql.contains("c.name_lower LIKE ? ESCAPE"));
        assert!(sql.contains("c.is_active = ? AND c.is_deleted = ?"));
        assert!(sql.ends_with("c.id IN (SELECT value FROM json_each(?))"));

        let sql = where_sql(&filter, false);
        assert!(!sql.contains("c.id IN"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("icon"), "%icon%");
    }

    #[test]
    fn test_search_term_is_lowercased() {
        let filter = FilterCompiler::compile_json(json!({ "searchTerm": "  ÉCLAIR Icon " })).unwrap();
        assert!(filter.facets.contains(&Facet::NameContains("éclair icon".to_string())));
    }

    #[test]
    fn test_scope_key_ordered_content_only_ignored_for_relevance() {
        let a = FilterCompiler::compile_json(json!({ "idsOrder": [1, 2, 3] })).unwrap();
        let b = FilterCompiler::compile_json(json!({ "idsOrder": [3] })).unwrap();
        assert_eq!(a.scope_key(CursorMode::Relevance), b.scope_key(CursorMode::Relevance));
        assert_ne!(a.scope_key(CursorMode::Field), b.scope_key(CursorMode::Field));

        let c = FilterCompiler::compile_json(json!({ "ids": [1] })).unwrap();
        let d = FilterCompiler::compile_json(json!({ "ids": [2] })).unwrap();
        assert_ne!(c.scope_key(CursorMode::Field), d.scope_key(CursorMode::Field));
        assert_ne!(c.scope_key(CursorMode::Relevance), d.scope_key(CursorMode::Relevance));
    }
}
