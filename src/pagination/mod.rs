//! Cursor (keyset) pagination over the catalog / 目录游标分页
//!
//! Components, leaves first:
//! - `filter`: facet map -> composable predicate
//! - `cursor`: opaque boundary tokens
//! - `sort`: field ordering or caller-supplied relevance ordering
//! - `engine`: one bounded fetch per call, page envelope
//!
//! Call direction: service -> engine -> (filter, cursor, sort) -> store

pub mod cursor;
pub mod engine;
pub mod filter;
pub mod sort;

pub use cursor::{Boundary, CursorCodec};
pub use engine::{EntityWrapper, Page, PageInfo, PageOptions, PageRequest, Paginator, RawRows, WrapWith};
pub use filter::{CompiledFilter, FacetMap, FilterCompiler, PriceTier};
pub use sort::{FieldSort, RelevanceSort, SortStrategy};
