pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod service;

pub use error::{PagerError, Result};
pub use models::{CatalogItem, SortBy, SortDirection, SortField};
pub use pagination::{FacetMap, Page, PageInfo, PageRequest, Paginator};
pub use service::{CatalogService, SearchParams, SearchSort};
