//! SQL-level pagination over an arbitrary base query.
//!
//! # Responsibility
//! - Append ORDER BY and LIMIT/OFFSET to a caller-supplied SELECT.
//! - Count the full result with a wrapped `COUNT(*)` when paging.
//! - Derive page and item numbering from the cached counts.
//!
//! # Invariants
//! - Rows and the on-page count are dropped whenever an input that shapes
//!   them changes; the total is dropped when the target, SQL or params change.
//! - `page_num` is never below 1.
//! - Counts are only readable after `items()` ran for the current inputs.

use crate::db::{Params, Store};
use crate::error::{ModelError, ModelResult};
use crate::model::value::Value;
use crate::model::RawRow;
use crate::query::sort::Sort;
use log::{error, info};
use serde::Deserialize;
use std::time::Instant;

/// Paging options a host can load from its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PaginatorConfig {
    pub page_size: Option<u32>,
    pub page_num: u32,
    pub max_page_links: Option<u32>,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            page_size: None,
            page_num: 1,
            max_page_links: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Paginator {
    sort: Option<Sort>,
    page_size: Option<u32>,
    page_num: u32,
    max_page_links: Option<u32>,
    target: Option<String>,
    sql: Option<String>,
    params: Params,
    rows: Option<Vec<RawRow>>,
    rows_on_page: Option<u64>,
    total: Option<u64>,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new()
    }
}

impl Paginator {
    pub fn new() -> Self {
        Self {
            sort: None,
            page_size: None,
            page_num: 1,
            max_page_links: None,
            target: None,
            sql: None,
            params: Params::new(),
            rows: None,
            rows_on_page: None,
            total: None,
        }
    }

    pub fn with_sort(sort: Sort) -> Self {
        let mut paginator = Self::new();
        paginator.sort = Some(sort);
        paginator
    }

    pub fn from_config(config: &PaginatorConfig) -> Self {
        let mut paginator = Self::new();
        paginator.set_page_size(config.page_size);
        paginator.set_page_num(config.page_num);
        paginator.set_max_page_links(config.max_page_links);
        paginator
    }

    /// Names the database the base query runs against.
    pub fn set_target(&mut self, target: impl Into<String>) -> &mut Self {
        let target = target.into();
        if self.target.as_deref() != Some(target.as_str()) {
            self.clear_all();
            self.target = Some(target);
        }
        self
    }

    pub fn set_sql(&mut self, sql: impl Into<String>) -> &mut Self {
        let sql = sql.into();
        if self.sql.as_deref() != Some(sql.as_str()) {
            self.clear_all();
            self.sql = Some(sql);
        }
        self
    }

    pub fn set_params(&mut self, params: Params) -> &mut Self {
        if self.params != params {
            self.clear_all();
            self.params = params;
        }
        self
    }

    /// Replaces the sort; the cached total is dropped along with the page.
    pub fn set_sort(&mut self, sort: Option<Sort>) -> &mut Self {
        self.sort = sort;
        self.clear_all();
        self
    }

    pub fn set_page_size(&mut self, page_size: Option<u32>) -> &mut Self {
        self.page_size = page_size;
        self.clear_page();
        self
    }

    /// Selects the 1-based page; values below 1 select the first page.
    pub fn set_page_num(&mut self, page_num: u32) -> &mut Self {
        self.page_num = page_num.max(1);
        self.clear_page();
        self
    }

    pub fn set_max_page_links(&mut self, max_page_links: Option<u32>) -> &mut Self {
        self.max_page_links = max_page_links;
        self
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }

    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    pub fn max_page_links(&self) -> Option<u32> {
        self.max_page_links
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Rows of the current page, querying `store` on the first call.
    ///
    /// With a page size, the total comes from a `COUNT(*)` over the base
    /// query; without one, every row is fetched and counted.
    ///
    /// # Errors
    /// - `Config` when no SQL was set.
    /// - `Db` when the store rejects a query.
    pub fn items(&mut self, store: &dyn Store) -> ModelResult<&[RawRow]> {
        if self.rows.is_none() {
            let started_at = Instant::now();
            match self.run(store) {
                Ok(()) => info!(
                    "event=paginator_query module=query status=ok rows={} total={} page={} duration_ms={}",
                    self.rows_on_page.unwrap_or(0),
                    self.total.unwrap_or(0),
                    self.page_num,
                    started_at.elapsed().as_millis()
                ),
                Err(err) => {
                    error!(
                        "event=paginator_query module=query status=error page={} duration_ms={} error={}",
                        self.page_num,
                        started_at.elapsed().as_millis(),
                        err
                    );
                    return Err(err);
                }
            }
        }
        Ok(self.rows.as_deref().unwrap_or_default())
    }

    fn run(&mut self, store: &dyn Store) -> ModelResult<()> {
        let sql = self.paginated_sql()?;
        if self.page_size.is_some() && self.total.is_none() {
            let count = store.fetch_scalar(&self.count_sql()?, &self.params)?;
            self.total = Some(count_value(&count)?);
        }

        let rows = store.fetch_all(&sql, &self.params)?;
        let on_page = rows.len() as u64;
        if self.page_size.is_none() {
            self.total = Some(on_page);
        }
        self.rows_on_page = Some(on_page);
        self.rows = Some(rows);
        Ok(())
    }

    /// Total rows matched by the base query.
    ///
    /// # Errors
    /// - `State` before `items()` ran for the current inputs.
    pub fn total(&self) -> ModelResult<u64> {
        self.total
            .ok_or_else(|| ModelError::state("total not available before items() runs"))
    }

    pub fn rows_on_page(&self) -> ModelResult<u64> {
        self.rows_on_page
            .ok_or_else(|| ModelError::state("rows on page not available before items() runs"))
    }

    /// Number of pages, at least 1.
    pub fn page_count(&self) -> ModelResult<u64> {
        let total = self.total()?;
        match self.page_size {
            Some(size) if size > 0 && total > 0 => Ok(total.div_ceil(u64::from(size))),
            _ => Ok(1),
        }
    }

    /// 1-based number of the first row on this page, 0 when nothing matched.
    pub fn first_item_num(&self) -> ModelResult<u64> {
        if self.total()? == 0 {
            return Ok(0);
        }
        let size = u64::from(self.page_size.unwrap_or(0));
        Ok(u64::from(self.page_num - 1) * size + 1)
    }

    pub fn last_item_num(&self) -> ModelResult<u64> {
        if self.total()? == 0 {
            return Ok(0);
        }
        Ok((self.first_item_num()? + self.rows_on_page()?).saturating_sub(1))
    }

    /// First page of the link window containing the current page.
    pub fn first_page_link_num(&self) -> u64 {
        match self.max_page_links {
            Some(links) if links > 0 => {
                let links = u64::from(links);
                let windows_before = u64::from(self.page_num).div_ceil(links) - 1;
                windows_before * links + 1
            }
            _ => 1,
        }
    }

    /// Last page of the link window, capped at the page count.
    pub fn last_page_link_num(&self) -> ModelResult<u64> {
        let page_count = self.page_count()?;
        match self.max_page_links {
            Some(links) if links > 0 => {
                Ok((self.first_page_link_num() + u64::from(links) - 1).min(page_count))
            }
            _ => Ok(page_count),
        }
    }

    pub fn sort_sql(&self) -> String {
        self.sort.as_ref().map(Sort::compile).unwrap_or_default()
    }

    /// `LIMIT n`, with `OFFSET` from the second page on; empty without a page size.
    pub fn limit_sql(&self) -> String {
        match self.page_size {
            Some(size) if self.page_num > 1 => format!(
                "LIMIT {size} OFFSET {}",
                u64::from(self.page_num - 1) * u64::from(size)
            ),
            Some(size) => format!("LIMIT {size}"),
            None => String::new(),
        }
    }

    pub fn count_sql(&self) -> ModelResult<String> {
        Ok(format!("SELECT COUNT(*) FROM ({}) AS t", self.base_sql()?))
    }

    /// Base query with the sort and limit clauses appended.
    pub fn paginated_sql(&self) -> ModelResult<String> {
        let mut sql = self.base_sql()?.to_string();
        for clause in [self.sort_sql(), self.limit_sql()] {
            if !clause.is_empty() {
                sql.push(' ');
                sql.push_str(&clause);
            }
        }
        Ok(sql)
    }

    fn base_sql(&self) -> ModelResult<&str> {
        self.sql
            .as_deref()
            .filter(|sql| !sql.trim().is_empty())
            .ok_or_else(|| ModelError::config("SQL not set"))
    }

    fn clear_page(&mut self) {
        self.rows = None;
        self.rows_on_page = None;
    }

    fn clear_all(&mut self) {
        self.clear_page();
        self.total = None;
    }
}

fn count_value(value: &Value) -> ModelResult<u64> {
    let count = match value {
        Value::Integer(v) => Some(*v),
        Value::Text(v) => v.trim().parse::<i64>().ok(),
        _ => None,
    };
    count
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| ModelError::state(format!("count query returned `{value}`")))
}
