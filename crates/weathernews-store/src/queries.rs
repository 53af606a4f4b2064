//! Query builder for cached forecasts.
//!
//! # Example
//!
//! ```
//! use weathernews_store::{ForecastQuery, Store};
//! use weathernews_types::dates;
//!
//! let store = Store::open_in_memory()?;
//! let today = dates::today_utc();
//!
//! // The next seven days, soonest first
//! let week = ForecastQuery::new().since(today).limit(7);
//! let summaries = store.query(&week)?;
//! assert!(summaries.is_empty());
//! # Ok::<(), weathernews_store::Error>(())
//! ```

use time::Date;
use weathernews_types::dates;

/// Fluent query builder for forecast summaries.
///
/// Use this to construct queries for [`Store::query`](crate::Store::query).
/// By default results are ordered by date ascending (soonest first), which
/// is the order list displays want.
#[derive(Debug, Default, Clone)]
pub struct ForecastQuery {
    /// Include only days on or after this date.
    pub since: Option<Date>,
    /// Include only days on or before this date.
    pub until: Option<Date>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Order by date descending.
    pub newest_first: bool,
}

impl ForecastQuery {
    /// Create a new query: no date filter, no limit, ascending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter to days on or after `date`.
    pub fn since(mut self, date: Date) -> Self {
        self.since = Some(date);
        self
    }

    /// Filter to days on or before `date`.
    pub fn until(mut self, date: Date) -> Self {
        self.until = Some(date);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Order results latest day first.
    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<i64>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(since) = self.since {
            conditions.push("date >= ?");
            params.push(dates::to_timestamp(since));
        }

        if let Some(until) = self.until {
            conditions.push("date <= ?");
            params.push(dates::to_timestamp(until));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query for the summary projection.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT id, condition_id, date, min_temp, max_temp \
             FROM forecasts {} ORDER BY date {}",
            where_clause, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }
}
