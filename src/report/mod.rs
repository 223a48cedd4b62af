//! Aggregate queries over the stored tables.
//!
//! Metric columns only ever come from the [`Metric`] allow-list and every
//! user-supplied value (country, limits) is a bound parameter.

pub mod export;
pub mod table;

pub use export::export_trends;
pub use table::render_grid;

use crate::constants::DAILY_TRENDS_LIMIT;
use crate::db::{display_value, DatabaseManager};
use crate::error::{EtlError, Result};
use crate::metrics;
use crate::types::Metric;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::ToSql;
use tracing::{info, instrument};

/// One (date, value) observation for a single country
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: Option<i64>,
}

/// An aggregate attributed to one country
#[derive(Debug, Clone, PartialEq)]
pub struct CountryTotal {
    pub country: String,
    pub total: i64,
}

pub struct ReportQueries<'a> {
    db: &'a DatabaseManager,
}

impl<'a> ReportQueries<'a> {
    pub fn new(db: &'a DatabaseManager) -> Self {
        Self { db }
    }

    /// Sum of `total_cases` over every stored day for `country`
    #[instrument(skip(self))]
    pub fn total_cases_by_country(&self, country: &str) -> Result<Option<CountryTotal>> {
        metrics::record_report_query("total_cases");
        let rows = self.db.query_with_params(
            "SELECT country_name, SUM(total_cases) AS total_cases \
             FROM daily_cases WHERE country_name = ?1 GROUP BY country_name",
            &[&country],
        )?;
        info!("Total cases queried for {}", country);
        rows.rows.first().map(|row| country_total(row)).transpose()
    }

    /// First ten (date, metric) pairs for `country`, oldest first
    #[instrument(skip(self))]
    pub fn daily_trends(&self, country: &str, metric: Metric) -> Result<Vec<TrendPoint>> {
        metrics::record_report_query("daily_trends");
        let sql = format!(
            "SELECT report_date, {column} FROM {table} \
             WHERE country_name = ?1 ORDER BY report_date ASC LIMIT ?2",
            column = metric.column(),
            table = metric.table().name(),
        );
        let rows = self
            .db
            .query_with_params(&sql, &[&country, &DAILY_TRENDS_LIMIT])?;
        info!("Daily trends for {} in {} queried.", metric, country);
        rows.rows.iter().map(|row| trend_point(row)).collect()
    }

    /// Countries ranked by the sum of `metric`, largest first, at most `n`
    #[instrument(skip(self))]
    pub fn top_n_by_metric(&self, n: u32, metric: Metric) -> Result<Vec<CountryTotal>> {
        metrics::record_report_query("top_n");
        let sql = format!(
            "SELECT country_name, COALESCE(SUM({column}), 0) AS total FROM {table} \
             GROUP BY country_name ORDER BY total DESC, country_name ASC LIMIT ?1",
            column = metric.column(),
            table = metric.table().name(),
        );
        let rows = self.db.query_with_params(&sql, &[&n])?;
        info!("Top {} countries by {} queried.", n, metric);
        rows.rows.iter().map(|row| country_total(row)).collect()
    }

    /// The most recent `last_n` observations for `country`, oldest first
    #[instrument(skip(self))]
    pub fn recent_series(
        &self,
        country: &str,
        metric: Metric,
        last_n: u32,
    ) -> Result<Vec<TrendPoint>> {
        metrics::record_report_query("recent_series");
        let sql = format!(
            "SELECT report_date, {column} FROM {table} \
             WHERE country_name = ?1 ORDER BY report_date DESC LIMIT ?2",
            column = metric.column(),
            table = metric.table().name(),
        );
        let rows = self.db.query_with_params(&sql, &[&country, &last_n])?;
        let mut points = rows
            .rows
            .iter()
            .map(|row| trend_point(row))
            .collect::<Result<Vec<_>>>()?;
        points.reverse();
        Ok(points)
    }

    /// Largest stored `metric` per country, for the given countries
    #[instrument(skip(self))]
    pub fn country_peaks(&self, countries: &[String], metric: Metric) -> Result<Vec<CountryTotal>> {
        if countries.is_empty() {
            return Ok(Vec::new());
        }
        metrics::record_report_query("country_peaks");
        let placeholders = vec!["?"; countries.len()].join(", ");
        let sql = format!(
            "SELECT country_name, MAX({column}) AS total FROM {table} \
             WHERE country_name IN ({placeholders}) GROUP BY country_name \
             HAVING MAX({column}) IS NOT NULL ORDER BY country_name",
            column = metric.column(),
            table = metric.table().name(),
        );
        let params: Vec<&dyn ToSql> = countries.iter().map(|c| c as &dyn ToSql).collect();
        let rows = self.db.query_with_params(&sql, &params)?;
        rows.rows.iter().map(|row| country_total(row)).collect()
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Real(f) => Some(f.round() as i64),
        Value::Text(s) => s.trim().parse().ok(),
        Value::Null | Value::Blob(_) => None,
    }
}

fn column<'r>(row: &'r [Value], index: usize) -> Result<&'r Value> {
    row.get(index)
        .ok_or_else(|| EtlError::Decode(format!("result row has no column {index}")))
}

fn trend_point(row: &[Value]) -> Result<TrendPoint> {
    let raw_date = display_value(column(row, 0)?);
    let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|e| {
        EtlError::Decode(format!("stored report_date '{raw_date}' is invalid: {e}"))
    })?;
    Ok(TrendPoint {
        date,
        value: value_as_i64(column(row, 1)?),
    })
}

fn country_total(row: &[Value]) -> Result<CountryTotal> {
    Ok(CountryTotal {
        country: display_value(column(row, 0)?),
        total: value_as_i64(column(row, 1)?).unwrap_or(0),
    })
}
