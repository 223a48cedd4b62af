use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use std::path::Path;
use tracing::{error, info, warn};

use crate::constants::{DASHBOARD_MAX_DAYS, DASHBOARD_MIN_DAYS};
use crate::dashboard::models::{
    chart_options, chart_traces, choropleth_trace, country_options, metric_options, script_json,
    series_csv, summarize, DashboardParams, DashboardQuery, SeriesRow,
};
use crate::dashboard::templates::DashboardTemplate;
use crate::dashboard::AppState;
use crate::db::DatabaseManager;
use crate::error::Result;
use crate::metrics;
use crate::report::{CountryTotal, ReportQueries};

pub const DOWNLOAD_FILE_NAME: &str = "healthcare_dashboard.csv";

#[derive(Debug, Default)]
struct DashboardData {
    rows: Vec<SeriesRow>,
    peaks: Vec<CountryTotal>,
}

/// One connection per render; closed before returning
fn load_dashboard_data(db_path: &Path, query: &DashboardQuery) -> Result<DashboardData> {
    let mut db = DatabaseManager::open_existing(db_path)?;
    let data = {
        let queries = ReportQueries::new(&db);
        let mut rows = Vec::new();
        for country in &query.countries {
            let points = queries.recent_series(country, query.metric, query.days)?;
            rows.extend(points.into_iter().map(|p| SeriesRow {
                date: p.date,
                country: country.clone(),
                value: p.value,
            }));
        }
        let peaks = if query.wants_map() {
            queries.country_peaks(&query.countries, query.metric)?
        } else {
            Vec::new()
        };
        DashboardData { rows, peaks }
    };
    if let Err(e) = db.close() {
        warn!("Failed to close dashboard connection: {}", e);
    }
    Ok(data)
}

async fn fetch_data(state: &AppState, query: &DashboardQuery) -> Result<DashboardData> {
    let db_path = state.config.database.path.clone();
    let query = query.clone();
    tokio::task::spawn_blocking(move || load_dashboard_data(&db_path, &query)).await?
}

pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Response {
    let query = DashboardQuery::from_params(&params);
    for warning in &query.warnings {
        warn!("{}", warning);
    }

    let (data, failure) = if query.countries.is_empty() {
        (DashboardData::default(), None)
    } else {
        match fetch_data(&state, &query).await {
            Ok(data) => (data, None),
            Err(e) => {
                error!("Dashboard query failed: {}", e);
                (DashboardData::default(), Some(format!("Error loading data: {}", e)))
            }
        }
    };

    let template = DashboardTemplate {
        countries: country_options(&query),
        metrics: metric_options(&query),
        charts: chart_options(&query),
        days: query.days,
        min_days: DASHBOARD_MIN_DAYS,
        max_days: DASHBOARD_MAX_DAYS,
        show_map: query.show_map,
        metric_title: query.metric.title(),
        warnings: query.warnings.clone(),
        error: failure,
        summary: summarize(&data.rows),
        chart_json: script_json(&chart_traces(&data.rows, query.chart)),
        map_json: choropleth_trace(&data.peaks).map(|trace| script_json(&trace)),
        download_href: format!("/download.csv?{}", query.query_string()),
        rows: data.rows,
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Template rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template rendering failed").into_response()
        }
    }
}

pub async fn download_csv(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Response {
    let query = DashboardQuery::from_params(&params);
    let data = match fetch_data(&state, &query).await {
        Ok(data) => data,
        Err(e) => {
            error!("Dashboard download failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    match series_csv(&data.rows, query.metric) {
        Ok(body) => {
            info!("Dashboard CSV download: {} rows", data.rows.len());
            (
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", DOWNLOAD_FILE_NAME),
                    ),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "healthcare-dashboard",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn metrics_text() -> Response {
    match metrics::render() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
