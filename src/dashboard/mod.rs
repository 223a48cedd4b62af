//! Read-only web dashboard over the loaded tables.
//!
//! Pages are rendered server-side with askama; charts are drawn in the
//! browser by Plotly from JSON embedded in the page.

pub mod handlers;
pub mod models;
pub mod templates;

use axum::{http::Method, routing::get, Router};
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use handlers::{download_csv, health, index, metrics_text};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/download.csv", get(download_csv))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(cors))
}

pub async fn start_server(config: Config, port: u16) -> anyhow::Result<()> {
    let database = config.database.path.clone();
    let app = create_router(AppState::new(config));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Dashboard reading {} on port {}", database.display(), port);
    println!("📈 Dashboard running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseManager;
    use crate::types::CaseRecord;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::NaiveDate;
    use tower::ServiceExt;

    fn seeded_state(dir: &tempfile::TempDir) -> AppState {
        let path = dir.path().join("dashboard.db");
        let mut db = DatabaseManager::open(&path).unwrap();
        db.create_tables().unwrap();
        let records: Vec<CaseRecord> = (1..=3)
            .map(|day| CaseRecord {
                report_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                country_name: "India".to_string(),
                total_cases: 100 * day as i64,
                new_cases: Some(10),
                total_deaths: None,
                new_deaths: None,
                etl_timestamp: NaiveDate::from_ymd_opt(2024, 1, 4)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            })
            .collect();
        db.insert_data("daily_cases", &records).unwrap();
        db.close().unwrap();

        let mut config = Config::default();
        config.database.path = path;
        AppState::new(config)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_index_renders_series() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(seeded_state(&dir));

        let (status, _, body) = get_body(app, "/?countries=India&metric=total_cases&days=5").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Summary Statistics"));
        assert!(body.contains("2024-01-03"));
        assert!(body.contains("\"locations\":[\"IND\"]"));
        assert!(body.contains("download.csv?countries=India"));
    }

    #[tokio::test]
    async fn test_index_without_data() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(seeded_state(&dir));

        let (status, _, body) = get_body(app, "/?countries=Brazil").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No data found for the selected countries."));
    }

    #[tokio::test]
    async fn test_index_reports_missing_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        DatabaseManager::open(&path).unwrap().close().unwrap();
        let mut config = Config::default();
        config.database.path = path;
        let app = create_router(AppState::new(config));

        let (status, _, body) = get_body(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Error loading data"));
    }

    #[tokio::test]
    async fn test_index_does_not_create_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo").join("missing.db");
        let mut config = Config::default();
        config.database.path = path.clone();
        let app = create_router(AppState::new(config));

        let (status, _, body) = get_body(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Error loading data"));
        assert!(!path.exists());
        assert!(!dir.path().join("typo").exists());
    }

    #[tokio::test]
    async fn test_invalid_days_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(seeded_state(&dir));

        let (status, _, body) = get_body(app, "/?countries=India&days=abc").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Invalid number of days"));
        assert!(body.contains("value=\"14\""));
        assert!(body.contains("Summary Statistics"));
    }

    #[tokio::test]
    async fn test_download_csv() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(seeded_state(&dir));

        let (status, headers, body) =
            get_body(app, "/download.csv?countries=India&metric=new_cases&days=5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"healthcare_dashboard.csv\""
        );
        assert_eq!(
            body,
            "Date,new_cases,Country\n2024-01-01,10,India\n2024-01-02,10,India\n2024-01-03,10,India\n"
        );
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        crate::metrics::init_metrics();
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(seeded_state(&dir));

        get_body(app.clone(), "/?countries=India").await;
        let (status, headers, body) = get_body(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert!(body.contains("healthcare_report_queries_total"));
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(seeded_state(&dir));

        let (status, _, body) = get_body(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"status\":\"healthy\""));
    }
}
