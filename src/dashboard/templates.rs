use askama::Template;

use crate::dashboard::models::{CountryOption, SelectOption, SeriesRow, SummaryRow};

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub countries: Vec<CountryOption>,
    pub metrics: Vec<SelectOption>,
    pub charts: Vec<SelectOption>,
    pub days: u32,
    pub min_days: u32,
    pub max_days: u32,
    pub show_map: bool,
    pub metric_title: String,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub rows: Vec<SeriesRow>,
    pub summary: Vec<SummaryRow>,
    /// Plotly traces, already escaped for a script element
    pub chart_json: String,
    pub map_json: Option<String>,
    pub download_href: String,
}
