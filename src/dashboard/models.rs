use crate::constants::{
    iso3_code, DASHBOARD_COUNTRIES, DASHBOARD_DEFAULT_COUNTRY, DASHBOARD_DEFAULT_DAYS,
    DASHBOARD_MAX_DAYS, DASHBOARD_MIN_DAYS,
};
use crate::report::export::write_csv;
use crate::report::CountryTotal;
use crate::types::Metric;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io;

/// Raw query-string parameters of the dashboard page
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DashboardParams {
    /// Comma-separated country names
    pub countries: Option<String>,
    pub metric: Option<String>,
    pub days: Option<String>,
    pub chart: Option<String>,
    pub map: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
    Area,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [ChartKind::Line, ChartKind::Bar, ChartKind::Area];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Area => "area",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Line => "Line Chart",
            ChartKind::Bar => "Bar Chart",
            ChartKind::Area => "Area Chart",
        }
    }

    fn from_param(value: &str) -> Option<Self> {
        ChartKind::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

/// Validated dashboard selection
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardQuery {
    pub countries: Vec<String>,
    pub metric: Metric,
    pub days: u32,
    pub chart: ChartKind,
    pub show_map: bool,
    /// Problems with the submitted parameters that were replaced by defaults
    pub warnings: Vec<String>,
}

impl DashboardQuery {
    pub fn from_params(params: &DashboardParams) -> Self {
        let mut warnings = Vec::new();

        let mut countries: Vec<String> = Vec::new();
        for country in params
            .countries
            .as_deref()
            .unwrap_or(DASHBOARD_DEFAULT_COUNTRY)
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            if !countries.iter().any(|c| c == country) {
                countries.push(country.to_string());
            }
        }

        let metric = match params.metric.as_deref() {
            None => Metric::TotalCases,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warnings.push(format!("Unknown metric '{raw}', showing total_cases"));
                Metric::TotalCases
            }),
        };

        let days = match params.days.as_deref().map(str::trim) {
            None | Some("") => DASHBOARD_DEFAULT_DAYS,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) => n.clamp(DASHBOARD_MIN_DAYS as i64, DASHBOARD_MAX_DAYS as i64) as u32,
                Err(_) => {
                    warnings.push(format!(
                        "Invalid number of days '{raw}', showing {DASHBOARD_DEFAULT_DAYS}"
                    ));
                    DASHBOARD_DEFAULT_DAYS
                }
            },
        };

        let chart = match params.chart.as_deref() {
            None => ChartKind::Line,
            Some(raw) => ChartKind::from_param(raw).unwrap_or_else(|| {
                warnings.push(format!("Unknown chart type '{raw}', showing a line chart"));
                ChartKind::Line
            }),
        };

        let show_map = match params.map.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => true,
                "false" | "0" | "off" => false,
                _ => {
                    warnings.push(format!("Invalid map flag '{raw}', showing the map"));
                    true
                }
            },
        };

        Self {
            countries,
            metric,
            days,
            chart,
            show_map,
            warnings,
        }
    }

    /// The choropleth summarizes case metrics only
    pub fn wants_map(&self) -> bool {
        self.show_map && self.metric.is_case_metric()
    }

    /// Query string reproducing this selection
    pub fn query_string(&self) -> String {
        let Ok(mut url) = reqwest::Url::parse("http://dashboard.local/") else {
            return String::new();
        };
        url.query_pairs_mut()
            .append_pair("countries", &self.countries.join(","))
            .append_pair("metric", self.metric.column())
            .append_pair("days", &self.days.to_string())
            .append_pair("chart", self.chart.as_str())
            .append_pair("map", if self.show_map { "true" } else { "false" });
        url.query().unwrap_or_default().to_string()
    }
}

/// One observation in the combined result set
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub date: NaiveDate,
    pub country: String,
    pub value: Option<i64>,
}

impl SeriesRow {
    pub fn date_label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn value_label(&self) -> String {
        self.value.map(|v| v.to_string()).unwrap_or_default()
    }
}

/// Per-country min / max / mean of the selected metric
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub country: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl SummaryRow {
    pub fn min_label(&self) -> String {
        format!("{:.2}", self.min)
    }

    pub fn max_label(&self) -> String {
        format!("{:.2}", self.max)
    }

    pub fn mean_label(&self) -> String {
        format!("{:.2}", self.mean)
    }
}

/// Countries appear in first-seen order; null observations are ignored
pub fn summarize(rows: &[SeriesRow]) -> Vec<SummaryRow> {
    let mut order: Vec<&str> = Vec::new();
    for row in rows {
        if !order.contains(&row.country.as_str()) {
            order.push(&row.country);
        }
    }

    order
        .into_iter()
        .filter_map(|country| {
            let values: Vec<f64> = rows
                .iter()
                .filter(|r| r.country == country)
                .filter_map(|r| r.value)
                .map(|v| v as f64)
                .collect();
            if values.is_empty() {
                return None;
            }
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            Some(SummaryRow {
                country: country.to_string(),
                min,
                max,
                mean,
            })
        })
        .collect()
}

/// Plotly traces, one per country
pub fn chart_traces(rows: &[SeriesRow], chart: ChartKind) -> Value {
    let mut countries: Vec<&str> = Vec::new();
    for row in rows {
        if !countries.contains(&row.country.as_str()) {
            countries.push(&row.country);
        }
    }

    let traces: Vec<Value> = countries
        .into_iter()
        .map(|country| {
            let (x, y): (Vec<String>, Vec<Option<i64>>) = rows
                .iter()
                .filter(|r| r.country == country)
                .map(|r| (r.date_label(), r.value))
                .unzip();
            match chart {
                ChartKind::Line => json!({
                    "type": "scatter", "mode": "lines+markers", "name": country, "x": x, "y": y
                }),
                ChartKind::Bar => json!({
                    "type": "bar", "name": country, "x": x, "y": y
                }),
                ChartKind::Area => json!({
                    "type": "scatter", "mode": "lines", "fill": "tozeroy", "opacity": 0.5,
                    "name": country, "x": x, "y": y
                }),
            }
        })
        .collect();
    Value::Array(traces)
}

/// Plotly choropleth trace; countries without a known ISO-3 code are left off
pub fn choropleth_trace(peaks: &[CountryTotal]) -> Option<Value> {
    let placed: Vec<(&str, &str, i64)> = peaks
        .iter()
        .filter_map(|p| iso3_code(&p.country).map(|iso| (iso, p.country.as_str(), p.total)))
        .collect();
    if placed.is_empty() {
        return None;
    }
    let locations: Vec<&str> = placed.iter().map(|(iso, _, _)| *iso).collect();
    let names: Vec<&str> = placed.iter().map(|(_, name, _)| *name).collect();
    let totals: Vec<i64> = placed.iter().map(|(_, _, total)| *total).collect();
    Some(json!([{
        "type": "choropleth",
        "locationmode": "ISO-3",
        "locations": locations,
        "z": totals,
        "text": names,
        "colorscale": "Blues",
    }]))
}

/// JSON safe to embed inside a `<script>` element
pub fn script_json(value: &Value) -> String {
    value.to_string().replace('<', "\\u003c")
}

/// Combined result set as `Date,<metric>,Country` CSV
pub fn series_csv(rows: &[SeriesRow], metric: Metric) -> io::Result<String> {
    let mut out = Vec::new();
    write_csv(
        &mut out,
        &["Date", metric.column(), "Country"],
        rows.iter()
            .map(|r| vec![r.date_label(), r.value_label(), r.country.clone()]),
    )?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Country checkbox on the filter form
#[derive(Debug, Clone)]
pub struct CountryOption {
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

pub fn country_options(query: &DashboardQuery) -> Vec<CountryOption> {
    let mut options: Vec<CountryOption> = DASHBOARD_COUNTRIES
        .iter()
        .map(|(name, _)| CountryOption {
            name: name.to_string(),
            selected: query.countries.iter().any(|c| c == name),
        })
        .collect();
    // keep ad-hoc countries from the URL selectable
    for country in &query.countries {
        if !options.iter().any(|o| &o.name == country) {
            options.push(CountryOption {
                name: country.clone(),
                selected: true,
            });
        }
    }
    options
}

pub fn metric_options(query: &DashboardQuery) -> Vec<SelectOption> {
    Metric::ALL
        .iter()
        .map(|m| SelectOption {
            value: m.column().to_string(),
            label: m.title(),
            selected: *m == query.metric,
        })
        .collect()
}

pub fn chart_options(query: &DashboardQuery) -> Vec<SelectOption> {
    ChartKind::ALL
        .iter()
        .map(|k| SelectOption {
            value: k.as_str().to_string(),
            label: k.label().to_string(),
            selected: *k == query.chart,
        })
        .collect()
}
