use crate::error::{EtlError, Result};
use crate::metrics;
use crate::types::{CaseRecord, RawRecord, VaccinationRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::{error, info, instrument};

type RawObject = Map<String, Value>;

const CASE_REQUIRED: [&str; 3] = ["report_date", "country_name", "total_cases"];
const VACCINATION_REQUIRED: [&str; 3] = ["report_date", "country_name", "total_vaccinations"];

/// Accepted layouts for date-times without an offset, tried in order
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Converts raw API records into typed case and vaccination records.
///
/// Records missing a required field are dropped and counted. Any parse failure
/// rejects the whole batch: the error is logged and nothing is returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataTransformer;

impl DataTransformer {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip_all, fields(raw = raw.len()))]
    pub fn transform_cases(&self, raw: &[RawRecord]) -> Vec<CaseRecord> {
        info!("Starting transformation of cases data.");
        let ingested_at = Utc::now().naive_utc();
        transform_batch("Cases", raw, &CASE_REQUIRED, |obj| {
            Ok(CaseRecord {
                report_date: report_date(obj)?,
                country_name: country_name(obj)?,
                total_cases: required_count(obj, "total_cases")?,
                new_cases: optional_count(obj, "new_cases")?,
                total_deaths: optional_count(obj, "total_deaths")?,
                new_deaths: optional_count(obj, "new_deaths")?,
                etl_timestamp: etl_timestamp(obj, ingested_at)?,
            })
        })
    }

    #[instrument(skip_all, fields(raw = raw.len()))]
    pub fn transform_vaccinations(&self, raw: &[RawRecord]) -> Vec<VaccinationRecord> {
        info!("Starting transformation of vaccination data.");
        let ingested_at = Utc::now().naive_utc();
        transform_batch("Vaccinations", raw, &VACCINATION_REQUIRED, |obj| {
            Ok(VaccinationRecord {
                report_date: report_date(obj)?,
                country_name: country_name(obj)?,
                total_vaccinations: required_count(obj, "total_vaccinations")?,
                people_vaccinated: optional_count(obj, "people_vaccinated")?,
                people_fully_vaccinated: optional_count(obj, "people_fully_vaccinated")?,
                etl_timestamp: etl_timestamp(obj, ingested_at)?,
            })
        })
    }
}

fn transform_batch<T>(
    label: &'static str,
    raw: &[RawRecord],
    required: &[&str],
    build: impl Fn(&RawObject) -> Result<T>,
) -> Vec<T> {
    let complete: Vec<&RawObject> = raw
        .iter()
        .filter_map(Value::as_object)
        .filter(|obj| required.iter().all(|field| is_present(obj, field)))
        .collect();

    let dropped = raw.len() - complete.len();
    info!("{}: Dropped {} records due to missing values.", label, dropped);
    metrics::record_dropped(label, dropped);

    match complete.into_iter().map(build).collect::<Result<Vec<T>>>() {
        Ok(records) => {
            info!("{}: Successfully transformed {} records.", label, records.len());
            records
        }
        Err(e) => {
            error!("{}: Error in conversion, batch discarded: {}", label, e);
            Vec::new()
        }
    }
}

fn is_present(obj: &RawObject, field: &str) -> bool {
    obj.get(field).map_or(false, |v| !v.is_null())
}

fn report_date(obj: &RawObject) -> Result<NaiveDate> {
    let raw = required_str(obj, "report_date")?;
    parse_report_date(raw)
        .ok_or_else(|| EtlError::Transform(format!("unparseable report_date '{raw}'")))
}

fn country_name(obj: &RawObject) -> Result<String> {
    required_str(obj, "country_name").map(str::to_string)
}

/// Missing or null timestamps are stamped with the ingestion time
fn etl_timestamp(obj: &RawObject, ingested_at: NaiveDateTime) -> Result<NaiveDateTime> {
    match obj.get("etl_timestamp") {
        None | Some(Value::Null) => Ok(ingested_at),
        Some(Value::String(raw)) => parse_etl_timestamp(raw)
            .ok_or_else(|| EtlError::Transform(format!("unparseable etl_timestamp '{raw}'"))),
        Some(other) => Err(EtlError::Transform(format!(
            "etl_timestamp must be a string, got {other}"
        ))),
    }
}

fn required_str<'a>(obj: &'a RawObject, field: &str) -> Result<&'a str> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(EtlError::Transform(format!(
            "{field} must be a string, got {other}"
        ))),
        None => Err(EtlError::Transform(format!("{field} is missing"))),
    }
}

fn required_count(obj: &RawObject, field: &str) -> Result<i64> {
    optional_count(obj, field)?.ok_or_else(|| EtlError::Transform(format!("{field} is missing")))
}

fn optional_count(obj: &RawObject, field: &str) -> Result<Option<i64>> {
    let invalid = |value: &Value| EtlError::Transform(format!("{field} is not a whole number: {value}"));
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(Some(i)),
            None => n
                .as_f64()
                .and_then(float_to_count)
                .map(Some)
                .ok_or_else(|| invalid(value)),
        },
        Some(value @ Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_count))
                .map(Some)
                .ok_or_else(|| invalid(value))
        }
        Some(other) => Err(invalid(other)),
    }
}

// Counts often arrive as floats (e.g. 1200.0) from upstream dataframes
fn float_to_count(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Calendar date as written; any time of day is discarded
pub fn parse_report_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    parse_naive_datetime(s).map(|dt| dt.date())
}

/// Offset-qualified timestamps are normalized to UTC
pub fn parse_etl_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    parse_naive_datetime(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_null_primary_metric_is_dropped() {
        let raw = vec![
            json!({"report_date": "2024-01-01", "country_name": "X", "total_cases": 10}),
            json!({"report_date": "2024-01-02", "country_name": "X", "total_cases": null}),
        ];

        let records = DataTransformer::new().transform_cases(&raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].report_date, date("2024-01-01"));
        assert_eq!(records[0].total_cases, 10);
    }

    #[test]
    fn test_only_incomplete_records_are_dropped() {
        let raw = vec![
            json!({"report_date": "2024-01-01", "country_name": "A", "total_cases": 1}),
            json!({"country_name": "B", "total_cases": 2}),
            json!({"report_date": "2024-01-01", "total_cases": 3}),
            json!({"report_date": "2024-01-01", "country_name": "C"}),
            json!({"report_date": null, "country_name": "D", "total_cases": 4}),
            json!("not an object"),
            json!({"report_date": "2024-01-02", "country_name": "E", "total_cases": 5, "new_cases": null}),
            json!({"report_date": "2024-01-03", "country_name": "F", "total_cases": 6}),
        ];

        let records = DataTransformer::new().transform_cases(&raw);
        let countries: Vec<&str> = records.iter().map(|r| r.country_name.as_str()).collect();
        assert_eq!(countries, vec!["A", "E", "F"]);
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let raw = vec![json!({
            "report_date": "2024-01-01",
            "country_name": "X",
            "total_cases": 10,
            "new_cases": 2
        })];

        let record = &DataTransformer::new().transform_cases(&raw)[0];
        assert_eq!(record.new_cases, Some(2));
        assert_eq!(record.total_deaths, None);
        assert_eq!(record.new_deaths, None);
    }

    #[test]
    fn test_time_of_day_is_discarded() {
        let raw = vec![
            json!({"report_date": "2024-01-01T18:45:00", "country_name": "X", "total_cases": 10}),
            json!({"report_date": "2024-01-02 06:00:00", "country_name": "X", "total_cases": 11}),
            json!({"report_date": "2024-01-03T23:30:00-05:00", "country_name": "X", "total_cases": 12}),
        ];

        let records = DataTransformer::new().transform_cases(&raw);
        let dates: Vec<NaiveDate> = records.iter().map(|r| r.report_date).collect();
        assert_eq!(
            dates,
            vec![date("2024-01-01"), date("2024-01-02"), date("2024-01-03")]
        );
    }

    #[test]
    fn test_bad_date_discards_whole_batch() {
        let raw = vec![
            json!({"report_date": "2024-01-01", "country_name": "X", "total_cases": 10}),
            json!({"report_date": "last tuesday", "country_name": "X", "total_cases": 11}),
        ];

        assert!(DataTransformer::new().transform_cases(&raw).is_empty());
    }

    #[test]
    fn test_bad_timestamp_discards_whole_batch() {
        let raw = vec![
            json!({"report_date": "2024-01-01", "country_name": "X", "total_vaccinations": 10, "etl_timestamp": "soon"}),
        ];

        assert!(DataTransformer::new().transform_vaccinations(&raw).is_empty());
    }

    #[test]
    fn test_non_numeric_metric_discards_whole_batch() {
        let raw = vec![
            json!({"report_date": "2024-01-01", "country_name": "X", "total_cases": 10}),
            json!({"report_date": "2024-01-02", "country_name": "X", "total_cases": 11, "new_deaths": "a few"}),
        ];

        assert!(DataTransformer::new().transform_cases(&raw).is_empty());
    }

    #[test]
    fn test_float_and_string_counts() {
        let raw = vec![json!({
            "report_date": "2024-01-01",
            "country_name": "X",
            "total_cases": 1200.0,
            "new_cases": "15",
            "total_deaths": " 7 ",
            "new_deaths": 0
        })];

        let record = &DataTransformer::new().transform_cases(&raw)[0];
        assert_eq!(record.total_cases, 1200);
        assert_eq!(record.new_cases, Some(15));
        assert_eq!(record.total_deaths, Some(7));
        assert_eq!(record.new_deaths, Some(0));
    }

    #[test]
    fn test_fractional_count_is_rejected() {
        let raw = vec![json!({"report_date": "2024-01-01", "country_name": "X", "total_cases": 10.5})];
        assert!(DataTransformer::new().transform_cases(&raw).is_empty());
    }

    #[test]
    fn test_etl_timestamp_parsing() {
        let raw = vec![
            json!({"report_date": "2024-01-01", "country_name": "X", "total_vaccinations": 1,
                   "etl_timestamp": "2024-01-05T10:00:00+02:00"}),
            json!({"report_date": "2024-01-02", "country_name": "X", "total_vaccinations": 2,
                   "etl_timestamp": "2024-01-05 10:00:00.250"}),
        ];

        let records = DataTransformer::new().transform_vaccinations(&raw);
        assert_eq!(
            records[0].etl_timestamp,
            date("2024-01-05").and_hms_opt(8, 0, 0).unwrap()
        );
        assert_eq!(
            records[1].etl_timestamp,
            date("2024-01-05").and_hms_milli_opt(10, 0, 0, 250).unwrap()
        );
    }

    #[test]
    fn test_missing_etl_timestamp_uses_ingestion_time() {
        let before = Utc::now().naive_utc();
        let raw = vec![json!({"report_date": "2024-01-01", "country_name": "X", "total_vaccinations": 1})];
        let records = DataTransformer::new().transform_vaccinations(&raw);
        let after = Utc::now().naive_utc();

        assert!(records[0].etl_timestamp >= before && records[0].etl_timestamp <= after);
    }

    #[test]
    fn test_vaccination_primary_metric_required() {
        let raw = vec![
            json!({"report_date": "2024-01-01", "country_name": "X", "total_vaccinations": 100,
                   "people_vaccinated": 60, "people_fully_vaccinated": 40}),
            json!({"report_date": "2024-01-02", "country_name": "X", "people_vaccinated": 70}),
        ];

        let records = DataTransformer::new().transform_vaccinations(&raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].people_vaccinated, Some(60));
        assert_eq!(records[0].people_fully_vaccinated, Some(40));
    }

    #[test]
    fn test_empty_input() {
        assert!(DataTransformer::new().transform_cases(&[]).is_empty());
        assert!(DataTransformer::new().transform_vaccinations(&[]).is_empty());
    }
}
