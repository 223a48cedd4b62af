use crate::error::Result;
use crate::report::TrendPoint;
use crate::types::Metric;
use chrono::NaiveDateTime;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Quote a CSV field when it contains a delimiter, quote or line break
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn write_csv<W, H, R>(writer: &mut W, headers: &[H], rows: R) -> io::Result<()>
where
    W: Write,
    H: AsRef<str>,
    R: IntoIterator<Item = Vec<String>>,
{
    let header_line: Vec<String> = headers.iter().map(|h| csv_field(h.as_ref())).collect();
    writeln!(writer, "{}", header_line.join(","))?;
    for row in rows {
        let line: Vec<String> = row.iter().map(|cell| csv_field(cell)).collect();
        writeln!(writer, "{}", line.join(","))?;
    }
    Ok(())
}

// Keep file names portable and inside the reports directory
fn file_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// `{country}_{metric}_trends_{YYYYmmdd_HHMMSS}.csv`
pub fn trends_file_name(country: &str, metric: Metric, at: NaiveDateTime) -> String {
    format!(
        "{}_{}_trends_{}.csv",
        file_safe(country),
        metric.column(),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Write a daily-trends result to `dir` as `Date,<metric>` CSV
pub fn export_trends(
    dir: &Path,
    country: &str,
    metric: Metric,
    points: &[TrendPoint],
    at: NaiveDateTime,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(trends_file_name(country, metric, at));

    let mut file = io::BufWriter::new(fs::File::create(&path)?);
    write_csv(
        &mut file,
        &["Date", metric.column()],
        points.iter().map(|p| {
            vec![
                p.date.format("%Y-%m-%d").to_string(),
                p.value.map(|v| v.to_string()).unwrap_or_default(),
            ]
        }),
    )?;
    file.flush()?;

    info!("Report exported to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap()
    }

    #[test]
    fn test_trends_file_name() {
        assert_eq!(
            trends_file_name("India", Metric::NewCases, at()),
            "India_new_cases_trends_20240506_070809.csv"
        );
        assert_eq!(
            trends_file_name("../South Korea", Metric::TotalCases, at()),
            "___South_Korea_total_cases_trends_20240506_070809.csv"
        );
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("Korea, South"), "\"Korea, South\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_export_trends_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let points = vec![
            TrendPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                value: Some(10),
            },
            TrendPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                value: None,
            },
        ];

        let path = export_trends(dir.path(), "X", Metric::TotalCases, &points, at()).unwrap();
        assert_eq!(path.parent().unwrap(), dir.path());
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Date,total_cases\n2024-01-01,10\n2024-01-02,\n");
    }
}
