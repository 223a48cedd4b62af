use crate::error::EtlError;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

/// Raw record as returned from the remote API
pub type RawRecord = serde_json::Value;

/// One day of case counts for one country
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecord {
    pub report_date: NaiveDate,
    pub country_name: String,
    pub total_cases: i64,
    pub new_cases: Option<i64>,
    pub total_deaths: Option<i64>,
    pub new_deaths: Option<i64>,
    pub etl_timestamp: NaiveDateTime,
}

/// One day of vaccination counts for one country
#[derive(Debug, Clone, PartialEq)]
pub struct VaccinationRecord {
    pub report_date: NaiveDate,
    pub country_name: String,
    pub total_vaccinations: i64,
    pub people_vaccinated: Option<i64>,
    pub people_fully_vaccinated: Option<i64>,
    pub etl_timestamp: NaiveDateTime,
}

/// Source of raw case and vaccination records.
///
/// Implementations never fail: an unreachable or misbehaving source yields an
/// empty collection and the failure is logged.
pub trait DataSource {
    fn source_name(&self) -> &str;

    fn fetch_cases(&self) -> Vec<RawRecord>;

    fn fetch_vaccinations(&self) -> Vec<RawRecord>;
}

/// The tables this crate owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    DailyCases,
    VaccinationData,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::DailyCases, Table::VaccinationData];

    pub fn name(&self) -> &'static str {
        match self {
            Table::DailyCases => "daily_cases",
            Table::VaccinationData => "vaccination_data",
        }
    }

    /// Columns in insertion order
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::DailyCases => &[
                "report_date",
                "country_name",
                "total_cases",
                "new_cases",
                "total_deaths",
                "new_deaths",
                "etl_timestamp",
            ],
            Table::VaccinationData => &[
                "report_date",
                "country_name",
                "total_vaccinations",
                "people_vaccinated",
                "people_fully_vaccinated",
                "etl_timestamp",
            ],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| EtlError::UnknownTable(s.to_string()))
    }
}

/// Allow-list of metric columns that may appear in report queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    TotalCases,
    NewCases,
    TotalDeaths,
    NewDeaths,
    TotalVaccinations,
    PeopleVaccinated,
    PeopleFullyVaccinated,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::TotalCases,
        Metric::NewCases,
        Metric::TotalDeaths,
        Metric::NewDeaths,
        Metric::TotalVaccinations,
        Metric::PeopleVaccinated,
        Metric::PeopleFullyVaccinated,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Metric::TotalCases => "total_cases",
            Metric::NewCases => "new_cases",
            Metric::TotalDeaths => "total_deaths",
            Metric::NewDeaths => "new_deaths",
            Metric::TotalVaccinations => "total_vaccinations",
            Metric::PeopleVaccinated => "people_vaccinated",
            Metric::PeopleFullyVaccinated => "people_fully_vaccinated",
        }
    }

    pub fn table(&self) -> Table {
        match self {
            Metric::TotalCases | Metric::NewCases | Metric::TotalDeaths | Metric::NewDeaths => {
                Table::DailyCases
            }
            Metric::TotalVaccinations
            | Metric::PeopleVaccinated
            | Metric::PeopleFullyVaccinated => Table::VaccinationData,
        }
    }

    pub fn is_case_metric(&self) -> bool {
        self.table() == Table::DailyCases
    }

    /// "people_fully_vaccinated" -> "People Fully Vaccinated"
    pub fn title(&self) -> String {
        self.column()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.column() == s)
            .ok_or_else(|| EtlError::UnknownMetric(s.to_string()))
    }
}
