/// Path suffixes appended to the configured API base URL
pub const CASES_RESOURCE: &str = "cases";
pub const VACCINATIONS_RESOURCE: &str = "vaccinations";

/// Daily-trends reports never return more than this many rows
pub const DAILY_TRENDS_LIMIT: u32 = 10;

// Dashboard window bounds, in days
pub const DASHBOARD_MIN_DAYS: u32 = 5;
pub const DASHBOARD_MAX_DAYS: u32 = 60;
pub const DASHBOARD_DEFAULT_DAYS: u32 = 14;

pub const DASHBOARD_DEFAULT_COUNTRY: &str = "India";

/// Countries offered by the dashboard, with their ISO 3166-1 alpha-3 codes
pub const DASHBOARD_COUNTRIES: &[(&str, &str)] = &[
    ("Australia", "AUS"),
    ("Brazil", "BRA"),
    ("Canada", "CAN"),
    ("China", "CHN"),
    ("France", "FRA"),
    ("Germany", "DEU"),
    ("India", "IND"),
    ("Japan", "JPN"),
    ("Russia", "RUS"),
    ("South Korea", "KOR"),
    ("UK", "GBR"),
    ("USA", "USA"),
];

/// ISO-3 code used to place a country on the choropleth
pub fn iso3_code(country: &str) -> Option<&'static str> {
    DASHBOARD_COUNTRIES
        .iter()
        .find(|(name, _)| *name == country)
        .map(|(_, code)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso3_code() {
        assert_eq!(iso3_code("Germany"), Some("DEU"));
        assert_eq!(iso3_code("UK"), Some("GBR"));
        assert_eq!(iso3_code("Atlantis"), None);
    }
}
