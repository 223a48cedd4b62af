use crate::db::{DatabaseManager, TableRecord};
use crate::error::Result;
use crate::types::{CaseRecord, Table, VaccinationRecord};
use tracing::{error, info};

/// Hands transformed records to the store.
///
/// Failures are logged here and returned; the caller decides whether to carry on.
pub struct DataLoader<'a> {
    db: &'a mut DatabaseManager,
}

impl<'a> DataLoader<'a> {
    pub fn new(db: &'a mut DatabaseManager) -> Self {
        Self { db }
    }

    pub fn load_cases(&mut self, records: &[CaseRecord]) -> Result<usize> {
        self.load(Table::DailyCases, records)
    }

    pub fn load_vaccinations(&mut self, records: &[VaccinationRecord]) -> Result<usize> {
        self.load(Table::VaccinationData, records)
    }

    fn load<R: TableRecord>(&mut self, table: Table, records: &[R]) -> Result<usize> {
        info!("Loading {} records into '{}' table.", records.len(), table);
        match self.db.insert_data(table.name(), records) {
            Ok(inserted) => {
                info!("Successfully loaded {} data ({} new rows).", table, inserted);
                Ok(inserted)
            }
            Err(e) => {
                error!("Error loading {} data: {}", table, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use chrono::NaiveDate;

    fn case(day: u32) -> CaseRecord {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        CaseRecord {
            report_date: date,
            country_name: "X".to_string(),
            total_cases: day as i64 * 10,
            new_cases: Some(10),
            total_deaths: Some(0),
            new_deaths: Some(0),
            etl_timestamp: date.and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_load_cases_reports_new_rows() {
        let mut db = DatabaseManager::open_in_memory().unwrap();
        db.create_tables().unwrap();

        let mut loader = DataLoader::new(&mut db);
        assert_eq!(loader.load_cases(&[case(1), case(2)]).unwrap(), 2);
        assert_eq!(loader.load_cases(&[case(2), case(3)]).unwrap(), 1);
        assert_eq!(db.count_rows(Table::DailyCases).unwrap(), 3);
    }

    #[test]
    fn test_load_failure_is_returned() {
        // no schema, so the insert fails
        let mut db = DatabaseManager::open_in_memory().unwrap();
        let mut loader = DataLoader::new(&mut db);
        assert!(matches!(
            loader.load_cases(&[case(1)]),
            Err(EtlError::Database(_))
        ));
    }
}
