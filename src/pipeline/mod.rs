pub mod load;
pub mod transform;

pub use load::DataLoader;
pub use transform::DataTransformer;

use crate::db::DatabaseManager;
use crate::error::{EtlError, Result};
use crate::types::DataSource;
use chrono::NaiveDate;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Arguments of a fetch-and-load run
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Label for the run; the source always returns every country
    pub country: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl FetchRequest {
    pub fn new(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            start_date: None,
            end_date: None,
        }
    }
}

/// Per-entity counts for one run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EntitySummary {
    pub fetched: usize,
    pub transformed: usize,
    pub inserted: usize,
}

/// Result of a complete pipeline run
#[derive(Debug)]
pub struct PipelineResult {
    pub source: String,
    pub cases: EntitySummary,
    pub vaccinations: EntitySummary,
    pub errors: Vec<String>,
    pub duration_secs: f64,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Pipeline;

impl Pipeline {
    /// Fetch, transform and load cases and vaccinations.
    ///
    /// Source and transform problems surface as empty batches. A failed load is
    /// recorded in [`PipelineResult::errors`] and the run continues with the
    /// next entity.
    #[instrument(skip(source, db), fields(source = %source.source_name(), country = %request.country))]
    pub fn run(
        source: &dyn DataSource,
        db: &mut DatabaseManager,
        request: &FetchRequest,
    ) -> Result<PipelineResult> {
        if request.start_date.is_some() || request.end_date.is_some() {
            return Err(EtlError::Unsupported(
                "date-ranged fetch; the source only serves current data".to_string(),
            ));
        }

        info!(
            "Fetching data for {} (the source returns all countries)",
            request.country
        );
        let started = Instant::now();
        let transformer = DataTransformer::new();
        let mut errors = Vec::new();

        let raw_cases = source.fetch_cases();
        let raw_vaccinations = source.fetch_vaccinations();
        info!(
            "Fetched {} raw case records and {} raw vaccination records",
            raw_cases.len(),
            raw_vaccinations.len()
        );

        let cases = transformer.transform_cases(&raw_cases);
        let vaccinations = transformer.transform_vaccinations(&raw_vaccinations);

        let mut loader = DataLoader::new(db);
        let cases_inserted = match loader.load_cases(&cases) {
            Ok(n) => n,
            Err(e) => {
                errors.push(format!("Failed to load cases: {e}"));
                0
            }
        };
        let vaccinations_inserted = match loader.load_vaccinations(&vaccinations) {
            Ok(n) => n,
            Err(e) => {
                errors.push(format!("Failed to load vaccinations: {e}"));
                0
            }
        };

        if !errors.is_empty() {
            warn!("{} errors encountered during pipeline run", errors.len());
        }
        let result = PipelineResult {
            source: source.source_name().to_string(),
            cases: EntitySummary {
                fetched: raw_cases.len(),
                transformed: cases.len(),
                inserted: cases_inserted,
            },
            vaccinations: EntitySummary {
                fetched: raw_vaccinations.len(),
                transformed: vaccinations.len(),
                inserted: vaccinations_inserted,
            },
            errors,
            duration_secs: started.elapsed().as_secs_f64(),
        };
        info!("Data fetch & load complete in {:.2}s", result.duration_secs);
        Ok(result)
    }
}
