pub mod healthcare_api;

pub use healthcare_api::HealthcareApiClient;
