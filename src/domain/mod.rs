pub mod compliance;
pub mod document_types;
pub mod models;
pub mod onboarding;
pub mod plan;
pub mod uploads;
pub mod validation;
pub mod wizard;
