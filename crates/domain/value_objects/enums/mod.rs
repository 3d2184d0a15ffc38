pub mod credit_reasons;
pub mod media_types;
