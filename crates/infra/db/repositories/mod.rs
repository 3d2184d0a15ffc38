pub mod credit_ledger;
pub mod credit_packages;
pub mod notifications;
pub mod payment_provider_customers;
pub mod uploads;
pub mod users;
