pub mod credit_ledger;
pub mod credit_packages;
pub mod daily_reward_grants;
pub mod notifications;
pub mod payment_provider_customers;
pub mod uploads;
pub mod users;
