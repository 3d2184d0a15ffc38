pub mod domain;
pub mod events;
pub mod identity;
pub mod infra;
pub mod observability;
pub mod payments;
