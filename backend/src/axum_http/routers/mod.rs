pub mod auth;
pub mod billing;
pub mod daily_reward;
pub mod media;
pub mod notifications;
