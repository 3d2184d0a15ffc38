pub mod daily_reward;
pub mod enums;
