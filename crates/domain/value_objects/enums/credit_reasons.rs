use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CreditReason {
    DailyReward,
    Purchase,
    Consumption,
    Refund,
}

impl CreditReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditReason::DailyReward => "daily_reward",
            CreditReason::Purchase => "purchase",
            CreditReason::Consumption => "consumption",
            CreditReason::Refund => "refund",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "daily_reward" => Some(CreditReason::DailyReward),
            "purchase" => Some(CreditReason::Purchase),
            "consumption" => Some(CreditReason::Consumption),
            "refund" => Some(CreditReason::Refund),
            _ => None,
        }
    }
}

impl Display for CreditReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
