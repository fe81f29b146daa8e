use serde::{Deserialize, Serialize};

/// A discrete trading signal derived from an indicator reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Neutral,
}
