//! Configuration for the insight engine

use serde::{Deserialize, Serialize};

use crate::{DEALS_FILE_SUFFIX, DEFAULT_ACCOUNT, DEFAULT_SYMBOL, DEFAULT_TIMEFRAME};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Instrument symbol selected before the user picks one
    pub default_symbol: String,
    /// Chart timeframe selected before the user picks one
    pub default_timeframe: String,
    /// Account number used for deal retrieval when none is given
    pub default_account: String,
    /// File suffix appended to account numbers for the deals backend
    pub deals_file_suffix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_symbol: DEFAULT_SYMBOL.to_string(),
            default_timeframe: DEFAULT_TIMEFRAME.to_string(),
            default_account: DEFAULT_ACCOUNT.to_string(),
            deals_file_suffix: DEALS_FILE_SUFFIX.to_string(),
        }
    }
}
