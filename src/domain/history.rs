use crate::domain::plan::PlaceColumn;
use serde::{Deserialize, Serialize};

/// One row of historical delivery reporting, used to infer a default
/// single-value rule for attributes the plan's rules leave uncovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Partner name the delivery was reported under.
    pub partner: String,
    pub place_col: PlaceColumn,
    pub value: String,
    pub impressions: u64,
}
