use crate::domain::plan::PlaceColumn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Candidate attribute values mapped to fractional weights.
pub type WeightMap = BTreeMap<String, Decimal>;

/// Target values of a lookup fan-out.
///
/// Stored rules carry either an explicit weight map or a bare value list;
/// both decode here once, at the boundary, instead of being type-sniffed
/// at expansion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupTargets {
    Weighted(WeightMap),
    Even(Vec<String>),
}

impl LookupTargets {
    /// Resolves the targets to a normalized weight map. A bare list splits
    /// the branch share evenly across its values.
    pub fn weights(&self) -> WeightMap {
        match self {
            LookupTargets::Weighted(map) => normalize_weights(map),
            LookupTargets::Even(values) => {
                if values.is_empty() {
                    return WeightMap::new();
                }
                let share = Decimal::ONE / Decimal::from(values.len() as u64);
                values.iter().map(|v| (v.clone(), share)).collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddPatch {
    /// Existing placement to clone fields from.
    pub source_id: u64,
    /// Field overrides applied to the clone.
    #[serde(default)]
    pub set: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePatch {
    /// Placement the patch applies to.
    pub id: u64,
    pub field: String,
    pub value: String,
}

/// The rule payload, decoded once from the stored
/// `{place_col, type, rule_info}` exchange shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "rule_info")]
pub enum RuleInfo {
    /// Weighted candidate values for one attribute.
    Create(WeightMap),
    /// Re-expands a resolved value of the rule's attribute into finer
    /// values, keyed by the resolved value.
    Lookup(BTreeMap<String, LookupTargets>),
    #[serde(rename = "add")]
    Add(AddPatch),
    #[serde(rename = "update")]
    Update(UpdatePatch),
    #[serde(rename = "delete")]
    Delete(Vec<String>),
}

impl RuleInfo {
    pub fn is_manual(&self) -> bool {
        matches!(
            self,
            RuleInfo::Add(_) | RuleInfo::Update(_) | RuleInfo::Delete(_)
        )
    }
}

/// A stored allocation rule scoped to one partner and one place column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRule {
    pub id: u64,
    pub partner_id: u64,
    pub name: String,
    pub place_col: PlaceColumn,
    #[serde(flatten)]
    pub info: RuleInfo,
}

/// Rescales a weight map so its weights sum to 1.0.
///
/// Weights that already sum to 1.0 pass through unchanged. A nonzero sum is
/// rescaled proportionally; a zero sum splits the mass evenly across keys.
pub fn normalize_weights(weights: &WeightMap) -> WeightMap {
    if weights.is_empty() {
        return WeightMap::new();
    }
    let sum: Decimal = weights.values().copied().sum();
    if sum.is_zero() {
        let share = Decimal::ONE / Decimal::from(weights.len() as u64);
        weights.keys().map(|k| (k.clone(), share)).collect()
    } else if sum == Decimal::ONE {
        weights.clone()
    } else {
        weights.iter().map(|(k, w)| (k.clone(), *w / sum)).collect()
    }
}
