use crate::domain::money::Budget;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The placement attributes, in the fixed order used for name derivation.
///
/// `Phase` and `Partner` are structural: their values come from the partner
/// record rather than from rules. The date columns default to the partner's
/// flight dates when no rule covers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceColumn {
    Phase,
    Partner,
    Country,
    Environment,
    Targeting,
    Creative,
    StartDate,
    EndDate,
}

impl PlaceColumn {
    /// Every column, in name-derivation order.
    pub const ORDERED: [PlaceColumn; 8] = [
        PlaceColumn::Phase,
        PlaceColumn::Partner,
        PlaceColumn::Country,
        PlaceColumn::Environment,
        PlaceColumn::Targeting,
        PlaceColumn::Creative,
        PlaceColumn::StartDate,
        PlaceColumn::EndDate,
    ];

    /// The columns that rules may drive, in expansion order.
    pub const RULE_DRIVEN: [PlaceColumn; 6] = [
        PlaceColumn::Country,
        PlaceColumn::Environment,
        PlaceColumn::Targeting,
        PlaceColumn::Creative,
        PlaceColumn::StartDate,
        PlaceColumn::EndDate,
    ];

    pub fn is_structural(&self) -> bool {
        matches!(self, PlaceColumn::Phase | PlaceColumn::Partner)
    }

    pub fn is_date(&self) -> bool {
        matches!(self, PlaceColumn::StartDate | PlaceColumn::EndDate)
    }

    pub fn as_key(&self) -> &'static str {
        match self {
            PlaceColumn::Phase => "phase",
            PlaceColumn::Partner => "partner",
            PlaceColumn::Country => "country",
            PlaceColumn::Environment => "environment",
            PlaceColumn::Targeting => "targeting",
            PlaceColumn::Creative => "creative",
            PlaceColumn::StartDate => "start_date",
            PlaceColumn::EndDate => "end_date",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "phase" => Some(PlaceColumn::Phase),
            "partner" => Some(PlaceColumn::Partner),
            "country" => Some(PlaceColumn::Country),
            "environment" => Some(PlaceColumn::Environment),
            "targeting" => Some(PlaceColumn::Targeting),
            "creative" => Some(PlaceColumn::Creative),
            "start_date" => Some(PlaceColumn::StartDate),
            "end_date" => Some(PlaceColumn::EndDate),
            _ => None,
        }
    }
}

/// An ad vendor allocation within a plan phase.
///
/// Holds the budget that generated placements partition, the flight dates,
/// and the rate assumptions that get denormalized onto each placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: u64,
    pub name: String,
    pub phase: String,
    pub total_budget: Budget,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cpm: Decimal,
    pub cpc: Decimal,
}
