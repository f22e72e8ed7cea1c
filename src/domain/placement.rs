use crate::domain::money::Budget;
use crate::domain::plan::{Partner, PlaceColumn};
use crate::error::{PlanError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// A planned line item under a partner: one creative/targeting/geo
/// combination with its share of the partner budget.
///
/// Carries the derived unique `name`, the budget share, and a denormalized
/// copy of the partner's rate assumptions. The same shape is persisted and
/// returned as the JSON payload of generation jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub id: u64,
    pub partner_id: u64,
    pub name: String,
    /// Rule-driven attribute values; structural columns resolve from the
    /// partner record at name-derivation time.
    pub values: BTreeMap<PlaceColumn, String>,
    pub total_budget: Budget,
    pub cpm: Decimal,
    pub cpc: Decimal,
}

impl Placement {
    /// Derives the unique placement name: attribute values joined with `_`
    /// in fixed column order. Structural columns use the phase and partner
    /// names; date values are normalized to `YYYYMMDD`.
    pub fn derive_name(partner: &Partner, values: &BTreeMap<PlaceColumn, String>) -> String {
        let mut parts = Vec::with_capacity(PlaceColumn::ORDERED.len());
        for col in PlaceColumn::ORDERED {
            let part = match col {
                PlaceColumn::Phase => partner.phase.clone(),
                PlaceColumn::Partner => partner.name.clone(),
                _ => {
                    let raw = values.get(&col).cloned().unwrap_or_default();
                    if col.is_date() { normalize_date(&raw) } else { raw }
                }
            };
            parts.push(part);
        }
        parts.join("_")
    }

    /// Recomputes `name` from the current attribute values.
    pub fn rename(&mut self, partner: &Partner) {
        self.name = Self::derive_name(partner, &self.values);
    }

    /// Patches one field by its exchange-shape key. Attribute patches do
    /// not re-derive the name; callers rename afterwards.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<()> {
        match field {
            "total_budget" => {
                self.total_budget = Budget::new(parse_decimal(field, value)?);
                Ok(())
            }
            "cpm" => {
                self.cpm = parse_decimal(field, value)?;
                Ok(())
            }
            "cpc" => {
                self.cpc = parse_decimal(field, value)?;
                Ok(())
            }
            other => match PlaceColumn::from_key(other) {
                Some(col) if col.is_structural() => Err(PlanError::Validation(format!(
                    "Cannot patch structural column '{}'",
                    other
                ))),
                Some(col) => {
                    self.values.insert(col, value.to_string());
                    Ok(())
                }
                None => Err(PlanError::Validation(format!(
                    "Unknown placement field '{}'",
                    other
                ))),
            },
        }
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim()).map_err(|_| {
        PlanError::Validation(format!("Field '{}' is not a decimal: '{}'", field, value))
    })
}

/// Normalizes a date-ish value to `YYYYMMDD`. Unparseable values pass
/// through unchanged.
pub fn normalize_date(value: &str) -> String {
    let trimmed = value.trim();
    for format in ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.format("%Y%m%d").to_string();
        }
    }
    trimmed.to_string()
}
