use crate::config::EngineConfig;
use crate::domain::placement::Placement;
use crate::domain::plan::{Partner, PlaceColumn};
use crate::domain::ports::{HistoryStoreBox, PlacementStoreBox, RuleStoreBox};
use crate::domain::rule::{LookupTargets, PlanRule, RuleInfo, WeightMap, normalize_weights};
use crate::error::{PlanError, Result};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// One candidate placement before it becomes a row: the rule-driven
/// attribute values and the combination's share of the partner budget.
type Combination = BTreeMap<PlaceColumn, String>;

/// Expands a partner's allocation rules into concrete placement rows whose
/// budgets partition the partner's total budget.
///
/// Generation is deterministic and idempotent: the same rules, history and
/// existing rows always produce the same names, budgets and ids. The whole
/// result replaces the partner's placement set in one batch write.
pub struct PlacementEngine {
    placements: PlacementStoreBox,
    rules: RuleStoreBox,
    history: HistoryStoreBox,
    config: EngineConfig,
}

impl PlacementEngine {
    pub fn new(
        placements: PlacementStoreBox,
        rules: RuleStoreBox,
        history: HistoryStoreBox,
        config: EngineConfig,
    ) -> Self {
        Self {
            placements,
            rules,
            history,
            config,
        }
    }

    /// Materializes the partner's placements from its stored rules.
    ///
    /// Rows whose derived name matches an existing placement keep that
    /// placement's id, so regeneration is an upsert rather than a
    /// delete-and-recreate.
    pub async fn generate(&self, partner: &Partner) -> Result<Vec<Placement>> {
        let rules = self.rules.for_partner(partner.id).await?;
        for rule in &rules {
            if rule.place_col.is_structural() && !rule.info.is_manual() {
                return Err(PlanError::Rule(format!(
                    "Rule '{}' targets structural column '{}'",
                    rule.name,
                    rule.place_col.as_key()
                )));
            }
        }

        let create = self.effective_create_rules(partner, &rules).await?;
        let mut combos = expand(&create);
        for rule in &rules {
            if let RuleInfo::Lookup(mappings) = &rule.info {
                combos = apply_lookup(combos, rule.place_col, mappings);
            }
        }
        let merged = merge_duplicates(combos);
        debug!(
            partner = partner.name.as_str(),
            combinations = merged.len(),
            "expanded rule combinations"
        );

        let existing = self.placements.for_partner(partner.id).await?;
        let by_name: HashMap<String, u64> = existing
            .iter()
            .map(|p| (p.name.clone(), p.id))
            .collect();
        let mut used_ids: HashSet<u64> = HashSet::new();

        let mut rows = Vec::with_capacity(merged.len());
        for (values, weight) in merged {
            let name = Placement::derive_name(partner, &values);
            let id = self.carry_or_allocate(&name, &by_name, &mut used_ids).await?;
            rows.push(Placement {
                id,
                partner_id: partner.id,
                name,
                values,
                total_budget: partner.total_budget.scaled(weight),
                cpm: partner.cpm,
                cpc: partner.cpc,
            });
        }

        self.apply_manual_rules(partner, &rules, &mut rows, &by_name, &mut used_ids)
            .await?;
        renormalize_budgets(partner, &mut rows);

        rows.sort_by(|a, b| a.name.cmp(&b.name));
        self.placements
            .replace_for_partner(partner.id, rows.clone())
            .await?;
        Ok(rows)
    }

    /// The effective `Create` weight map per rule-driven column: explicit
    /// rules (normalized), else an inferred single-value default.
    async fn effective_create_rules(
        &self,
        partner: &Partner,
        rules: &[PlanRule],
    ) -> Result<BTreeMap<PlaceColumn, WeightMap>> {
        let mut create: BTreeMap<PlaceColumn, WeightMap> = BTreeMap::new();
        for rule in rules {
            if let RuleInfo::Create(weights) = &rule.info {
                if weights.is_empty() {
                    return Err(PlanError::Rule(format!(
                        "Create rule '{}' has no candidate values",
                        rule.name
                    )));
                }
                create.insert(rule.place_col, normalize_weights(weights));
            }
        }
        for col in PlaceColumn::RULE_DRIVEN {
            if create.contains_key(&col) {
                continue;
            }
            let value = self.default_value(partner, col).await?;
            create.insert(col, WeightMap::from([(value, Decimal::ONE)]));
        }
        Ok(create)
    }

    /// Default value for a column with no rule: the historically dominant
    /// value for this partner's name, else the partner's own flight dates
    /// for the date columns, else the configured placeholder.
    async fn default_value(&self, partner: &Partner, col: PlaceColumn) -> Result<String> {
        if let Some(value) = self.history.top_value(&partner.name, col).await? {
            return Ok(value);
        }
        Ok(match col {
            PlaceColumn::StartDate => partner.start_date.format("%Y%m%d").to_string(),
            PlaceColumn::EndDate => partner.end_date.format("%Y%m%d").to_string(),
            _ => self.config.unassigned_value.clone(),
        })
    }

    async fn carry_or_allocate(
        &self,
        name: &str,
        by_name: &HashMap<String, u64>,
        used_ids: &mut HashSet<u64>,
    ) -> Result<u64> {
        let id = match by_name.get(name) {
            Some(id) if !used_ids.contains(id) => *id,
            _ => self.placements.next_id().await?,
        };
        used_ids.insert(id);
        Ok(id)
    }

    /// Applies manual rules after generation, in `update`, `add`, `delete`
    /// order. Manual values take precedence over rule-generated ones.
    async fn apply_manual_rules(
        &self,
        partner: &Partner,
        rules: &[PlanRule],
        rows: &mut Vec<Placement>,
        by_name: &HashMap<String, u64>,
        used_ids: &mut HashSet<u64>,
    ) -> Result<()> {
        for rule in rules {
            if let RuleInfo::Update(patch) = &rule.info {
                let Some(row) = rows.iter_mut().find(|p| p.id == patch.id) else {
                    warn!(
                        rule = rule.name.as_str(),
                        id = patch.id,
                        "update rule references a missing placement"
                    );
                    continue;
                };
                row.set_field(&patch.field, &patch.value)?;
                if PlaceColumn::from_key(&patch.field).is_some() {
                    row.rename(partner);
                }
            }
        }

        for rule in rules {
            if let RuleInfo::Add(patch) = &rule.info {
                let Some(source) = rows.iter().find(|p| p.id == patch.source_id).cloned() else {
                    warn!(
                        rule = rule.name.as_str(),
                        id = patch.source_id,
                        "add rule references a missing placement"
                    );
                    continue;
                };
                let mut row = source;
                for (field, value) in &patch.set {
                    row.set_field(field, value)?;
                }
                row.rename(partner);
                row.id = self.carry_or_allocate(&row.name, by_name, used_ids).await?;
                rows.push(row);
            }
        }

        for rule in rules {
            if let RuleInfo::Delete(names) = &rule.info {
                rows.retain(|p| !names.contains(&p.name));
            }
        }
        Ok(())
    }
}

/// Cartesian product of the per-column weight maps, in fixed column order.
fn expand(create: &BTreeMap<PlaceColumn, WeightMap>) -> Vec<(Combination, Decimal)> {
    let mut combos: Vec<(Combination, Decimal)> = vec![(Combination::new(), Decimal::ONE)];
    for col in PlaceColumn::RULE_DRIVEN {
        let Some(weights) = create.get(&col) else {
            continue;
        };
        let mut next = Vec::with_capacity(combos.len() * weights.len());
        for (combo, weight) in &combos {
            for (value, share) in weights {
                let mut combo = combo.clone();
                combo.insert(col, value.clone());
                next.push((combo, *weight * *share));
            }
        }
        combos = next;
    }
    combos
}

/// Replaces every combination whose value under `col` matches a configured
/// key with one combination per target value. The replacements' combined
/// share equals the replaced combination's share.
fn apply_lookup(
    combos: Vec<(Combination, Decimal)>,
    col: PlaceColumn,
    mappings: &BTreeMap<String, LookupTargets>,
) -> Vec<(Combination, Decimal)> {
    let mut next = Vec::with_capacity(combos.len());
    for (combo, weight) in combos {
        match combo.get(&col).and_then(|v| mappings.get(v)) {
            Some(targets) => {
                for (value, share) in targets.weights() {
                    let mut combo = combo.clone();
                    combo.insert(col, value);
                    next.push((combo, weight * share));
                }
            }
            None => next.push((combo, weight)),
        }
    }
    next
}

/// Lookup fan-out can land two branches on the same value set; their
/// shares merge into one row.
fn merge_duplicates(combos: Vec<(Combination, Decimal)>) -> BTreeMap<Combination, Decimal> {
    let mut merged: BTreeMap<Combination, Decimal> = BTreeMap::new();
    for (combo, weight) in combos {
        *merged.entry(combo).or_insert(Decimal::ZERO) += weight;
    }
    merged
}

/// Restores the invariant "sum of placement budgets == partner budget":
/// proportional rescale when the current sum is nonzero, even split when it
/// is zero, with the rounding residual assigned to the largest row.
fn renormalize_budgets(partner: &Partner, rows: &mut [Placement]) {
    if rows.is_empty() {
        return;
    }
    let total = partner.total_budget;
    let sum: Decimal = rows.iter().map(|p| p.total_budget.0).sum();
    if sum != total.0 {
        if sum.is_zero() {
            let share = Decimal::ONE / Decimal::from(rows.len() as u64);
            for row in rows.iter_mut() {
                row.total_budget = total.scaled(share);
            }
        } else {
            let factor = total.0 / sum;
            for row in rows.iter_mut() {
                row.total_budget = row.total_budget.scaled(factor);
            }
        }
    }
    let sum: Decimal = rows.iter().map(|p| p.total_budget.0).sum();
    let residual = total.0 - sum;
    if !residual.is_zero() {
        if let Some(row) = rows.iter_mut().max_by_key(|p| p.total_budget.0) {
            row.total_budget.0 += residual;
        }
    }
}
