use crate::domain::plan::{Partner, PlaceColumn};
use crate::domain::rule::{PlanRule, RuleInfo};
use crate::error::Result;
use serde::Deserialize;
use std::io::Read;

/// One rule entry of a plan file: the `{place_col, type, rule_info}`
/// exchange shape, with an optional display name.
#[derive(Debug, Deserialize)]
struct RuleEntry {
    #[serde(default)]
    name: Option<String>,
    place_col: PlaceColumn,
    #[serde(flatten)]
    info: RuleInfo,
}

#[derive(Debug, Deserialize)]
struct PlanFile {
    partner: Partner,
    #[serde(default)]
    rules: Vec<RuleEntry>,
}

/// Reads a plan file: one partner plus its allocation rules.
///
/// Rule payloads decode into their tagged variants here, at the boundary;
/// a malformed `rule_info` is a typed decode error, never a runtime shape
/// surprise inside the engine.
pub struct PlanReader<R: Read> {
    source: R,
}

impl<R: Read> PlanReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    pub fn read(self) -> Result<(Partner, Vec<PlanRule>)> {
        let file: PlanFile = serde_json::from_reader(self.source)?;
        let partner = file.partner;
        let rules = file
            .rules
            .into_iter()
            .enumerate()
            .map(|(i, entry)| PlanRule {
                id: (i + 1) as u64,
                partner_id: partner.id,
                name: entry
                    .name
                    .unwrap_or_else(|| format!("rule {}", i + 1)),
                place_col: entry.place_col,
                info: entry.info,
            })
            .collect();
        Ok((partner, rules))
    }
}
