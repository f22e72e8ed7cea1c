use serde_json::{Value, json};
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;

/// The worked example: budget 1000, country {US: 0.6, CA: 0.4},
/// environment {Mobile: 1.0}.
pub fn sample_plan() -> Value {
    json!({
        "partner": {
            "id": 1,
            "name": "Acme",
            "phase": "Launch",
            "total_budget": 1000,
            "start_date": "2026-03-01",
            "end_date": "2026-03-31",
            "cpm": 5.0,
            "cpc": 0.25
        },
        "rules": [
            {"place_col": "country", "type": "Create", "rule_info": {"US": 0.6, "CA": 0.4}},
            {"place_col": "environment", "type": "Create", "rule_info": {"Mobile": 1.0}}
        ]
    })
}

pub fn write_plan(path: &Path, plan: &Value) -> Result<(), Error> {
    let mut file = File::create(path)?;
    file.write_all(serde_json::to_string_pretty(plan)?.as_bytes())?;
    Ok(())
}
