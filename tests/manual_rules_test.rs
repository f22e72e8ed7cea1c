use chrono::NaiveDate;
use mediaplan::application::engine::PlacementEngine;
use mediaplan::config::EngineConfig;
use mediaplan::domain::money::Budget;
use mediaplan::domain::plan::{Partner, PlaceColumn};
use mediaplan::domain::ports::RuleStore;
use mediaplan::domain::rule::{AddPatch, PlanRule, RuleInfo, UpdatePatch};
use mediaplan::infrastructure::in_memory::{
    InMemoryHistoryStore, InMemoryPlacementStore, InMemoryRuleStore,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

fn partner() -> Partner {
    Partner {
        id: 1,
        name: "Acme".to_string(),
        phase: "Launch".to_string(),
        total_budget: Budget::new(dec!(1000)),
        start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        cpm: dec!(5.0),
        cpc: dec!(0.25),
    }
}

fn country_split(id: u64) -> PlanRule {
    PlanRule {
        id,
        partner_id: 1,
        name: "country split".to_string(),
        place_col: PlaceColumn::Country,
        info: RuleInfo::Create(BTreeMap::from([
            ("US".to_string(), dec!(0.6)),
            ("CA".to_string(), dec!(0.4)),
        ])),
    }
}

fn manual(id: u64, name: &str, info: RuleInfo) -> PlanRule {
    PlanRule {
        id,
        partner_id: 1,
        name: name.to_string(),
        place_col: PlaceColumn::Country,
        info,
    }
}

fn engine(placements: InMemoryPlacementStore, rules: InMemoryRuleStore) -> PlacementEngine {
    PlacementEngine::new(
        Box::new(placements),
        Box::new(rules),
        Box::new(InMemoryHistoryStore::new()),
        EngineConfig::default(),
    )
}

#[tokio::test]
async fn test_manual_budget_update_triggers_renormalization() {
    let rules = InMemoryRuleStore::new();
    rules.store(country_split(1)).await.unwrap();
    let engine = engine(InMemoryPlacementStore::new(), rules.clone());

    let rows = engine.generate(&partner()).await.unwrap();
    let us_id = rows.iter().find(|p| p.name.contains("_US_")).unwrap().id;

    rules
        .store(manual(
            2,
            "bump US",
            RuleInfo::Update(UpdatePatch {
                id: us_id,
                field: "total_budget".to_string(),
                value: "900".to_string(),
            }),
        ))
        .await
        .unwrap();

    let rows = engine.generate(&partner()).await.unwrap();
    let us = rows.iter().find(|p| p.name.contains("_US_")).unwrap();
    let ca = rows.iter().find(|p| p.name.contains("_CA_")).unwrap();

    // 900/400 rescaled so the partner budget is conserved exactly.
    let sum: Decimal = rows.iter().map(|p| p.total_budget.0).sum();
    assert_eq!(sum, dec!(1000));
    assert_eq!(us.total_budget, Budget::new(dec!(692.3077)));
    assert_eq!(ca.total_budget, Budget::new(dec!(307.6923)));
}

#[tokio::test]
async fn test_name_stable_update_survives_regeneration() {
    let rules = InMemoryRuleStore::new();
    rules.store(country_split(1)).await.unwrap();
    let engine = engine(InMemoryPlacementStore::new(), rules.clone());

    let rows = engine.generate(&partner()).await.unwrap();
    let us_id = rows.iter().find(|p| p.name.contains("_US_")).unwrap().id;

    rules
        .store(manual(
            2,
            "negotiated US rate",
            RuleInfo::Update(UpdatePatch {
                id: us_id,
                field: "cpm".to_string(),
                value: "4.5".to_string(),
            }),
        ))
        .await
        .unwrap();

    // The patch is reapplied on every regeneration: the rate does not
    // change the derived name, so the id stays resolvable.
    for _ in 0..2 {
        let rows = engine.generate(&partner()).await.unwrap();
        let us = rows.iter().find(|p| p.id == us_id).unwrap();
        assert_eq!(us.cpm, dec!(4.5));
        let ca = rows.iter().find(|p| p.name.contains("_CA_")).unwrap();
        assert_eq!(ca.cpm, dec!(5.0));
    }
}

#[tokio::test]
async fn test_add_rule_clones_and_renormalizes() {
    let rules = InMemoryRuleStore::new();
    let engine = engine(InMemoryPlacementStore::new(), rules.clone());

    // With no rules at all there is exactly one generated placement, id 1.
    let rows = engine.generate(&partner()).await.unwrap();
    assert_eq!(rows.len(), 1);
    let source_id = rows[0].id;

    rules
        .store(manual(
            1,
            "extra video line",
            RuleInfo::Add(AddPatch {
                source_id,
                set: BTreeMap::from([("creative".to_string(), "Video".to_string())]),
            }),
        ))
        .await
        .unwrap();

    let rows = engine.generate(&partner()).await.unwrap();
    assert_eq!(rows.len(), 2);

    let clone = rows.iter().find(|p| p.name.contains("_Video_")).unwrap();
    assert_ne!(clone.id, source_id);
    // Cloning doubled the allocated budget; renormalization halves both.
    for row in &rows {
        assert_eq!(row.total_budget, Budget::new(dec!(500)));
    }
}

#[tokio::test]
async fn test_delete_rule_removes_row_and_reallocates() {
    let rules = InMemoryRuleStore::new();
    rules.store(country_split(1)).await.unwrap();
    let engine = engine(InMemoryPlacementStore::new(), rules.clone());

    let rows = engine.generate(&partner()).await.unwrap();
    let ca_name = rows
        .iter()
        .find(|p| p.name.contains("_CA_"))
        .unwrap()
        .name
        .clone();

    rules
        .store(manual(2, "drop CA", RuleInfo::Delete(vec![ca_name])))
        .await
        .unwrap();

    let rows = engine.generate(&partner()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].name.contains("_US_"));
    assert_eq!(rows[0].total_budget, Budget::new(dec!(1000)));
}

#[tokio::test]
async fn test_update_referencing_missing_id_is_skipped() {
    let rules = InMemoryRuleStore::new();
    rules.store(country_split(1)).await.unwrap();
    rules
        .store(manual(
            2,
            "stale patch",
            RuleInfo::Update(UpdatePatch {
                id: 999,
                field: "cpm".to_string(),
                value: "1.0".to_string(),
            }),
        ))
        .await
        .unwrap();
    let engine = engine(InMemoryPlacementStore::new(), rules);

    let rows = engine.generate(&partner()).await.unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.cpm, dec!(5.0));
    }
}

#[tokio::test]
async fn test_manual_update_rejects_unknown_field() {
    let rules = InMemoryRuleStore::new();
    rules.store(country_split(1)).await.unwrap();
    let engine = engine(InMemoryPlacementStore::new(), rules.clone());

    let rows = engine.generate(&partner()).await.unwrap();
    let id = rows[0].id;

    rules
        .store(manual(
            2,
            "bad field",
            RuleInfo::Update(UpdatePatch {
                id,
                field: "margin".to_string(),
                value: "0.2".to_string(),
            }),
        ))
        .await
        .unwrap();

    assert!(engine.generate(&partner()).await.is_err());
}
