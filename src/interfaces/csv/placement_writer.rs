use crate::domain::placement::Placement;
use crate::domain::plan::{Partner, PlaceColumn};
use crate::error::Result;
use std::io::Write;

/// Writes generated placements as CSV to any `Write` sink.
///
/// Column order matches the name-derivation order; the structural columns
/// are filled from the partner record. Decimals are normalized so budgets
/// print without trailing zeros.
pub struct PlacementWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PlacementWriter<W> {
    pub fn new(sink: W) -> Self {
        let writer = csv::WriterBuilder::new().from_writer(sink);
        Self { writer }
    }

    pub fn write_placements(&mut self, partner: &Partner, placements: &[Placement]) -> Result<()> {
        let mut header = vec!["id".to_string(), "name".to_string()];
        header.extend(PlaceColumn::ORDERED.iter().map(|c| c.as_key().to_string()));
        header.extend(["total_budget", "cpm", "cpc"].map(String::from));
        self.writer.write_record(&header)?;

        for placement in placements {
            let mut record = vec![placement.id.to_string(), placement.name.clone()];
            for col in PlaceColumn::ORDERED {
                let cell = match col {
                    PlaceColumn::Phase => partner.phase.clone(),
                    PlaceColumn::Partner => partner.name.clone(),
                    _ => placement.values.get(&col).cloned().unwrap_or_default(),
                };
                record.push(cell);
            }
            record.push(placement.total_budget.0.normalize().to_string());
            record.push(placement.cpm.normalize().to_string());
            record.push(placement.cpc.normalize().to_string());
            self.writer.write_record(&record)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Budget;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    #[test]
    fn test_writer_output_shape() {
        let partner = Partner {
            id: 1,
            name: "Acme".to_string(),
            phase: "Launch".to_string(),
            total_budget: Budget::new(dec!(1000)),
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            cpm: dec!(5.0),
            cpc: dec!(0.25),
        };
        let placement = Placement {
            id: 3,
            partner_id: 1,
            name: "Launch_Acme_US".to_string(),
            values: BTreeMap::from([(PlaceColumn::Country, "US".to_string())]),
            total_budget: Budget::new(dec!(600.0)),
            cpm: dec!(5.0),
            cpc: dec!(0.25),
        };

        let mut sink = Vec::new();
        PlacementWriter::new(&mut sink)
            .write_placements(&partner, &[placement])
            .unwrap();
        let output = String::from_utf8(sink).unwrap();

        let mut lines = output.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,name,phase,partner,country,environment,targeting,creative,start_date,end_date,total_budget,cpm,cpc"
        );
        assert_eq!(
            lines.next().unwrap(),
            "3,Launch_Acme_US,Launch,Acme,US,,,,,,600,5,0.25"
        );
    }
}
