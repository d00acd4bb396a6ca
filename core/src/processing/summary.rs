use crate::model::FittedModel;
use crate::prelude::{DsmResult, Platform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

/// Observed and expected counts for one model on one platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountComparison {
    pub model: String,
    pub platform: Platform,
    pub observed: f64,
    pub expected: f64,
}

/// Sums the response and the fitted values over each platform's segments.
pub fn observed_vs_expected(model: &FittedModel) -> Vec<CountComparison> {
    let mut totals: BTreeMap<Platform, (f64, f64)> = BTreeMap::new();
    for (row, key) in model.data.keys.iter().enumerate() {
        let entry = totals.entry(key.platform).or_insert((0.0, 0.0));
        entry.0 += model.data.response[row];
        entry.1 += model.fitted[row];
    }
    totals
        .into_iter()
        .map(|(platform, (observed, expected))| CountComparison {
            model: model.label(),
            platform,
            observed,
            expected,
        })
        .collect()
}

/// Plain-text table for the run log.
pub fn render_table(rows: &[CountComparison]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:>8} {:>12} {:>12}",
        "model", "platform", "observed", "expected"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<24} {:>8} {:>12.2} {:>12.2}",
            row.model, row.platform, row.observed, row.expected
        );
    }
    out
}

pub fn write_csv<W: Write>(writer: W, rows: &[CountComparison]) -> DsmResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}
