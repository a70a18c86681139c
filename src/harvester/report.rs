use std::io::Write;
use std::pin::pin;

use futures::TryStreamExt;
use tracing::{debug, info};

use super::{BibliographicRow, Harvester};

pub const REPORT_FIELDS: [&str; 4] = ["date", "publisher", "coverage", "creator"];

/// Rows are written as they are harvested, so a failing page leaves the
/// earlier rows in `out`.
pub(super) async fn run<W: Write>(
    harvester: &Harvester,
    set: &str,
    limit: Option<usize>,
    out: &mut W,
) -> anyhow::Result<Vec<BibliographicRow>> {
    let mut records = pin!(harvester.list_records(set, limit));
    let mut rows = Vec::new();

    while let Some(record) = records.try_next().await? {
        debug!("Extracting {}", record.identifier().unwrap_or_default());
        let row = BibliographicRow::extract(record.element(), &REPORT_FIELDS);
        writeln!(out, "{}", row)?;
        rows.push(row);
    }

    out.flush()?;
    info!("Reported {} record(s) from set {}", rows.len(), set);
    Ok(rows)
}
