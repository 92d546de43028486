use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{LeadAttributes, LeadId};
use super::gateways::{ContactGateway, CrmSync};
use super::lifecycle::LeadLifecycleController;
use super::store::LeadStore;

#[derive(Debug, thiserror::Error)]
pub enum LeadImportError {
    #[error("failed to read lead export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid lead CSV data: {0}")]
    Csv(#[from] csv::Error),
}

/// One parsed CSV row; `line` is the 1-based line number in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadRow {
    pub line: u64,
    pub attributes: LeadAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub reason: String,
}

/// Outcome of a batch import; rejected rows never abort the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub created: Vec<LeadId>,
    pub rejected: Vec<RejectedRow>,
}

/// Parse a CSV export whose header row names the lead attributes. Blank cells are skipped.
pub fn parse_lead_rows<R: Read>(reader: R) -> Result<Vec<LeadRow>, LeadImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let mut attributes = LeadAttributes::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            if header.is_empty() || cell.is_empty() {
                continue;
            }
            attributes.insert_input(header, cell);
        }
        rows.push(LeadRow { line, attributes });
    }

    Ok(rows)
}

/// Create one lead per row through the controller.
pub fn import_leads<R, S, C, M>(
    controller: &LeadLifecycleController<S, C, M>,
    reader: R,
) -> Result<ImportSummary, LeadImportError>
where
    R: Read,
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    let mut summary = ImportSummary::default();

    for row in parse_lead_rows(reader)? {
        match controller.generate_lead(row.attributes) {
            Ok(lead) => summary.created.push(lead.id().clone()),
            Err(err) => {
                warn!(line = row.line, error = %err, "lead row rejected");
                summary.rejected.push(RejectedRow {
                    line: row.line,
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        created = summary.created.len(),
        rejected = summary.rejected.len(),
        "lead import finished"
    );
    Ok(summary)
}

pub fn import_leads_from_path<S, C, M>(
    controller: &LeadLifecycleController<S, C, M>,
    path: impl AsRef<Path>,
) -> Result<ImportSummary, LeadImportError>
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    let file = File::open(path)?;
    import_leads(controller, file)
}
