//! Run orchestration: assembling exports into a filing document, and the
//! verification run over a stored document.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    aggregate::{self, Dashboard},
    assemble,
    classification::{self, CodeCorrections, MasterCodeTable, ReapportionOutcome},
    config::{CountPolicy, RunConfig},
    document::Document,
    error::ReconError,
    normalize,
    reclassify::{self, ReclassifyOutcome},
    registry::detect_category,
    report,
    storage::ByteStore,
};

/// One ingested export: a name hint (usually the file name) and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub document: Document,
    pub categories_processed: usize,
    /// Names of inputs that were not assembled.
    pub skipped: Vec<String>,
}

/// Normalizes each input and merges it into `base`.
///
/// Inputs with an unknown category, unparseable text, or a rejected count
/// are skipped with a warning; the rest of the run continues.
pub fn generate(inputs: &[SourceFile], base: Document, policy: CountPolicy) -> GenerateOutcome {
    let mut document = base;
    let mut categories_processed = 0;
    let mut skipped = Vec::new();

    for input in inputs {
        let Some(category) = detect_category(&input.name) else {
            warn!("Skipping '{}': unknown category", input.name);
            skipped.push(input.name.clone());
            continue;
        };
        let rows = match normalize::parse(&input.name, &input.content) {
            Ok(rows) => rows,
            Err(err) => {
                warn!("Skipping '{}': {err}", input.name);
                skipped.push(input.name.clone());
                continue;
            }
        };
        if rows.is_empty() {
            info!("'{}' has no data rows", input.name);
            continue;
        }
        let records = match normalize::normalize(category, &input.name, &rows, policy) {
            Ok(records) => records,
            Err(err) => {
                warn!("Skipping '{}': {err}", input.name);
                skipped.push(input.name.clone());
                continue;
            }
        };
        let stats = assemble::assemble(&mut document, category, &records);
        categories_processed += 1;
        info!(
            "✓ {} -> '{}': {} row(s) written",
            input.name,
            category.sheet_name(),
            stats.rows_written
        );
    }

    GenerateOutcome {
        document,
        categories_processed,
        skipped,
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub reclassification: ReclassifyOutcome,
    pub corrections: CodeCorrections,
    pub reapportionment: ReapportionOutcome,
    pub dashboard: Dashboard,
}

/// Validates identifiers, corrects codes, rebalances the code sheet and
/// aggregates the result, all in memory.
pub fn reconcile(
    document: &mut Document,
    master: &MasterCodeTable,
    config: &RunConfig,
) -> Result<ReconcileOutcome, ReconError> {
    let reclassification = reclassify::reclassify(document)?;
    let corrections = classification::correct_codes(document, master, config.similarity_threshold);
    let reapportionment = classification::reapportion(document, &reclassification.ledger)?;
    let dashboard = aggregate::aggregate(document)?;
    Ok(ReconcileOutcome {
        reclassification,
        corrections,
        reapportionment,
        dashboard,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub storage_key: String,
    pub ca_code: String,
    #[serde(default)]
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total_checked: usize,
    pub total_invalid: usize,
    pub total_moved: usize,
    pub codes_corrected: usize,
    pub corrected_key: String,
    pub error_report_key: String,
    pub dashboard: Dashboard,
}

/// Output keys for one run: `<prefix>/<ca>/<customer|unknown>/..._<ts>`.
pub fn output_keys(config: &RunConfig, request: &RunRequest, timestamp: i64) -> (String, String) {
    let customer = request
        .customer_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or("unknown");
    let base = format!(
        "{}/{}/{}",
        config.output_prefix.trim_end_matches('/'),
        request.ca_code,
        customer
    );
    (
        format!("{base}/corrected_{timestamp}.json"),
        format!("{base}/error_report_{timestamp}.csv"),
    )
}

/// Reads the stored document, reconciles it and writes the corrected
/// document and error report back.
///
/// Both outputs are encoded before the first write. If the error report
/// cannot be stored, the corrected document is deleted again, so a failed
/// run leaves no outputs behind.
pub fn run_verification(
    store: &dyn ByteStore,
    request: &RunRequest,
    master: &MasterCodeTable,
    config: &RunConfig,
) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    info!("Verification {run_id} started for '{}'", request.storage_key);

    let bytes = store
        .read(&request.storage_key)
        .map_err(ReconError::from)
        .with_context(|| format!("Reading '{}'", request.storage_key))?;
    let mut document = Document::from_bytes(&bytes)
        .with_context(|| format!("Decoding '{}'", request.storage_key))?;
    let outcome = reconcile(&mut document, master, config)?;

    let corrected = report::document_bytes(&document)?;
    let error_report = report::error_report(&outcome.reclassification.records)?;

    let (corrected_key, error_report_key) = output_keys(config, request, Utc::now().timestamp());
    let corrected_key = store
        .write(&corrected_key, &corrected)
        .map_err(ReconError::from)
        .with_context(|| format!("Writing '{corrected_key}'"))?;
    let error_report_key = match store.write(&error_report_key, &error_report) {
        Ok(key) => key,
        Err(err) => {
            if let Err(cleanup) = store.delete(&corrected_key) {
                warn!("Could not remove '{corrected_key}' after a failed run: {cleanup}");
            }
            return Err(ReconError::from(err))
                .with_context(|| format!("Writing '{error_report_key}'"));
        }
    };

    let summary = RunSummary {
        run_id,
        total_checked: outcome.reclassification.checked,
        total_invalid: outcome.reclassification.invalid(),
        total_moved: outcome.reclassification.moved(),
        codes_corrected: outcome.corrections.corrected,
        corrected_key,
        error_report_key,
        dashboard: outcome.dashboard,
    };
    info!(
        "✓ Verification {run_id} complete: {} checked, {} moved, {} code(s) corrected",
        summary.total_checked, summary.total_moved, summary.codes_corrected
    );
    Ok(summary)
}
