//! Delimited-text parsing and per-category record normalization.
//!
//! [`parse`] turns an export into header-keyed text rows; [`normalize`]
//! translates those rows into canonical [`Field`]s for one category and
//! fills the derived fields (net issued documents, classification sub-type,
//! default rate).

use std::collections::{BTreeMap, HashMap};

use log::warn;
use rust_decimal::Decimal;

use crate::{
    config::CountPolicy,
    data::{Cell, normalize_column_name, parse_decimal, sub_amounts},
    error::ReconError,
    io_utils,
    registry::{CategoryTag, Field, mapping_for},
};

/// One export row keyed by its original header text.
pub type RawRecord = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRecord {
    fields: BTreeMap<Field, Cell>,
}

impl NormalizedRecord {
    pub fn get(&self, field: Field) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.fields.get(&field).unwrap_or(&EMPTY)
    }

    pub fn insert(&mut self, field: Field, value: Cell) {
        self.fields.insert(field, value);
    }

    pub fn text(&self, field: Field) -> String {
        self.get(field).as_display()
    }
}

impl FromIterator<(Field, Cell)> for NormalizedRecord {
    fn from_iter<I: IntoIterator<Item = (Field, Cell)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Parses comma-delimited text whose first row is the header.
///
/// A leading byte-order marker is ignored. Text without a single header
/// column is an ingest failure; a header with no body yields no rows.
pub fn parse(name: &str, text: &str) -> Result<Vec<RawRecord>, ReconError> {
    let ingest_error = |reason: String| ReconError::Ingest {
        file: name.to_string(),
        reason,
    };
    let mut reader = io_utils::open_csv_reader(io_utils::strip_bom(text).as_bytes(), true);
    let headers = reader
        .headers()
        .map_err(|err| ingest_error(err.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ingest_error("no header columns found".to_string()));
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| ingest_error(format!("row {}: {err}", idx + 2)))?;
        let row = headers
            .iter()
            .enumerate()
            .map(|(col, header)| (header.clone(), record.get(col).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Translates raw rows into canonical records for `category`.
///
/// `filename_hint` feeds the classification-code sub-type when rows carry
/// none of their own.
pub fn normalize(
    category: CategoryTag,
    filename_hint: &str,
    rows: &[RawRecord],
    policy: CountPolicy,
) -> Result<Vec<NormalizedRecord>, ReconError> {
    let hinted_type = classification_type_from_hint(filename_hint);
    rows.iter()
        .map(|row| {
            let mut record = translate(category, row);
            match category {
                CategoryTag::DocsIssued => derive_net_issued(&mut record, policy)?,
                CategoryTag::Hsn => derive_classification(&mut record, hinted_type),
                _ => {}
            }
            Ok(record)
        })
        .collect()
}

fn translate(category: CategoryTag, row: &RawRecord) -> NormalizedRecord {
    let lookup = row
        .iter()
        .map(|(header, value)| (normalize_column_name(header), value.trim()))
        .collect::<HashMap<_, _>>();
    let mut record = NormalizedRecord::default();
    for entry in mapping_for(category).entries() {
        let value = entry
            .sources
            .iter()
            .filter_map(|source| lookup.get(&normalize_column_name(source)))
            .find(|value| !value.is_empty());
        if let Some(value) = value {
            record.insert(entry.field, Cell::text(*value));
        }
    }
    record
}

fn derive_net_issued(record: &mut NormalizedRecord, policy: CountPolicy) -> Result<(), ReconError> {
    let total = coerce_count(record.get(Field::TotalNumber), "Total Number", policy)?;
    let cancelled = coerce_count(record.get(Field::Cancelled), "Cancelled", policy)?;
    record.insert(Field::TotalNumber, Cell::Number(total));
    record.insert(Field::Cancelled, Cell::Number(cancelled));
    let net = sub_amounts(total, cancelled, "Net Issued")?;
    record.insert(Field::NetIssued, Cell::Number(net));
    Ok(())
}

fn coerce_count(cell: &Cell, column: &str, policy: CountPolicy) -> Result<Decimal, ReconError> {
    if cell.is_blank() {
        return Ok(Decimal::ZERO);
    }
    let raw = cell.as_display();
    match parse_decimal(&raw) {
        Some(value) => Ok(value),
        None => match policy {
            CountPolicy::Zero => {
                warn!("Non-numeric {column} '{raw}' treated as 0");
                Ok(Decimal::ZERO)
            }
            CountPolicy::Reject => Err(ReconError::NumericCoercion {
                column: column.to_string(),
                value: raw,
            }),
        },
    }
}

fn classification_type_from_hint(filename_hint: &str) -> Option<&'static str> {
    let upper = filename_hint.to_uppercase();
    if upper.contains("B2B") {
        Some("B2B")
    } else if upper.contains("B2C") {
        Some("B2C")
    } else {
        None
    }
}

fn derive_classification(record: &mut NormalizedRecord, hinted_type: Option<&str>) {
    if record.get(Field::CodeType).is_blank()
        && let Some(kind) = hinted_type
    {
        record.insert(Field::CodeType, Cell::text(kind));
    }
    if record.get(Field::Rate).is_blank() {
        record.insert(Field::Rate, Cell::Number(Decimal::ZERO));
    }
}
