//! Merges normalized records into the sheets of a filing document.
//!
//! Most categories are appended below the last populated row. The nil/exempt
//! category instead overwrites the template rows whose description matches
//! the incoming record; records without a matching row are dropped.

use std::{borrow::Cow, collections::HashMap, sync::OnceLock};

use log::{debug, warn};
use regex::Regex;

use crate::{
    data::{Cell, parse_abbreviated_date},
    document::{Document, Sheet},
    error::ReconError,
    normalize::NormalizedRecord,
    registry::{CategoryTag, ColumnMapping, Field, Transform, WriteMode, mapping_for},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub rows_written: usize,
    /// Match-mode records with no template row to land on.
    pub rows_dropped: usize,
    pub sheet_created: bool,
}

pub fn assemble(
    document: &mut Document,
    category: CategoryTag,
    records: &[NormalizedRecord],
) -> AssemblyStats {
    let (sheet, created) = document.ensure_sheet(category.sheet_name());
    if created {
        warn!(
            "{}; created an empty sheet",
            ReconError::Schema {
                sheet: category.sheet_name().to_string()
            }
        );
    }
    let mapping = mapping_for(category);
    let mut stats = match category.write_mode() {
        WriteMode::Append => AssemblyStats {
            rows_written: append_records(sheet, &mapping, records),
            ..AssemblyStats::default()
        },
        WriteMode::Match => match_records(sheet, &mapping, records),
    };
    stats.sheet_created = created;
    stats
}

fn mapped_columns(sheet: &Sheet, mapping: &ColumnMapping) -> Vec<(Field, usize)> {
    mapping
        .entries()
        .iter()
        .filter_map(|entry| sheet.column(entry.column).map(|col| (entry.field, col)))
        .collect()
}

fn append_records(sheet: &mut Sheet, mapping: &ColumnMapping, records: &[NormalizedRecord]) -> usize {
    let columns = mapped_columns(sheet, mapping);
    if columns.is_empty() {
        warn!(
            "Sheet '{}' has no columns for {}; {} record(s) not written",
            sheet.name,
            mapping.category,
            records.len()
        );
        return 0;
    }
    let mut row = sheet.append_position();
    for record in records {
        for &(field, col) in &columns {
            sheet.set_cell(row, col, transform_value(field, record.get(field)));
        }
        row += 1;
    }
    records.len()
}

fn match_records(sheet: &mut Sheet, mapping: &ColumnMapping, records: &[NormalizedRecord]) -> AssemblyStats {
    let mut stats = AssemblyStats::default();
    let template_rows = (0..sheet.rows.len())
        .filter_map(|idx| {
            let description = sheet.cell(idx, 0).as_display().trim().to_string();
            (!description.is_empty()).then_some((description, idx))
        })
        .collect::<HashMap<_, _>>();
    let columns = mapped_columns(sheet, mapping);

    for record in records {
        let description = record.text(Field::Description).trim().to_string();
        let Some(&row) = template_rows.get(&description) else {
            debug!("No template row for '{description}' in '{}'; dropped", sheet.name);
            stats.rows_dropped += 1;
            continue;
        };
        for &(field, col) in &columns {
            let cell = record.get(field);
            if cell.is_blank() {
                continue;
            }
            let text = cell.as_display();
            let value = match Cell::from_numeric_text(&text.replace(',', "")) {
                number @ Cell::Number(_) => number,
                _ => Cell::Text(text),
            };
            sheet.set_cell(row, col, value);
        }
        stats.rows_written += 1;
    }
    if stats.rows_dropped > 0 {
        warn!(
            "{} record(s) for '{}' matched no template description",
            stats.rows_dropped, sheet.name
        );
    }
    stats
}

fn place_code_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+-\s*").expect("static place pattern compiles"))
}

/// `33-Tamil Nadu` -> `Tamil Nadu`.
pub fn strip_place_code(value: &str) -> String {
    place_code_prefix().replace(value, "").trim().to_string()
}

/// Applies the field's write transform, then coerces numeric-looking text.
pub fn transform_value(field: Field, cell: &Cell) -> Cell {
    let text = match cell {
        Cell::Text(text) => text.as_str(),
        Cell::Empty => return Cell::Empty,
        other => return other.clone(),
    };
    let rewritten: Cow<'_, str> = match field.transform() {
        Transform::None => Cow::Borrowed(text),
        Transform::PlaceOfSupply => Cow::Owned(strip_place_code(text)),
        Transform::InvoiceType => Cow::Owned(
            text.replace(" B2B", "")
                .replace(" B2C", "")
                .trim()
                .to_string(),
        ),
        Transform::YesNo => match text {
            "Y" => Cow::Borrowed("Yes"),
            "N" => Cow::Borrowed("No"),
            _ => Cow::Borrowed(text),
        },
        Transform::Date => match parse_abbreviated_date(text) {
            Some(date) => return Cell::Date(date),
            None => Cow::Borrowed(text),
        },
    };
    Cell::from_numeric_text(&rewritten)
}
