//! Classification-code correction and B2B -> B2C reapportionment on the
//! `hsn` sheet.
//!
//! Codes are first snapped to the closest entry of a [`MasterCodeTable`].
//! The taxable value recorded in a [`ShiftLedger`] is then moved, rate by
//! rate, from `B2B` rows to `B2C` rows so the sheet agrees with the
//! reclassified invoices. The sheet's total taxable value never changes.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result, ensure};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use similar::TextDiff;

use crate::{
    data::{Cell, add_amounts},
    document::{Document, Sheet},
    error::ReconError,
    reclassify::ShiftLedger,
    registry::{CategoryTag, ColumnIndex, ENGINE_RULES, Role},
};

const BUILTIN_CODES: &[(&str, &str)] = &[
    ("1001", "Wheat and meslin"),
    ("1002", "Rye"),
    ("998412", "Telecommunication services"),
    ("998599", "Other support services"),
    ("847130", "Portable digital ADP machines"),
    ("851712", "Telephones for cellular networks"),
    ("998311", "Management consulting"),
    ("998312", "Business consulting"),
    ("9983", "Professional Services"),
    ("8471", "Computers and tech"),
    ("99", "Service generic"),
];

const BUSINESS_TYPE: &str = "B2B";
const CONSUMER_TYPE: &str = "B2C";

/// Reference table of known classification codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterCodeTable {
    codes: BTreeMap<String, String>,
}

impl Default for MasterCodeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MasterCodeTable {
    pub fn builtin() -> Self {
        BUILTIN_CODES
            .iter()
            .map(|(code, description)| (code.to_string(), description.to_string()))
            .collect()
    }

    /// Reads a YAML map of `code: description`. Numeric keys are accepted.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let raw: serde_yaml::Mapping =
            serde_yaml::from_str(text).context("Parsing master code YAML")?;
        let mut codes = BTreeMap::new();
        for (key, description) in raw {
            let code = yaml_scalar(&key)
                .with_context(|| format!("Unsupported master code key {key:?}"))?;
            let description = yaml_scalar(&description)
                .with_context(|| format!("Unsupported description for code '{code}'"))?;
            codes.insert(code.trim().to_string(), description);
        }
        ensure!(!codes.is_empty(), "Master code table is empty");
        Ok(Self { codes })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Reading master code file {path:?}"))?;
        Self::from_yaml_str(&text).with_context(|| format!("Loading master codes from {path:?}"))
    }

    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn description(&self, code: &str) -> Option<&str> {
        self.codes.get(code).map(String::as_str)
    }

    /// Looks `raw` up exactly, then by character similarity.
    ///
    /// The code is trimmed and cut at its first `.` before lookup. Among
    /// equally similar candidates the lexicographically greatest wins.
    pub fn match_code(&self, raw: &str, threshold: f64) -> CodeMatch {
        let cleaned = clean_code(raw);
        if self.codes.contains_key(cleaned) {
            return CodeMatch::Exact(cleaned.to_string());
        }
        let best = self
            .codes
            .keys()
            .map(|candidate| (similarity(cleaned, candidate), candidate))
            .fold(None::<(f64, &String)>, |best, (score, candidate)| match best {
                Some((top, _)) if score < top => best,
                _ => Some((score, candidate)),
            });
        match best {
            Some((score, code)) if score >= threshold => CodeMatch::Approximate {
                code: code.clone(),
                score,
            },
            Some((score, code)) => CodeMatch::Unmatched {
                original: cleaned.to_string(),
                best: Some(code.clone()),
                score,
            },
            None => CodeMatch::Unmatched {
                original: cleaned.to_string(),
                best: None,
                score: 0.0,
            },
        }
    }
}

impl FromIterator<(String, String)> for MasterCodeTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            codes: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CodeMatch {
    Exact(String),
    Approximate { code: String, score: f64 },
    Unmatched {
        original: String,
        best: Option<String>,
        score: f64,
    },
}

impl CodeMatch {
    /// The code to write back, if any.
    pub fn resolved(&self) -> Option<&str> {
        match self {
            CodeMatch::Exact(code) | CodeMatch::Approximate { code, .. } => Some(code),
            CodeMatch::Unmatched { .. } => None,
        }
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(text) => Some(text.clone()),
        serde_yaml::Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn clean_code(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.split('.').next().unwrap_or(trimmed)
}

/// `2 * matches / total length`, 0.0 to 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    f64::from(TextDiff::from_chars(a, b).ratio())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeCorrections {
    pub corrected: usize,
    pub unmatched: usize,
}

struct CodeColumns {
    code: usize,
    taxable: usize,
    rate: usize,
    kind: Option<usize>,
    /// Tax amount columns; cleared on cloned rows.
    taxes: Vec<usize>,
}

impl CodeColumns {
    fn resolve(sheet: &Sheet) -> Option<Self> {
        let index = ColumnIndex::resolve(&sheet.headers, ENGINE_RULES);
        Some(Self {
            code: index.get(Role::Code)?,
            taxable: index.get(Role::TaxableValue)?,
            rate: index.get(Role::Rate)?,
            kind: index.get(Role::SupplyType),
            taxes: [Role::Integrated, Role::Central, Role::State, Role::Cess]
                .into_iter()
                .filter_map(|role| index.get(role))
                .collect(),
        })
    }
}

fn code_sheet(document: &mut Document) -> Option<(&mut Sheet, CodeColumns)> {
    let name = CategoryTag::Hsn.sheet_name();
    let sheet = document.sheet_mut(name)?;
    if sheet.data_row_count() == 0 {
        return None;
    }
    match CodeColumns::resolve(sheet) {
        Some(columns) => Some((sheet, columns)),
        None => {
            warn!("Sheet '{name}' lacks code, taxable value or rate columns; skipped");
            None
        }
    }
}

/// Rewrites every code on the `hsn` sheet that resolves to a different
/// master entry.
pub fn correct_codes(document: &mut Document, master: &MasterCodeTable, threshold: f64) -> CodeCorrections {
    let mut corrections = CodeCorrections::default();
    let Some((sheet, columns)) = code_sheet(document) else {
        return corrections;
    };
    for row in 0..sheet.rows.len() {
        let cell = sheet.cell(row, columns.code);
        if cell.is_blank() {
            continue;
        }
        let current = cell.as_display();
        let outcome = master.match_code(&current, threshold);
        match outcome.resolved() {
            Some(code) if code != current.trim() => {
                debug!(
                    "Code '{current}' on row {} corrected to '{code}' ({}, {outcome:?})",
                    row + 1,
                    master.description(code).unwrap_or_default()
                );
                let code = code.to_string();
                sheet.set_cell(row, columns.code, Cell::Text(code));
                corrections.corrected += 1;
            }
            Some(_) => {}
            None => {
                debug!("Code '{current}' on row {} left unchanged ({outcome:?})", row + 1);
                corrections.unmatched += 1;
            }
        }
    }
    info!(
        "✓ Corrected {} classification code(s); {} unmatched",
        corrections.corrected, corrections.unmatched
    );
    corrections
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapportionOutcome {
    pub shifted: Decimal,
    pub rows_added: usize,
    /// Ledger amounts that found no donor value, per rate.
    pub residuals: Vec<(Decimal, Decimal)>,
}

/// Moves each ledger amount from `B2B` rows to `B2C` rows at the same rate.
///
/// Donors are drained greedily in row order. The amount lands on the first
/// `B2C` row with the donor's code, or on a new `B2C` copy of the donor row.
pub fn reapportion(document: &mut Document, ledger: &ShiftLedger) -> Result<ReapportionOutcome, ReconError> {
    let mut outcome = ReapportionOutcome::default();
    if ledger.is_empty() {
        return Ok(outcome);
    }
    let Some((sheet, columns)) = code_sheet(document) else {
        return Ok(outcome);
    };
    let Some(kind_col) = columns.kind else {
        warn!("Sheet '{}' has no Type column; reapportionment skipped", sheet.name);
        return Ok(outcome);
    };

    for (rate, amount) in ledger.iter() {
        if amount <= Decimal::ZERO {
            continue;
        }
        let before = taxable_total(sheet, columns.taxable)?;
        let (donors, mut recipients) = partition_by_type(sheet, &columns, kind_col, rate);

        let mut remaining = amount;
        for donor in donors {
            let current = sheet.cell(donor, columns.taxable).as_decimal();
            let moved = current.min(remaining);
            if moved <= Decimal::ZERO {
                continue;
            }
            sheet.set_cell(donor, columns.taxable, Cell::Number(current - moved));

            let code = sheet.cell(donor, columns.code).as_display().trim().to_string();
            let matched = recipients
                .iter()
                .copied()
                .find(|&row| sheet.cell(row, columns.code).as_display().trim() == code);
            match matched {
                Some(row) => {
                    let total = add_amounts(
                        sheet.cell(row, columns.taxable).as_decimal(),
                        moved,
                        "Consumer code taxable value",
                    )?;
                    sheet.set_cell(row, columns.taxable, Cell::Number(total));
                }
                None => {
                    let mut copy = sheet.rows[donor].clone();
                    let width = copy.len().max(kind_col + 1).max(columns.taxable + 1);
                    copy.resize(width, Cell::Empty);
                    for &col in &columns.taxes {
                        if let Some(cell) = copy.get_mut(col) {
                            *cell = Cell::Empty;
                        }
                    }
                    copy[kind_col] = Cell::text(CONSUMER_TYPE);
                    copy[columns.taxable] = Cell::Number(moved);
                    recipients.push(sheet.push_row(copy));
                    outcome.rows_added += 1;
                }
            }
            remaining -= moved;
            outcome.shifted = add_amounts(outcome.shifted, moved, "Reapportioned taxable value")?;
            if remaining <= Decimal::ZERO {
                break;
            }
        }

        if remaining > Decimal::ZERO {
            warn!("Rate {rate}: {remaining} of {amount} could not be reapportioned");
            outcome.residuals.push((rate, remaining));
        }
        let after = taxable_total(sheet, columns.taxable)?;
        if before != after {
            return Err(ReconError::ConservationViolation { rate, before, after });
        }
    }
    info!(
        "✓ Reapportioned {} across {} rate(s); {} row(s) added",
        outcome.shifted,
        ledger.iter().count(),
        outcome.rows_added
    );
    Ok(outcome)
}

fn partition_by_type(sheet: &Sheet, columns: &CodeColumns, kind_col: usize, rate: Decimal) -> (Vec<usize>, Vec<usize>) {
    let mut donors = Vec::new();
    let mut recipients = Vec::new();
    for row in 0..sheet.rows.len() {
        if sheet.cell(row, columns.rate).as_decimal() != rate {
            continue;
        }
        match sheet.cell(row, kind_col).as_display().trim().to_uppercase().as_str() {
            BUSINESS_TYPE => donors.push(row),
            CONSUMER_TYPE => recipients.push(row),
            _ => {}
        }
    }
    (donors, recipients)
}

pub fn taxable_total(sheet: &Sheet, taxable_col: usize) -> Result<Decimal, ReconError> {
    (0..sheet.rows.len()).try_fold(Decimal::ZERO, |sum, row| {
        add_amounts(sum, sheet.cell(row, taxable_col).as_decimal(), "Code sheet taxable value")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::mapping_for;
    use rust_decimal_macros::dec;

    fn hsn_doc(rows: &[(&str, &str, Decimal, Decimal)]) -> Document {
        let mut doc = Document::new();
        let headers = mapping_for(CategoryTag::Hsn).template_headers();
        let sheet = doc.add_sheet(Sheet::with_headers("hsn", &headers));
        for (kind, code, rate, taxable) in rows {
            let mut cells = vec![Cell::Empty; headers.len()];
            cells[0] = Cell::text(*kind);
            cells[1] = Cell::text(*code);
            cells[6] = Cell::Number(*rate);
            cells[7] = Cell::Number(*taxable);
            sheet.push_row(cells);
        }
        doc
    }

    fn taxable_of(doc: &Document, row: usize) -> Decimal {
        doc.sheet("hsn").unwrap().cell(row, 7).as_decimal()
    }

    #[test]
    fn near_codes_are_snapped_and_distant_codes_kept() {
        let master = MasterCodeTable::builtin();
        assert_eq!(master.match_code("998412", 0.6), CodeMatch::Exact("998412".into()));
        assert_eq!(master.match_code(" 1001.00 ", 0.6), CodeMatch::Exact("1001".into()));
        assert!(matches!(
            master.match_code("99841", 0.6),
            CodeMatch::Approximate { ref code, score } if code == "998412" && score >= 0.6
        ));
        assert!(matches!(
            master.match_code("000000", 0.6),
            CodeMatch::Unmatched { ref original, score, .. } if original == "000000" && score < 0.6
        ));
    }

    #[test]
    fn ties_prefer_greater_code() {
        let master: MasterCodeTable = [("1234", "a"), ("1235", "b")]
            .into_iter()
            .map(|(c, d)| (c.to_string(), d.to_string()))
            .collect();
        assert_eq!(
            master.match_code("123", 0.5).resolved(),
            Some("1235")
        );
    }

    #[test]
    fn yaml_tables_accept_numeric_keys() {
        let master = MasterCodeTable::from_yaml_str("1001: Wheat\n'0101': Horses\n").unwrap();
        assert_eq!(master.description("0101"), Some("Horses"));
        assert_eq!(master.description("1001"), Some("Wheat"));
        assert_eq!(master.description("101"), None);
        assert!(MasterCodeTable::from_yaml_str("{}").is_err());
    }

    #[test]
    fn correction_rewrites_only_changed_codes() {
        let mut doc = hsn_doc(&[
            ("B2B", "99841", dec!(18), dec!(10)),
            ("B2B", "998412", dec!(18), dec!(10)),
            ("B2B", "000000", dec!(18), dec!(10)),
        ]);
        let corrections = correct_codes(&mut doc, &MasterCodeTable::builtin(), 0.6);
        assert_eq!(corrections, CodeCorrections { corrected: 1, unmatched: 1 });
        let sheet = doc.sheet("hsn").unwrap();
        assert_eq!(sheet.cell(0, 1), &Cell::text("998412"));
        assert_eq!(sheet.cell(2, 1), &Cell::text("000000"));
    }

    #[test]
    fn shift_drains_donors_into_matching_recipient() {
        let mut doc = hsn_doc(&[
            ("B2B", "998412", dec!(18), dec!(300)),
            ("B2B", "998599", dec!(18), dec!(400)),
            ("B2C", "998599", dec!(18), dec!(50)),
            ("B2B", "1001", dec!(5), dec!(900)),
        ]);
        let ledger = ShiftLedger::from_shifts([(dec!(18), dec!(500))]).unwrap();
        let outcome = reapportion(&mut doc, &ledger).unwrap();

        assert_eq!(outcome.shifted, dec!(500));
        assert_eq!(outcome.rows_added, 1);
        assert_eq!(taxable_of(&doc, 0), Decimal::ZERO);
        assert_eq!(taxable_of(&doc, 1), dec!(200));
        assert_eq!(taxable_of(&doc, 2), dec!(250));
        assert_eq!(taxable_of(&doc, 3), dec!(900));
        let sheet = doc.sheet("hsn").unwrap();
        assert_eq!(sheet.cell(4, 0), &Cell::text("B2C"));
        assert_eq!(sheet.cell(4, 1), &Cell::text("998412"));
        assert_eq!(taxable_of(&doc, 4), dec!(300));
    }

    #[test]
    fn residual_is_reported_when_donors_run_dry() {
        let mut doc = hsn_doc(&[("B2B", "1001", dec!(12), dec!(100))]);
        let ledger = ShiftLedger::from_shifts([(dec!(12), dec!(150)), (dec!(28), dec!(40))]).unwrap();
        let outcome = reapportion(&mut doc, &ledger).unwrap();
        assert_eq!(outcome.shifted, dec!(100));
        assert_eq!(
            outcome.residuals,
            vec![(dec!(12), dec!(50)), (dec!(28), dec!(40))]
        );
    }

    #[test]
    fn clone_becomes_recipient_for_later_donors() {
        let mut doc = hsn_doc(&[
            ("B2B", "8471", dec!(18), dec!(30)),
            ("B2B", "8471", dec!(18), dec!(30)),
        ]);
        let ledger = ShiftLedger::from_shifts([(dec!(18), dec!(50))]).unwrap();
        let outcome = reapportion(&mut doc, &ledger).unwrap();
        assert_eq!(outcome.rows_added, 1);
        assert_eq!(taxable_of(&doc, 2), dec!(50));
        assert_eq!(taxable_of(&doc, 1), dec!(10));
    }

    #[test]
    fn overflowing_sheet_total_is_an_error() {
        let mut doc = hsn_doc(&[
            ("B2B", "1001", dec!(18), Decimal::MAX),
            ("B2C", "1001", dec!(18), Decimal::MAX),
        ]);
        let ledger = ShiftLedger::from_shifts([(dec!(18), dec!(1))]).unwrap();
        let err = reapportion(&mut doc, &ledger).unwrap_err();
        assert!(matches!(err, ReconError::AmountOverflow { .. }));
    }

    #[test]
    fn missing_type_column_skips_shift() {
        let mut doc = Document::new();
        let sheet = doc.add_sheet(Sheet::with_headers("hsn", &["HSN", "Rate", "Taxable Value"]));
        sheet.push_row(vec![Cell::text("1001"), Cell::Number(dec!(5)), Cell::Number(dec!(10))]);
        let ledger = ShiftLedger::from_shifts([(dec!(5), dec!(10))]).unwrap();
        let outcome = reapportion(&mut doc, &ledger).unwrap();
        assert_eq!(outcome, ReapportionOutcome::default());
    }
}
