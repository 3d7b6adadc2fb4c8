//! In-memory filing document: ordered named sheets of typed cells.
//!
//! The header row lives apart from the data rows, so no write through
//! [`Sheet::set_cell`] or [`Sheet::push_row`] can land on it. Column lookups
//! go through the existing header; a sheet is never widened to fit new
//! column names.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    data::{Cell, normalize_column_name},
    error::ReconError,
    registry::{CategoryTag, NIL_EXEMPT_DESCRIPTIONS, mapping_for},
};

static EMPTY_CELL: Cell = Cell::Empty;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            headers: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn with_headers<S: AsRef<str>>(name: impl Into<String>, headers: &[S]) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn is_header_less(&self) -> bool {
        self.headers.iter().all(|h| h.trim().is_empty())
    }

    /// Position of `name` in the header, compared case/whitespace-normalized.
    pub fn column(&self, name: &str) -> Option<usize> {
        let wanted = normalize_column_name(name);
        self.headers
            .iter()
            .position(|header| normalize_column_name(header) == wanted)
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Writes a cell, growing the row set and the row width as needed.
    pub fn set_cell(&mut self, row: usize, column: usize, value: Cell) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= column {
            cells.resize(column + 1, Cell::Empty);
        }
        cells[column] = value;
    }

    pub fn row_is_blank(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .is_none_or(|cells| cells.iter().all(Cell::is_blank))
    }

    /// Row index right after the last non-blank row. Trailing blank rows
    /// are reused rather than skipped over.
    pub fn append_position(&self) -> usize {
        (0..self.rows.len())
            .rev()
            .find(|&idx| !self.row_is_blank(idx))
            .map_or(0, |idx| idx + 1)
    }

    pub fn push_row(&mut self, cells: Vec<Cell>) -> usize {
        let position = self.append_position();
        if position < self.rows.len() {
            self.rows[position] = cells;
        } else {
            self.rows.push(cells);
        }
        position
    }

    /// Rebuilds the row set without the given indices and returns the
    /// removed rows in their original order. Duplicate and out-of-range
    /// indices are ignored.
    pub fn remove_rows(&mut self, indices: &[usize]) -> Vec<Vec<Cell>> {
        if indices.is_empty() {
            return Vec::new();
        }
        let targets = indices.iter().copied().collect::<HashSet<_>>();
        let mut kept = Vec::with_capacity(self.rows.len());
        let mut removed = Vec::with_capacity(indices.len());
        for (idx, row) in std::mem::take(&mut self.rows).into_iter().enumerate() {
            if targets.contains(&idx) {
                removed.push(row);
            } else {
                kept.push(row);
            }
        }
        self.rows = kept;
        removed
    }

    pub fn data_row_count(&self) -> usize {
        self.append_position()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    sheets: Vec<Sheet>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// The blank filing template: one sheet per category with its standard
    /// header, and the nil/exempt description rows pre-filled.
    pub fn template() -> Self {
        let sheets = CategoryTag::ALL
            .into_iter()
            .map(|category| {
                let headers = mapping_for(category).template_headers();
                let mut sheet = Sheet::with_headers(category.sheet_name(), &headers);
                if category == CategoryTag::NilExempt {
                    for description in NIL_EXEMPT_DESCRIPTIONS {
                        sheet.push_row(vec![Cell::text(*description)]);
                    }
                }
                sheet
            })
            .collect();
        Self { sheets }
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn add_sheet(&mut self, sheet: Sheet) -> &mut Sheet {
        self.sheets.retain(|existing| existing.name != sheet.name);
        self.sheets.push(sheet);
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    /// Returns the named sheet, creating an empty header-less one if absent.
    /// The flag reports whether it was created.
    pub fn ensure_sheet(&mut self, name: &str) -> (&mut Sheet, bool) {
        match self.sheets.iter().position(|s| s.name == name) {
            Some(idx) => (&mut self.sheets[idx], false),
            None => (self.add_sheet(Sheet::new(name)), true),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ReconError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReconError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
