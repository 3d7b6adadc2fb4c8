//! Plain-text tables for terminal output.

use std::{borrow::Cow, fmt::Write as _};

use itertools::Itertools;

use crate::{
    aggregate::{Dashboard, Group},
    registry::ColumnMapping,
};

const DASHBOARD_HEADERS: [&str; 7] = ["group", "taxable", "igst", "cgst", "sgst", "cess", "total_tax"];
const MAPPING_HEADERS: [&str; 4] = ["sheet", "field", "sources", "column"];

#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Columns are padded to their widest cell and separated by two spaces.
    pub fn render(&self) -> String {
        let mut widths = self
            .headers
            .iter()
            .map(|h| h.chars().count().max(3))
            .collect::<Vec<_>>();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(single_line(cell).chars().count());
            }
        }

        let mut output = String::new();
        let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
        for line in std::iter::once(&self.headers)
            .chain(std::iter::once(&separator))
            .chain(&self.rows)
        {
            let _ = writeln!(output, "{}", pad_line(line, &widths));
        }
        output
    }
}

fn pad_line(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{:<width$}", single_line(value), width = *width))
        .join("  ");
    line.trim_end().to_string()
}

fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

pub fn dashboard_table(dashboard: &Dashboard) -> Table {
    let mut table = Table::new(&DASHBOARD_HEADERS);
    for group in Group::ALL {
        let totals = dashboard.group(group);
        table.push(
            std::iter::once(group.label().to_string())
                .chain(
                    [
                        totals.taxable,
                        totals.igst,
                        totals.cgst,
                        totals.sgst,
                        totals.cess,
                        totals.total_tax,
                    ]
                    .into_iter()
                    .map(|amount| amount.normalize().to_string()),
                )
                .collect(),
        );
    }
    table
}

pub fn mapping_table(mappings: &[ColumnMapping]) -> Table {
    let mut table = Table::new(&MAPPING_HEADERS);
    for mapping in mappings {
        for entry in mapping.entries() {
            table.push(vec![
                mapping.category.sheet_name().to_string(),
                format!("{:?}", entry.field),
                entry.sources.join(" | "),
                entry.column.to_string(),
            ]);
        }
    }
    table
}
