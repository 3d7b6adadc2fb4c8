#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use gstr_recon::data::Cell;
use gstr_recon::document::{Document, Sheet};
use gstr_recon::pipeline::SourceFile;
use gstr_recon::registry::{CategoryTag, mapping_for};
use rust_decimal::Decimal;
use tempfile::{TempDir, tempdir};

pub const FIXTURES: [&str; 6] = [
    "b2b.csv",
    "b2cs.csv",
    "hsn_b2b.csv",
    "hsn_b2c.csv",
    "docs.csv",
    "exemp.csv",
];

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Loads a fixture as an ingestion input named after the file.
pub fn fixture_source(name: &str) -> SourceFile {
    let content = fs::read_to_string(fixture_path(name)).expect("read fixture");
    SourceFile::new(name, content)
}

pub fn all_fixture_sources() -> Vec<SourceFile> {
    FIXTURES.iter().map(|name| fixture_source(name)).collect()
}

/// A sheet laid out with the template header of `category`.
pub fn template_sheet(category: CategoryTag) -> Sheet {
    Sheet::with_headers(
        category.sheet_name(),
        &mapping_for(category).template_headers(),
    )
}

/// `b2b` row in template column order.
pub fn b2b_row(identifier: &str, place: &str, rate: Decimal, taxable: Decimal) -> Vec<Cell> {
    let mut cells = vec![Cell::Empty; 12];
    cells[0] = Cell::text(identifier);
    cells[1] = Cell::text("Party");
    cells[2] = Cell::text("INV");
    cells[5] = Cell::Number(rate);
    cells[6] = Cell::Number(taxable);
    cells[8] = Cell::text(place);
    cells
}

/// `hsn` row in template column order.
pub fn hsn_row(kind: &str, code: &str, rate: Decimal, taxable: Decimal, cgst: Decimal) -> Vec<Cell> {
    let mut cells = vec![Cell::Empty; 12];
    cells[0] = Cell::text(kind);
    cells[1] = Cell::text(code);
    cells[6] = Cell::Number(rate);
    cells[7] = Cell::Number(taxable);
    cells[9] = Cell::Number(cgst);
    cells
}

pub fn sheet_taxable(document: &Document, sheet: &str, column: usize) -> Decimal {
    let sheet = document.sheet(sheet).expect("sheet exists");
    (0..sheet.rows.len())
        .map(|row| sheet.cell(row, column).as_decimal())
        .sum()
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` under the workspace, creating parent directories.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read_to_string(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }

    /// Every file below the workspace root, as `/`-joined relative keys.
    pub fn files(&self) -> Vec<String> {
        let mut found = Vec::new();
        collect_files(self.path(), self.path(), &mut found);
        found.sort();
        found
    }
}

fn collect_files(root: &Path, dir: &Path, found: &mut Vec<String>) {
    for entry in fs::read_dir(dir).expect("read dir") {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            collect_files(root, &path, found);
        } else {
            let relative = path.strip_prefix(root).expect("under root");
            found.push(
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/"),
            );
        }
    }
}
