mod common;

use chrono::NaiveDate;
use common::{all_fixture_sources, fixture_source, sheet_taxable};
use gstr_recon::classification::MasterCodeTable;
use gstr_recon::config::{CountPolicy, RunConfig};
use gstr_recon::data::Cell;
use gstr_recon::document::Document;
use gstr_recon::error::ReconError;
use gstr_recon::pipeline::{SourceFile, generate, reconcile};
use rust_decimal_macros::dec;

#[test]
fn fixtures_assemble_into_template_sheets() {
    let outcome = generate(&all_fixture_sources(), Document::template(), CountPolicy::Zero);
    assert_eq!(outcome.categories_processed, 6);
    assert!(outcome.skipped.is_empty());
    let document = &outcome.document;

    let b2b = document.sheet("b2b").unwrap();
    assert_eq!(b2b.data_row_count(), 3);
    let date = b2b.column("Date of Invoice").unwrap();
    let kind = b2b.column("Invoice Type").unwrap();
    let rcm = b2b.column("RCM Applicable").unwrap();
    let place = b2b.column("Place Of Supply").unwrap();
    assert_eq!(
        b2b.cell(0, date),
        &Cell::Date(NaiveDate::from_ymd_opt(2024, 4, 5).unwrap())
    );
    assert_eq!(b2b.cell(0, kind), &Cell::text("Regular"));
    assert_eq!(b2b.cell(0, rcm), &Cell::text("No"));
    assert_eq!(b2b.cell(2, rcm), &Cell::text("Yes"));
    assert_eq!(b2b.cell(1, place), &Cell::text("Maharashtra"));

    let hsn = document.sheet("hsn").unwrap();
    assert_eq!(hsn.data_row_count(), 3);
    assert_eq!(hsn.cell(0, 0), &Cell::text("B2B"));
    assert_eq!(hsn.cell(2, 0), &Cell::text("B2C"));

    let docs = document.sheet("Docs_issued").unwrap();
    let net = docs.column("Net Issued").unwrap();
    assert_eq!(docs.cell(0, net), &Cell::Number(dec!(118)));
    assert_eq!(docs.cell(1, net), &Cell::Number(dec!(5)));

    let nil = document.sheet("Nil_exempt_NonGST").unwrap();
    let nil_rated = nil.column("Nil Rated Supplies").unwrap();
    assert_eq!(nil.data_row_count(), 4);
    assert_eq!(nil.cell(1, nil_rated), &Cell::Number(dec!(1500)));
}

#[test]
fn second_generate_appends_after_existing_rows() {
    let first = generate(&[fixture_source("b2b.csv")], Document::template(), CountPolicy::Zero);
    let second = generate(&[fixture_source("b2b.csv")], first.document, CountPolicy::Zero);
    assert_eq!(second.document.sheet("b2b").unwrap().data_row_count(), 6);
}

#[test]
fn non_numeric_counts_follow_policy() {
    let inputs = [SourceFile::new(
        "docs.csv",
        "Nature of Document,Total Number,Cancelled\nInvoices,lots,1\n",
    )];

    let zeroed = generate(&inputs, Document::template(), CountPolicy::Zero);
    assert_eq!(zeroed.categories_processed, 1);
    let docs = zeroed.document.sheet("Docs_issued").unwrap();
    let net = docs.column("Net Issued").unwrap();
    assert_eq!(docs.cell(0, net), &Cell::Number(dec!(-1)));

    let rejected = generate(&inputs, Document::template(), CountPolicy::Reject);
    assert_eq!(rejected.categories_processed, 0);
    assert_eq!(rejected.skipped, vec!["docs.csv"]);
    assert_eq!(rejected.document, Document::template());
}

#[test]
fn missing_sheet_is_created_and_run_continues() {
    let outcome = generate(&[fixture_source("b2b.csv")], Document::new(), CountPolicy::Zero);
    assert_eq!(outcome.categories_processed, 1);
    let b2b = outcome.document.sheet("b2b").unwrap();
    assert!(b2b.is_header_less());
    assert!(b2b.rows.is_empty());
}

#[test]
fn generated_document_reconciles_end_to_end() {
    let mut document =
        generate(&all_fixture_sources(), Document::template(), CountPolicy::Zero).document;
    let hsn_before = sheet_taxable(&document, "hsn", 7);

    let outcome = reconcile(&mut document, &MasterCodeTable::builtin(), &RunConfig::default())
        .expect("reconcile");

    assert_eq!(outcome.reclassification.checked, 3);
    assert_eq!(outcome.reclassification.moved(), 1);
    assert_eq!(outcome.reclassification.ledger.get(dec!(18)), dec!(500));
    assert_eq!(outcome.corrections.corrected, 1);
    assert_eq!(outcome.reapportionment.shifted, dec!(500));
    assert_eq!(outcome.reapportionment.rows_added, 1);

    assert_eq!(document.sheet("b2b").unwrap().data_row_count(), 2);
    assert_eq!(document.sheet("b2cs").unwrap().data_row_count(), 2);

    let hsn = document.sheet("hsn").unwrap();
    assert_eq!(hsn.cell(1, 1).as_display(), "998412");
    assert_eq!(hsn.cell(0, 7).as_decimal(), dec!(1000));
    assert_eq!(hsn.cell(3, 0), &Cell::text("B2C"));
    assert_eq!(hsn.cell(3, 7).as_decimal(), dec!(500));
    assert_eq!(hsn.cell(3, 9), &Cell::Empty);
    assert_eq!(sheet_taxable(&document, "hsn", 7), hsn_before);

    assert_eq!(outcome.dashboard.hsn.cgst, dec!(169));
    assert_eq!(outcome.dashboard.b2b.taxable, dec!(2000));
    assert_eq!(outcome.dashboard.b2c.taxable, dec!(2500));
}

#[test]
fn near_max_taxable_value_fails_reconcile_instead_of_panicking() {
    let inputs = [SourceFile::new(
        "b2b.csv",
        "GSTIN/UIN of Recipient,Place Of Supply,Rate,Taxable Value\n\
         29AAAAA0000A1Z5,29-Karnataka,18,79228162514264337593543950335\n",
    )];
    let mut document = generate(&inputs, Document::template(), CountPolicy::Zero).document;

    let err = reconcile(&mut document, &MasterCodeTable::builtin(), &RunConfig::default())
        .unwrap_err();
    assert!(matches!(err, ReconError::AmountOverflow { .. }));
}
