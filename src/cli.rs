use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Assemble and reconcile GSTR-1 filing documents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Assemble per-category CSV exports into a filing document
    Generate(GenerateArgs),
    /// Validate, correct and reconcile a stored filing document
    Verify(VerifyArgs),
    /// Project a filing document into the portal JSON return format
    Portal(PortalArgs),
    /// List the column mappings of one or every category
    Mappings(MappingsArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// CSV exports to assemble; the category is detected from each file name
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Existing filing document to merge into (defaults to the blank template)
    #[arg(short, long)]
    pub base: Option<PathBuf>,
    /// Destination filing document (.json)
    #[arg(short, long)]
    pub output: PathBuf,
    /// Run configuration YAML
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Root directory of the local byte store
    #[arg(short, long)]
    pub store: PathBuf,
    /// Storage key of the filing document to verify
    #[arg(short, long)]
    pub key: String,
    /// Practitioner code used in output keys
    #[arg(long = "ca-code")]
    pub ca_code: String,
    /// Customer identifier used in output keys
    #[arg(long = "customer-id")]
    pub customer_id: Option<String>,
    /// Run configuration YAML
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Master code table YAML (overrides the configured one)
    #[arg(long = "master-codes")]
    pub master_codes: Option<PathBuf>,
    /// Print the run summary as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PortalArgs {
    /// Filing document (.json) to project
    #[arg(short, long)]
    pub document: PathBuf,
    /// Filer registration number
    #[arg(long)]
    pub gstin: String,
    /// Filing period as MMYYYY
    #[arg(long, value_parser = parse_period)]
    pub period: String,
    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MappingsArgs {
    /// Restrict the listing to one sheet name (e.g. `b2b`, `hsn`)
    #[arg(long)]
    pub category: Option<String>,
}

pub fn parse_period(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.len() != 6 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err("Period must be six digits (MMYYYY)".to_string());
    }
    let month: u32 = trimmed[..2]
        .parse()
        .map_err(|_| "Period month is not a number".to_string())?;
    if !(1..=12).contains(&month) {
        return Err(format!("Period month {month:02} is out of range"));
    }
    Ok(trimmed.to_string())
}
