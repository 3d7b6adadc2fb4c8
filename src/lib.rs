pub mod aggregate;
pub mod assemble;
pub mod classification;
pub mod cli;
pub mod config;
pub mod data;
pub mod document;
pub mod error;
pub mod io_utils;
pub mod normalize;
pub mod pipeline;
pub mod portal;
pub mod reclassify;
pub mod registry;
pub mod report;
pub mod storage;
pub mod table;

use std::{env, fs, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    classification::MasterCodeTable,
    cli::{Cli, Commands},
    config::RunConfig,
    document::Document,
    pipeline::{RunRequest, SourceFile},
    registry::{CategoryTag, mapping_for},
    storage::LocalStore,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("gstr_recon", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate(args) => handle_generate(&args),
        Commands::Verify(args) => handle_verify(&args),
        Commands::Portal(args) => handle_portal(&args),
        Commands::Mappings(args) => handle_mappings(&args),
    }
}

fn handle_generate(args: &cli::GenerateArgs) -> Result<()> {
    let config = RunConfig::load_or_default(args.config.as_deref())?;
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let base = match &args.base {
        Some(path) => read_document(path)?,
        None => Document::template(),
    };

    let mut inputs = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let bytes = fs::read(path).with_context(|| format!("Reading input {path:?}"))?;
        let content = io_utils::decode_bytes(&bytes, encoding)
            .with_context(|| format!("Decoding input {path:?}"))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        inputs.push(SourceFile::new(name, content));
    }
    debug!("Generating from {} input(s)", inputs.len());

    let outcome = pipeline::generate(&inputs, base, config.count_policy);
    let bytes = report::document_bytes(&outcome.document)?;
    fs::write(&args.output, bytes).with_context(|| format!("Writing document to {:?}", args.output))?;
    info!(
        "✓ {} category file(s) processed, {} skipped; document written to {:?}",
        outcome.categories_processed,
        outcome.skipped.len(),
        args.output
    );
    Ok(())
}

fn handle_verify(args: &cli::VerifyArgs) -> Result<()> {
    let config = RunConfig::load_or_default(args.config.as_deref())?;
    let master_path = args.master_codes.as_deref().or(config.master_codes.as_deref());
    let master = MasterCodeTable::load_or_builtin(master_path)?;
    let store = LocalStore::new(&args.store);
    let request = RunRequest {
        storage_key: args.key.clone(),
        ca_code: args.ca_code.clone(),
        customer_id: args.customer_id.clone(),
    };

    let summary = pipeline::run_verification(&store, &request, &master, &config)?;
    if args.json {
        let json = serde_json::to_string_pretty(&summary).context("Encoding run summary")?;
        println!("{json}");
    } else {
        println!("run:          {}", summary.run_id);
        println!(
            "identifiers:  {} checked, {} invalid, {} moved",
            summary.total_checked, summary.total_invalid, summary.total_moved
        );
        println!("codes:        {} corrected", summary.codes_corrected);
        println!("corrected:    {}", summary.corrected_key);
        println!("error report: {}", summary.error_report_key);
        if let Some(home) = &summary.dashboard.home_place {
            println!("home place:   {home}");
        }
        println!();
        print!("{}", table::dashboard_table(&summary.dashboard).render());
    }
    Ok(())
}

fn handle_portal(args: &cli::PortalArgs) -> Result<()> {
    let document = read_document(&args.document)?;
    let projected = portal::project(&document, &args.gstin, &args.period)
        .context("Projecting portal return")?;
    let json = serde_json::to_string_pretty(&projected).context("Encoding portal JSON")?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Writing portal JSON to {path:?}"))?;
            info!("✓ Portal JSON for {} written to {path:?}", args.period);
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn handle_mappings(args: &cli::MappingsArgs) -> Result<()> {
    let categories = match &args.category {
        Some(name) => vec![
            CategoryTag::from_sheet_name(name).ok_or_else(|| anyhow!("Unknown category '{name}'"))?,
        ],
        None => CategoryTag::ALL.to_vec(),
    };
    let mappings = categories.into_iter().map(mapping_for).collect::<Vec<_>>();
    print!("{}", table::mapping_table(&mappings).render());
    Ok(())
}

fn read_document(path: &Path) -> Result<Document> {
    let bytes = fs::read(path).with_context(|| format!("Reading document {path:?}"))?;
    Document::from_bytes(&bytes).with_context(|| format!("Decoding document {path:?}"))
}
