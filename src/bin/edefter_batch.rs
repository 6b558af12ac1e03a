//! Batch CLI: parse a file, directory or zip archive of ledger exports,
//! enrich the combined row set and write it as CSV, with a diagnostic log
//! alongside the output.

use clap::Parser;
use edefter_ledger::{
    enrich_rows, export, fieldmap::standard_fieldmap_json, load_batch, voucher_imbalances,
    FieldMap, LedgerError, Result,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "edefter-batch",
    version,
    about = "Parse e-Defter XML / text ledger exports into enriched CSV"
)]
struct Cli {
    /// Input: an XML/TXT/CSV file, a directory, or a zip archive
    input: PathBuf,

    /// Output CSV file
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Field map configuration
    #[arg(long = "fieldmap", default_value = "fieldmap.json")]
    fieldmap: PathBuf,

    /// Company code recorded in text-parse metadata
    #[arg(long = "company", default_value = "")]
    company: String,

    /// Write the standard field map to the --fieldmap path and exit
    #[arg(long = "write-default-fieldmap")]
    write_default_fieldmap: bool,
}

fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_dir() {
        let mut files = Vec::new();
        collect_dir(input, &mut files)?;
        files.sort();
        return Ok(files);
    }

    match input
        .extension()
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
        .and_then(|e| e.to_str())
    {
        Some("zip") => extract_zip(input),
        Some("xml") | Some("txt") | Some("csv") => Ok(vec![input.to_path_buf()]),
        _ => Err(LedgerError::Unsupported(format!(
            "{} is not an XML, TXT, CSV or zip input",
            input.display()
        ))),
    }
}

fn collect_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_dir(&path, files)?;
        } else if matches!(
            path.extension()
                .map(|e| e.to_ascii_lowercase())
                .as_deref()
                .and_then(|e| e.to_str()),
            Some("xml") | Some("txt") | Some("csv")
        ) {
            files.push(path);
        }
    }
    Ok(())
}

/// Extracts a zip archive's XML members into a temporary directory and
/// returns their paths.
fn extract_zip(archive_path: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| LedgerError::Unsupported(format!("zip archive: {e}")))?;

    let target = std::env::temp_dir().join(format!("edefter-batch-{}", std::process::id()));
    fs::create_dir_all(&target)?;

    let mut files = Vec::new();
    for i in 0..archive.len() {
        let mut member = archive
            .by_index(i)
            .map_err(|e| LedgerError::Unsupported(format!("zip member: {e}")))?;
        if !member.name().to_ascii_lowercase().ends_with(".xml") {
            continue;
        }
        let name = Path::new(member.name())
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let out_path = target.join(name);
        let mut out = File::create(&out_path)?;
        std::io::copy(&mut member, &mut out)?;
        files.push(out_path);
    }
    files.sort();
    Ok(files)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.write_default_fieldmap {
        fs::write(&cli.fieldmap, standard_fieldmap_json())?;
        println!("Wrote standard field map to {}", cli.fieldmap.display());
        return Ok(());
    }

    let fieldmap = FieldMap::load(&cli.fieldmap)?;

    let inputs = collect_inputs(&cli.input)?;
    if inputs.is_empty() {
        return Err(LedgerError::Unsupported(format!(
            "no ledger files found under {}",
            cli.input.display()
        )));
    }

    let mut batch = load_batch(&inputs, &fieldmap, &cli.company);
    enrich_rows(&mut batch.rows);
    let imbalances: Vec<_> = voucher_imbalances(&batch.rows)
        .into_iter()
        .filter(|v| !v.imbalance.is_zero())
        .collect();

    let out = File::create(&cli.output)?;
    export::write_rows_csv(out, &batch.rows)?;

    let log_path = cli.output.with_extension("log");
    let mut log = File::create(&log_path)?;
    writeln!(log, "inputs: {}", inputs.len())?;
    writeln!(log, "rows: {}", batch.rows.len())?;
    writeln!(log, "errors: {}", batch.errors.len())?;
    for (path, error) in &batch.errors {
        writeln!(log, "  {}: {error}", path.display())?;
    }
    writeln!(log, "unbalanced vouchers: {}", imbalances.len())?;
    for v in &imbalances {
        writeln!(
            log,
            "  {} {}: {:.2}",
            v.key.posting_date, v.key.entry_number, v.imbalance
        )?;
    }
    for (path, meta) in &batch.text_meta {
        writeln!(
            log,
            "text {}: {} parsed, {} skipped, delimiter {:?}, fallback encoding {}",
            path.display(),
            meta.parsed_rows,
            meta.skipped_rows,
            meta.delimiter,
            meta.used_fallback_encoding
        )?;
    }
    writeln!(log, "unmatched paths: {}", batch.unmatched_paths.len())?;
    for path in &batch.unmatched_paths {
        writeln!(log, "  {path}")?;
    }

    println!(
        "{} rows from {} files -> {} ({} file errors, {} unbalanced vouchers)",
        batch.rows.len(),
        inputs.len(),
        cli.output.display(),
        batch.errors.len(),
        imbalances.len()
    );

    if !batch.errors.is_empty() && batch.rows.is_empty() {
        return Err(LedgerError::Unsupported(
            "every input file failed to parse".to_string(),
        ));
    }
    Ok(())
}
