//! # e-Defter Ledger Engine
//!
//! A schema-tolerant ingestion and reporting engine for Turkish standard
//! e-Ledger (e-Defter) XML exports and loosely-structured TXT/CSV exports
//! from accounting software.
//!
//! ## Core Concepts
//!
//! - **Canonical Row**: every debit-or-credit movement line, from any
//!   source, lands in one [`LedgerRow`] shape
//! - **Path Normalization**: XML matching runs on canonical paths that are
//!   independent of vendor wrapper elements, prefixes and casing
//! - **Field Map**: a configuration file maps logical ledger fields to
//!   candidate paths; no vendor tag name is hardcoded in the parser
//! - **Enrichment**: counter-account attribution and running balances are
//!   computed in fixed-order passes over the complete row set
//! - **Reports**: trial balance (mizan) rollups and aging buckets derive
//!   from the enriched rows
//!
//! ## Example
//!
//! ```rust,ignore
//! use edefter_ledger::*;
//! use std::path::PathBuf;
//!
//! let fieldmap = FieldMap::load(std::path::Path::new("fieldmap.json"))?;
//! let mut batch = load_batch(&[PathBuf::from("defter-2024-01.xml")], &fieldmap, "FIRMA1");
//! enrich_rows(&mut batch.rows);
//!
//! let chart = ChartOfAccounts::load(std::path::Path::new("hesap_plani.txt"));
//! let (start, end) = year_window(2024);
//! let mizan = mizan::calculate(&batch.rows, &MizanOptions::for_window(start, end), &chart);
//! let aging = aging::calculate(&batch.rows, end);
//! ```

pub mod aging;
pub mod chart_of_accounts;
pub mod enrich;
pub mod error;
pub mod explorer;
pub mod export;
pub mod fieldmap;
pub mod ingest;
pub mod mizan;
pub mod paths;
pub mod schema;
pub mod store;
pub mod utils;

pub use chart_of_accounts::ChartOfAccounts;
pub use enrich::{
    fill_counter_accounts, running_balance, running_balance_per_account, voucher_imbalances,
};
pub use error::{LedgerError, Result};
pub use fieldmap::{FieldMap, LogicalField};
pub use ingest::text::{TextParseResult, parse_file as parse_text_file};
pub use ingest::xml::XmlLedgerParser;
pub use mizan::{ActivityFilter, MizanOptions, MizanView};
pub use paths::{normalize_path, PathBuilder};
pub use schema::*;
pub use store::{MemoryStore, RowStore};
pub use utils::year_window;

use log::{info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Outcome of loading a batch of input files.
///
/// Per-file errors never abort sibling files; they are collected here for
/// the caller to report.
#[derive(Debug, Default)]
pub struct LoadedBatch {
    pub rows: Vec<LedgerRow>,
    pub errors: Vec<(PathBuf, LedgerError)>,
    /// XML paths that matched neither configuration nor heuristics, merged
    /// across all files.
    pub unmatched_paths: BTreeSet<String>,
    /// Metadata per successfully parsed text file.
    pub text_meta: Vec<(PathBuf, TextParseMeta)>,
}

fn is_xml(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}

/// Parses every input file into one combined row collection.
///
/// Dispatches on extension: `.xml` through the e-Defter parser, everything
/// else through the delimited text parser. Run [`enrich_rows`] afterwards,
/// and only after *all* files of the logical batch are loaded, because
/// counter-account attribution and running balances are defined over the
/// complete row set.
pub fn load_batch(paths: &[PathBuf], fieldmap: &FieldMap, company_code: &str) -> LoadedBatch {
    let mut batch = LoadedBatch::default();
    let mut parser = XmlLedgerParser::new(fieldmap);

    for path in paths {
        let outcome = if is_xml(path) {
            parser.parse_file(path).map(|rows| (rows, None))
        } else {
            ingest::text::parse_file(path, company_code)
                .map(|result| (result.rows, Some(result.meta)))
        };

        match outcome {
            Ok((rows, meta)) => {
                info!("{}: {} rows", path.display(), rows.len());
                batch.rows.extend(rows);
                if let Some(meta) = meta {
                    batch.text_meta.push((path.clone(), meta));
                }
            }
            Err(e) => {
                warn!("{}: {e}", path.display());
                batch.errors.push((path.clone(), e));
            }
        }
    }

    batch.unmatched_paths = parser.unmatched_paths().clone();
    batch
}

/// Runs the standard enrichment passes in their fixed order:
/// counter-account attribution (sides, group keys, counter sets) first,
/// then the global running balance, which also leaves the rows sorted
/// chronologically.
pub fn enrich_rows(rows: &mut Vec<LedgerRow>) {
    fill_counter_accounts(rows, true);
    running_balance(rows);
}
