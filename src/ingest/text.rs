//! Delimited TXT/CSV ledger parser.
//!
//! Text exports are far looser than e-Defter XML: unknown encoding, unknown
//! delimiter, a header row hiding somewhere below report banners, and
//! Turkish column names spelled a dozen ways. Detection runs first, then the
//! rows stream through the same canonicalization as the XML path.

use crate::error::{LedgerError, Result};
use crate::ingest::{
    extract_document_number, infer_voucher_text, ledger_code_for, normalize_side,
    synthesize_entry_number,
};
use crate::schema::{GroupKey, LedgerRow, RowSource, Side, TextParseMeta};
use crate::utils::{parse_flexible_date, parse_flexible_decimal, period_of};
use crate::ingest::fold_diacritics;
use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// Parsed rows plus the metadata callers use to pick a storage period.
#[derive(Debug)]
pub struct TextParseResult {
    pub rows: Vec<LedgerRow>,
    pub meta: TextParseMeta,
}

/// How many leading lines are scanned for the header row.
const HEADER_SCAN_LIMIT: usize = 50;
/// How many leading lines are sampled for the mojibake signal.
const ENCODING_SAMPLE_LINES: usize = 10;

/// Logical columns recognized in delimited exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    Date,
    AccountCode,
    AccountName,
    Debit,
    Credit,
    Amount,
    SideCode,
    VoucherNumber,
    VoucherType,
    Description,
    LineCounter,
    DocumentNumber,
}

/// Canonicalizes a header cell (diacritic fold, lowercase, de-space, strip
/// punctuation) and maps known synonyms onto one logical column.
fn canonical_column(cell: &str) -> Option<Column> {
    let key: String = fold_diacritics(cell)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    match key.as_str() {
        "tarih" | "fistarihi" | "islemtarihi" | "kayittarihi" => Some(Column::Date),
        "hesapkodu" | "hesapkod" | "hesapno" | "hesap" => Some(Column::AccountCode),
        "hesapadi" | "hesapismi" | "hesapunvani" => Some(Column::AccountName),
        "borc" | "borctutari" | "borctutar" => Some(Column::Debit),
        "alacak" | "alacaktutari" | "alacaktutar" => Some(Column::Credit),
        "tutar" | "meblag" => Some(Column::Amount),
        "ba" | "borcalacak" | "yon" => Some(Column::SideCode),
        // Voucher, journal and document numbers all key the same logical
        // voucher-number column in these exports.
        "fisno" | "fisnumarasi" | "yevmiye" | "yevmiyeno" | "belgeno" => {
            Some(Column::VoucherNumber)
        }
        "fisturu" | "fistur" | "fistipi" => Some(Column::VoucherType),
        "aciklama" | "izahat" => Some(Column::Description),
        "sira" | "sirano" | "satir" | "satirno" => Some(Column::LineCounter),
        "evrakno" | "evrak" => Some(Column::DocumentNumber),
        _ => None,
    }
}

/// Delimiter preference for a candidate header line: tab, then semicolon,
/// then comma; semicolon when nothing matches.
fn detect_delimiter(line: &str) -> char {
    if line.contains('\t') {
        '\t'
    } else if line.contains(';') {
        ';'
    } else if line.contains(',') {
        ','
    } else {
        ';'
    }
}

fn decode(bytes: &[u8]) -> (String, bool) {
    let lossy = String::from_utf8_lossy(bytes);
    let mojibake = lossy
        .lines()
        .take(ENCODING_SAMPLE_LINES)
        .any(|l| l.contains('\u{FFFD}'));
    if mojibake {
        let (decoded, _, _) = encoding_rs::WINDOWS_1254.decode(bytes);
        (decoded.into_owned(), true)
    } else {
        (lossy.into_owned(), false)
    }
}

struct HeaderLayout {
    line_index: usize,
    delimiter: char,
    columns: HashMap<Column, usize>,
}

/// A line is the header when it yields a date column plus either an account
/// code or an account name column.
fn find_header(lines: &[&str]) -> Option<HeaderLayout> {
    for (i, line) in lines.iter().take(HEADER_SCAN_LIMIT).enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let delimiter = detect_delimiter(line);
        let mut columns = HashMap::new();
        for (idx, cell) in line.split(delimiter).enumerate() {
            if let Some(col) = canonical_column(cell) {
                columns.entry(col).or_insert(idx);
            }
        }
        if columns.contains_key(&Column::Date)
            && (columns.contains_key(&Column::AccountCode)
                || columns.contains_key(&Column::AccountName))
        {
            return Some(HeaderLayout {
                line_index: i,
                delimiter,
                columns,
            });
        }
    }
    None
}

/// Parses one delimited export. The company code is passed through into the
/// metadata for storage keying; rows themselves carry no company field.
pub fn parse_file(path: &Path, company_code: &str) -> Result<TextParseResult> {
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_bytes(&bytes, &name, company_code)
}

pub fn parse_bytes(bytes: &[u8], source_file: &str, company_code: &str) -> Result<TextParseResult> {
    let (text, used_fallback_encoding) = decode(bytes);
    if used_fallback_encoding {
        info!("{source_file}: UTF-8 decode produced mojibake, fell back to windows-1254");
    }

    let lines: Vec<&str> = text.lines().collect();
    let layout = find_header(&lines)
        .ok_or_else(|| LedgerError::NoHeaderRow(Path::new(source_file).to_path_buf()))?;
    debug!(
        "{source_file}: header at line {}, delimiter {:?}",
        layout.line_index, layout.delimiter
    );

    let body = lines[layout.line_index + 1..].join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(layout.delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let cell = |record: &csv::StringRecord, col: Column| -> Option<String> {
        layout
            .columns
            .get(&col)
            .and_then(|idx| record.get(*idx))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    let mut counters: HashMap<(String, NaiveDate), u32> = HashMap::new();
    let mut periods: BTreeSet<(i32, u32)> = BTreeSet::new();
    let mut period_freq: HashMap<(i32, u32), usize> = HashMap::new();
    let mut min_date: Option<NaiveDate> = None;
    let mut max_date: Option<NaiveDate> = None;

    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let posting_date = match cell(&record, Column::Date).and_then(|d| parse_flexible_date(&d))
        {
            Some(d) => d,
            None => {
                skipped += 1;
                continue;
            }
        };

        let account_code = cell(&record, Column::AccountCode).unwrap_or_default();
        let account_name = cell(&record, Column::AccountName).unwrap_or_default();
        if account_code.is_empty() && account_name.is_empty() {
            skipped += 1;
            continue;
        }
        let ledger_code = ledger_code_for(&account_code);

        let description = cell(&record, Column::Description).unwrap_or_default();
        let voucher_type_cell = cell(&record, Column::VoucherType);
        let (voucher_type, voucher_subtype) =
            infer_voucher_text(voucher_type_cell.as_deref(), &description);

        let explicit_debit = cell(&record, Column::Debit).and_then(|v| parse_flexible_decimal(&v));
        let explicit_credit =
            cell(&record, Column::Credit).and_then(|v| parse_flexible_decimal(&v));

        let has_explicit_columns = layout.columns.contains_key(&Column::Debit)
            || layout.columns.contains_key(&Column::Credit);

        let (debit, credit, amount) = if has_explicit_columns {
            let d = explicit_debit.unwrap_or(Decimal::ZERO).abs();
            let c = explicit_credit.unwrap_or(Decimal::ZERO).abs();
            (d, c, d - c)
        } else {
            let amount = cell(&record, Column::Amount)
                .and_then(|v| parse_flexible_decimal(&v))
                .unwrap_or(Decimal::ZERO);
            let side = cell(&record, Column::SideCode)
                .map(|v| normalize_side(&v))
                .unwrap_or(Side::None);
            match side {
                Side::Debit => (amount.abs(), Decimal::ZERO, amount),
                Side::Credit => (Decimal::ZERO, amount.abs(), amount),
                // Un-coded nonzero amounts default to debit.
                Side::None => (amount.abs(), Decimal::ZERO, amount),
            }
        };

        let entry_counter = cell(&record, Column::LineCounter)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or_else(|| {
                let voucher_no = cell(&record, Column::VoucherNumber).unwrap_or_default();
                let slot = counters.entry((voucher_no, posting_date)).or_insert(0);
                *slot += 1;
                *slot
            });

        let entry_number = match cell(&record, Column::VoucherNumber) {
            Some(no) => no,
            None => synthesize_entry_number(
                RowSource::Text,
                posting_date,
                &account_code,
                debit,
                credit,
                entry_counter,
                &description,
                &[voucher_type.as_str(), source_file],
            ),
        };

        let document_number = cell(&record, Column::DocumentNumber)
            .or_else(|| extract_document_number(&description))
            .unwrap_or_default();

        min_date = Some(min_date.map_or(posting_date, |d| d.min(posting_date)));
        max_date = Some(max_date.map_or(posting_date, |d| d.max(posting_date)));
        let period = period_of(posting_date);
        periods.insert(period);
        *period_freq.entry(period).or_insert(0) += 1;

        rows.push(LedgerRow {
            entry_number,
            entry_counter,
            posting_date,
            ledger_code,
            account_code,
            account_name,
            debit,
            credit,
            amount,
            voucher_type,
            voucher_subtype,
            description,
            document_number,
            source: RowSource::Text,
            source_file: source_file.to_string(),
            side: Side::None,
            running_balance: Decimal::ZERO,
            group_key: None::<GroupKey>,
            counter_account: String::new(),
            counter_account_codes_csv: String::new(),
            counter_ledger_codes_csv: String::new(),
        });
    }

    // Modal period: most frequent year-month, ties broken by earlier period.
    let detected = period_freq
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(p, _)| *p);

    let meta = TextParseMeta {
        company_code: company_code.to_string(),
        min_date,
        max_date,
        period_count: periods.len(),
        detected_year: detected.map(|(y, _)| y),
        detected_month: detected.map(|(_, m)| m),
        parsed_rows: rows.len(),
        skipped_rows: skipped,
        used_fallback_encoding,
        delimiter: layout.delimiter,
    };

    Ok(TextParseResult { rows, meta })
}
