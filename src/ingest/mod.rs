//! Ingestion paths and the helpers they share.
//!
//! Both parsers normalize vendor quirks the same way: debit/credit side
//! codes, Turkish diacritics, surrogate entry numbers and voucher-type
//! inference all live here so XML- and text-sourced rows stay comparable.

pub mod text;
pub mod xml;

use crate::schema::{RowSource, Side, VoucherType};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// Unifies the debit/credit encodings seen across bookkeeping software:
/// leading `D` (debit) or `B` (borç) mean debit, leading `C` (credit) or
/// `A` (alacak) mean credit. Anything else is no side.
pub fn normalize_side(raw: &str) -> Side {
    match raw.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('D') | Some('B') => Side::Debit,
        Some('C') | Some('A') => Side::Credit,
        _ => Side::None,
    }
}

/// Replaces Turkish diacritics with their ASCII counterparts. Other
/// characters pass through unchanged.
pub fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'ç' => 'c',
            'Ç' => 'C',
            'ğ' => 'g',
            'Ğ' => 'G',
            'ı' => 'i',
            'İ' => 'I',
            'ö' => 'o',
            'Ö' => 'O',
            'ş' => 's',
            'Ş' => 'S',
            'ü' => 'u',
            'Ü' => 'U',
            'â' => 'a',
            'î' => 'i',
            'û' => 'u',
            _ => c,
        })
        .collect()
}

/// Hash-payload form of a free-text description: diacritics folded,
/// lowercased, stripped to alphanumerics, truncated to 80 characters.
///
/// The exact folding, truncation length and field order of the payload are a
/// compatibility contract: previously imported data is only reloadable
/// idempotently if re-parsing reproduces identical ids.
pub fn normalized_description(desc: &str) -> String {
    let folded = fold_diacritics(desc).to_lowercase();
    folded
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(80)
        .collect()
}

/// Builds a deterministic surrogate entry number for sources that omit one.
///
/// The payload is hashed with SHA-256 and the first 12 hex characters are
/// kept; the result is prefixed with the source tag and posting date so ids
/// stay greppable. `extra` lets the text parser fold in voucher type and
/// source file name, distinguishing otherwise-identical lines from
/// different exports.
pub fn synthesize_entry_number(
    source: RowSource,
    posting_date: NaiveDate,
    account_code: &str,
    debit: Decimal,
    credit: Decimal,
    counter: u32,
    description: &str,
    extra: &[&str],
) -> String {
    let mut payload = format!(
        "{}|{}|{:.2}|{:.2}|{}|{}",
        posting_date.format("%Y%m%d"),
        fold_diacritics(account_code).to_lowercase().trim(),
        debit,
        credit,
        counter,
        normalized_description(description),
    );
    for part in extra {
        payload.push('|');
        payload.push_str(&fold_diacritics(part).to_lowercase());
    }

    let digest = Sha256::digest(payload.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}",
        source.id_tag(),
        posting_date.format("%Y%m%d"),
        &hex[..12]
    )
}

fn has_opening_keyword(desc: &str) -> bool {
    fold_diacritics(desc).to_lowercase().contains("acilis")
}

fn has_closing_keyword(desc: &str) -> bool {
    fold_diacritics(desc).to_lowercase().contains("kapanis")
}

/// Voucher-type inference for XML sources.
///
/// Requires the conjunction of a description keyword and the matching
/// calendar boundary: opening vouchers must be dated January 1, closing
/// vouchers December 31. XML exports have reliable calendar semantics, so
/// the date corroborates the free-text signal.
pub fn infer_voucher_xml(description: &str, date: NaiveDate) -> (VoucherType, Option<String>) {
    if has_opening_keyword(description) && date.month() == 1 && date.day() == 1 {
        return (VoucherType::Acilis, Some(VoucherType::Acilis.as_str().to_string()));
    }
    if has_closing_keyword(description) && date.month() == 12 && date.day() == 31 {
        return (VoucherType::Kapanis, Some(VoucherType::Kapanis.as_str().to_string()));
    }
    (VoucherType::Mahsup, None)
}

/// Voucher-type inference for delimited text sources.
///
/// When an explicit type column is present its signal must be corroborated
/// by a description keyword; when the column is blank, the description alone
/// decides. Text exports have no reliable calendar semantics, so no date
/// rule applies. Deliberately not unified with [`infer_voucher_xml`].
pub fn infer_voucher_text(
    type_field: Option<&str>,
    description: &str,
) -> (VoucherType, Option<String>) {
    match type_field.map(str::trim).filter(|t| !t.is_empty()) {
        Some(raw) => {
            if has_opening_keyword(raw) && has_opening_keyword(description) {
                (VoucherType::Acilis, Some(raw.to_string()))
            } else if has_closing_keyword(raw) && has_closing_keyword(description) {
                (VoucherType::Kapanis, Some(raw.to_string()))
            } else {
                (VoucherType::Mahsup, Some(raw.to_string()))
            }
        }
        None => {
            if has_opening_keyword(description) {
                (VoucherType::Acilis, Some(VoucherType::Acilis.as_str().to_string()))
            } else if has_closing_keyword(description) {
                (VoucherType::Kapanis, Some(VoucherType::Kapanis.as_str().to_string()))
            } else {
                (VoucherType::Mahsup, None)
            }
        }
    }
}

// Ordered document-number matchers; the first capture wins.
static DOCUMENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Bracketed tag: "[no: ABC2024/15]"
        Regex::new(r"(?i)\[\s*no\s*[:.]?\s*([0-9A-Za-z/\.-]+)\s*\]").unwrap(),
        // Labeled: "Fatura No: GIB2024000001", "belge no 123"
        Regex::new(r"(?i)\b(?:fatura|belge|irsaliye)\s*no\s*[:.]?\s*([0-9A-Za-z/\.-]+)").unwrap(),
        // Bare short alphanumeric prefix code: "ABC2024000012345"
        Regex::new(r"\b([A-Z]{2,4}[0-9]{7,16})\b").unwrap(),
        // Generic label: "no: 42/B"
        Regex::new(r"(?i)\bno\s*[:.]\s*([0-9A-Za-z/\.-]+)").unwrap(),
    ]
});

/// Extracts an invoice/document number from a free-text description.
pub fn extract_document_number(description: &str) -> Option<String> {
    for pattern in DOCUMENT_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(description) {
            if let Some(m) = caps.get(1) {
                let value = m.as_str().trim_matches('.').trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Separators recognized inside hierarchical account codes.
const ACCOUNT_SEPARATORS: [char; 2] = ['-', '.'];

/// Composes a full account code from main and sub identifiers.
///
/// A sub id that already starts with the main id is used alone (vendors
/// often repeat the prefix); otherwise the two join with a dash. An
/// accidental `NNN-NNN-rest` repetition collapses to `NNN-rest`.
pub fn compose_account_code(main: &str, sub: &str) -> String {
    let main = main.trim();
    let sub = sub.trim();

    let code = if sub.is_empty() {
        main.to_string()
    } else if main.is_empty() || sub.starts_with(main) {
        sub.to_string()
    } else {
        format!("{main}-{sub}")
    };

    collapse_repeated_prefix(&code)
}

fn collapse_repeated_prefix(code: &str) -> String {
    let segments: Vec<&str> = code.split('-').collect();
    if segments.len() >= 2 && !segments[0].is_empty() && segments[0] == segments[1] {
        return segments[1..].join("-");
    }
    code.to_string()
}

/// Derives the ledger ("kebir") code: the account code up to its first
/// separator, or its first three characters when no separator exists.
pub fn ledger_code_for(account_code: &str) -> String {
    let code = account_code.trim();
    if let Some(pos) = code.find(&ACCOUNT_SEPARATORS[..]) {
        return code[..pos].to_string();
    }
    code.chars().take(3).collect()
}
