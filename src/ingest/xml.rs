//! Streaming e-Defter XML parser.
//!
//! A forward-only scan over the document: a [`PathBuilder`] mirrors the
//! element nesting, every text and attribute node is matched against the
//! configured [`FieldMap`] candidate sets by canonical path, and each detail
//! element flushes into one canonical [`LedgerRow`]. Nothing here names a
//! vendor tag directly; unmapped-but-recognizable paths are caught by suffix
//! heuristics and everything else is recorded for diagnostics.

use crate::error::{LedgerError, Result};
use crate::fieldmap::{FieldMap, LogicalField, MATCH_ORDER};
use crate::ingest::{
    compose_account_code, extract_document_number, infer_voucher_xml, ledger_code_for,
    normalize_side, synthesize_entry_number,
};
use crate::paths::PathBuilder;
use crate::schema::{GroupKey, LedgerRow, RowSource, Side};
use crate::utils::{parse_flexible_date, parse_flexible_decimal};
use chrono::NaiveDate;
use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Default)]
struct HeaderScope {
    entry_number: String,
    posting_date: Option<NaiveDate>,
    description: String,
    document_number: String,
    /// Running count of detail lines seen under this header.
    line_counter: u32,
}

#[derive(Debug, Default)]
struct DetailScope {
    account_main: String,
    account_sub: String,
    account_name: String,
    side_code: String,
    amount: Option<Decimal>,
    comment: String,
    posting_date: Option<NaiveDate>,
    counter: Option<u32>,
    document_number: String,
}

/// Schema-agnostic ledger entry parser for e-Defter XML exports.
pub struct XmlLedgerParser<'a> {
    fieldmap: &'a FieldMap,
    unmatched: BTreeSet<String>,
    skipped_details: usize,
}

impl<'a> XmlLedgerParser<'a> {
    pub fn new(fieldmap: &'a FieldMap) -> Self {
        Self {
            fieldmap,
            unmatched: BTreeSet::new(),
            skipped_details: 0,
        }
    }

    pub fn parse_file(&mut self, path: &Path) -> Result<Vec<LedgerRow>> {
        let file = File::open(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.parse_reader(BufReader::new(file), &name)
    }

    /// Parses one document. Malformed XML aborts this file with an error;
    /// structurally empty or undatable detail lines are skipped silently.
    pub fn parse_reader<R: BufRead>(&mut self, r: R, source_file: &str) -> Result<Vec<LedgerRow>> {
        let mut reader = Reader::from_reader(r);
        reader.trim_text(true);

        let mut builder = PathBuilder::new();
        let mut header = HeaderScope::default();
        let mut detail = DetailScope::default();
        let mut in_detail = false;
        let mut rows = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    builder.push(&qualified);

                    let local = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                    if local == self.fieldmap.header_tag() {
                        header = HeaderScope::default();
                        in_detail = false;
                    } else if local == self.fieldmap.detail_tag() {
                        in_detail = true;
                        header.line_counter += 1;
                        detail = DetailScope::default();
                    }

                    for attr in e.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.local_name().as_ref())
                            .into_owned();
                        if let Ok(value) = attr.unescape_value() {
                            let path = builder.attribute(&key);
                            self.capture(&path, &value, &mut header, &mut detail, in_detail);
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    // Self-closing elements can still carry attribute values.
                    let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    builder.push(&qualified);
                    for attr in e.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.local_name().as_ref())
                            .into_owned();
                        if let Ok(value) = attr.unescape_value() {
                            let path = builder.attribute(&key);
                            self.capture(&path, &value, &mut header, &mut detail, in_detail);
                        }
                    }
                    builder.pop();
                }
                Ok(Event::Text(t)) => {
                    let value = t
                        .unescape()
                        .map_err(|e| LedgerError::Xml(e.to_string()))?
                        .into_owned();
                    let path = builder.current().to_string();
                    self.capture(&path, &value, &mut header, &mut detail, in_detail);
                }
                Ok(Event::CData(t)) => {
                    let value = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    let path = builder.current().to_string();
                    self.capture(&path, &value, &mut header, &mut detail, in_detail);
                }
                Ok(Event::End(e)) => {
                    let local = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                    if local == self.fieldmap.detail_tag() {
                        if let Some(row) = self.flush(&header, &mut detail, source_file) {
                            rows.push(row);
                        }
                        in_detail = false;
                    } else if local == self.fieldmap.header_tag() {
                        in_detail = false;
                    }
                    builder.pop();
                }
                Ok(Event::Eof) => {
                    if builder.depth() != 0 {
                        return Err(LedgerError::Xml(format!(
                            "unexpected end of document inside <{}>",
                            builder.current()
                        )));
                    }
                    break;
                }
                Err(e) => return Err(LedgerError::Xml(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        debug!(
            "{source_file}: {} rows, {} details skipped, {} unmatched paths",
            rows.len(),
            self.skipped_details,
            self.unmatched.len()
        );
        Ok(rows)
    }

    /// Paths seen in input that matched neither configuration nor heuristics.
    /// Observability data for fieldmap maintenance, never an error.
    pub fn unmatched_paths(&self) -> &BTreeSet<String> {
        &self.unmatched
    }

    pub fn skipped_details(&self) -> usize {
        self.skipped_details
    }

    fn capture(
        &mut self,
        path: &str,
        value: &str,
        header: &mut HeaderScope,
        detail: &mut DetailScope,
        in_detail: bool,
    ) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }

        // Configured mappings first, header fields before detail fields.
        for field in MATCH_ORDER {
            if self.fieldmap.matches(field, path) {
                Self::assign(field, value, header, detail);
                return;
            }
        }

        // Unmapped schema variant: suffix heuristics keep recognizable
        // detail fields flowing even before the fieldmap catches up.
        if in_detail && self.capture_by_suffix(path, value, detail) {
            return;
        }

        self.unmatched.insert(path.to_string());
    }

    fn capture_by_suffix(&self, path: &str, value: &str, detail: &mut DetailScope) -> bool {
        if path.ends_with("/amount") {
            detail.amount = parse_flexible_decimal(value);
            true
        } else if path.ends_with("/debitcreditcode") {
            detail.side_code = value.to_string();
            true
        } else if path.ends_with("/accountmainid") {
            detail.account_main = value.to_string();
            true
        } else if path.ends_with("/accountsubid") {
            detail.account_sub = value.to_string();
            true
        } else if path.ends_with("/documentnumber") {
            detail.document_number = value.to_string();
            true
        } else if path.ends_with("/postingdate") {
            detail.posting_date = parse_flexible_date(value);
            true
        } else if path.ends_with("/detailcomment") || path.ends_with("/linecomment") {
            detail.comment = value.to_string();
            true
        } else {
            false
        }
    }

    fn assign(
        field: LogicalField,
        value: &str,
        header: &mut HeaderScope,
        detail: &mut DetailScope,
    ) {
        match field {
            LogicalField::EntryNumber => header.entry_number = value.to_string(),
            LogicalField::EntryDate => header.posting_date = parse_flexible_date(value),
            LogicalField::EntryDescription => header.description = value.to_string(),
            LogicalField::EntryDocumentNumber => header.document_number = value.to_string(),
            LogicalField::LineCounter => detail.counter = value.parse().ok(),
            LogicalField::LineAccountMainId => detail.account_main = value.to_string(),
            LogicalField::LineAccountSubId => detail.account_sub = value.to_string(),
            LogicalField::LineAccountName => detail.account_name = value.to_string(),
            LogicalField::LineSide => detail.side_code = value.to_string(),
            LogicalField::LineAmount => detail.amount = parse_flexible_decimal(value),
            LogicalField::LineComment => detail.comment = value.to_string(),
            LogicalField::LineDate => detail.posting_date = parse_flexible_date(value),
            LogicalField::LineDocumentNumber => detail.document_number = value.to_string(),
        }
    }

    fn flush(
        &mut self,
        header: &HeaderScope,
        detail: &mut DetailScope,
        source_file: &str,
    ) -> Option<LedgerRow> {
        let detail = std::mem::take(detail);

        // Structurally empty detail: no account identity, no side signal.
        if detail.account_main.is_empty()
            && detail.account_sub.is_empty()
            && detail.side_code.is_empty()
        {
            self.skipped_details += 1;
            return None;
        }

        // A row without a posting date cannot be placed in any period.
        let posting_date = match header.posting_date.or(detail.posting_date) {
            Some(d) => d,
            None => {
                self.skipped_details += 1;
                return None;
            }
        };

        let side = normalize_side(&detail.side_code);
        let account_code = compose_account_code(&detail.account_main, &detail.account_sub);
        let ledger_code = ledger_code_for(&account_code);

        let amount = detail.amount.unwrap_or(Decimal::ZERO);
        let (debit, credit) = match side {
            Side::Debit => (amount.abs(), Decimal::ZERO),
            Side::Credit => (Decimal::ZERO, amount.abs()),
            Side::None => {
                if amount < Decimal::ZERO {
                    (Decimal::ZERO, amount.abs())
                } else {
                    (amount, Decimal::ZERO)
                }
            }
        };

        let entry_counter = detail.counter.unwrap_or(header.line_counter);
        let description = if detail.comment.is_empty() {
            header.description.clone()
        } else {
            detail.comment.clone()
        };

        let entry_number = if header.entry_number.is_empty() {
            synthesize_entry_number(
                RowSource::Xml,
                posting_date,
                &account_code,
                debit,
                credit,
                entry_counter,
                &description,
                &[],
            )
        } else {
            header.entry_number.clone()
        };

        let (voucher_type, voucher_subtype) = infer_voucher_xml(&description, posting_date);

        let document_number = if !detail.document_number.is_empty() {
            detail.document_number
        } else if !header.document_number.is_empty() {
            header.document_number.clone()
        } else {
            extract_document_number(&description).unwrap_or_default()
        };

        Some(LedgerRow {
            entry_number,
            entry_counter,
            posting_date,
            ledger_code,
            account_code,
            account_name: detail.account_name,
            debit,
            credit,
            amount,
            voucher_type,
            voucher_subtype,
            description,
            document_number,
            source: RowSource::Xml,
            source_file: source_file.to_string(),
            side: Side::None,
            running_balance: Decimal::ZERO,
            group_key: None::<GroupKey>,
            counter_account: String::new(),
            counter_account_codes_csv: String::new(),
            counter_ledger_codes_csv: String::new(),
        })
    }
}
