//! CSV export of fully-enriched rows.
//!
//! A pure serialization surface: callers run the post-processors first so
//! every derived field is populated, then hand the ordered row sequence
//! here.

use crate::error::Result;
use crate::schema::LedgerRow;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ExportRow<'a> {
    entry_number: &'a str,
    entry_counter: u32,
    posting_date: String,
    ledger_code: &'a str,
    account_code: &'a str,
    account_name: &'a str,
    debit: String,
    credit: String,
    side: &'a str,
    running_balance: String,
    voucher_type: &'a str,
    voucher_subtype: &'a str,
    description: &'a str,
    document_number: &'a str,
    counter_account: &'a str,
    counter_account_codes: &'a str,
    counter_ledger_codes: &'a str,
    source_file: &'a str,
}

/// Writes the rows with the fixed export column set.
pub fn write_rows_csv<W: Write>(w: W, rows: &[LedgerRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(w);

    for row in rows {
        writer.serialize(ExportRow {
            entry_number: &row.entry_number,
            entry_counter: row.entry_counter,
            posting_date: row.posting_date.format("%Y-%m-%d").to_string(),
            ledger_code: &row.ledger_code,
            account_code: &row.account_code,
            account_name: &row.account_name,
            debit: format!("{:.2}", row.debit),
            credit: format!("{:.2}", row.credit),
            side: row.side.as_str(),
            running_balance: format!("{:.2}", row.running_balance),
            voucher_type: row.voucher_type.as_str(),
            voucher_subtype: row.voucher_subtype.as_deref().unwrap_or(""),
            description: &row.description,
            document_number: &row.document_number,
            counter_account: &row.counter_account,
            counter_account_codes: &row.counter_account_codes_csv,
            counter_ledger_codes: &row.counter_ledger_codes_csv,
            source_file: &row.source_file,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{fill_counter_accounts, running_balance};
    use crate::schema::{GroupKey, RowSource, Side, VoucherType};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn row(account: &str, debit: Decimal, credit: Decimal) -> LedgerRow {
        LedgerRow {
            entry_number: "A1".to_string(),
            entry_counter: 1,
            posting_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ledger_code: crate::ingest::ledger_code_for(account),
            account_code: account.to_string(),
            account_name: "Hesap".to_string(),
            debit,
            credit,
            amount: debit - credit,
            voucher_type: VoucherType::Mahsup,
            voucher_subtype: None,
            description: "Satış".to_string(),
            document_number: String::new(),
            source: RowSource::Xml,
            source_file: "mart.xml".to_string(),
            side: Side::None,
            running_balance: Decimal::ZERO,
            group_key: None::<GroupKey>,
            counter_account: String::new(),
            counter_account_codes_csv: String::new(),
            counter_ledger_codes_csv: String::new(),
        }
    }

    #[test]
    fn test_export_includes_enrichment_columns() {
        let mut rows = vec![
            row("120-01", dec!(1000), Decimal::ZERO),
            row("600-01", Decimal::ZERO, dec!(1000)),
        ];
        rows[1].entry_counter = 2;
        fill_counter_accounts(&mut rows, true);
        running_balance(&mut rows);

        let mut out = Vec::new();
        write_rows_csv(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("entry_number;entry_counter;posting_date"));
        let first = lines.next().unwrap();
        assert!(first.contains(";1000.00;"));
        assert!(first.contains(";600;"));
        assert_eq!(lines.count(), 1);
    }
}
