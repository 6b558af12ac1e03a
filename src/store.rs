//! Row repository port.
//!
//! The relational store is an external collaborator; the core only needs a
//! fetch/bulk-insert surface keyed by company and period, with
//! delete-and-replace-by-source-file semantics. Monetary amounts cross this
//! boundary as minor currency units (kuruş) so storage cannot accumulate
//! rounding drift; conversion rounds half away from zero.

use crate::error::Result;
use crate::schema::LedgerRow;
use crate::utils::period_of;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

/// Decimal major units -> integer minor units, round half away from zero.
pub fn to_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// Integer minor units -> decimal major units.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Storage port for canonical ledger rows.
pub trait RowStore {
    /// Rows for a company and year (optionally one month), in canonical
    /// order: posting date, entry number, entry counter.
    fn fetch_rows(&self, company: &str, year: i32, month: Option<u32>) -> Result<Vec<LedgerRow>>;

    /// Inserts a batch. With `replace_same_source`, rows previously stored
    /// for the same (company, year, month, source file) are deleted first,
    /// making re-imports of a corrected export idempotent.
    fn bulk_insert(
        &mut self,
        company: &str,
        rows: &[LedgerRow],
        source_file: &str,
        replace_same_source: bool,
    ) -> Result<()>;
}

/// Stored form: monetary fields held as minor units.
#[derive(Debug, Clone)]
struct StoredRow {
    source_file: String,
    debit_minor: i64,
    credit_minor: i64,
    amount_minor: i64,
    row: LedgerRow,
}

/// In-memory reference implementation of the port, used by tests and the
/// batch CLI.
#[derive(Debug, Default)]
pub struct MemoryStore {
    // (company, year, month) -> rows
    periods: HashMap<(String, i32, u32), Vec<StoredRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.periods.values().map(Vec::len).sum()
    }
}

impl RowStore for MemoryStore {
    fn fetch_rows(&self, company: &str, year: i32, month: Option<u32>) -> Result<Vec<LedgerRow>> {
        let mut rows: Vec<LedgerRow> = self
            .periods
            .iter()
            .filter(|((c, y, m), _)| {
                c == company && *y == year && month.map_or(true, |wanted| *m == wanted)
            })
            .flat_map(|(_, stored)| stored.iter())
            .map(|stored| {
                let mut row = stored.row.clone();
                row.debit = from_minor_units(stored.debit_minor);
                row.credit = from_minor_units(stored.credit_minor);
                row.amount = from_minor_units(stored.amount_minor);
                row
            })
            .collect();

        rows.sort_by(|a, b| {
            a.posting_date
                .cmp(&b.posting_date)
                .then_with(|| a.entry_number.cmp(&b.entry_number))
                .then_with(|| a.entry_counter.cmp(&b.entry_counter))
        });
        Ok(rows)
    }

    fn bulk_insert(
        &mut self,
        company: &str,
        rows: &[LedgerRow],
        source_file: &str,
        replace_same_source: bool,
    ) -> Result<()> {
        if replace_same_source {
            let touched: std::collections::BTreeSet<(i32, u32)> =
                rows.iter().map(|r| period_of(r.posting_date)).collect();
            for (year, month) in touched {
                if let Some(stored) =
                    self.periods
                        .get_mut(&(company.to_string(), year, month))
                {
                    stored.retain(|s| s.source_file != source_file);
                }
            }
        }

        for row in rows {
            let (year, month) = period_of(row.posting_date);
            self.periods
                .entry((company.to_string(), year, month))
                .or_default()
                .push(StoredRow {
                    source_file: source_file.to_string(),
                    debit_minor: to_minor_units(row.debit),
                    credit_minor: to_minor_units(row.credit),
                    amount_minor: to_minor_units(row.amount),
                    row: row.clone(),
                });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{GroupKey, RowSource, Side, VoucherType};
    use chrono::{Datelike, NaiveDate};
    use rust_decimal_macros::dec;

    fn row(entry: &str, date: (i32, u32, u32), debit: Decimal) -> LedgerRow {
        LedgerRow {
            entry_number: entry.to_string(),
            entry_counter: 1,
            posting_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            ledger_code: "100".to_string(),
            account_code: "100-01".to_string(),
            account_name: "Kasa".to_string(),
            debit,
            credit: Decimal::ZERO,
            amount: debit,
            voucher_type: VoucherType::Mahsup,
            voucher_subtype: None,
            description: String::new(),
            document_number: String::new(),
            source: RowSource::Xml,
            source_file: String::new(),
            side: Side::None,
            running_balance: Decimal::ZERO,
            group_key: None::<GroupKey>,
            counter_account: String::new(),
            counter_account_codes_csv: String::new(),
            counter_ledger_codes_csv: String::new(),
        }
    }

    #[test]
    fn test_minor_unit_conversion_rounds_half_away_from_zero() {
        assert_eq!(to_minor_units(dec!(10.005)), 1001);
        assert_eq!(to_minor_units(dec!(-10.005)), -1001);
        assert_eq!(to_minor_units(dec!(10.004)), 1000);
        assert_eq!(from_minor_units(1001), dec!(10.01));
        assert_eq!(from_minor_units(-250), dec!(-2.50));
    }

    #[test]
    fn test_roundtrip_preserves_two_decimal_amounts() {
        for raw in [dec!(0.01), dec!(123.45), dec!(-99999.99), Decimal::ZERO] {
            assert_eq!(from_minor_units(to_minor_units(raw)), raw);
        }
    }

    #[test]
    fn test_fetch_is_canonically_ordered() {
        let mut store = MemoryStore::new();
        store
            .bulk_insert(
                "F1",
                &[
                    row("B", (2024, 1, 20), dec!(2)),
                    row("A", (2024, 1, 20), dec!(1)),
                    row("A", (2024, 1, 5), dec!(3)),
                ],
                "ocak.xml",
                false,
            )
            .unwrap();

        let rows = store.fetch_rows("F1", 2024, Some(1)).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].posting_date.day(), 5);
        assert_eq!(rows[1].entry_number, "A");
        assert_eq!(rows[2].entry_number, "B");
    }

    #[test]
    fn test_replace_same_source_deletes_prior_rows() {
        let mut store = MemoryStore::new();
        store
            .bulk_insert("F1", &[row("A", (2024, 1, 5), dec!(1))], "ocak.xml", true)
            .unwrap();
        store
            .bulk_insert("F1", &[row("B", (2024, 1, 6), dec!(2))], "diger.xml", true)
            .unwrap();
        // Re-import of the corrected first file.
        store
            .bulk_insert(
                "F1",
                &[
                    row("A", (2024, 1, 5), dec!(1)),
                    row("A2", (2024, 1, 5), dec!(4)),
                ],
                "ocak.xml",
                true,
            )
            .unwrap();

        let rows = store.fetch_rows("F1", 2024, Some(1)).unwrap();
        assert_eq!(rows.len(), 3);
        // The sibling file's rows survived.
        assert!(rows.iter().any(|r| r.entry_number == "B"));
    }

    #[test]
    fn test_year_fetch_spans_months_and_companies_are_isolated() {
        let mut store = MemoryStore::new();
        store
            .bulk_insert("F1", &[row("A", (2024, 1, 5), dec!(1))], "a.xml", false)
            .unwrap();
        store
            .bulk_insert("F1", &[row("B", (2024, 2, 5), dec!(1))], "b.xml", false)
            .unwrap();
        store
            .bulk_insert("F2", &[row("C", (2024, 1, 5), dec!(1))], "c.xml", false)
            .unwrap();

        assert_eq!(store.fetch_rows("F1", 2024, None).unwrap().len(), 2);
        assert_eq!(store.fetch_rows("F1", 2024, Some(2)).unwrap().len(), 1);
        assert_eq!(store.fetch_rows("F2", 2024, None).unwrap().len(), 1);
        assert_eq!(store.fetch_rows("F1", 2023, None).unwrap().len(), 0);
    }
}
