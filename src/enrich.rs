//! Post-processors over a loaded row collection.
//!
//! These run after *all* rows of a logical batch are collected, in a fixed
//! order, and each stage writes a documented set of fields:
//!
//! - [`fill_counter_accounts`] writes `side`, `group_key`, `counter_account`,
//!   `counter_account_codes_csv`, `counter_ledger_codes_csv`.
//! - [`running_balance`] / [`running_balance_per_account`] write
//!   `running_balance` (and establish their row ordering by sorting).
//!
//! No stage ever touches identity or monetary fields.

use crate::schema::{GroupKey, LedgerRow, RowSource, Side, VoucherImbalance};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

/// Separator between codes in the human-readable counter-account form.
const DISPLAY_SEPARATOR: &str = " / ";

fn side_of(row: &LedgerRow) -> Side {
    if row.debit > Decimal::ZERO {
        Side::Debit
    } else if row.credit > Decimal::ZERO {
        Side::Credit
    } else {
        Side::None
    }
}

fn group_key_of(row: &LedgerRow) -> GroupKey {
    // Document numbers legitimately vary or go missing on opening/closing
    // vouchers and drift across text re-exports; including them there would
    // fragment vouchers that belong together.
    let document_number = if !row.voucher_type.is_boundary()
        && row.source != RowSource::Text
        && !row.document_number.is_empty()
    {
        Some(row.document_number.clone())
    } else {
        None
    };
    GroupKey {
        entry_number: row.entry_number.clone(),
        posting_date: row.posting_date,
        document_number,
    }
}

/// Joins a sorted code set, excluding `own` only when it appears in the set.
fn join_minus(set: &BTreeSet<String>, own: &str) -> (String, String) {
    let codes: Vec<&str> = set
        .iter()
        .map(String::as_str)
        .filter(|c| *c != own)
        .collect();
    (codes.join(DISPLAY_SEPARATOR), codes.join(","))
}

#[derive(Default)]
struct GroupSets {
    debit_ledgers: BTreeSet<String>,
    credit_ledgers: BTreeSet<String>,
    debit_accounts: BTreeSet<String>,
    credit_accounts: BTreeSet<String>,
}

/// Counter-account (karşı hesap) attribution.
///
/// Assigns sides and group keys, partitions rows into voucher groups, and
/// gives every row the sorted set of ledger codes from the opposing side of
/// its voucher. A row's own ledger code is removed only when the opposing
/// side actually contains it; rows with no side see the union of both sides.
/// With `include_account_codes` the same attribution is also produced at
/// full-account-code granularity.
pub fn fill_counter_accounts(rows: &mut [LedgerRow], include_account_codes: bool) {
    for row in rows.iter_mut() {
        row.side = side_of(row);
        if row.group_key.is_none() {
            row.group_key = Some(group_key_of(row));
        }
    }

    let mut groups: HashMap<GroupKey, GroupSets> = HashMap::new();
    for row in rows.iter() {
        let key = row.group_key.clone().expect("group key assigned above");
        let sets = groups.entry(key).or_default();
        match row.side {
            Side::Debit => {
                sets.debit_ledgers.insert(row.ledger_code.clone());
                if include_account_codes {
                    sets.debit_accounts.insert(row.account_code.clone());
                }
            }
            Side::Credit => {
                sets.credit_ledgers.insert(row.ledger_code.clone());
                if include_account_codes {
                    sets.credit_accounts.insert(row.account_code.clone());
                }
            }
            Side::None => {}
        }
    }

    // Several rows of one group usually ask for the same minus-self result;
    // memoize per (group, side, own codes).
    #[allow(clippy::type_complexity)]
    let mut cache: HashMap<(GroupKey, Side, String, String), (String, String, String)> =
        HashMap::new();

    for row in rows.iter_mut() {
        let key = row.group_key.clone().expect("group key assigned above");
        let cache_key = (
            key.clone(),
            row.side,
            row.ledger_code.clone(),
            row.account_code.clone(),
        );

        let (display, ledger_csv, account_csv) = cache
            .entry(cache_key)
            .or_insert_with(|| {
                let sets = &groups[&key];
                match row.side {
                    Side::Debit => {
                        let (display, ledger_csv) =
                            join_minus(&sets.credit_ledgers, &row.ledger_code);
                        let (_, account_csv) =
                            join_minus(&sets.credit_accounts, &row.account_code);
                        (display, ledger_csv, account_csv)
                    }
                    Side::Credit => {
                        let (display, ledger_csv) =
                            join_minus(&sets.debit_ledgers, &row.ledger_code);
                        let (_, account_csv) =
                            join_minus(&sets.debit_accounts, &row.account_code);
                        (display, ledger_csv, account_csv)
                    }
                    Side::None => {
                        let union_ledgers: BTreeSet<String> = sets
                            .debit_ledgers
                            .union(&sets.credit_ledgers)
                            .cloned()
                            .collect();
                        let union_accounts: BTreeSet<String> = sets
                            .debit_accounts
                            .union(&sets.credit_accounts)
                            .cloned()
                            .collect();
                        let (display, ledger_csv) = join_minus(&union_ledgers, &row.ledger_code);
                        let (_, account_csv) = join_minus(&union_accounts, &row.account_code);
                        (display, ledger_csv, account_csv)
                    }
                }
            })
            .clone();

        row.counter_account = display;
        row.counter_ledger_codes_csv = ledger_csv;
        row.counter_account_codes_csv = if include_account_codes {
            account_csv
        } else {
            String::new()
        };
    }
}

fn chronological(a: &LedgerRow, b: &LedgerRow) -> std::cmp::Ordering {
    a.posting_date
        .cmp(&b.posting_date)
        .then_with(|| a.entry_number.cmp(&b.entry_number))
        .then_with(|| a.entry_counter.cmp(&b.entry_counter))
}

/// Global running balance: one cumulative debit−credit sequence over the
/// whole row set in chronological order. Sorts the slice.
pub fn running_balance(rows: &mut [LedgerRow]) {
    rows.sort_by(chronological);
    let mut balance = Decimal::ZERO;
    for row in rows.iter_mut() {
        balance += row.debit - row.credit;
        row.running_balance = balance;
    }
}

/// Per-account running balance: the same ordering partitioned by account
/// code, with the balance resetting to zero at each account boundary.
/// Sorts the slice (account first, then chronology).
pub fn running_balance_per_account(rows: &mut [LedgerRow]) {
    rows.sort_by(|a, b| {
        a.account_code
            .cmp(&b.account_code)
            .then_with(|| chronological(a, b))
    });
    let mut balance = Decimal::ZERO;
    let mut current: Option<String> = None;
    for row in rows.iter_mut() {
        if current.as_deref() != Some(row.account_code.as_str()) {
            balance = Decimal::ZERO;
            current = Some(row.account_code.clone());
        }
        balance += row.debit - row.credit;
        row.running_balance = balance;
    }
}

/// Reports Σdebit − Σcredit per voucher group. Balanced vouchers report
/// zero; an imbalance is a data-quality signal, never an error. Rows without
/// a group key are keyed as if [`fill_counter_accounts`] had run.
pub fn voucher_imbalances(rows: &[LedgerRow]) -> Vec<VoucherImbalance> {
    let mut totals: HashMap<GroupKey, (Decimal, Decimal)> = HashMap::new();
    for row in rows {
        let key = row.group_key.clone().unwrap_or_else(|| group_key_of(row));
        let entry = totals.entry(key).or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 += row.debit;
        entry.1 += row.credit;
    }

    let mut report: Vec<VoucherImbalance> = totals
        .into_iter()
        .map(|(key, (debit_total, credit_total))| VoucherImbalance {
            key,
            debit_total,
            credit_total,
            imbalance: debit_total - credit_total,
        })
        .collect();
    report.sort_by(|a, b| {
        a.key
            .posting_date
            .cmp(&b.key.posting_date)
            .then_with(|| a.key.entry_number.cmp(&b.key.entry_number))
    });
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::VoucherType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn row(
        entry: &str,
        date: (i32, u32, u32),
        account: &str,
        debit: Decimal,
        credit: Decimal,
    ) -> LedgerRow {
        LedgerRow {
            entry_number: entry.to_string(),
            entry_counter: 0,
            posting_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            ledger_code: crate::ingest::ledger_code_for(account),
            account_code: account.to_string(),
            account_name: String::new(),
            debit,
            credit,
            amount: debit - credit,
            voucher_type: VoucherType::Mahsup,
            voucher_subtype: None,
            description: String::new(),
            document_number: String::new(),
            source: RowSource::Xml,
            source_file: "test.xml".to_string(),
            side: Side::None,
            running_balance: Decimal::ZERO,
            group_key: None,
            counter_account: String::new(),
            counter_account_codes_csv: String::new(),
            counter_ledger_codes_csv: String::new(),
        }
    }

    #[test]
    fn test_counter_accounts_two_sided_voucher() {
        let mut rows = vec![
            row("A1", (2024, 3, 1), "120-01", dec!(1000), Decimal::ZERO),
            row("A1", (2024, 3, 1), "600-01", Decimal::ZERO, dec!(1000)),
        ];
        fill_counter_accounts(&mut rows, true);

        assert_eq!(rows[0].side, Side::Debit);
        assert_eq!(rows[0].counter_account, "600");
        assert_eq!(rows[0].counter_ledger_codes_csv, "600");
        assert_eq!(rows[0].counter_account_codes_csv, "600-01");
        assert_eq!(rows[1].side, Side::Credit);
        assert_eq!(rows[1].counter_account, "120");
    }

    #[test]
    fn test_counter_account_self_exclusion_asymmetry() {
        // Debit side: ledgers 100 and 120. Credit side: ledgers 100 and 600.
        let mut rows = vec![
            row("V1", (2024, 5, 2), "100-01", dec!(100), Decimal::ZERO),
            row("V1", (2024, 5, 2), "120-01", dec!(200), Decimal::ZERO),
            row("V1", (2024, 5, 2), "100-02", Decimal::ZERO, dec!(50)),
            row("V1", (2024, 5, 2), "600-01", Decimal::ZERO, dec!(250)),
        ];
        fill_counter_accounts(&mut rows, false);

        // Own ledger also on the opposing side: excluded.
        assert_eq!(rows[0].counter_account, "600");
        // Own ledger absent from the opposing side: full set, unmodified.
        assert_eq!(rows[1].counter_account, "100 / 600");
        // Credit rows mirror against the debit set.
        assert_eq!(rows[2].counter_account, "120");
        assert_eq!(rows[3].counter_account, "100 / 120");
    }

    #[test]
    fn test_counter_account_sole_opposite_code_yields_empty() {
        let mut rows = vec![
            row("V2", (2024, 5, 2), "100-01", dec!(10), Decimal::ZERO),
            row("V2", (2024, 5, 2), "100-02", Decimal::ZERO, dec!(10)),
        ];
        fill_counter_accounts(&mut rows, false);
        assert_eq!(rows[0].counter_account, "");
        assert_eq!(rows[1].counter_account, "");
    }

    #[test]
    fn test_zero_row_sees_union_of_both_sides() {
        let mut rows = vec![
            row("V3", (2024, 5, 2), "100-01", dec!(10), Decimal::ZERO),
            row("V3", (2024, 5, 2), "320-01", Decimal::ZERO, dec!(10)),
            row("V3", (2024, 5, 2), "900-01", Decimal::ZERO, Decimal::ZERO),
        ];
        fill_counter_accounts(&mut rows, false);
        assert_eq!(rows[2].side, Side::None);
        assert_eq!(rows[2].counter_account, "100 / 320");
    }

    #[test]
    fn test_group_key_document_number_rules() {
        let mut plain = row("E1", (2024, 4, 1), "100", dec!(5), Decimal::ZERO);
        plain.document_number = "F-77".to_string();

        let mut opening = plain.clone();
        opening.voucher_type = VoucherType::Acilis;

        let mut text = plain.clone();
        text.source = RowSource::Text;

        let mut rows = vec![plain, opening, text];
        fill_counter_accounts(&mut rows, false);

        let keys: Vec<&GroupKey> = rows.iter().map(|r| r.group_key.as_ref().unwrap()).collect();
        assert_eq!(keys[0].document_number.as_deref(), Some("F-77"));
        // Opening vouchers group without the document number.
        assert_eq!(keys[1].document_number, None);
        // Text-sourced rows group without the document number.
        assert_eq!(keys[2].document_number, None);
    }

    #[test]
    fn test_global_running_balance() {
        let mut rows = vec![
            row("A1", (2024, 3, 1), "600-01", Decimal::ZERO, dec!(1000)),
            row("A1", (2024, 3, 1), "120-01", dec!(1000), Decimal::ZERO),
        ];
        // entry_counter orders the two legs within the voucher
        rows[1].entry_counter = 1;
        rows[0].entry_counter = 2;
        running_balance(&mut rows);

        assert_eq!(rows[0].account_code, "120-01");
        assert_eq!(rows[0].running_balance, dec!(1000));
        assert_eq!(rows[1].running_balance, Decimal::ZERO);
    }

    #[test]
    fn test_per_account_running_balance_resets() {
        let mut rows = vec![
            row("A1", (2024, 1, 10), "100", dec!(100), Decimal::ZERO),
            row("A2", (2024, 2, 10), "100", Decimal::ZERO, dec!(30)),
            row("A3", (2024, 1, 15), "320", Decimal::ZERO, dec!(500)),
        ];
        running_balance_per_account(&mut rows);

        assert_eq!(rows[0].account_code, "100");
        assert_eq!(rows[0].running_balance, dec!(100));
        assert_eq!(rows[1].running_balance, dec!(70));
        // New account: balance restarts from zero.
        assert_eq!(rows[2].account_code, "320");
        assert_eq!(rows[2].running_balance, dec!(-500));
    }

    #[test]
    fn test_replaying_per_account_balances_reproduces_stored_values() {
        let mut rows = vec![
            row("A1", (2024, 1, 10), "100", dec!(100), Decimal::ZERO),
            row("A2", (2024, 1, 12), "100", dec!(40), Decimal::ZERO),
            row("A3", (2024, 2, 1), "100", Decimal::ZERO, dec!(90)),
        ];
        running_balance_per_account(&mut rows);

        let mut replay = Decimal::ZERO;
        for r in &rows {
            replay += r.debit - r.credit;
            assert_eq!(r.running_balance, replay);
        }
    }

    #[test]
    fn test_voucher_imbalance_report() {
        let mut rows = vec![
            row("B1", (2024, 6, 1), "100", dec!(100), Decimal::ZERO),
            row("B1", (2024, 6, 1), "600", Decimal::ZERO, dec!(100)),
            row("B2", (2024, 6, 2), "100", dec!(75), Decimal::ZERO),
            row("B2", (2024, 6, 2), "600", Decimal::ZERO, dec!(50)),
        ];
        fill_counter_accounts(&mut rows, false);
        let report = voucher_imbalances(&rows);

        assert_eq!(report.len(), 2);
        let balanced = report.iter().find(|r| r.key.entry_number == "B1").unwrap();
        assert_eq!(balanced.imbalance, Decimal::ZERO);
        let skewed = report.iter().find(|r| r.key.entry_number == "B2").unwrap();
        assert_eq!(skewed.imbalance, dec!(25));
        assert_eq!(skewed.debit_total, dec!(75));
        assert_eq!(skewed.credit_total, dec!(50));
    }
}
