//! Trial balance (mizan) construction.
//!
//! Rolls the row set up into ledger-header rows and account rows for a date
//! window. Period activity is measured inside `[start, end]`; balances are
//! cumulative through `end` regardless of the window start, because a trial
//! balance reports period movement alongside the all-time balance.

use crate::chart_of_accounts::ChartOfAccounts;
use crate::schema::{LedgerRow, MizanLevel, MizanRow, VoucherType};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Activity-based suppression, evaluated independently at the ledger level
/// and at the account level: each level computes its own period-activity
/// flag from its own aggregated rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityFilter {
    #[default]
    All,
    OnlyActive,
    OnlyInactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MizanView {
    /// Ledger headers followed by their account rows.
    #[default]
    Detailed,
    /// Ledger headers only.
    LedgersOnly,
}

#[derive(Debug, Clone)]
pub struct MizanOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub filter: ActivityFilter,
    pub view: MizanView,
    /// Opening vouchers participate by default.
    pub include_opening: bool,
    /// Closing vouchers are excluded by default: a year-end closing voucher
    /// zeroes every balance and would empty the report.
    pub include_closing: bool,
}

impl MizanOptions {
    pub fn for_window(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            filter: ActivityFilter::default(),
            view: MizanView::default(),
            include_opening: true,
            include_closing: false,
        }
    }
}

/// Fixed fallback names for ledger groups conventionally outside the chart
/// file.
fn fixed_ledger_name(ledger_code: &str) -> Option<&'static str> {
    match ledger_code.chars().next() {
        Some('8') => Some("Serbest Hesaplar"),
        Some('9') => Some("Nazım Hesaplar"),
        _ => None,
    }
}

#[derive(Default)]
struct Sums {
    period_debit: Decimal,
    period_credit: Decimal,
    total_debit: Decimal,
    total_credit: Decimal,
}

impl Sums {
    fn add(&mut self, row: &LedgerRow, in_period: bool) {
        self.total_debit += row.debit;
        self.total_credit += row.credit;
        if in_period {
            self.period_debit += row.debit;
            self.period_credit += row.credit;
        }
    }

    fn has_period_activity(&self) -> bool {
        !self.period_debit.is_zero() || !self.period_credit.is_zero()
    }

    /// Signed net decomposed by convention: positive net is a debit balance,
    /// negative a credit balance, zero is both zero.
    fn balances(&self) -> (Decimal, Decimal) {
        let net = self.total_debit - self.total_credit;
        if net > Decimal::ZERO {
            (net, Decimal::ZERO)
        } else if net < Decimal::ZERO {
            (Decimal::ZERO, -net)
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        }
    }
}

fn passes(filter: ActivityFilter, active: bool) -> bool {
    match filter {
        ActivityFilter::All => true,
        ActivityFilter::OnlyActive => active,
        ActivityFilter::OnlyInactive => !active,
    }
}

/// Builds the trial balance for the given options.
///
/// Rows are filtered to posting dates ≤ `end` (cumulative set); dates inside
/// `[start, end]` additionally count as period activity. Ledger groups sort
/// ordinally by code; empty accounts remain visible under the `All` filter
/// so a known chart can be verified complete.
pub fn calculate(
    rows: &[LedgerRow],
    options: &MizanOptions,
    chart: &ChartOfAccounts,
) -> Vec<MizanRow> {
    let included = |row: &&LedgerRow| -> bool {
        match row.voucher_type {
            VoucherType::Acilis => options.include_opening,
            VoucherType::Kapanis => options.include_closing,
            VoucherType::Mahsup => true,
        }
    };

    // Cumulative set: everything through the window end, non-empty ledger
    // codes only. Period rows are the subset inside the window.
    let mut ledgers: BTreeMap<&str, Vec<&LedgerRow>> = BTreeMap::new();
    for row in rows
        .iter()
        .filter(|r| r.posting_date <= options.end && !r.ledger_code.is_empty())
        .filter(included)
    {
        ledgers.entry(row.ledger_code.as_str()).or_default().push(row);
    }

    let mut report = Vec::new();

    for (ledger_code, ledger_rows) in &ledgers {
        let mut ledger_sums = Sums::default();
        for row in ledger_rows {
            ledger_sums.add(row, row.posting_date >= options.start);
        }

        if passes(options.filter, ledger_sums.has_period_activity()) {
            let (debit_balance, credit_balance) = ledger_sums.balances();
            report.push(MizanRow {
                level: MizanLevel::Ledger,
                ledger_code: ledger_code.to_string(),
                account_code: ledger_code.to_string(),
                account_name: resolve_ledger_name(ledger_code, ledger_rows, chart),
                period_debit: ledger_sums.period_debit,
                period_credit: ledger_sums.period_credit,
                total_debit: ledger_sums.total_debit,
                total_credit: ledger_sums.total_credit,
                debit_balance,
                credit_balance,
            });
        }

        if options.view == MizanView::LedgersOnly {
            continue;
        }

        let mut accounts: BTreeMap<(&str, &str), Vec<&LedgerRow>> = BTreeMap::new();
        for row in ledger_rows {
            accounts
                .entry((row.account_code.as_str(), row.account_name.as_str()))
                .or_default()
                .push(row);
        }

        for ((account_code, account_name), account_rows) in &accounts {
            // The header already covers an "account" that is the ledger
            // itself; do not re-emit it as a pseudo-account.
            if *account_code == *ledger_code {
                continue;
            }

            let mut sums = Sums::default();
            for row in account_rows {
                sums.add(row, row.posting_date >= options.start);
            }
            if !passes(options.filter, sums.has_period_activity()) {
                continue;
            }

            let (debit_balance, credit_balance) = sums.balances();
            report.push(MizanRow {
                level: MizanLevel::Account,
                ledger_code: ledger_code.to_string(),
                account_code: account_code.to_string(),
                account_name: account_name.to_string(),
                period_debit: sums.period_debit,
                period_credit: sums.period_credit,
                total_debit: sums.total_debit,
                total_credit: sums.total_credit,
                debit_balance,
                credit_balance,
            });
        }
    }

    report
}

/// Display name for a ledger header: chart lookup, then the fixed 8/9
/// fallbacks, then a name observed on the rows, preferring a row whose
/// account code equals the ledger code exactly.
fn resolve_ledger_name(
    ledger_code: &str,
    ledger_rows: &[&LedgerRow],
    chart: &ChartOfAccounts,
) -> String {
    if let Some(name) = chart.ledger_name_for(ledger_code) {
        return name.to_string();
    }
    if let Some(name) = fixed_ledger_name(ledger_code) {
        return name.to_string();
    }
    let exact = ledger_rows
        .iter()
        .find(|r| r.account_code == ledger_code && !r.account_name.is_empty());
    if let Some(row) = exact {
        return row.account_name.clone();
    }
    ledger_rows
        .iter()
        .find(|r| !r.account_name.is_empty())
        .map(|r| r.account_name.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{GroupKey, RowSource, Side};
    use crate::utils::year_window;
    use rust_decimal_macros::dec;

    fn row(
        date: (i32, u32, u32),
        account: &str,
        name: &str,
        debit: Decimal,
        credit: Decimal,
    ) -> LedgerRow {
        LedgerRow {
            entry_number: "E".to_string(),
            entry_counter: 0,
            posting_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            ledger_code: crate::ingest::ledger_code_for(account),
            account_code: account.to_string(),
            account_name: name.to_string(),
            debit,
            credit,
            amount: debit - credit,
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

    fn options(year: i32) -> MizanOptions {
        let (start, end) = year_window(year);
        MizanOptions::for_window(start, end)
    }

    #[test]
    fn test_full_year_balanced_rows_balance_overall() {
        let rows = vec![
            row((2024, 3, 1), "120-01", "Alıcılar", dec!(1000), Decimal::ZERO),
            row((2024, 3, 1), "600-01", "Satışlar", Decimal::ZERO, dec!(1000)),
        ];
        let report = calculate(&rows, &options(2024), &ChartOfAccounts::empty());

        let headers: Vec<&MizanRow> = report
            .iter()
            .filter(|r| r.level == MizanLevel::Ledger)
            .collect();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].ledger_code, "120");
        assert_eq!(headers[0].debit_balance, dec!(1000));
        assert_eq!(headers[0].credit_balance, Decimal::ZERO);
        assert_eq!(headers[1].ledger_code, "600");
        assert_eq!(headers[1].credit_balance, dec!(1000));

        let total_debit: Decimal = headers.iter().map(|h| h.debit_balance).sum();
        let total_credit: Decimal = headers.iter().map(|h| h.credit_balance).sum();
        assert_eq!(total_debit, total_credit);
    }

    #[test]
    fn test_cumulative_balance_spans_before_window() {
        // January movement, February window: no period activity but the
        // balance carries through.
        let rows = vec![row((2024, 1, 10), "100-01", "Kasa", dec!(500), Decimal::ZERO)];
        let mut opts = options(2024);
        opts.start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        opts.end = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();

        let report = calculate(&rows, &opts, &ChartOfAccounts::empty());
        let header = &report[0];
        assert_eq!(header.period_debit, Decimal::ZERO);
        assert_eq!(header.total_debit, dec!(500));
        assert_eq!(header.debit_balance, dec!(500));
    }

    #[test]
    fn test_activity_filters_are_per_level() {
        let mut opts = options(2024);
        opts.start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        opts.end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();

        let rows = vec![
            // Active in June.
            row((2024, 6, 5), "100-01", "Kasa", dec!(10), Decimal::ZERO),
            // Same ledger, inactive account.
            row((2024, 1, 5), "100-02", "Kasa Döviz", dec!(20), Decimal::ZERO),
            // Entirely inactive ledger.
            row((2024, 1, 8), "320-01", "Satıcılar", Decimal::ZERO, dec!(30)),
        ];

        opts.filter = ActivityFilter::OnlyActive;
        let active = calculate(&rows, &opts, &ChartOfAccounts::empty());
        assert!(active.iter().any(|r| r.account_code == "100-01"));
        assert!(!active.iter().any(|r| r.account_code == "100-02"));
        assert!(!active.iter().any(|r| r.ledger_code == "320"));

        opts.filter = ActivityFilter::OnlyInactive;
        let inactive = calculate(&rows, &opts, &ChartOfAccounts::empty());
        // Ledger 100 had period activity: header suppressed, but its
        // inactive child account still appears.
        assert!(!inactive
            .iter()
            .any(|r| r.level == MizanLevel::Ledger && r.ledger_code == "100"));
        assert!(inactive.iter().any(|r| r.account_code == "100-02"));
        assert!(inactive
            .iter()
            .any(|r| r.level == MizanLevel::Ledger && r.ledger_code == "320"));
    }

    #[test]
    fn test_ledgers_only_view() {
        let rows = vec![
            row((2024, 3, 1), "120-01", "Alıcılar", dec!(100), Decimal::ZERO),
            row((2024, 3, 2), "120-02", "Alıcılar B", dec!(50), Decimal::ZERO),
        ];
        let mut opts = options(2024);
        opts.view = MizanView::LedgersOnly;
        let report = calculate(&rows, &opts, &ChartOfAccounts::empty());
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].level, MizanLevel::Ledger);
        assert_eq!(report[0].total_debit, dec!(150));
    }

    #[test]
    fn test_ledger_name_resolution_order() {
        let chart = ChartOfAccounts::from_text("120=Alıcılar (TL)\n");
        let rows = vec![
            row((2024, 2, 1), "120-01", "Müşteri A", dec!(10), Decimal::ZERO),
            row((2024, 2, 1), "800-01", "", dec!(5), Decimal::ZERO),
            row((2024, 2, 1), "900", "Emanetler", Decimal::ZERO, Decimal::ZERO),
            row((2024, 2, 1), "335", "Personel", Decimal::ZERO, dec!(15)),
        ];
        let report = calculate(&rows, &options(2024), &chart);

        let name_of = |code: &str| {
            report
                .iter()
                .find(|r| r.level == MizanLevel::Ledger && r.ledger_code == code)
                .map(|r| r.account_name.clone())
                .unwrap()
        };
        // Chart lookup wins.
        assert_eq!(name_of("120"), "Alıcılar (TL)");
        // 8xx/9xx fixed fallbacks.
        assert_eq!(name_of("800"), "Serbest Hesaplar");
        assert_eq!(name_of("900"), "Nazım Hesaplar");
        // Row-observed name.
        assert_eq!(name_of("335"), "Personel");
    }

    #[test]
    fn test_account_equal_to_ledger_not_reemitted() {
        let rows = vec![row((2024, 2, 1), "100", "Kasa", dec!(10), Decimal::ZERO)];
        let report = calculate(&rows, &options(2024), &ChartOfAccounts::empty());
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].level, MizanLevel::Ledger);
        // The exact-code row supplies the header name.
        assert_eq!(report[0].account_name, "Kasa");
    }

    #[test]
    fn test_closing_vouchers_excluded_by_default() {
        let mut closing = row((2024, 12, 31), "100-01", "Kasa", Decimal::ZERO, dec!(500));
        closing.voucher_type = VoucherType::Kapanis;
        let rows = vec![
            row((2024, 3, 1), "100-01", "Kasa", dec!(500), Decimal::ZERO),
            closing,
        ];

        let report = calculate(&rows, &options(2024), &ChartOfAccounts::empty());
        let header = &report[0];
        assert_eq!(header.debit_balance, dec!(500));

        let mut opts = options(2024);
        opts.include_closing = true;
        let with_closing = calculate(&rows, &opts, &ChartOfAccounts::empty());
        assert_eq!(with_closing[0].debit_balance, Decimal::ZERO);
        assert_eq!(with_closing[0].credit_balance, Decimal::ZERO);
    }
}
