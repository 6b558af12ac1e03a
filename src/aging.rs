//! Receivables/payables aging.
//!
//! Allocates each account's net balance backward through its movement
//! history into day-distance buckets. The walk is reverse-chronological and
//! consumes movements on the dominant side only: the outstanding balance is
//! assumed to correspond to the most recent transactions first, consistent
//! with standard receivables aging practice.

use crate::schema::{AgingRow, LedgerRow, Side, VoucherType, AGING_BUCKET_BOUNDS, AGING_BUCKET_COUNT};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Index of the bucket covering `distance` days, or `None` for the
/// overflow bucket beyond the last boundary.
fn bucket_index(distance: i64) -> Option<usize> {
    AGING_BUCKET_BOUNDS.iter().position(|bound| distance <= *bound)
}

/// Builds one aging row per account with a nonzero net balance as of
/// `aging_date`, ordered by account code.
pub fn calculate(rows: &[LedgerRow], aging_date: NaiveDate) -> Vec<AgingRow> {
    let mut accounts: BTreeMap<&str, Vec<&LedgerRow>> = BTreeMap::new();
    for row in rows {
        accounts.entry(row.account_code.as_str()).or_default().push(row);
    }

    let mut report = Vec::new();

    for (account_code, mut account_rows) in accounts {
        account_rows.sort_by(|a, b| {
            a.posting_date
                .cmp(&b.posting_date)
                .then_with(|| a.entry_number.cmp(&b.entry_number))
                .then_with(|| a.entry_counter.cmp(&b.entry_counter))
        });

        // Net balance: the precomputed running balance on the last row when
        // it is nonzero, otherwise a direct recomputation.
        let net_balance = account_rows
            .last()
            .map(|r| r.running_balance)
            .filter(|b| !b.is_zero())
            .unwrap_or_else(|| {
                account_rows
                    .iter()
                    .map(|r| r.debit - r.credit)
                    .sum::<Decimal>()
            });
        if net_balance.is_zero() {
            continue;
        }

        let dominant = if net_balance > Decimal::ZERO {
            Side::Debit
        } else {
            Side::Credit
        };

        let mut remaining = net_balance.abs();
        let mut opening = Decimal::ZERO;
        let mut buckets = [Decimal::ZERO; AGING_BUCKET_COUNT];
        let mut overflow = Decimal::ZERO;

        for row in account_rows.iter().rev() {
            if remaining.is_zero() {
                break;
            }
            let movement = match dominant {
                Side::Debit => row.debit,
                _ => row.credit,
            };
            if movement.is_zero() {
                continue;
            }

            let allocation = remaining.min(movement);
            if row.voucher_type == VoucherType::Acilis {
                // Opening entries age into their own bucket regardless of
                // date distance.
                opening += allocation;
            } else {
                // Future-dated rows count as zero distance.
                let distance = (aging_date - row.posting_date).num_days().max(0);
                match bucket_index(distance) {
                    Some(idx) => buckets[idx] += allocation,
                    None => overflow += allocation,
                }
            }
            remaining -= allocation;
        }

        let name = account_rows
            .iter()
            .rev()
            .find(|r| !r.account_name.is_empty())
            .map(|r| r.account_name.clone())
            .unwrap_or_default();

        report.push(AgingRow {
            account_code: account_code.to_string(),
            account_name: name,
            net_balance,
            opening,
            buckets,
            overflow,
        });
    }

    report
}
