use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Movement side of a ledger row. Vendor encodings are normalized to this
/// before any derivation runs ("B"/"D" are debit, "A"/"C" are credit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum Side {
    Debit,
    Credit,
    #[default]
    None,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Debit => "D",
            Side::Credit => "C",
            Side::None => "",
        }
    }
}

/// Voucher classification. `Mahsup` is the generic compound entry; opening
/// and closing vouchers mark the fiscal-year boundary and are treated
/// specially by grouping, trial balance and aging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum VoucherType {
    #[default]
    Mahsup,
    Acilis,
    Kapanis,
}

impl VoucherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherType::Mahsup => "Mahsup",
            VoucherType::Acilis => "Açılış",
            VoucherType::Kapanis => "Kapanış",
        }
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self, VoucherType::Acilis | VoucherType::Kapanis)
    }
}

/// Which ingestion path produced a row. Group-key construction and surrogate
/// id prefixes depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RowSource {
    Xml,
    Text,
}

impl RowSource {
    /// Prefix tag used in synthesized entry numbers.
    pub fn id_tag(&self) -> &'static str {
        match self {
            RowSource::Xml => "X",
            RowSource::Text => "T",
        }
    }
}

/// Composite voucher grouping key. Value equality, no string concatenation,
/// so separator characters inside entry numbers cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub entry_number: String,
    pub posting_date: NaiveDate,
    pub document_number: Option<String>,
}

/// One debit-or-credit movement line in canonical form.
///
/// Parsers populate everything except the enrichment fields; the
/// post-processors in [`crate::enrich`] fill `side`, `group_key`,
/// `running_balance` and the counter-account fields in place and never touch
/// identity or monetary fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LedgerRow {
    pub entry_number: String,
    /// Intra-voucher line ordinal, unique within an entry-number + date group.
    pub entry_counter: u32,
    pub posting_date: NaiveDate,
    /// Top-level chart grouping ("kebir"), the account code's leading segment.
    pub ledger_code: String,
    pub account_code: String,
    pub account_name: String,
    pub debit: Decimal,
    pub credit: Decimal,
    /// Signed magnitude as captured from the source.
    pub amount: Decimal,
    pub voucher_type: VoucherType,
    pub voucher_subtype: Option<String>,
    pub description: String,
    pub document_number: String,
    pub source: RowSource,
    pub source_file: String,

    // Enrichment fields, written only by the post-processors.
    pub side: Side,
    pub running_balance: Decimal,
    pub group_key: Option<GroupKey>,
    pub counter_account: String,
    pub counter_account_codes_csv: String,
    pub counter_ledger_codes_csv: String,
}

impl LedgerRow {
    /// A structurally present row that carries no monetary meaning.
    pub fn is_empty_movement(&self) -> bool {
        self.debit.is_zero() && self.credit.is_zero()
    }
}

/// Emission level of a trial balance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MizanLevel {
    Ledger,
    Account,
}

/// One trial balance (mizan) row: a ledger header aggregating every account
/// under one ledger code, or a single account beneath it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MizanRow {
    pub level: MizanLevel,
    pub ledger_code: String,
    pub account_code: String,
    pub account_name: String,
    /// Activity inside the requested window.
    pub period_debit: Decimal,
    pub period_credit: Decimal,
    /// Cumulative totals through the window end, regardless of window start.
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    /// Net balance decomposed by sign; exactly one of the two is nonzero.
    pub debit_balance: Decimal,
    pub credit_balance: Decimal,
}

/// Number of day-distance buckets before the 365+ overflow.
pub const AGING_BUCKET_COUNT: usize = 12;

/// Upper day-distance boundary of each aging bucket. The last regular bucket
/// covers 331..=365; anything further lands in the overflow bucket.
pub const AGING_BUCKET_BOUNDS: [i64; AGING_BUCKET_COUNT] =
    [30, 60, 90, 120, 150, 180, 210, 240, 270, 300, 330, 365];

/// Aging decomposition of one account's net balance at a cutoff date.
/// Opening-voucher contributions bypass the day buckets entirely. Every
/// bucket amount is a non-negative magnitude; their sum equals
/// `net_balance.abs()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgingRow {
    pub account_code: String,
    pub account_name: String,
    /// Signed net balance as of the aging date.
    pub net_balance: Decimal,
    pub opening: Decimal,
    pub buckets: [Decimal; AGING_BUCKET_COUNT],
    pub overflow: Decimal,
}

impl AgingRow {
    pub fn bucket_total(&self) -> Decimal {
        self.opening + self.buckets.iter().copied().sum::<Decimal>() + self.overflow
    }
}

/// Data-quality signal for a voucher whose debit and credit legs do not sum
/// to the same amount. Reported, never raised as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoucherImbalance {
    pub key: GroupKey,
    pub debit_total: Decimal,
    pub credit_total: Decimal,
    /// `debit_total - credit_total`; zero for a balanced voucher.
    pub imbalance: Decimal,
}

/// Parse metadata emitted by the text parser, used by callers to pick a
/// storage period without re-scanning the rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TextParseMeta {
    pub company_code: String,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    /// Count of distinct year-month periods observed.
    pub period_count: usize,
    /// Modal (most frequent) year-month among parsed rows.
    pub detected_year: Option<i32>,
    pub detected_month: Option<u32>,
    pub parsed_rows: usize,
    pub skipped_rows: usize,
    pub used_fallback_encoding: bool,
    pub delimiter: char,
}
