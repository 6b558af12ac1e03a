//! Logical-field to XML-path mapping.
//!
//! The parser never hardcodes vendor tag names. Instead a configuration file
//! maps each logical ledger field to a list of raw path templates; templates
//! are expanded, normalized and deduplicated once at load time into
//! immutable candidate sets that the parser matches against.

use crate::error::{LedgerError, Result};
use crate::paths::normalize_path;
use log::warn;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Placeholder expanded to each known root element name, so one template
/// line covers both `defter`- and `berat`-rooted exports.
pub const ROOT_PLACEHOLDER: &str = "%ROOT%";

/// Conventional configuration location relative to the running process.
pub const DEFAULT_FIELDMAP_FILE: &str = "fieldmap.json";

/// Logical ledger fields addressable from configuration.
///
/// The declaration order is the match priority: header fields are tried
/// before detail fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    EntryNumber,
    EntryDate,
    EntryDescription,
    EntryDocumentNumber,
    LineCounter,
    LineAccountMainId,
    LineAccountSubId,
    LineAccountName,
    LineSide,
    LineAmount,
    LineComment,
    LineDate,
    LineDocumentNumber,
}

/// All fields in match-priority order.
pub const MATCH_ORDER: [LogicalField; 13] = [
    LogicalField::EntryNumber,
    LogicalField::EntryDate,
    LogicalField::EntryDescription,
    LogicalField::EntryDocumentNumber,
    LogicalField::LineCounter,
    LogicalField::LineAccountMainId,
    LogicalField::LineAccountSubId,
    LogicalField::LineAccountName,
    LogicalField::LineSide,
    LogicalField::LineAmount,
    LogicalField::LineComment,
    LogicalField::LineDate,
    LogicalField::LineDocumentNumber,
];

impl LogicalField {
    pub fn config_key(&self) -> &'static str {
        match self {
            LogicalField::EntryNumber => "Header.EntryNumber",
            LogicalField::EntryDate => "Header.PostingDate",
            LogicalField::EntryDescription => "Header.Description",
            LogicalField::EntryDocumentNumber => "Header.DocumentNumber",
            LogicalField::LineCounter => "Line.Counter",
            LogicalField::LineAccountMainId => "Line.AccountMainId",
            LogicalField::LineAccountSubId => "Line.AccountSubId",
            LogicalField::LineAccountName => "Line.AccountName",
            LogicalField::LineSide => "Line.Side",
            LogicalField::LineAmount => "Line.Amount",
            LogicalField::LineComment => "Line.Comment",
            LogicalField::LineDate => "Line.PostingDate",
            LogicalField::LineDocumentNumber => "Line.DocumentNumber",
        }
    }

    fn from_config_key(key: &str) -> Option<Self> {
        MATCH_ORDER.iter().copied().find(|f| f.config_key() == key)
    }
}

#[derive(Debug, Deserialize)]
struct FieldMapConfig {
    #[serde(default = "default_header_tag")]
    header_tag: String,
    #[serde(default = "default_detail_tag")]
    detail_tag: String,
    fields: HashMap<String, Vec<String>>,
}

fn default_header_tag() -> String {
    "entryheader".to_string()
}

fn default_detail_tag() -> String {
    "entrydetail".to_string()
}

/// Immutable logical-field → candidate-path lookup, loaded once.
#[derive(Debug)]
pub struct FieldMap {
    header_tag: String,
    detail_tag: String,
    fields: HashMap<LogicalField, BTreeSet<String>>,
}

impl FieldMap {
    /// Loads the configuration file. A missing file is a fatal
    /// initialization error; there is no silent default mapping.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LedgerError::FieldMapMissing(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_reader<R: Read>(mut r: R) -> Result<Self> {
        let mut text = String::new();
        r.read_to_string(&mut text)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: FieldMapConfig = serde_json::from_str(text)
            .map_err(|e| LedgerError::FieldMapInvalid(e.to_string()))?;

        let mut fields: HashMap<LogicalField, BTreeSet<String>> = HashMap::new();
        for (key, templates) in &config.fields {
            let Some(field) = LogicalField::from_config_key(key) else {
                warn!("Ignoring unknown field map entry: {key}");
                continue;
            };
            let set = fields.entry(field).or_default();
            for template in templates {
                for expanded in expand_root_placeholder(template) {
                    // Element text content is addressed with a /#text suffix
                    // by some callers; register that variant too. After
                    // normalization the variants coincide and the set
                    // deduplicates them.
                    set.insert(normalize_path(&expanded));
                    if !expanded.contains('@') {
                        set.insert(normalize_path(&format!("{expanded}/#text")));
                    }
                }
            }
        }

        Ok(Self {
            header_tag: config.header_tag.trim().to_lowercase(),
            detail_tag: config.detail_tag.trim().to_lowercase(),
            fields,
        })
    }

    /// Lazily-initialized process-wide map from the conventional location.
    /// Initialization runs at most once; a load failure is surfaced to every
    /// caller until a load succeeds.
    pub fn global() -> Result<&'static FieldMap> {
        static GLOBAL: OnceCell<FieldMap> = OnceCell::new();
        GLOBAL.get_or_try_init(|| FieldMap::load(Path::new(DEFAULT_FIELDMAP_FILE)))
    }

    /// Element name opening a voucher header scope.
    pub fn header_tag(&self) -> &str {
        &self.header_tag
    }

    /// Element name opening a detail line scope.
    pub fn detail_tag(&self) -> &str {
        &self.detail_tag
    }

    pub fn candidates(&self, field: LogicalField) -> Option<&BTreeSet<String>> {
        self.fields.get(&field)
    }

    /// Whether `path` (already canonical) is a configured candidate for
    /// `field`. Comparison is exact ordinal equality; normalization has
    /// already lowercased both sides.
    pub fn matches(&self, field: LogicalField, path: &str) -> bool {
        self.fields
            .get(&field)
            .map(|set| set.contains(path))
            .unwrap_or(false)
    }
}

fn expand_root_placeholder(template: &str) -> Vec<String> {
    if template.contains(ROOT_PLACEHOLDER) {
        crate::paths::ROOT_TOKENS
            .iter()
            .map(|root| template.replace(ROOT_PLACEHOLDER, root))
            .collect()
    } else {
        vec![template.to_string()]
    }
}

/// A field map covering the standard e-Defter (XBRL GL) layout. Tests and
/// the CLI's `--write-default-fieldmap` flag use this as a starting point;
/// the runtime load path still requires an actual file.
pub fn standard_fieldmap_json() -> &'static str {
    r#"{
  "header_tag": "entryheader",
  "detail_tag": "entrydetail",
  "fields": {
    "Header.EntryNumber": [
      "%ROOT%/xbrl/accountingentries/entryheader/entrynumbercounter",
      "%ROOT%/xbrl/accountingentries/entryheader/entrynumber"
    ],
    "Header.PostingDate": [
      "%ROOT%/xbrl/accountingentries/entryheader/postingdate"
    ],
    "Header.Description": [
      "%ROOT%/xbrl/accountingentries/entryheader/entrycomment"
    ],
    "Header.DocumentNumber": [
      "%ROOT%/xbrl/accountingentries/entryheader/documentnumber"
    ],
    "Line.Counter": [
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/linenumbercounter",
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/linenumber"
    ],
    "Line.AccountMainId": [
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/account/accountmainid"
    ],
    "Line.AccountSubId": [
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/account/accountsubid",
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/account/accountsub/accountsubid"
    ],
    "Line.AccountName": [
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/account/accountmaindescription",
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/account/accountsub/accountsubdescription"
    ],
    "Line.Side": [
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/debitcreditcode"
    ],
    "Line.Amount": [
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/amount"
    ],
    "Line.Comment": [
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/detailcomment"
    ],
    "Line.PostingDate": [
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/postingdate"
    ],
    "Line.DocumentNumber": [
      "%ROOT%/xbrl/accountingentries/entryheader/entrydetail/documentnumber"
    ]
  }
}"#
}
