//! Chart-of-accounts name lookup.
//!
//! A line-oriented text file maps ledger codes to display names, in any of
//! three forms per line: `code=name`, `code. name` or `code name`. Lines
//! starting with `#` are comments. A missing file degrades to a lookup that
//! always misses; the trial balance then falls back to names observed on the
//! rows themselves.

use log::warn;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ChartOfAccounts {
    names: HashMap<String, String>,
}

impl ChartOfAccounts {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the lookup file. Missing or unreadable files are not errors:
    /// the result is an empty chart and every lookup misses.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_text(&text),
            Err(e) => {
                warn!("Chart of accounts {} not loaded: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn from_text(text: &str) -> Self {
        let mut names = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((code, name)) = split_entry(line) {
                names.insert(code.to_string(), name.to_string());
            }
        }
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name for an exact code.
    pub fn name_for(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    /// Ledger-level lookup: the exact code first, then its 3-digit and
    /// 1-digit truncations, matching how chart files list group headers.
    pub fn ledger_name_for(&self, code: &str) -> Option<&str> {
        if let Some(name) = self.name_for(code) {
            return Some(name);
        }
        for len in [3, 1] {
            if code.len() > len {
                let prefix: String = code.chars().take(len).collect();
                if let Some(name) = self.name_for(&prefix) {
                    return Some(name);
                }
            }
        }
        None
    }
}

fn split_entry(line: &str) -> Option<(&str, &str)> {
    if let Some((code, name)) = line.split_once('=') {
        let (code, name) = (code.trim(), name.trim());
        if !code.is_empty() && !name.is_empty() {
            return Some((code, name));
        }
        return None;
    }
    if let Some((code, name)) = line.split_once(". ") {
        let (code, name) = (code.trim(), name.trim());
        if !code.is_empty() && !name.is_empty() {
            return Some((code, name));
        }
        return None;
    }
    let (code, name) = line.split_once(char::is_whitespace)?;
    let (code, name) = (code.trim_end_matches('.'), name.trim());
    if !code.is_empty() && !name.is_empty() {
        Some((code, name))
    } else {
        None
    }
}
