//! Path/tag explorer.
//!
//! Diagnostic scan over whole XML documents collecting per-path occurrence
//! counts and bounded value samples. Reports use the raw (untruncated) path
//! form so vendor wrapper structure stays visible. The output feeds fieldmap
//! authoring for new schema variants, never the runtime parse.

use crate::error::{LedgerError, Result};
use crate::paths::PathBuilder;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// How many example values are kept per path.
const SAMPLE_LIMIT: usize = 3;

#[derive(Debug, Default, Clone)]
pub struct PathStat {
    pub count: u64,
    pub samples: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PathStats {
    stats: BTreeMap<String, PathStat>,
}

impl PathStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: &str, value: &str) {
        let stat = self.stats.entry(path.to_string()).or_default();
        stat.count += 1;
        let value = value.trim();
        if !value.is_empty() && stat.samples.len() < SAMPLE_LIMIT {
            let mut sample = value.to_string();
            if sample.len() > 60 {
                sample.truncate(60);
            }
            stat.samples.push(sample);
        }
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&PathStat> {
        self.stats.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PathStat)> {
        self.stats.iter()
    }

    pub fn merge(&mut self, other: PathStats) {
        for (path, stat) in other.stats {
            let entry = self.stats.entry(path).or_default();
            entry.count += stat.count;
            for sample in stat.samples {
                if entry.samples.len() < SAMPLE_LIMIT {
                    entry.samples.push(sample);
                }
            }
        }
    }

    pub fn scan_file(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)?;
        self.scan_reader(BufReader::new(file))
    }

    /// Collects every text and attribute node of the document.
    pub fn scan_reader<R: BufRead>(&mut self, r: R) -> Result<()> {
        let mut reader = Reader::from_reader(r);
        reader.trim_text(true);

        let mut builder = PathBuilder::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    builder.push(&qualified);
                    for attr in e.attributes().flatten() {
                        let key =
                            String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                        if let Ok(value) = attr.unescape_value() {
                            let path = format!("{}/@{}", builder.raw(), key.to_lowercase());
                            self.record(&path, &value);
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    builder.push(&qualified);
                    let raw = builder.raw();
                    self.record(&raw, "");
                    for attr in e.attributes().flatten() {
                        let key =
                            String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                        if let Ok(value) = attr.unescape_value() {
                            let path = format!("{raw}/@{}", key.to_lowercase());
                            self.record(&path, &value);
                        }
                    }
                    builder.pop();
                }
                Ok(Event::Text(t)) => {
                    let value = t
                        .unescape()
                        .map_err(|e| LedgerError::Xml(e.to_string()))?
                        .into_owned();
                    self.record(&builder.raw(), &value);
                }
                Ok(Event::CData(t)) => {
                    let value = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    self.record(&builder.raw(), &value);
                }
                Ok(Event::End(_)) => builder.pop(),
                Ok(Event::Eof) => break,
                Err(e) => return Err(LedgerError::Xml(e.to_string())),
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    /// Human-readable report, most frequent paths first.
    pub fn report(&self) -> String {
        let mut entries: Vec<(&String, &PathStat)> = self.stats.iter().collect();
        entries.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));

        let mut out = String::new();
        out.push_str("count\tpath\tsamples\n");
        for (path, stat) in entries {
            out.push_str(&format!(
                "{}\t{}\t{}\n",
                stat.count,
                path,
                stat.samples.join(" | ")
            ));
        }
        out
    }
}
