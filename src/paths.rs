//! Canonicalization of XML traversal paths.
//!
//! Every bookkeeping vendor wraps the standard e-Defter payload in its own
//! stack of root and schema-reference elements, with its own namespace
//! prefixes and casing. All path matching in this crate therefore runs on a
//! canonical form that is independent of those wrappers: lowercased,
//! prefix-free, rooted at the first recognized ledger root element.

/// Root element names used by known e-Defter generators. A path containing
/// one of these is truncated so the token becomes its first segment.
pub const ROOT_TOKENS: [&str; 2] = ["defter", "berat"];

fn canonical_segment(seg: &str) -> &str {
    // Namespace prefixes ("gl-cor:amount") are not part of the canonical key.
    match seg.rsplit_once(':') {
        Some((_, local)) => local,
        None => seg,
    }
}

/// Canonicalizes a raw traversal path into a schema-independent key.
///
/// Lowercases, strips namespace prefixes per segment, drops a trailing
/// `/#text`, removes `schemaref` wrapper segments, truncates everything
/// before the first recognized root token, collapses repeated slashes and
/// drops leading/trailing slashes. Idempotent; unparseable or empty input
/// yields the empty string.
pub fn normalize_path(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return String::new();
    }

    let trimmed = lowered.strip_suffix("/#text").unwrap_or(&lowered);

    let mut segments: Vec<&str> = trimmed
        .split('/')
        .filter(|s| !s.is_empty())
        .map(canonical_segment)
        .filter(|s| *s != "schemaref")
        .collect();

    if let Some(pos) = segments
        .iter()
        .position(|s| ROOT_TOKENS.contains(s))
    {
        segments.drain(..pos);
    }

    segments.join("/")
}

/// Stateful companion to [`normalize_path`] that mirrors the current XML
/// element nesting as a push/pop stack.
///
/// Consecutive duplicate segments are collapsed to one, which neutralizes
/// self-referential wrapper schemas that nest an element inside an element
/// of the same name.
#[derive(Debug, Default)]
pub struct PathBuilder {
    // Each entry records the pushed segment and whether it extended the
    // visible path (false when collapsed into its identical parent).
    stack: Vec<(String, bool)>,
    current: String,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter an element. `name` may carry a namespace prefix.
    pub fn push(&mut self, name: &str) {
        let seg = canonical_segment(name.trim()).to_lowercase();
        let duplicate = self
            .stack
            .iter()
            .rev()
            .find(|(_, visible)| *visible)
            .map(|(s, _)| s == &seg)
            .unwrap_or(false);
        self.stack.push((seg, !duplicate));
        if !duplicate {
            self.rebuild();
        }
    }

    /// Leave the current element.
    pub fn pop(&mut self) {
        if let Some((_, visible)) = self.stack.pop() {
            if visible {
                self.rebuild();
            }
        }
    }

    /// Canonical path for the cursor position.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Canonical path for an attribute of the current element.
    pub fn attribute(&self, attr: &str) -> String {
        format!("{}/@{}", self.current, attr.trim().to_lowercase())
    }

    /// Raw (untruncated) path for the cursor position, still lowercased,
    /// prefix-free and duplicate-collapsed. The explorer reports this form
    /// so vendor wrapper structure stays visible.
    pub fn raw(&self) -> String {
        let segs: Vec<&str> = self
            .stack
            .iter()
            .filter(|(_, visible)| *visible)
            .map(|(s, _)| s.as_str())
            .collect();
        segs.join("/")
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn rebuild(&mut self) {
        self.current = normalize_path(&self.raw());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_strips_prefixes() {
        assert_eq!(
            normalize_path("Defter/xbrl/gl-cor:AccountingEntries/gl-cor:EntryHeader"),
            "defter/xbrl/accountingentries/entryheader"
        );
    }

    #[test]
    fn test_normalize_drops_text_suffix() {
        assert_eq!(
            normalize_path("defter/xbrl/entryheader/postingdate/#text"),
            "defter/xbrl/entryheader/postingdate"
        );
    }

    #[test]
    fn test_normalize_truncates_before_root() {
        assert_eq!(
            normalize_path("/envelope/payload/edefter:defter/xbrl/accountingentries"),
            "defter/xbrl/accountingentries"
        );
        assert_eq!(
            normalize_path("/wrapper/berat/xbrl"),
            "berat/xbrl"
        );
    }

    #[test]
    fn test_normalize_removes_schemaref_and_slashes() {
        assert_eq!(
            normalize_path("//defter//schemaRef/xbrl///entryheader/"),
            "defter/xbrl/entryheader"
        );
    }

    #[test]
    fn test_normalize_empty_and_garbage() {
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("   "), "");
        assert_eq!(normalize_path("///"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "Defter/xbrl/gl-cor:Amount/#text",
            "/a/b/edefter:defter/xbrl/schemaRef/entryheader",
            "berat/xbrl/entrydetail/amount",
            "",
            "no/root/here",
        ];
        for raw in inputs {
            let once = normalize_path(raw);
            assert_eq!(normalize_path(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_builder_tracks_nesting() {
        let mut b = PathBuilder::new();
        b.push("edefter:defter");
        b.push("xbrli:xbrl");
        b.push("gl-cor:entryHeader");
        assert_eq!(b.current(), "defter/xbrl/entryheader");
        b.pop();
        assert_eq!(b.current(), "defter/xbrl");
        b.push("gl-cor:entryHeader");
        b.push("gl-cor:postingDate");
        assert_eq!(b.current(), "defter/xbrl/entryheader/postingdate");
    }

    #[test]
    fn test_builder_collapses_consecutive_duplicates() {
        let mut b = PathBuilder::new();
        b.push("defter");
        b.push("wrapper");
        b.push("wrapper");
        b.push("amount");
        assert_eq!(b.current(), "defter/wrapper/amount");
        b.pop(); // amount
        b.pop(); // inner wrapper (collapsed)
        b.pop(); // outer wrapper
        assert_eq!(b.current(), "defter");
    }

    #[test]
    fn test_builder_attribute_paths() {
        let mut b = PathBuilder::new();
        b.push("defter");
        b.push("amount");
        assert_eq!(b.attribute("unitRef"), "defter/amount/@unitref");
    }

    #[test]
    fn test_builder_matches_free_function() {
        let mut b = PathBuilder::new();
        for seg in ["envelope", "edefter:defter", "xbrl", "schemaRef", "entryHeader"] {
            b.push(seg);
        }
        assert_eq!(
            b.current(),
            normalize_path("envelope/defter/xbrl/schemaref/entryheader")
        );
    }
}
