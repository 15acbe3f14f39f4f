//! Endpoint alias normalisation.
//!
//! Maps free-text outcome names onto a small set of canonical labels so that
//! "Change in Pulmonary Vascular Resistance" and "PVR at week 16" both land on
//! `PVR`. Matching is a case-insensitive substring test over an ordered
//! category table; the first category with a matching alias wins.
//!
//! Usage:
//! ```ignore
//! let label = AliasNormaliser::standard().normalise("6-Minute Walk Distance");  // "6MWD"
//! ```

use std::sync::OnceLock;

/// One canonical label and the aliases that map onto it.
#[derive(Debug, Clone)]
pub struct AliasCategory {
    /// Canonical label, returned upper-cased.
    pub label: String,
    /// Lower-case alias fragments.
    pub aliases: Vec<String>,
}

/// Built-in category table, in match order.
const STANDARD_CATEGORIES: &[(&str, &[&str])] = &[
    ("pvr", &["pulmonary vascular resistance", "pvr", "pulmonary resistance", "vascular resistance"]),
    ("6mwd", &["6 minute walk distance", "6mwd", "6-minute walk", "six minute walk", "6 min walk", "distance walked"]),
    ("nt-probnp", &["nt-probnp", "nt probnp", "n-terminal pro-bnp", "brain natriuretic peptide", "natriuretic peptide"]),
    ("who fc", &["who functional class", "who fc", "functional class", "who class", "fc improved"]),
    ("time to clinical worsening", &["ttcw", "time to clinical worsening", "clinical worsening", "time to worsening"]),
    ("cardiac output", &["cardiac output", "co", "cardiac index", "ci"]),
];

/// Ordered alias table. Build once; share by reference.
#[derive(Debug, Clone)]
pub struct AliasNormaliser {
    categories: Vec<AliasCategory>,
}

impl AliasNormaliser {
    // ── Constructors ──────────────────────────────────────────────────────────

    /// Process-wide instance over the built-in table.
    pub fn standard() -> &'static AliasNormaliser {
        static STANDARD: OnceLock<AliasNormaliser> = OnceLock::new();
        STANDARD.get_or_init(|| {
            Self::from_pairs(STANDARD_CATEGORIES.iter().map(|(label, aliases)| (*label, aliases.iter().copied())))
        })
    }

    /// Build from `(label, aliases)` pairs, keeping their order.
    pub fn from_pairs<'a, I, A>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, A)>,
        A: IntoIterator<Item = &'a str>,
    {
        let categories = pairs
            .into_iter()
            .map(|(label, aliases)| AliasCategory {
                label: label.to_uppercase(),
                aliases: aliases
                    .into_iter()
                    .map(|a| a.trim().to_lowercase())
                    .filter(|a| !a.is_empty())
                    .collect(),
            })
            .collect();
        Self::from_categories(categories)
    }

    pub fn from_categories(categories: Vec<AliasCategory>) -> Self {
        Self { categories }
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// Canonical label of the first category with an alias contained in `name`.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.categories
            .iter()
            .find(|cat| cat.aliases.iter().any(|alias| lower.contains(alias.as_str())))
            .map(|cat| cat.label.as_str())
    }

    /// Canonical label, or the input with whitespace collapsed when no alias matches.
    pub fn normalise(&self, name: &str) -> String {
        match self.lookup(name) {
            Some(label) => label.to_string(),
            None => collapse_whitespace(name),
        }
    }

    pub fn categories(&self) -> &[AliasCategory] {
        &self.categories
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_alias_maps_to_its_label() {
        let n = AliasNormaliser::standard();
        for (label, aliases) in STANDARD_CATEGORIES {
            for alias in *aliases {
                let input = format!("Change in {} from baseline", alias.to_uppercase());
                let got = n.normalise(&input);
                // An earlier category may legitimately claim a later alias
                // (e.g. "co" inside another name), so only check the first hit.
                let expected = STANDARD_CATEGORIES
                    .iter()
                    .find(|(_, a)| a.iter().any(|x| input.to_lowercase().contains(x)))
                    .map(|(l, _)| l.to_uppercase())
                    .unwrap();
                assert_eq!(got, expected, "alias {alias:?} of {label:?}");
            }
        }
    }

    #[test]
    fn test_canonical_labels() {
        let n = AliasNormaliser::standard();
        assert_eq!(n.normalise("Pulmonary Vascular Resistance"), "PVR");
        assert_eq!(n.normalise("6-Minute Walk Distance"), "6MWD");
        assert_eq!(n.normalise("NT-proBNP at Week 26"), "NT-PROBNP");
        assert_eq!(n.normalise("WHO Functional Class"), "WHO FC");
        assert_eq!(n.normalise("Time to Clinical Worsening"), "TIME TO CLINICAL WORSENING");
    }

    #[test]
    fn test_first_category_wins() {
        // Mentions both PVR and 6MWD; PVR is listed first.
        let n = AliasNormaliser::standard();
        assert_eq!(n.normalise("6MWD and PVR composite"), "PVR");
    }

    #[test]
    fn test_unmatched_is_collapsed_and_trimmed() {
        let n = AliasNormaliser::standard();
        assert_eq!(n.normalise("  Borg   dyspnoea  "), "Borg dyspnoea");
        assert_eq!(n.lookup("Borg dyspnoea"), None);
    }

    #[test]
    fn test_custom_table() {
        let n = AliasNormaliser::from_pairs([("mpap", ["mean pulmonary arterial pressure", "mpap"])]);
        assert_eq!(n.normalise("Change in mPAP"), "MPAP");
        assert_eq!(n.categories().len(), 1);
    }

    #[test]
    fn test_long_unmatched_name_is_kept_whole() {
        let n = AliasNormaliser::standard();
        let title = "Borg dyspnea rating at week 12 ".repeat(5);
        let title = title.trim();
        assert!(title.len() >= 150);
        assert_eq!(n.normalise(title), title);
    }
}
