//! Trial mentions inside company financial data.

use trialscope_common::record::MentionContext;

/// Characters kept on either side of a mention.
const CONTEXT_RADIUS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MentionStats {
    pub total_mentions: u32,
    pub name_mentions: u32,
    pub nct_mentions: u32,
    pub contexts: Vec<MentionContext>,
}

impl MentionStats {
    pub fn merge(&mut self, other: MentionStats) {
        self.total_mentions += other.total_mentions;
        self.name_mentions += other.name_mentions;
        self.nct_mentions += other.nct_mentions;
        self.contexts.extend(other.contexts);
    }
}

/// Count case-insensitive occurrences of the trial name and identifier.
///
/// One context is recorded per term, around its first occurrence, with
/// newlines replaced by spaces.
pub fn search_mentions(text: &str, trial_name: &str, nct_id: &str) -> MentionStats {
    let content = text.to_lowercase();
    let mut stats = MentionStats::default();

    for (term, is_name) in [(trial_name, true), (nct_id, false)] {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let count = content.matches(needle.as_str()).count() as u32;
        if count == 0 {
            continue;
        }
        if is_name {
            stats.name_mentions = count;
        } else {
            stats.nct_mentions = count;
        }
        if let Some(pos) = content.find(needle.as_str()) {
            stats.contexts.push(MentionContext {
                matched_term: term.to_string(),
                context: context_around(&content, pos, needle.len()),
            });
        }
    }

    stats.total_mentions = stats.name_mentions + stats.nct_mentions;
    stats
}

fn context_around(content: &str, pos: usize, len: usize) -> String {
    let mut start = pos.saturating_sub(CONTEXT_RADIUS);
    while start > 0 && !content.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (pos + len + CONTEXT_RADIUS).min(content.len());
    while end < content.len() && !content.is_char_boundary(end) {
        end += 1;
    }
    content[start..end].replace('\n', " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_both_terms() {
        let text = "The SERAPHIN study (NCT00660179) met its endpoint.\nSERAPHIN extension ongoing.";
        let stats = search_mentions(text, "SERAPHIN", "NCT00660179");
        assert_eq!(stats.name_mentions, 2);
        assert_eq!(stats.nct_mentions, 1);
        assert_eq!(stats.total_mentions, 3);
        assert_eq!(stats.contexts.len(), 2);
        assert_eq!(stats.contexts[0].matched_term, "SERAPHIN");
        assert!(!stats.contexts[0].context.contains('\n'));
        assert!(stats.contexts[1].context.contains("nct00660179"));
    }

    #[test]
    fn test_no_mentions() {
        let stats = search_mentions("revenue grew 4%", "GRIPHON", "NCT01106014");
        assert_eq!(stats, MentionStats::default());
    }

    #[test]
    fn test_empty_name_is_ignored() {
        let stats = search_mentions("anything", "", "NCT01106014");
        assert_eq!(stats.total_mentions, 0);
    }

    #[test]
    fn test_merge() {
        let mut a = search_mentions("griphon", "GRIPHON", "x1");
        a.merge(search_mentions("griphon griphon", "GRIPHON", "x1"));
        assert_eq!(a.name_mentions, 3);
        assert_eq!(a.contexts.len(), 2);
    }
}
