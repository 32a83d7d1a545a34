//! Context-window policy: when to summarize and what to keep.
//!
//! Summaries are appended as marker entries; the active window starts at
//! the last marker. When the window grows past the threshold, the oldest
//! `summary_ratio` share of it is summarized, never touching the most recent
//! `preserve_recent_messages` entries.

use sv_domain::config::ContextPolicyConfig;

use crate::history::HistoryEntry;

#[derive(Debug, Clone, PartialEq)]
pub struct ContextPolicy {
    pub summary_ratio: f32,
    pub preserve_recent_messages: usize,
    pub max_active_messages: usize,
}

impl Default for ContextPolicy {
    fn default() -> Self {
        Self::from(&ContextPolicyConfig::default())
    }
}

impl From<&ContextPolicyConfig> for ContextPolicy {
    fn from(cfg: &ContextPolicyConfig) -> Self {
        Self {
            summary_ratio: cfg.summary_ratio.clamp(0.0, 1.0),
            preserve_recent_messages: cfg.preserve_recent_messages,
            max_active_messages: cfg.max_active_messages,
        }
    }
}

/// The part of a history the model still sees.
#[derive(Debug, Clone, Copy)]
pub struct ActiveWindow<'a> {
    /// The latest summary marker, if any.
    pub summary: Option<&'a HistoryEntry>,
    /// Entries after the marker.
    pub entries: &'a [HistoryEntry],
}

impl ContextPolicy {
    pub fn active_window<'a>(&self, lines: &'a [HistoryEntry]) -> ActiveWindow<'a> {
        match lines.iter().rposition(HistoryEntry::is_summary) {
            Some(i) => ActiveWindow {
                summary: Some(&lines[i]),
                entries: &lines[i + 1..],
            },
            None => ActiveWindow {
                summary: None,
                entries: lines,
            },
        }
    }

    pub fn needs_summary(&self, window: &ActiveWindow<'_>) -> bool {
        window.entries.len() > self.max_active_messages
    }

    /// Split active entries into `(to_summarize, to_keep)`.
    ///
    /// The kept part always starts at a user entry so the model never sees
    /// an assistant reply without the request it answered.
    pub fn split<'a>(&self, entries: &'a [HistoryEntry]) -> (&'a [HistoryEntry], &'a [HistoryEntry]) {
        let len = entries.len();
        let ceiling = len.saturating_sub(self.preserve_recent_messages);
        let mut cut = ((len as f32) * self.summary_ratio).floor() as usize;
        cut = cut.max(1).min(ceiling);
        while cut > 0 && cut < len && entries[cut].role != "user" {
            cut -= 1;
        }
        entries.split_at(cut)
    }

    /// Marker line holding a summary of `summarized` earlier entries.
    pub fn summary_entry(summary: &str, summarized: usize) -> HistoryEntry {
        HistoryEntry::new("system", summary).with_metadata(serde_json::json!({
            "summary": true,
            "messages_summarized": summarized,
        }))
    }

    /// Prompt asking the model to fold `previous` and `entries` into one
    /// summary.
    pub fn summary_prompt(previous: Option<&HistoryEntry>, entries: &[HistoryEntry]) -> String {
        let mut conversation = String::new();
        if let Some(prev) = previous {
            conversation.push_str("Earlier summary: ");
            conversation.push_str(&prev.content);
            conversation.push('\n');
        }
        for line in entries {
            let label = match line.role.as_str() {
                "user" => "User",
                "assistant" => "Assistant",
                "tool" => "Tool",
                "system" => "System",
                other => other,
            };
            conversation.push_str(label);
            conversation.push_str(": ");
            conversation.push_str(&truncate_middle(&line.content, 2000));
            conversation.push('\n');
        }

        format!(
            "Summarize the following operations conversation so it can replace the \
             original messages. Keep open incidents, alarms and resources mentioned, \
             actions already taken, emails answered and anything still pending. \
             Be concise and write in present tense.\n\nCONVERSATION:\n{conversation}"
        )
    }
}

/// Keep the head and tail of very long content.
fn truncate_middle(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_owned();
    }
    let head_end = floor_char_boundary(s, max / 2);
    let tail_start = floor_char_boundary(s, s.len() - max / 4);
    format!("{} [...] {}", &s[..head_end], &s[tail_start..])
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn convo(pairs: usize) -> Vec<HistoryEntry> {
        (0..pairs)
            .flat_map(|i| {
                [
                    HistoryEntry::new("user", &format!("q{i}")),
                    HistoryEntry::new("assistant", &format!("a{i}")),
                ]
            })
            .collect()
    }

    #[test]
    fn window_starts_after_last_marker() {
        let policy = ContextPolicy::default();
        let mut lines = convo(3);
        lines.push(ContextPolicy::summary_entry("first", 6));
        lines.extend(convo(1));
        let window = policy.active_window(&lines);
        assert_eq!(window.summary.map(|s| s.content.as_str()), Some("first"));
        assert_eq!(window.entries.len(), 2);
    }

    #[test]
    fn threshold_is_exclusive() {
        let policy = ContextPolicy::default();
        let lines = convo(20);
        assert!(!policy.needs_summary(&policy.active_window(&lines)));
        let lines = convo(21);
        assert!(policy.needs_summary(&policy.active_window(&lines)));
    }

    #[test]
    fn split_takes_ratio_and_keeps_recent() {
        let policy = ContextPolicy::default();
        let lines = convo(25);
        let (old, keep) = policy.split(&lines);
        // floor(50 * 0.4) = 20, already on a user entry.
        assert_eq!(old.len(), 20);
        assert_eq!(keep.len(), 30);
        assert_eq!(keep[0].role, "user");
    }

    #[test]
    fn split_never_touches_preserved_tail() {
        let policy = ContextPolicy {
            summary_ratio: 0.9,
            preserve_recent_messages: 10,
            max_active_messages: 12,
        };
        let lines = convo(7);
        let (old, keep) = policy.split(&lines);
        assert_eq!(old.len(), 4);
        assert_eq!(keep.len(), 10);
    }

    #[test]
    fn split_backs_off_to_user_boundary() {
        let policy = ContextPolicy {
            summary_ratio: 0.5,
            preserve_recent_messages: 2,
            max_active_messages: 4,
        };
        let lines = convo(3);
        // floor(6 * 0.5) = 3 lands on an assistant reply; back off to 2.
        let (old, keep) = policy.split(&lines);
        assert_eq!(old.len(), 2);
        assert_eq!(keep[0].content, "q1");
    }

    #[test]
    fn long_content_is_truncated_in_prompt() {
        let long = "x".repeat(5000);
        let prompt = ContextPolicy::summary_prompt(None, &[HistoryEntry::new("tool", &long)]);
        assert!(prompt.contains("[...]"));
        assert!(prompt.len() < 3000);
    }
}
