use regex::Regex;

use crate::parse::note_parser::parse_checklist_line;

/// Fields pulled out of one tagged checklist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFields {
    /// Line text with the checkbox, markers, and tag tokens stripped.
    pub title: String,
    pub completed: bool,
    /// Priority name (`Critical`/`High`/`Medium`/`Low`).
    pub priority: Option<String>,
    /// ISO date from the first matching due marker.
    pub due_date: Option<String>,
    /// Routed project name from `#base/Suffix` (hyphens become spaces).
    pub routed_project: Option<String>,
    /// Freeform tag names, unresolved (the scanner matches them against
    /// the target project's tag list).
    pub tag_names: Vec<String>,
}

/// Compiled patterns for one scanner instance. The base tag is
/// configurable, so the routing pattern is built with `regex::escape`.
pub struct LinePatterns {
    base_tag: String,
    priority_word: Regex,
    due_emoji: Regex,
    due_word: Regex,
    due_at: Regex,
    routing: Regex,
    tag_token: Regex,
}

impl LinePatterns {
    pub fn new(base_tag: &str) -> Self {
        let escaped = regex::escape(base_tag);
        LinePatterns {
            base_tag: base_tag.to_string(),
            priority_word: Regex::new(r"(?i)\b(critical|high|medium|low)\b").unwrap(),
            due_emoji: Regex::new(r"📅\s*(\d{4}-\d{2}-\d{2})").unwrap(),
            due_word: Regex::new(r"(?i)\bdue:\s*(\d{4}-\d{2}-\d{2})").unwrap(),
            due_at: Regex::new(r"@(\d{4}-\d{2}-\d{2})").unwrap(),
            routing: Regex::new(&format!(r"#{}/([^\s#]+)", escaped)).unwrap(),
            tag_token: Regex::new(r"#[^\s#]+").unwrap(),
        }
    }

    /// Is this a checklist line carrying the base tag?
    pub fn is_task_line(&self, line: &str) -> bool {
        parse_checklist_line(line.trim_start()).is_some() && self.has_base_tag(line)
    }

    /// The base tag as a standalone token (`#planner`, `#planner/...`),
    /// not a prefix of a longer tag (`#plannerx` does not count).
    fn has_base_tag(&self, line: &str) -> bool {
        let needle = format!("#{}", self.base_tag);
        let mut start = 0;
        while let Some(pos) = line[start..].find(&needle) {
            let end = start + pos + needle.len();
            match line[end..].chars().next() {
                None => return true,
                Some(c) if c.is_whitespace() || c == '/' || c == '#' => return true,
                _ => {}
            }
            start = end;
        }
        false
    }

    /// Run the layered extractors over a checklist line.
    ///
    /// Precedence is fixed: priority markers first (`!!!` before `!!`
    /// before `!`, then the textual form), then due-date markers (emoji,
    /// `due:`, `@`), then the routing tag, then freeform tags. Only the
    /// first match of each layer applies, and each matched substring is
    /// stripped from the returned title along with every `#token`.
    pub fn extract(&self, line: &str) -> Option<ScanFields> {
        let (completed, rest) = parse_checklist_line(line.trim_start())?;
        if !self.has_base_tag(rest) {
            return None;
        }
        let mut text = rest.to_string();

        let priority = self.take_priority(&mut text);
        let due_date = self.take_due_date(&mut text);
        let routed_project = self.take_routing(&mut text);

        // Freeform tags: every remaining #token except the base tag
        let mut tag_names = Vec::new();
        for m in self.tag_token.find_iter(&text) {
            let name = &m.as_str()[1..];
            if !name.eq_ignore_ascii_case(&self.base_tag) {
                tag_names.push(name.to_string());
            }
        }
        text = self.tag_token.replace_all(&text, "").into_owned();

        Some(ScanFields {
            title: collapse_spaces(&text),
            completed,
            priority,
            due_date,
            routed_project,
            tag_names,
        })
    }

    fn take_priority(&self, text: &mut String) -> Option<String> {
        for (marker, name) in [("!!!", "Critical"), ("!!", "High"), ("!", "Medium")] {
            if let Some(pos) = text.find(marker) {
                text.replace_range(pos..pos + marker.len(), "");
                return Some(name.to_string());
            }
        }
        if let Some(m) = self.priority_word.find(text.as_str()) {
            let name = match m.as_str().to_ascii_lowercase().as_str() {
                "critical" => "Critical",
                "high" => "High",
                "medium" => "Medium",
                _ => "Low",
            };
            let range = m.range();
            text.replace_range(range, "");
            return Some(name.to_string());
        }
        None
    }

    fn take_due_date(&self, text: &mut String) -> Option<String> {
        for pattern in [&self.due_emoji, &self.due_word, &self.due_at] {
            if let Some(caps) = pattern.captures(text.as_str()) {
                let date = caps.get(1).map(|g| g.as_str().to_string());
                let range = caps.get(0).map(|g| g.range());
                if let (Some(date), Some(range)) = (date, range) {
                    text.replace_range(range, "");
                    return Some(date);
                }
            }
        }
        None
    }

    fn take_routing(&self, text: &mut String) -> Option<String> {
        let caps = self.routing.captures(text.as_str())?;
        let suffix = caps.get(1)?.as_str().replace('-', " ");
        let range = caps.get(0)?.range();
        text.replace_range(range, "");
        Some(suffix)
    }
}

/// Collapse whitespace runs left behind by stripping and trim the ends.
fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
