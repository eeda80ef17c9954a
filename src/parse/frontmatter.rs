use indexmap::IndexMap;

/// A value in the metadata header: a scalar or a block sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FmValue {
    Scalar(String),
    List(Vec<String>),
}

/// The `---`-fenced metadata header of a task note.
///
/// Keys keep insertion order so emission is deterministic. Parsing is
/// tolerant: unrecognized lines inside the fence are skipped, and a
/// missing closing fence makes the whole header malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    entries: IndexMap<String, FmValue>,
}

impl Frontmatter {
    pub fn new() -> Self {
        Frontmatter::default()
    }

    pub fn set_scalar(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .insert(key.to_string(), FmValue::Scalar(value.into()));
    }

    pub fn set_list(&mut self, key: &str, items: Vec<String>) {
        self.entries.insert(key.to_string(), FmValue::List(items));
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(FmValue::Scalar(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.entries.get(key) {
            Some(FmValue::List(items)) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Scalar parsed as a boolean (`true`/`false`, case-insensitive).
    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.scalar(key)?.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Emit the fenced header block, trailing newline included.
    pub fn to_text(&self) -> String {
        let mut out = String::from("---\n");
        for (key, value) in &self.entries {
            match value {
                FmValue::Scalar(s) => {
                    out.push_str(key);
                    out.push_str(": ");
                    out.push_str(s);
                    out.push('\n');
                }
                FmValue::List(items) => {
                    out.push_str(key);
                    out.push_str(":\n");
                    for item in items {
                        out.push_str("  - ");
                        out.push_str(item);
                        out.push('\n');
                    }
                }
            }
        }
        out.push_str("---\n");
        out
    }

    /// Parse the header from the start of `lines`.
    ///
    /// Returns the header and the index of the first body line. `None` if
    /// the document does not open with a fence or the fence never closes.
    pub fn parse(lines: &[&str]) -> Option<(Frontmatter, usize)> {
        if lines.first().map(|l| l.trim()) != Some("---") {
            return None;
        }

        let mut fm = Frontmatter::new();
        let mut idx = 1;
        let mut open_list: Option<String> = None;

        while idx < lines.len() {
            let line = lines[idx];
            if line.trim() == "---" {
                return Some((fm, idx + 1));
            }

            // Sequence item belonging to the most recent `key:` line
            let trimmed = line.trim_start();
            if let Some(item) = trimmed.strip_prefix("- ")
                && let Some(ref key) = open_list
            {
                let item = item.trim();
                if !item.is_empty()
                    && let Some(FmValue::List(items)) = fm.entries.get_mut(key)
                {
                    items.push(item.to_string());
                }
                idx += 1;
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                let value = value.trim();
                if key.is_empty() {
                    idx += 1;
                    continue;
                }
                if value.is_empty() {
                    // Block sequence opener
                    fm.entries.insert(key.to_string(), FmValue::List(Vec::new()));
                    open_list = Some(key.to_string());
                } else {
                    fm.set_scalar(key, value);
                    open_list = None;
                }
            } else {
                // Unrecognized line inside the fence — skip
                open_list = None;
            }
            idx += 1;
        }

        // Fence never closed
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_text(text: &str) -> Option<(Frontmatter, usize)> {
        let lines: Vec<&str> = text.lines().collect();
        Frontmatter::parse(&lines)
    }

    #[test]
    fn test_parse_scalars() {
        let (fm, body_start) = parse_text(
            "---\n\
             id: task-1\n\
             title: Fix the importer: phase two\n\
             completed: false\n\
             ---\n\
             Body text",
        )
        .unwrap();
        assert_eq!(fm.scalar("id"), Some("task-1"));
        // Only the first colon separates key from value
        assert_eq!(fm.scalar("title"), Some("Fix the importer: phase two"));
        assert_eq!(fm.bool("completed"), Some(false));
        assert_eq!(body_start, 4);
    }

    #[test]
    fn test_parse_block_sequences() {
        let (fm, _) = parse_text(
            "---\n\
             id: task-1\n\
             tags:\n\
             \x20\x20- tag-1\n\
             \x20\x20- tag-2\n\
             dependencies:\n\
             \x20\x20- FS:task-0\n\
             ---",
        )
        .unwrap();
        assert_eq!(fm.list("tags"), Some(&["tag-1".to_string(), "tag-2".to_string()][..]));
        assert_eq!(fm.list("dependencies"), Some(&["FS:task-0".to_string()][..]));
    }

    #[test]
    fn test_missing_opening_fence() {
        assert!(parse_text("id: task-1\n---\n").is_none());
    }

    #[test]
    fn test_unclosed_fence_is_malformed() {
        assert!(parse_text("---\nid: task-1\ntitle: X\n").is_none());
    }

    #[test]
    fn test_unrecognized_lines_skipped() {
        let (fm, _) = parse_text(
            "---\n\
             id: task-1\n\
             ???\n\
             title: Still parsed\n\
             ---",
        )
        .unwrap();
        assert_eq!(fm.scalar("title"), Some("Still parsed"));
    }

    #[test]
    fn test_stray_list_item_without_opener_skipped() {
        let (fm, _) = parse_text(
            "---\n\
             id: task-1\n\
             title: X\n\
             - orphan\n\
             ---",
        )
        .unwrap();
        // `title` is a scalar, so the dash line has no open list to join
        assert_eq!(fm.scalar("title"), Some("X"));
        assert!(fm.list("title").is_none());
    }

    #[test]
    fn test_emit_round_trip() {
        let mut fm = Frontmatter::new();
        fm.set_scalar("id", "task-9");
        fm.set_scalar("title", "Write the codec");
        fm.set_scalar("completed", "true");
        fm.set_list("tags", vec!["tag-a".into(), "tag-b".into()]);

        let text = fm.to_text();
        let (back, _) = parse_text(&text).unwrap();
        assert_eq!(back, fm);
    }

    #[test]
    fn test_emit_is_deterministic() {
        let mut fm = Frontmatter::new();
        fm.set_scalar("id", "t");
        fm.set_scalar("title", "T");
        assert_eq!(fm.to_text(), fm.to_text());
        assert_eq!(fm.to_text(), "---\nid: t\ntitle: T\n---\n");
    }
}
