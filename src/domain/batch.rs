use super::LogEntry;

/// Content of exactly one batch file: one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    body: String,
    entries: usize,
}

impl Batch {
    pub fn render(entries: &[LogEntry]) -> Result<Self, serde_json::Error> {
        let mut body = String::with_capacity(entries.len() * 192);
        for entry in entries {
            body.push_str(&serde_json::to_string(entry)?);
            body.push('\n');
        }
        Ok(Self {
            body,
            entries: entries.len(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.body
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.body.as_bytes()
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}
