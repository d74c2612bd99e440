//! Parsing of supervisor log files (`YYYY-MM-DD HH:MM:SS - LEVEL - message`)

use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

pub struct LogParser {
    lines: Vec<String>,
}

impl LogParser {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Parser over a log file; empty if it cannot be read.
    pub fn from_file(path: &Path) -> Self {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        Self::new(content.lines().map(str::to_string).collect())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.lines.iter().any(|line| line.contains(pattern))
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.lines.iter().filter(|line| line.contains(pattern)).count()
    }

    /// Entries in the file format; other lines are skipped.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lines.iter().filter_map(|line| parse_line(line)).collect()
    }
}

fn parse_line(line: &str) -> Option<LogEntry> {
    let mut parts = line.splitn(3, " - ");
    let timestamp = parts.next()?;
    let level = parts.next()?;
    let message = parts.next()?;

    // 2024-05-01 06:00:00
    if timestamp.len() != 19 || timestamp.as_bytes().get(10) != Some(&b' ') {
        return None;
    }

    Some(LogEntry {
        timestamp: timestamp.to_string(),
        level: level.trim().to_string(),
        message: message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_format_lines() {
        let parser = LogParser::new(vec![
            "2024-05-01 06:00:00 - INFO - Sync started: /a -> /b (backend: filesystem)".to_string(),
            "not a log line".to_string(),
            "2024-05-01 06:00:01 - ERROR - OFFLINE: probe failed; no transfer attempted".to_string(),
        ]);

        let entries = parser.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, "INFO");
        assert_eq!(entries[1].timestamp, "2024-05-01 06:00:01");
        assert!(entries[1].message.starts_with("OFFLINE"));
        assert_eq!(parser.count("2024-05-01"), 2);
    }
}
