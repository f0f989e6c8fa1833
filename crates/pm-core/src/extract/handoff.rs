//! "Known Issues" extraction from handoff documents.

use regex::Regex;

const SECTION_TITLE: &str = "known issues";

/// Line-oriented parser for markdown "Known Issues" blocks.
///
/// A heading of any level titled "Known Issues" (any case, optional trailing
/// colon) opens a block; the next heading closes it. Inside a block every
/// `-` or `*` bullet is one issue.
#[derive(Debug, Clone)]
pub struct KnownIssuesParser {
    heading: Regex,
    bullet: Regex,
}

impl Default for KnownIssuesParser {
    fn default() -> Self {
        Self::new()
    }
}

impl KnownIssuesParser {
    pub fn new() -> Self {
        Self {
            heading: Regex::new(r"^\s{0,3}#{1,6}\s+(.*?)[\s#]*$").expect("heading regex"),
            bullet: Regex::new(r"^\s*[-*]\s+(\S.*?)\s*$").expect("bullet regex"),
        }
    }

    /// Bullet texts of every "Known Issues" block, in document order.
    pub fn parse(&self, content: &str) -> Vec<String> {
        let mut issues = Vec::new();
        let mut in_block = false;

        for line in content.lines() {
            if let Some(caps) = self.heading.captures(line) {
                let title = caps[1].trim().trim_end_matches(':').trim();
                in_block = title.eq_ignore_ascii_case(SECTION_TITLE);
                continue;
            }
            if !in_block {
                continue;
            }
            if let Some(caps) = self.bullet.captures(line) {
                issues.push(caps[1].to_string());
            }
        }

        issues
    }
}
