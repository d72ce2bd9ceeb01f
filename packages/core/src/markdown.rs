// ABOUTME: Markdown section parsing for PRD documents
// ABOUTME: Splits on heading markers and extracts task candidates from list items

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

use crate::constants::MAX_NAME_LENGTH;
use crate::validation::truncate;

lazy_static! {
    static ref HEADING: Regex = Regex::new(r"^(#{1,6})\s+(.+?)(?:\s+#+)?\s*$").unwrap();
    static ref LIST_ITEM: Regex =
        Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+(?:\[([ xX])\]\s+)?(.+?)\s*$").unwrap();
}

/// Heading titles (lowercased) under which list items become tasks
const TASK_SECTION_KEYWORDS: &[&str] = &[
    "task",
    "requirement",
    "feature",
    "user stor",
    "deliverable",
    "todo",
    "to-do",
    "action item",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub level: u8,
    pub title: String,
    pub content: String,
    pub children: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedDocument {
    pub title: Option<String>,
    /// Text before the first heading
    pub preamble: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskCandidate {
    pub title: String,
    pub section: String,
}

#[derive(Debug)]
struct FlatSection {
    level: u8,
    title: String,
    content: String,
}

/// Walk lines, yielding (heading, line) pairs while skipping fenced code
fn flatten(markdown: &str) -> (String, Vec<FlatSection>) {
    let mut preamble = String::new();
    let mut sections: Vec<FlatSection> = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        } else if !in_fence {
            if let Some(caps) = HEADING.captures(line) {
                sections.push(FlatSection {
                    level: caps[1].len() as u8,
                    title: caps[2].trim().to_string(),
                    content: String::new(),
                });
                continue;
            }
        }

        let target = match sections.last_mut() {
            Some(section) => &mut section.content,
            None => &mut preamble,
        };
        target.push_str(line);
        target.push('\n');
    }

    (preamble, sections)
}

fn nest<I>(flat: &mut std::iter::Peekable<I>, parent_level: u8) -> Vec<Section>
where
    I: Iterator<Item = FlatSection>,
{
    let mut out = Vec::new();
    while flat.peek().is_some_and(|next| next.level > parent_level) {
        let Some(current) = flat.next() else { break };
        let children = nest(flat, current.level);
        out.push(Section {
            level: current.level,
            title: current.title,
            content: current.content.trim().to_string(),
            children,
        });
    }
    out
}

/// Parse a markdown document into a heading tree
pub fn parse_sections(markdown: &str) -> ParsedDocument {
    let (preamble, flat) = flatten(markdown);
    let title = flat
        .iter()
        .find(|section| section.level == 1)
        .map(|section| section.title.clone());
    let mut iter = flat.into_iter().peekable();
    let sections = nest(&mut iter, 0);

    ParsedDocument {
        title,
        preamble: preamble.trim().to_string(),
        sections,
    }
}

/// First level-1 heading of the document
pub fn document_title(markdown: &str) -> Option<String> {
    parse_sections(markdown).title
}

fn is_task_heading(title: &str) -> bool {
    let lower = title.to_lowercase();
    TASK_SECTION_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn clean_item(text: &str) -> String {
    let text = text.trim();
    let text = text.trim_start_matches("**").trim_end_matches("**");
    let text = text.trim_matches('`').trim();
    truncate(text, MAX_NAME_LENGTH)
}

/// Collect open list items under task-like headings (and their sub-headings)
pub fn extract_task_candidates(markdown: &str) -> Vec<TaskCandidate> {
    let (_, flat) = flatten(markdown);
    let mut candidates = Vec::new();
    let mut seen = HashSet::new();
    // (level, heading matched) for the current heading path
    let mut path: Vec<(u8, bool)> = Vec::new();

    for section in &flat {
        while path.last().is_some_and(|(level, _)| *level >= section.level) {
            path.pop();
        }
        let inherited = path.iter().any(|(_, matched)| *matched);
        let matched = is_task_heading(&section.title);
        path.push((section.level, matched));

        if !(matched || inherited) {
            continue;
        }

        let mut in_fence = false;
        for line in section.content.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            let Some(caps) = LIST_ITEM.captures(line) else {
                continue;
            };
            if matches!(caps.get(1).map(|m| m.as_str()), Some("x") | Some("X")) {
                continue;
            }
            let title = clean_item(&caps[2]);
            if title.is_empty() || !seen.insert(title.to_lowercase()) {
                continue;
            }
            candidates.push(TaskCandidate {
                title,
                section: section.title.clone(),
            });
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const PRD: &str = r#"Intro text.

# Habit Tracker

## Overview
Track daily habits.

## Requirements
- [ ] Users can create a habit
- [x] Users can sign in
- **Streak counter**

### Stretch Features
1. Weekly digest email
2. Users can create a habit

## Notes
- not a task

```
# not a heading
- not a task either
```
"#;

    #[test]
    fn test_parse_sections_builds_tree() {
        let doc = parse_sections(PRD);
        assert_eq!(doc.title.as_deref(), Some("Habit Tracker"));
        assert_eq!(doc.preamble, "Intro text.");
        assert_eq!(doc.sections.len(), 1);

        let root = &doc.sections[0];
        let titles: Vec<&str> = root.children.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Overview", "Requirements", "Notes"]);
        assert_eq!(root.children[1].children[0].title, "Stretch Features");
        assert_eq!(root.children[0].content, "Track daily habits.");
    }

    #[test]
    fn test_headings_inside_fences_are_ignored() {
        let doc = parse_sections(PRD);
        let notes = &doc.sections[0].children[2];
        assert!(notes.content.contains("# not a heading"));
        assert!(notes.children.is_empty());
    }

    #[test]
    fn test_extract_task_candidates() {
        let tasks = extract_task_candidates(PRD);
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Users can create a habit",
                "Streak counter",
                "Weekly digest email"
            ]
        );
        assert_eq!(tasks[2].section, "Stretch Features");
    }

    #[rstest]
    #[case("## Learn C#", "Learn C#")]
    #[case("## Closed heading ##", "Closed heading")]
    #[case("### Issue #42", "Issue #42")]
    #[case("# Title   ", "Title")]
    fn test_heading_titles_keep_inner_hashes(#[case] line: &str, #[case] title: &str) {
        let doc = parse_sections(line);
        assert_eq!(doc.sections[0].title, title);
    }

    #[test]
    fn test_document_without_headings() {
        let doc = parse_sections("just text");
        assert!(doc.title.is_none());
        assert!(doc.sections.is_empty());
        assert!(extract_task_candidates("- item").is_empty());
    }
}
