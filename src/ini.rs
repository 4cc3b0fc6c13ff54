//! Small INI codec shared by the credential file and group record files.
//!
//! Section names are case-sensitive, keys are matched case-insensitively and
//! keep the spelling they were first written with. Entry order is preserved so
//! a record written back to disk diffs cleanly against the one that was read.
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IniError {
    #[error("line {line}: key/value pair outside of any section")]
    OrphanEntry { line: usize },
    #[error("line {line}: expected `key = value`")]
    MissingDelimiter { line: usize },
    #[error("line {line}: empty key")]
    EmptyKey { line: usize },
    #[error("line {line}: malformed section header")]
    BadHeader { line: usize },
    #[error("line {line}: duplicate section [{name}]")]
    DuplicateSection { line: usize, name: String },
    #[error("line {line}: duplicate key {key} in [{section}]")]
    DuplicateKey {
        line: usize,
        section: String,
        key: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

/// Parsed document: ordered sections of ordered `key = value` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ini {
    sections: Vec<Section>,
}

impl Ini {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(src: &str) -> Result<Self, IniError> {
        let mut doc = Ini::new();
        let mut current: Option<usize> = None;

        for (idx, raw) in src.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix('[') {
                let Some(name) = rest.strip_suffix(']') else {
                    return Err(IniError::BadHeader { line });
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(IniError::BadHeader { line });
                }
                if doc.section(name).is_some() {
                    return Err(IniError::DuplicateSection {
                        line,
                        name: name.to_string(),
                    });
                }
                doc.sections.push(Section {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                current = Some(doc.sections.len() - 1);
                continue;
            }

            let Some(sidx) = current else {
                return Err(IniError::OrphanEntry { line });
            };
            let Some(split) = trimmed.find(['=', ':']) else {
                return Err(IniError::MissingDelimiter { line });
            };
            let key = trimmed[..split].trim();
            if key.is_empty() {
                return Err(IniError::EmptyKey { line });
            }
            let value = unquote(trimmed[split + 1..].trim());

            let section = &mut doc.sections[sidx];
            if section.position(key).is_some() {
                return Err(IniError::DuplicateKey {
                    line,
                    section: section.name.clone(),
                    key: key.to_string(),
                });
            }
            section.entries.push((key.to_string(), value.to_string()));
        }

        Ok(doc)
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let section = self.section(section)?;
        section.position(key).map(|i| section.entries[i].1.as_str())
    }

    /// Set `key` in `section`, creating the section at the end if needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let value = value.into();
        let idx = match self.sections.iter().position(|s| s.name == section) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section {
                    name: section.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        let section = &mut self.sections[idx];
        match section.position(key) {
            Some(i) => section.entries[i].1 = value,
            None => section.entries.push((key.to_string(), value)),
        }
    }
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Wrap `value` in double quotes when writing it bare would not read back
/// unchanged: surrounding whitespace is trimmed and one quote pair stripped.
fn quote_if_needed(value: &str) -> std::borrow::Cow<'_, str> {
    if value.trim() != value || unquote(value) != value {
        format!("\"{}\"", value).into()
    } else {
        value.into()
    }
}

impl fmt::Display for Ini {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "[{}]", section.name)?;
            for (k, v) in &section.entries {
                writeln!(f, "{} = {}", k, quote_if_needed(v))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
