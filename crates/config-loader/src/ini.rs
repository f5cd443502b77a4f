//! Minimal INI reader compatible with the files Python's `configparser`
//! produces and consumes with its default settings.

use crate::ConfigError;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Section whose options act as fallbacks for every other section.
pub const DEFAULT_SECTION: &str = "DEFAULT";

const MAX_INTERPOLATION_DEPTH: usize = 10;

/// A named group of options. Option names are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    fn value_mut(&mut self, key: &str) -> Option<&mut String> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Nothing,
    Defaults,
    Section(usize),
}

/// Parsed INI document, sections kept in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    defaults: Section,
    sections: Vec<Section>,
}

impl IniDocument {
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigFileNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let document = Self::parse(&content)?;
        debug!(
            sections = document.sections.len(),
            "Loaded config from {:?}", path
        );
        Ok(document)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut document = IniDocument {
            defaults: Section::new(DEFAULT_SECTION),
            sections: Vec::new(),
        };
        let mut target = Target::Nothing;
        let mut last_key: Option<String> = None;

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                last_key = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            // Indented line directly under an option extends its value
            if raw.starts_with(char::is_whitespace) {
                if let Some(key) = &last_key {
                    if let Some(value) = document
                        .section_mut(target)
                        .and_then(|section| section.value_mut(key))
                    {
                        if !value.is_empty() {
                            value.push('\n');
                        }
                        value.push_str(trimmed);
                        continue;
                    }
                }
            }

            // `[name]` up to the last `]`; anything after it is ignored
            if trimmed.starts_with('[') {
                let name = match trimmed.rfind(']') {
                    Some(end) if end > 1 => &trimmed[1..end],
                    _ => {
                        return Err(ConfigError::Syntax {
                            line: line_no,
                            message: format!("malformed section header '{}'", trimmed),
                        })
                    }
                };

                target = document.open_section(name, line_no)?;
                last_key = None;
                continue;
            }

            let (key, value) = split_option(trimmed).ok_or_else(|| ConfigError::Syntax {
                line: line_no,
                message: format!("expected 'key = value', found '{}'", trimmed),
            })?;

            let section = document
                .section_mut(target)
                .ok_or_else(|| ConfigError::Syntax {
                    line: line_no,
                    message: format!("option '{}' appears before any section header", key),
                })?;

            if section.contains(&key) {
                return Err(ConfigError::DuplicateKey {
                    section: section.name.clone(),
                    key,
                    line: line_no,
                });
            }

            section.entries.push((key.clone(), value));
            last_key = Some(key);
        }

        Ok(document)
    }

    fn open_section(&mut self, name: &str, line: usize) -> Result<Target, ConfigError> {
        if name == DEFAULT_SECTION {
            return Ok(Target::Defaults);
        }
        if self.sections.iter().any(|s| s.name == name) {
            return Err(ConfigError::DuplicateSection {
                section: name.to_string(),
                line,
            });
        }
        self.sections.push(Section::new(name));
        Ok(Target::Section(self.sections.len() - 1))
    }

    fn section_mut(&mut self, target: Target) -> Option<&mut Section> {
        match target {
            Target::Nothing => None,
            Target::Defaults => Some(&mut self.defaults),
            Target::Section(idx) => self.sections.get_mut(idx),
        }
    }

    /// Named sections in file order. `[DEFAULT]` is not listed.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// Uninterpolated value, falling back to `[DEFAULT]`.
    pub fn get_raw(&self, section: &str, key: &str) -> Option<&str> {
        if section == DEFAULT_SECTION {
            return self.defaults.get(key);
        }
        self.section(section)?
            .get(key)
            .or_else(|| self.defaults.get(key))
    }

    /// Value with `%%` and `%(name)s` references resolved, the way
    /// configparser's basic interpolation does.
    pub fn get(&self, section: &str, key: &str) -> Result<Option<String>, ConfigError> {
        match self.get_raw(section, key) {
            Some(raw) => self.interpolate(section, key, raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn require(&self, section: &str, key: &str) -> Result<String, ConfigError> {
        if section != DEFAULT_SECTION && !self.has_section(section) {
            return Err(ConfigError::MissingSection {
                section: section.to_string(),
            });
        }
        self.get(section, key)?.ok_or_else(|| ConfigError::MissingKey {
            section: section.to_string(),
            key: key.to_string(),
        })
    }

    pub fn require_parsed<T>(&self, section: &str, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.require(section, key)?;
        value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.clone(),
            message: e.to_string(),
        })
    }

    fn interpolate(&self, section: &str, key: &str, raw: &str) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(raw.len());
        self.interpolate_into(section, key, raw, 1, &mut out)?;
        Ok(out)
    }

    fn interpolate_into(
        &self,
        section: &str,
        key: &str,
        mut rest: &str,
        depth: usize,
        out: &mut String,
    ) -> Result<(), ConfigError> {
        let fail = |message: String| ConfigError::Interpolation {
            section: section.to_string(),
            key: key.to_string(),
            message,
        };

        if depth > MAX_INTERPOLATION_DEPTH {
            return Err(fail(format!(
                "more than {} nested references",
                MAX_INTERPOLATION_DEPTH
            )));
        }

        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];
            let after = &rest[1..];

            if let Some(tail) = after.strip_prefix('%') {
                out.push('%');
                rest = tail;
            } else if let Some(tail) = after.strip_prefix('(') {
                let close = tail
                    .find(')')
                    .filter(|&end| end > 0 && tail[end + 1..].starts_with('s'))
                    .ok_or_else(|| fail(format!("bad variable reference '{}'", rest)))?;
                let name = tail[..close].to_ascii_lowercase();
                let value = self
                    .get_raw(section, &name)
                    .ok_or_else(|| fail(format!("no option '{}' to substitute", name)))?;
                rest = &tail[close + 2..];

                if value.contains('%') {
                    self.interpolate_into(section, key, value, depth + 1, out)?;
                } else {
                    out.push_str(value);
                }
            } else {
                return Err(fail(format!(
                    "'%' must be followed by '%' or '(', found '{}'",
                    rest
                )));
            }
        }

        out.push_str(rest);
        Ok(())
    }
}

/// Splits on the first `=` or `:`; the option name is lowercased.
fn split_option(line: &str) -> Option<(String, String)> {
    let pos = line.find(['=', ':'])?;
    let key = line[..pos].trim();
    if key.is_empty() {
        return None;
    }
    let value = line[pos + 1..].trim();
    Some((key.to_ascii_lowercase(), value.to_string()))
}
