//! Tolerant parser for the flattened `.gitmodules` configuration.
//!
//! The input is what `git config --list` prints for a `.gitmodules` blob:
//! one `submodule.<name>.<key>=<value>` line per setting. Submodule names may
//! contain dots and slashes, values may contain `=`. Lines that do not fit
//! are skipped and reported as [`ConfigDiagnostic`]s instead of failing the
//! parse.

use std::fmt;

const SECTION_PREFIX: &str = "submodule.";

/// One submodule declared in `.gitmodules`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleEntry {
    /// Submodule name (the subsection of the config key).
    pub name: String,
    /// Checkout path inside the parent working tree.
    pub path: String,
    /// URL exactly as written, possibly relative.
    pub url: String,
}

/// Why a line or submodule was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The line has no `=` separator.
    MissingSeparator,
    /// The key does not start with `submodule.`.
    UnexpectedPrefix,
    /// The key has no name between the prefix and the setting.
    MissingName,
    /// The submodule never declared a `path`.
    MissingPath,
    /// The submodule never declared a `url`.
    MissingUrl,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingSeparator => "line has no '=' separator",
            Self::UnexpectedPrefix => "key is not in the submodule section",
            Self::MissingName => "key has no submodule name",
            Self::MissingPath => "submodule has no path",
            Self::MissingUrl => "submodule has no url",
        };
        f.write_str(text)
    }
}

/// A skipped line or dropped submodule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDiagnostic {
    /// The offending line, or the submodule name for dropped groups.
    pub subject: String,
    /// What was wrong with it.
    pub kind: DiagnosticKind,
}

impl fmt::Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.subject)
    }
}

/// Result of parsing: usable entries plus everything that was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    /// Complete submodule entries in first-appearance order.
    pub entries: Vec<SubmoduleEntry>,
    /// Skipped lines and dropped submodules.
    pub diagnostics: Vec<ConfigDiagnostic>,
}

#[derive(Default)]
struct Group {
    name: String,
    path: Option<String>,
    url: Option<String>,
}

/// Parses `git config --list` output of a `.gitmodules` file.
///
/// # Examples
///
/// ```
/// use git_bundler::gitmodules::parse;
///
/// let parsed = parse(concat!(
///     "submodule.libs.core.path=vendor/core\n",
///     "submodule.libs.core.url=../core.git\n",
/// ));
/// assert_eq!(parsed.entries.len(), 1);
/// assert_eq!(parsed.entries[0].name, "libs.core");
/// assert!(parsed.diagnostics.is_empty());
/// ```
#[must_use]
pub fn parse(config_text: &str) -> ParsedConfig {
    let mut groups: Vec<Group> = Vec::new();
    let mut diagnostics = Vec::new();

    for line in config_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((key, value)) = line.split_once('=') else {
            diagnostics.push(diagnostic(line, DiagnosticKind::MissingSeparator));
            continue;
        };
        let Some(rest) = key.strip_prefix(SECTION_PREFIX) else {
            diagnostics.push(diagnostic(line, DiagnosticKind::UnexpectedPrefix));
            continue;
        };
        let Some((name, setting)) = rest.rsplit_once('.') else {
            diagnostics.push(diagnostic(line, DiagnosticKind::MissingName));
            continue;
        };
        if name.is_empty() {
            diagnostics.push(diagnostic(line, DiagnosticKind::MissingName));
            continue;
        }

        let index = match groups.iter().position(|g| g.name == name) {
            Some(index) => index,
            None => {
                groups.push(Group {
                    name: name.to_owned(),
                    ..Group::default()
                });
                groups.len() - 1
            }
        };
        let Some(group) = groups.get_mut(index) else {
            continue;
        };
        match setting {
            "path" => group.path = Some(value.to_owned()),
            "url" => group.url = Some(value.to_owned()),
            _ => {}
        }
    }

    let mut entries = Vec::with_capacity(groups.len());
    for group in groups {
        match (group.path, group.url) {
            (Some(path), Some(url)) => entries.push(SubmoduleEntry {
                name: group.name,
                path,
                url,
            }),
            (None, _) => diagnostics.push(diagnostic(&group.name, DiagnosticKind::MissingPath)),
            (Some(_), None) => {
                diagnostics.push(diagnostic(&group.name, DiagnosticKind::MissingUrl));
            }
        }
    }

    ParsedConfig {
        entries,
        diagnostics,
    }
}

fn diagnostic(subject: &str, kind: DiagnosticKind) -> ConfigDiagnostic {
    ConfigDiagnostic {
        subject: subject.to_owned(),
        kind,
    }
}
