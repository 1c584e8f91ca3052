//! Rule tables for the security scanner and dependency audit.
//!
//! Rules are plain data ([`RuleConfig`]) compiled once into an immutable
//! [`RuleSet`] which is then passed by reference into every checker. The
//! built-in defaults can be replaced wholesale with a YAML rule file.

use std::path::Path;

use regex::{Match, Regex};
use serde::{Deserialize, Serialize};

use crate::errors::{PlugcheckError, Result};

/// A single danger pattern as written in a rule file.
///
/// Either a bare regex, or a regex with an `unless` guard that is tested
/// against the remainder of the line after the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternConfig {
    /// Plain regex.
    Plain(String),
    /// Regex whose matches are ignored when `unless` matches the rest of the line.
    Guarded {
        /// Regex to search for.
        pattern: String,
        /// Regex applied to the text following the match on the same line.
        unless: String,
    },
}

/// A named danger category and its patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryConfig {
    /// Category name (e.g., `command_execution`).
    pub name: String,
    /// Patterns belonging to this category, in evaluation order.
    pub patterns: Vec<PatternConfig>,
}

/// Serializable rule configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Danger categories, in reporting order.
    pub categories: Vec<CategoryConfig>,
    /// Patterns marking a safe context (e.g., logging calls).
    pub safe_patterns: Vec<String>,
    /// File extensions treated as implementation modules.
    pub extensions: Vec<String>,
    /// Package names that must not appear in the dependency manifest.
    pub dangerous_packages: Vec<String>,
    /// Package name prefixes the host already provides.
    pub core_dependency_prefixes: Vec<String>,
    /// Hook vocabulary understood by the host.
    pub known_hooks: Vec<String>,
}

fn plain(p: &str) -> PatternConfig {
    PatternConfig::Plain(p.to_string())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            categories: vec![
                CategoryConfig {
                    name: "arbitrary_code_execution".to_string(),
                    patterns: vec![
                        plain(r"eval\s*\("),
                        plain(r"new\s+Function\s*\("),
                        plain(r#"setTimeout\s*\(\s*['"](.*?)['"]"#),
                        plain(r#"setInterval\s*\(\s*['"](.*?)['"]"#),
                    ],
                },
                CategoryConfig {
                    name: "command_execution".to_string(),
                    patterns: vec![
                        plain(r"exec\s*\("),
                        plain(r"execSync\s*\("),
                        plain(r"spawn\s*\("),
                        plain(r"spawnSync\s*\("),
                        plain(r"child_process"),
                        plain(r"execFile\s*\("),
                    ],
                },
                CategoryConfig {
                    name: "file_system_access".to_string(),
                    patterns: vec![
                        plain(r"fs\.(write|append|create|unlink|rm|mkdir|rmdir|chmod|chown)"),
                        PatternConfig::Guarded {
                            pattern: r"fs\.(read|readFile)".to_string(),
                            unless: r#"['"]package\.json['"]"#.to_string(),
                        },
                        plain(r"path\.resolve\s*\([^)]*\.\.[^)]*\)"),
                    ],
                },
                CategoryConfig {
                    name: "network_access".to_string(),
                    patterns: vec![
                        plain(r"http\.(request|get)\s*\("),
                        plain(r"https\.(request|get)\s*\("),
                        plain(r"net\.(connect|createConnection|createServer)"),
                        plain(r"axios\.(get|post|put|delete|patch)"),
                    ],
                },
            ],
            safe_patterns: strings(&[
                r"logger\.(info|debug|warn|error)",
                r"console\.(log|info|warn|error)",
            ]),
            extensions: strings(&["js", "ts", "jsx", "tsx"]),
            dangerous_packages: strings(&["shelljs", "vm2", "node-gyp"]),
            core_dependency_prefixes: strings(&[
                "@ceramicnetwork",
                "ceramic-http-client",
                "@composedb",
                "@glaze",
                "@didtools",
                "dids",
            ]),
            known_hooks: strings(&[
                "connect",
                "query",
                "generate",
                "process",
                "auth",
                "storage",
                "notification",
                "trigger",
                "schedule",
                "transform",
            ]),
        }
    }
}

/// A compiled danger pattern.
#[derive(Debug)]
pub struct DangerPattern {
    regex: Regex,
    unless: Option<Regex>,
}

impl DangerPattern {
    /// Iterate over matches in `content`, skipping those whose guard fires.
    pub fn matches<'a>(&'a self, content: &'a str) -> impl Iterator<Item = Match<'a>> + 'a {
        self.regex.find_iter(content).filter(move |m| match &self.unless {
            Some(guard) => !guard.is_match(rest_of_line(content, m.end())),
            None => true,
        })
    }

    /// Source text of the pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// A compiled danger category.
#[derive(Debug)]
pub struct DangerCategory {
    /// Category name.
    pub name: String,
    /// Compiled patterns.
    pub patterns: Vec<DangerPattern>,
}

/// Immutable, compiled rule set shared by all checkers.
#[derive(Debug)]
pub struct RuleSet {
    config: RuleConfig,
    categories: Vec<DangerCategory>,
    safe_patterns: Vec<Regex>,
}

impl RuleSet {
    /// Compile a rule configuration.
    ///
    /// Fails with [`PlugcheckError::Rules`] when any regex is invalid or a
    /// category has no patterns.
    pub fn compile(config: RuleConfig) -> Result<Self> {
        let mut categories = Vec::with_capacity(config.categories.len());
        for cat in &config.categories {
            if cat.patterns.is_empty() {
                return Err(PlugcheckError::Rules {
                    message: format!("category '{}' has no patterns", cat.name),
                });
            }
            let mut patterns = Vec::with_capacity(cat.patterns.len());
            for p in &cat.patterns {
                let (pattern, unless) = match p {
                    PatternConfig::Plain(s) => (s.as_str(), None),
                    PatternConfig::Guarded { pattern, unless } => {
                        (pattern.as_str(), Some(compile_regex(unless)?))
                    }
                };
                patterns.push(DangerPattern {
                    regex: compile_regex(pattern)?,
                    unless,
                });
            }
            categories.push(DangerCategory {
                name: cat.name.clone(),
                patterns,
            });
        }
        let safe_patterns = config
            .safe_patterns
            .iter()
            .map(|s| compile_regex(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            config,
            categories,
            safe_patterns,
        })
    }

    /// Load and compile a YAML rule file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RuleConfig = serde_yaml_ng::from_str(&content)?;
        Self::compile(config)
    }

    /// Source configuration this set was compiled from.
    #[must_use]
    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Compiled danger categories, in reporting order.
    #[must_use]
    pub fn categories(&self) -> &[DangerCategory] {
        &self.categories
    }

    /// Returns `true` if a file extension belongs to an implementation module.
    #[must_use]
    pub fn is_scanned_extension(&self, ext: &str) -> bool {
        self.config.extensions.iter().any(|e| e == ext)
    }

    /// Returns `true` if `name` is on the dangerous-package list.
    #[must_use]
    pub fn is_dangerous_package(&self, name: &str) -> bool {
        self.config.dangerous_packages.iter().any(|p| p == name)
    }

    /// Returns the core prefix `name` duplicates, if any.
    #[must_use]
    pub fn core_prefix_of(&self, name: &str) -> Option<&str> {
        self.config
            .core_dependency_prefixes
            .iter()
            .find(|prefix| name.starts_with(prefix.as_str()))
            .map(String::as_str)
    }

    /// Returns `true` if `hook` is in the host's hook vocabulary.
    #[must_use]
    pub fn is_known_hook(&self, hook: &str) -> bool {
        self.config.known_hooks.iter().any(|h| h == hook)
    }

    /// Returns `true` if a danger match sits inside a safe context.
    ///
    /// A match is safe only when it lies inside the argument list of a safe
    /// call on the same source line: the safe pattern ends before the match,
    /// is followed by `(`, and that parenthesis is still open at the match.
    /// Parentheses inside string literals are ignored. Calls spanning
    /// several lines are not recognised, so their contents are reported.
    #[must_use]
    pub fn is_suppressed(&self, content: &str, m: &Match<'_>) -> bool {
        let line_start = content[..m.start()].rfind('\n').map_or(0, |i| i + 1);
        let line = &content[line_start..m.start()];
        self.safe_patterns.iter().any(|re| {
            re.find_iter(line)
                .any(|s| inside_call_arguments(&line[s.end()..]))
        })
    }

    /// Render the effective configuration as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(&self.config)?)
    }
}

/// Returns `true` if the end of `between` is still inside the argument list
/// that `between` opens with (after optional whitespace).
fn inside_call_arguments(between: &str) -> bool {
    let mut chars = between.chars().skip_while(|c| c.is_whitespace());
    if chars.next() != Some('(') {
        return false;
    }
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in chars {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::compile(RuleConfig::default()).expect("built-in rules must compile")
    }
}

fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PlugcheckError::Rules {
        message: format!("invalid pattern '{pattern}': {e}"),
    })
}

fn rest_of_line(content: &str, from: usize) -> &str {
    let tail = &content[from..];
    tail.find('\n').map_or(tail, |i| &tail[..i])
}
