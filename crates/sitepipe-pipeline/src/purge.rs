//! Unused-selector detection.
//!
//! Content files are scanned for tokens with a permissive extractor. Any
//! class or id defined by the stylesheet that never appears as a token is
//! unused. A selector naming an unused symbol is removed from its list, and
//! a rule whose list empties is removed with it.

use std::{
    collections::HashSet,
    fs,
    path::Path,
    sync::LazyLock,
};

use lightningcss::{
    rules::{CssRule, CssRuleList},
    stylesheet::{PrinterOptions, StyleSheet},
    traits::ToCss,
};
use regex::Regex;
use tracing::debug;

use crate::{
    error::{PipelineError, Result},
    sources::SourceSet,
};

/// Whole tokens, e.g. `class="btn btn-primary"` yields `btn` and `btn-primary`.
static BROAD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^<>"'`\s]*[^<>"'`\s:]"#).expect("valid regex"));

/// Tokens split at dots and parentheses, e.g. `classList.add(open)` yields
/// `classList`, `add` and `open`.
static INNER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^<>"'`\s.()]*[^<>"'`\s.():]"#).expect("valid regex"));

/// Class and id names in a serialized selector.
static SELECTOR_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.#]((?:\\.|[A-Za-z0-9_-])+)").expect("valid regex"));

/// Attribute selectors, whose values may contain dots.
static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("valid regex"));

/// Tokens that may name a class or id somewhere in the site's content.
#[derive(Debug, Clone, Default)]
pub struct ContentTokens {
    tokens: HashSet<String>,
}

impl ContentTokens {
    /// Extract tokens from every file in `content`.
    pub fn scan(content: &SourceSet) -> Result<Self> {
        let mut tokens = Self::default();
        for file in content.iter() {
            let text = fs::read(&file.path)?;
            tokens.extend_from(&String::from_utf8_lossy(&text));
        }
        debug!(files = content.len(), tokens = tokens.len(), "scanned purge content");
        Ok(tokens)
    }

    /// Add the tokens found in `text`.
    pub fn extend_from(&mut self, text: &str) {
        for re in [&*BROAD_TOKEN, &*INNER_TOKEN] {
            self.tokens
                .extend(re.find_iter(text).map(|m| m.as_str().to_string()));
        }
    }

    /// Add names that must always be kept.
    pub fn extend_safelist<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        self.tokens.extend(names.into_iter().cloned());
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Classes and ids referenced by `sheet` that no content token matches.
pub fn unused_symbols(sheet: &StyleSheet, tokens: &ContentTokens, path: &Path) -> Result<HashSet<String>> {
    let mut defined = HashSet::new();
    collect_symbols(&sheet.rules, &mut defined)
        .map_err(|message| PipelineError::transform(path, message))?;

    let unused: HashSet<_> = defined
        .into_iter()
        .filter(|name| !tokens.contains(name))
        .collect();
    debug!(unused = unused.len(), "computed unused selectors");
    Ok(unused)
}

/// Remove every selector that names a symbol in `unused`.
///
/// Style rules left without selectors are removed, as are grouping rules
/// left without children. Returns the number of selectors removed.
pub fn prune_selectors(sheet: &mut StyleSheet, unused: &HashSet<String>, path: &Path) -> Result<usize> {
    if unused.is_empty() {
        return Ok(0);
    }
    prune_rules(&mut sheet.rules, unused).map_err(|message| PipelineError::transform(path, message))
}

fn prune_rules(rules: &mut CssRuleList, unused: &HashSet<String>) -> std::result::Result<usize, String> {
    let mut removed = 0;
    let mut keep = Vec::with_capacity(rules.0.len());
    for rule in &mut rules.0 {
        let live = match rule {
            CssRule::Style(style) => {
                let mut live = Vec::with_capacity(style.selectors.0.len());
                for selector in &style.selectors.0 {
                    let text = selector
                        .to_css_string(PrinterOptions::default())
                        .map_err(|e| e.to_string())?;
                    live.push(!selector_symbols(&text).iter().any(|name| unused.contains(name)));
                }
                removed += live.iter().filter(|l| !**l).count();
                let mut live = live.into_iter();
                style.selectors.0.retain(|_| live.next().unwrap_or(true));
                removed += prune_rules(&mut style.rules, unused)?;
                !style.selectors.0.is_empty()
            }
            CssRule::Media(media) => {
                removed += prune_rules(&mut media.rules, unused)?;
                !media.rules.0.is_empty()
            }
            CssRule::Supports(supports) => {
                removed += prune_rules(&mut supports.rules, unused)?;
                !supports.rules.0.is_empty()
            }
            CssRule::LayerBlock(layer) => {
                removed += prune_rules(&mut layer.rules, unused)?;
                !layer.rules.0.is_empty()
            }
            _ => true,
        };
        keep.push(live);
    }

    let mut keep = keep.into_iter();
    rules.0.retain(|_| keep.next().unwrap_or(true));
    Ok(removed)
}

fn collect_symbols(rules: &CssRuleList, out: &mut HashSet<String>) -> std::result::Result<(), String> {
    for rule in &rules.0 {
        match rule {
            CssRule::Style(style) => {
                for selector in &style.selectors.0 {
                    let text = selector
                        .to_css_string(PrinterOptions::default())
                        .map_err(|e| e.to_string())?;
                    out.extend(selector_symbols(&text));
                }
                collect_symbols(&style.rules, out)?;
            }
            CssRule::Media(media) => collect_symbols(&media.rules, out)?,
            CssRule::Supports(supports) => collect_symbols(&supports.rules, out)?,
            CssRule::LayerBlock(layer) => collect_symbols(&layer.rules, out)?,
            _ => {}
        }
    }
    Ok(())
}

/// Unescaped class and id names in one serialized selector.
fn selector_symbols(selector: &str) -> Vec<String> {
    let stripped = ATTRIBUTE.replace_all(selector, "");
    SELECTOR_SYMBOL
        .captures_iter(&stripped)
        .map(|c| unescape(&c[1]))
        .collect()
}

fn unescape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
