// src/analyze/patterns.rs
//! Risk-signal matcher: a fixed, ordered catalogue of scam patterns compiled
//! once from `config/risk_patterns.toml`.
//!
//! Signals are explanatory only. They never change the model's label.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Catalogue bundled into the binary.
pub const DEFAULT_RISK_PATTERNS: &str = include_str!("../../config/risk_patterns.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One matched risk pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskSignal {
    pub pattern_id: String,
    pub matched_text: String,
    pub severity: Severity,
    pub description: String,
}

/// A legitimate-context cue found in the message (explanations only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegitimateCue {
    pub id: String,
    pub description: String,
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
struct PatternsRoot {
    #[serde(default)]
    suppression: Option<SuppressionCfg>,
    #[serde(default)]
    risk: Vec<RiskCfg>,
    #[serde(default)]
    legitimate: Vec<LegitimateCfg>,
}

#[derive(Debug, Clone, Deserialize)]
struct SuppressionCfg {
    pattern: String,
    /// Risk ids the legitimate context silences.
    applies_to: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum MatcherCfg {
    Regex { pattern: String },
    AnyPhrase { phrases: Vec<String> },
}

#[derive(Debug, Clone, Deserialize)]
struct RiskCfg {
    id: String,
    severity: Severity,
    description: String,
    #[serde(default)]
    unless: Option<String>,
    #[serde(flatten)]
    matcher: MatcherCfg,
}

#[derive(Debug, Clone, Deserialize)]
struct LegitimateCfg {
    id: String,
    description: String,
    #[serde(flatten)]
    matcher: MatcherCfg,
}

/* ----------------------------
Compiled structures
---------------------------- */

#[derive(Debug)]
enum Matcher {
    Regex(Regex),
    AnyPhrase(Vec<String>),
}

impl Matcher {
    fn compile(id: &str, cfg: MatcherCfg) -> anyhow::Result<Self> {
        Ok(match cfg {
            MatcherCfg::Regex { pattern } => Matcher::Regex(
                Regex::new(&pattern)
                    .map_err(|e| anyhow::anyhow!("pattern `{}` regex error: {}", id, e))?,
            ),
            MatcherCfg::AnyPhrase { phrases } => {
                if phrases.is_empty() {
                    anyhow::bail!("pattern `{id}` has an empty phrase list");
                }
                Matcher::AnyPhrase(phrases.into_iter().map(|p| p.to_lowercase()).collect())
            }
        })
    }

    /// First match in `text`, if any. Phrases are tried in table order.
    fn first_match<'t>(&self, text: &'t str) -> Option<&'t str> {
        match self {
            Matcher::Regex(re) => re.find(text).map(|m| m.as_str()),
            Matcher::AnyPhrase(phrases) => phrases
                .iter()
                .find_map(|p| text.find(p.as_str()).map(|at| &text[at..at + p.len()])),
        }
    }
}

#[derive(Debug)]
struct CompiledRisk {
    id: String,
    severity: Severity,
    description: String,
    matcher: Matcher,
    unless: Option<Regex>,
    /// Silenced by the catalogue-wide legitimate-context pattern.
    suppressible: bool,
}

#[derive(Debug)]
struct CompiledCue {
    id: String,
    description: String,
    matcher: Matcher,
}

/// Compiled pattern catalogue. Build once, share behind an `Arc`.
#[derive(Debug)]
pub struct RiskPatternMatcher {
    suppression: Option<Regex>,
    risks: Vec<CompiledRisk>,
    cues: Vec<CompiledCue>,
}

impl RiskPatternMatcher {
    /// Compile the bundled catalogue.
    pub fn bundled() -> anyhow::Result<Self> {
        Self::from_toml_str(DEFAULT_RISK_PATTERNS)
    }

    /// Load from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: PatternsRoot = toml::from_str(toml_str)?;

        let (suppression, suppressible_ids) = match cfg.suppression {
            Some(s) => {
                let re = Regex::new(&s.pattern)
                    .map_err(|e| anyhow::anyhow!("suppression regex error: {}", e))?;
                for id in &s.applies_to {
                    if !cfg.risk.iter().any(|r| &r.id == id) {
                        anyhow::bail!("suppression names unknown risk pattern `{id}`");
                    }
                }
                (Some(re), s.applies_to)
            }
            None => (None, Vec::new()),
        };

        let mut seen = std::collections::HashSet::new();
        let risks = cfg
            .risk
            .into_iter()
            .map(|r| {
                if !seen.insert(r.id.clone()) {
                    anyhow::bail!("duplicate risk pattern id `{}`", r.id);
                }
                let unless = r
                    .unless
                    .as_deref()
                    .map(|p| {
                        Regex::new(p).map_err(|e| {
                            anyhow::anyhow!("pattern `{}` unless regex error: {}", r.id, e)
                        })
                    })
                    .transpose()?;
                let matcher = Matcher::compile(&r.id, r.matcher)?;
                let suppressible = suppressible_ids.contains(&r.id);
                Ok(CompiledRisk {
                    id: r.id,
                    severity: r.severity,
                    description: r.description,
                    matcher,
                    unless,
                    suppressible,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let cues = cfg
            .legitimate
            .into_iter()
            .map(|c| {
                let matcher = Matcher::compile(&c.id, c.matcher)?;
                Ok(CompiledCue {
                    id: c.id,
                    description: c.description,
                    matcher,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            suppression,
            risks,
            cues,
        })
    }

    /// Scan raw text for risk signals.
    ///
    /// Each pattern reports at most once, with its first match. Output follows
    /// catalogue order, not position in the text.
    pub fn scan(&self, raw_text: &str) -> Vec<RiskSignal> {
        let text = prepare(raw_text);
        if text.is_empty() {
            return Vec::new();
        }
        let legitimate_context = self.suppression.as_ref().is_some_and(|re| re.is_match(&text));

        self.risks
            .iter()
            .filter(|r| !(r.suppressible && legitimate_context))
            .filter(|r| !r.unless.as_ref().is_some_and(|re| re.is_match(&text)))
            .filter_map(|r| {
                r.matcher.first_match(&text).map(|m| RiskSignal {
                    pattern_id: r.id.clone(),
                    matched_text: m.to_string(),
                    severity: r.severity,
                    description: r.description.clone(),
                })
            })
            .collect()
    }

    /// Legitimate-context cues present in the text, in catalogue order.
    pub fn legitimate_cues(&self, raw_text: &str) -> Vec<LegitimateCue> {
        let text = prepare(raw_text);
        self.cues
            .iter()
            .filter(|c| c.matcher.first_match(&text).is_some())
            .map(|c| LegitimateCue {
                id: c.id.clone(),
                description: c.description.clone(),
            })
            .collect()
    }

    pub fn pattern_ids(&self) -> impl Iterator<Item = &str> {
        self.risks.iter().map(|r| r.id.as_str())
    }
}

/// Lowercase and collapse whitespace so patterns see one canonical form.
fn prepare(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
