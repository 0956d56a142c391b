//! DSRP analyses: the move that produced them and their typed elements.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::hash::analysis_content;
use crate::types::{Embeddable, Meta, OwnerKind};

/// One of the four DSRP patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pattern {
    #[serde(rename = "D")]
    Distinctions,
    #[serde(rename = "S")]
    Systems,
    #[serde(rename = "R")]
    Relationships,
    #[serde(rename = "P")]
    Perspectives,
}

/// The thinking move an analysis applied to a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveType {
    IsIsNot,
    ZoomIn,
    ZoomOut,
    PartParty,
    RdsBarbell,
    PCircle,
}

impl MoveType {
    pub const ALL: [MoveType; 6] =
        [Self::IsIsNot, Self::ZoomIn, Self::ZoomOut, Self::PartParty, Self::RdsBarbell, Self::PCircle];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IsIsNot => "is-is-not",
            Self::ZoomIn => "zoom-in",
            Self::ZoomOut => "zoom-out",
            Self::PartParty => "part-party",
            Self::RdsBarbell => "rds-barbell",
            Self::PCircle => "p-circle",
        }
    }

    pub fn pattern(self) -> Pattern {
        match self {
            Self::IsIsNot => Pattern::Distinctions,
            Self::ZoomIn | Self::ZoomOut | Self::PartParty => Pattern::Systems,
            Self::RdsBarbell => Pattern::Relationships,
            Self::PCircle => Pattern::Perspectives,
        }
    }
}

impl fmt::Display for MoveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoveType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown move type '{s}'")))
    }
}

/// Element pair of a pattern, as extracted by an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern")]
pub enum AnalysisElements {
    #[serde(rename = "D")]
    Distinctions { identity: String, other: Vec<String> },
    #[serde(rename = "S")]
    Systems { whole: String, parts: Vec<String> },
    #[serde(rename = "R")]
    Relationships { action: String, reaction: String },
    #[serde(rename = "P")]
    Perspectives { point: String, view: String },
}

impl AnalysisElements {
    pub fn pattern(&self) -> Pattern {
        match self {
            Self::Distinctions { .. } => Pattern::Distinctions,
            Self::Systems { .. } => Pattern::Systems,
            Self::Relationships { .. } => Pattern::Relationships,
            Self::Perspectives { .. } => Pattern::Perspectives,
        }
    }

    /// Single-line rendering used in embedded text.
    pub fn render(&self) -> String {
        match self {
            Self::Distinctions { identity, other } => format!("identity: {identity}; other: {}", other.join(", ")),
            Self::Systems { whole, parts } => format!("whole: {whole}; parts: {}", parts.join(", ")),
            Self::Relationships { action, reaction } => format!("action: {action}; reaction: {reaction}"),
            Self::Perspectives { point, view } => format!("point: {point}; view: {view}"),
        }
    }
}

/// A completed analysis of one concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub analysis_id: String,
    pub concept_id: String,
    pub move_type: MoveType,
    pub reasoning: String,
    #[serde(default)]
    pub elements: Option<AnalysisElements>,
}

impl Analysis {
    /// Elements must belong to the move's pattern.
    pub fn validate(&self) -> Result<()> {
        if self.reasoning.trim().is_empty() {
            return Err(Error::InvalidRequest(format!("analysis {} has no reasoning", self.analysis_id)));
        }
        if let Some(elements) = &self.elements {
            if elements.pattern() != self.move_type.pattern() {
                return Err(Error::InvalidRequest(format!(
                    "{:?} elements do not fit move {}",
                    elements.pattern(),
                    self.move_type
                )));
            }
        }
        Ok(())
    }

    pub fn content(&self) -> String {
        analysis_content(self.move_type, &self.reasoning, self.elements.as_ref())
    }

    /// Validated index row, keyed by `analysis_id`.
    pub fn embeddable(&self) -> Result<Embeddable> {
        self.validate()?;
        let mut meta = Meta::new();
        meta.insert("concept_id".into(), self.concept_id.clone().into());
        meta.insert("move_type".into(), self.move_type.as_str().into());
        Ok(Embeddable::new(&self.analysis_id, OwnerKind::Analysis, self.content())
            .with_move_type(Some(self.move_type))
            .with_metadata(meta))
    }
}
