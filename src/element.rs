//! Element identity and the per-kind activation behaviour.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::actions::Actuator;

/// Stable identity of a visual element, owned by the upstream hit-tester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Button,
    Toggle,
    SelectionItem,
    ExpandCollapse,
    /// Containers and decorations: tracked for feedback, never activated.
    Passive,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Toggle => "toggle",
            Self::SelectionItem => "selection-item",
            Self::ExpandCollapse => "expand-collapse",
            Self::Passive => "passive",
        }
    }

    pub fn is_invokable(&self) -> bool {
        !matches!(self, Self::Passive)
    }

    /// Perform the activation effect for this kind.
    pub fn invoke(&self, id: ElementId, actuator: &mut dyn Actuator) -> Result<()> {
        match self {
            Self::Button => actuator.click(id),
            Self::Toggle => actuator.toggle(id),
            Self::SelectionItem => actuator.select(id),
            Self::ExpandCollapse => actuator.expand_collapse(id),
            Self::Passive => {
                log::warn!("invoke requested on passive element {id}; ignoring");
                Ok(())
            }
        }
    }
}

impl FromStr for TargetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "button" => Ok(Self::Button),
            "toggle" => Ok(Self::Toggle),
            "selection-item" => Ok(Self::SelectionItem),
            "expand-collapse" => Ok(Self::ExpandCollapse),
            "passive" => Ok(Self::Passive),
            _ => Err(anyhow!("unknown target kind: {s}")),
        }
    }
}

/// What the tracker needs to know about an element. The element itself
/// stays owned by the visual tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub kind: TargetKind,
    #[serde(default)]
    pub name: Option<String>,
    /// Per-element override of the profile's max repeat count.
    #[serde(default)]
    pub max_dwell_repeat_count: Option<u32>,
}

#[cfg(test)]
impl Element {
    pub fn new(id: u64, kind: TargetKind) -> Self {
        Self {
            id: ElementId(id),
            kind,
            name: None,
            max_dwell_repeat_count: None,
        }
    }

    pub fn with_max_repeat(mut self, count: u32) -> Self {
        self.max_dwell_repeat_count = Some(count);
        self
    }
}
