//! Replay scenarios: views to open and page events to raise, per update cycle.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use ulbind_core::NativeEvent;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Update cycles to run; raised to cover the last scripted event.
    #[serde(default = "default_cycles")]
    pub cycles: u32,
    #[serde(default)]
    pub views: Vec<ViewSpec>,
    #[serde(default)]
    pub events: Vec<ScriptedEvent>,
}

fn default_cycles() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct ViewSpec {
    pub name: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub transparent: bool,
    pub html: Option<String>,
    pub url: Option<String>,
    /// Answer every child-view request with `None`.
    #[serde(default = "deny_by_default")]
    pub deny_children: bool,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn deny_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ScriptedEvent {
    pub view: String,
    /// Zero-based update cycle the event is raised in.
    #[serde(default)]
    pub cycle: u32,
    #[serde(flatten)]
    pub event: NativeEvent,
}

impl Scenario {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(source)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read scenario {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        for (i, view) in self.views.iter().enumerate() {
            if self.views[..i].iter().any(|v| v.name == view.name) {
                bail!("view `{}` is declared twice", view.name);
            }
            if view.html.is_some() && view.url.is_some() {
                bail!("view `{}` sets both html and url", view.name);
            }
        }
        for event in &self.events {
            if !self.views.iter().any(|v| v.name == event.view) {
                bail!("event targets unknown view `{}`", event.view);
            }
        }
        Ok(())
    }

    /// Cycles needed to raise every scripted event.
    pub fn total_cycles(&self) -> u32 {
        let last = self.events.iter().map(|e| e.cycle + 1).max().unwrap_or(0);
        self.cycles.max(last)
    }

    pub fn events_in(&self, cycle: u32) -> impl Iterator<Item = &ScriptedEvent> {
        self.events.iter().filter(move |e| e.cycle == cycle)
    }
}
