//! Scripted call simulation.
//!
//! Pure state: a [`CallSimulation`] walks a [`CallScript`] stage by stage,
//! renders each stage's prompts for the current lead and carries the
//! [`QualificationChecklist`] filled in along the way.

pub mod qualification;
pub mod script;

use std::collections::HashMap;

pub use qualification::{QualificationChecklist, QualificationItem};
pub use script::{CallScript, ScriptStage, StageKind, render};

#[derive(Clone, Debug)]
pub struct CallSimulation {
    script: CallScript,
    vars: HashMap<String, String>,
    position: usize,
    pub checklist: QualificationChecklist,
}

impl CallSimulation {
    pub fn new(script: CallScript, vars: HashMap<String, String>) -> Self {
        Self { script, vars, position: 0, checklist: QualificationChecklist::new() }
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// `None` once every stage has been walked, or for an empty script.
    #[must_use]
    pub fn current_stage(&self) -> Option<&ScriptStage> {
        self.script.stages.get(self.position)
    }

    /// Zero-based stage index; equals the stage count when complete.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.script.stages.len()
    }

    /// Move to the next stage. Returns `false` when already complete.
    pub fn advance(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }
        self.position += 1;
        true
    }

    /// Move to the previous stage. Returns `false` at the first stage.
    pub fn back(&mut self) -> bool {
        if self.position == 0 {
            return false;
        }
        self.position -= 1;
        true
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.position >= self.script.stages.len()
    }

    /// Prompts of the current stage with placeholders filled in.
    #[must_use]
    pub fn rendered_prompts(&self) -> Vec<String> {
        self.current_stage()
            .map(|stage| stage.prompts.iter().map(|p| render(p, &self.vars)).collect())
            .unwrap_or_default()
    }

    /// Every stage rendered in order, for printing a whole script.
    #[must_use]
    pub fn render_all(&self) -> Vec<(StageKind, Vec<String>)> {
        self.script
            .stages
            .iter()
            .map(|stage| (stage.kind, stage.prompts.iter().map(|p| render(p, &self.vars)).collect()))
            .collect()
    }
}

#[cfg(test)]
#[path = "simulation_test.rs"]
mod tests;
