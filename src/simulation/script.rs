//! Call scripts and placeholder rendering.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Opening,
    Discovery,
    Pitch,
    ObjectionHandling,
    Closing,
}

impl StageKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Opening => "Opening",
            Self::Discovery => "Discovery",
            Self::Pitch => "Pitch",
            Self::ObjectionHandling => "Objection Handling",
            Self::Closing => "Closing",
        }
    }
}

/// One step of a call script. Prompts may contain `{placeholder}` markers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStage {
    pub kind: StageKind,
    pub title: String,
    pub prompts: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallScript {
    pub name: String,
    pub stages: Vec<ScriptStage>,
}

impl CallScript {
    #[must_use]
    pub fn stage(&self, kind: StageKind) -> Option<&ScriptStage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    /// The built-in five-stage outbound script.
    #[must_use]
    pub fn standard() -> Self {
        let stage = |kind: StageKind, prompts: &[&str], tips: &[&str]| ScriptStage {
            kind,
            title: kind.label().to_owned(),
            prompts: prompts.iter().map(|p| (*p).to_owned()).collect(),
            tips: tips.iter().map(|t| (*t).to_owned()).collect(),
        };
        Self {
            name: "Standard outbound".to_owned(),
            stages: vec![
                stage(
                    StageKind::Opening,
                    &[
                        "Hi {lead_name}, this is {rep_name} from {company}. Did I catch you at a good time?",
                        "I'm calling because you showed interest in {product}.",
                    ],
                    &["Smile while you talk.", "Ask for permission to continue."],
                ),
                stage(
                    StageKind::Discovery,
                    &[
                        "What made you start looking into {product}?",
                        "How are you handling this today?",
                        "Who else is involved in a decision like this?",
                    ],
                    &["Listen more than you speak."],
                ),
                stage(
                    StageKind::Pitch,
                    &["Based on what you shared, {product} helps by saving you time where it matters most."],
                    &["Tie every feature back to a need they mentioned."],
                ),
                stage(
                    StageKind::ObjectionHandling,
                    &["I understand. Can you tell me more about what's behind that concern?"],
                    &["Acknowledge, clarify, respond, confirm."],
                ),
                stage(
                    StageKind::Closing,
                    &["Would {meeting_time} work for a quick follow-up, {lead_name}?"],
                    &["Agree on a concrete next step before hanging up."],
                ),
            ],
        }
    }
}

/// Replace each `{key}` with its value. Unknown keys and unbalanced braces
/// are left as written.
#[must_use]
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after[..close];
        match vars.get(key) {
            Some(value) if !key.contains('{') => out.push_str(value),
            _ => {
                out.push('{');
                out.push_str(key);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "script_test.rs"]
mod tests;
