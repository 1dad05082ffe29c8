//! AI objection coach.
//!
//! DESIGN
//! ======
//! The coach is advisory. [`ObjectionCoach::respond`] never returns an
//! error: any generator failure is logged and replaced with
//! [`UNAVAILABLE_MESSAGE`] so a live call is never blocked on the model.
//! There is no retry; the rep can simply ask again.

pub mod ollama;
pub mod types;

use std::sync::Arc;

pub use ollama::OllamaGenerator;
pub use types::{CoachError, TextGenerator};

/// Shown instead of a suggestion when the model cannot be reached.
pub const UNAVAILABLE_MESSAGE: &str =
    "AI coaching is currently unavailable. Acknowledge the concern, ask a clarifying question, and continue the call.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoachReply {
    /// Model-generated suggestion.
    Suggestion(String),
    /// The generator failed; carries [`UNAVAILABLE_MESSAGE`].
    Unavailable(String),
}

impl CoachReply {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Suggestion(text) | Self::Unavailable(text) => text,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Suggestion(_))
    }
}

/// A canned practice objection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommonObjection {
    pub category: &'static str,
    pub text: &'static str,
}

const COMMON_OBJECTIONS: &[CommonObjection] = &[
    CommonObjection { category: "price", text: "It's too expensive for us right now." },
    CommonObjection { category: "timing", text: "Now isn't a good time, call me back next quarter." },
    CommonObjection { category: "stall", text: "I need to think about it." },
    CommonObjection { category: "information", text: "Just send me some information by email." },
    CommonObjection { category: "competition", text: "We're already working with another provider." },
    CommonObjection { category: "authority", text: "I'd have to run this by my partner first." },
    CommonObjection { category: "need", text: "I'm not sure we really need this." },
    CommonObjection { category: "trust", text: "I've never heard of your company." },
];

/// Built-in objections for practice sessions.
#[must_use]
pub fn common_objections() -> &'static [CommonObjection] {
    COMMON_OBJECTIONS
}

/// Build the generation prompt for an objection.
#[must_use]
pub fn build_prompt(objection: &str, context: Option<&str>) -> String {
    let mut prompt = String::from(
        "You are an experienced sales coach. A representative is on a live call and the prospect \
         just raised an objection.\n",
    );
    prompt.push_str(&format!("Objection: \"{}\"\n", objection.trim()));
    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("Call context: {context}\n"));
    }
    prompt.push_str(
        "Reply with one short, empathetic response the representative can say next, followed by \
         one open question that keeps the conversation going. Keep it under 80 words.",
    );
    prompt
}

#[derive(Clone)]
pub struct ObjectionCoach {
    generator: Arc<dyn TextGenerator>,
}

impl ObjectionCoach {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn respond(&self, objection: &str, context: Option<&str>) -> CoachReply {
        let prompt = build_prompt(objection, context);
        match self.generator.generate(&prompt).await {
            Ok(text) => CoachReply::Suggestion(text),
            Err(e) => {
                tracing::warn!(error = %e, model = %self.generator.model(), "objection coach unavailable");
                CoachReply::Unavailable(UNAVAILABLE_MESSAGE.to_owned())
            }
        }
    }
}

#[cfg(test)]
#[path = "coach_test.rs"]
mod tests;
