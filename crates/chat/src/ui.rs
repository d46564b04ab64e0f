//! UI node model and the channel the assembler pushes updates through.

use crate::streamable::TextSubscriber;
use profrag_knowledge::ScoredMatch;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Placeholder shown while the retrieval tool runs.
pub const SEARCHING_PLACEHOLDER: &str = "Searching for professor information...";

/// Shown in an evidence card when retrieval found nothing.
pub const NO_EVIDENCE_TEXT: &str = "No information found for the given query.";

/// Renderable piece of an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiNode {
    /// Transient status line
    Placeholder { text: String },

    /// One card per retrieved review
    Evidence { matches: Vec<ScoredMatch> },

    /// Assistant text (final value)
    Text { text: String },
}

impl UiNode {
    pub fn searching() -> Self {
        Self::Placeholder {
            text: SEARCHING_PLACEHOLDER.to_string(),
        }
    }

    /// Plain-text rendering for terminals.
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::Placeholder { text } | Self::Text { text } => text.clone(),
            Self::Evidence { matches } if matches.is_empty() => NO_EVIDENCE_TEXT.to_string(),
            Self::Evidence { matches } => matches
                .iter()
                .map(|m| {
                    format!(
                        "{} ({}) {}/5\n  {}",
                        m.professor, m.subject, m.star_rating, m.review_comment
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Update pushed to the UI during a turn.
#[derive(Debug)]
pub enum UiUpdate {
    /// A complete node
    Node(UiNode),

    /// The live assistant text; sent once per turn, then observed
    Text(TextSubscriber),
}

pub type UiSender = mpsc::UnboundedSender<UiUpdate>;
pub type UiReceiver = mpsc::UnboundedReceiver<UiUpdate>;

pub fn ui_channel() -> (UiSender, UiReceiver) {
    mpsc::unbounded_channel()
}

/// Send without failing the turn when the UI has gone away.
pub(crate) fn push(ui: &UiSender, update: UiUpdate) {
    if ui.send(update).is_err() {
        tracing::debug!("UI receiver dropped; update discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_serializes_tagged() {
        let json = serde_json::to_value(UiNode::searching()).unwrap();
        assert_eq!(json["type"], "placeholder");
        assert_eq!(json["text"], SEARCHING_PLACEHOLDER);
    }

    #[test]
    fn test_evidence_plain_text() {
        assert_eq!(
            UiNode::Evidence { matches: vec![] }.to_plain_text(),
            NO_EVIDENCE_TEXT
        );

        let card = UiNode::Evidence {
            matches: vec![ScoredMatch {
                score: 0.9,
                professor: "Dr. James Allen".to_string(),
                subject: "Chemistry".to_string(),
                star_rating: 3,
                review_comment: "His office hours are helpful.".to_string(),
            }],
        };
        assert_eq!(
            card.to_plain_text(),
            "Dr. James Allen (Chemistry) 3/5\n  His office hours are helpful."
        );
    }
}
