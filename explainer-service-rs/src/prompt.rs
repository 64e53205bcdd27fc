// explainer-service-rs/src/prompt.rs
//
// Prompt contract for event explanations.
//
// The system prompt is a hard constraint on the backend: short answers, no headers
// or bullets, no echo of the raw log. Building prompts never fails; an action the
// table does not know falls back to a generic instruction.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use sysmon_events::{Collection, Event};

use crate::llm_client::ChatMessage;

pub const SYSTEM_PROMPT: &str = "You are a SOC analyst assistant.
Always respond in 2–3 concise sentences.
Do NOT include headers, bullet points, or event metadata.
Do NOT restate the entire log.
Only give the explanation directly.";

pub const FALLBACK_INSTRUCTION: &str = "Give a short explanation.";

/// What the analyst wants explained about an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    WhyBenign,
    WhenMalicious,
    WhyMalicious,
    UserAction,
    /// Any other action string, kept verbatim
    Unrecognized(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::WhyBenign => "why_benign",
            ActionKind::WhenMalicious => "when_malicious",
            ActionKind::WhyMalicious => "why_malicious",
            ActionKind::UserAction => "user_action",
            ActionKind::Unrecognized(raw) => raw,
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            ActionKind::WhyBenign => {
                "Give a short 2–3 sentence explanation of why this Sysmon event is benign."
            }
            ActionKind::WhenMalicious => {
                "Give a short 2–3 sentence explanation of in what situation this benign Sysmon event might become malicious."
            }
            ActionKind::WhyMalicious => {
                "Give a short 2–3 sentence explanation of why this Sysmon event is malicious."
            }
            ActionKind::UserAction => {
                "Give a short 2–3 sentence recommended action for the user for this Sysmon event."
            }
            ActionKind::Unrecognized(_) => FALLBACK_INSTRUCTION,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, ActionKind::Unrecognized(_))
    }

    /// Actions offered for events of `collection`
    pub fn offered_for(collection: Collection) -> [ActionKind; 2] {
        match collection {
            Collection::Benign => [ActionKind::WhyBenign, ActionKind::WhenMalicious],
            Collection::Malicious => [ActionKind::WhyMalicious, ActionKind::UserAction],
        }
    }
}

/// No action given; explained with the generic instruction
impl Default for ActionKind {
    fn default() -> Self {
        ActionKind::Unrecognized(String::new())
    }
}

impl From<&str> for ActionKind {
    fn from(raw: &str) -> Self {
        match raw {
            "why_benign" => ActionKind::WhyBenign,
            "when_malicious" => ActionKind::WhenMalicious,
            "why_malicious" => ActionKind::WhyMalicious,
            "user_action" => ActionKind::UserAction,
            other => ActionKind::Unrecognized(other.to_string()),
        }
    }
}

impl From<String> for ActionKind {
    fn from(raw: String) -> Self {
        ActionKind::from(raw.as_str())
    }
}

impl From<ActionKind> for String {
    fn from(action: ActionKind) -> Self {
        action.as_str().to_string()
    }
}

impl FromStr for ActionKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ActionKind::from(s))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system_prompt: String,
    pub user_prompt: String,
}

impl PromptPair {
    /// System turn followed by the single user turn
    pub fn into_messages(self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt),
            ChatMessage::user(self.user_prompt),
        ]
    }
}

/// Build the prompt pair for explaining `event` under `action`
pub fn build(event: &Event, action: &ActionKind) -> PromptPair {
    PromptPair {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt: format!("{}\n\n{}", action.instruction(), event.message),
    }
}
