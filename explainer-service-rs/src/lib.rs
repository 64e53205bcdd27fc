//! Event explanations backed by a chat completion service
//!
//! - `prompt`: action kinds, the fixed system prompt and the instruction table
//! - `explainer`: the single-shot explanation service
//! - `llm_client`: the `ChatBackend` seam and its reqwest implementation

pub mod explainer;
pub mod llm_client;
pub mod prompt;


pub use explainer::{Explanation, ExplanationService, EXPLANATION_TEMPERATURE, NO_OUTPUT};
pub use llm_client::{
    ChatBackend, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, LlmClient, LlmError,
};
pub use prompt::{build, ActionKind, PromptPair, SYSTEM_PROMPT};
