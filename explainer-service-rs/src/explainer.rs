// explainer-service-rs/src/explainer.rs
//
// Single-turn explanation requests against a chat backend.
//
// Every call is independent: one request, no retry, no cache, nothing kept between
// calls. An empty completion is not an error and reads as `NO_OUTPUT`.

use serde::Serialize;
use std::sync::Arc;
use sysmon_events::Event;

use config_rs::BackendSettings;

use crate::llm_client::{ChatBackend, ChatCompletionRequest, LlmClient, LlmError};
use crate::prompt::{self, ActionKind};

/// Low temperature keeps explanations terse and stable
pub const EXPLANATION_TEMPERATURE: f32 = 0.2;

pub const NO_OUTPUT: &str = "No output";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub text: String,
}

pub struct ExplanationService {
    backend: Arc<dyn ChatBackend>,
    model: String,
}

impl ExplanationService {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Service over an `LlmClient`; fails fast when the credential is missing
    pub fn from_settings(settings: &BackendSettings) -> Result<Self, LlmError> {
        let client = LlmClient::new(settings)?;
        Ok(Self::new(Arc::new(client), settings.model.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The exact request `explain` sends for this pair
    pub fn request_for(&self, event: &Event, action: &ActionKind) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: prompt::build(event, action).into_messages(),
            temperature: Some(EXPLANATION_TEMPERATURE),
        }
    }

    pub async fn explain(
        &self,
        event: &Event,
        action: &ActionKind,
    ) -> Result<Explanation, LlmError> {
        if !action.is_recognized() {
            log::warn!("Unrecognized action {:?}, using generic instruction", action.as_str());
        }
        log::info!("Requesting {} explanation for event {}", action, event.id);

        let response = self.backend.complete(self.request_for(event, action)).await?;

        let text = response
            .first_content()
            .filter(|text| !text.is_empty())
            .unwrap_or(NO_OUTPUT)
            .to_string();

        Ok(Explanation { text })
    }
}
