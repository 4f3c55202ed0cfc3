use bytes::Bytes;
use serde_json::Value;

use crate::error::TasksDomainError;
use crate::ids::ItemId;
use crate::state::ItemState;

/// Highest percentage an in-flight item can show before its response arrives.
pub const IN_FLIGHT_PROGRESS_MAX: u8 = 99;

/// A local input waiting to be submitted, e.g. an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPayload {
    pub name: String,
    pub media_type: Option<String>,
    pub content: Bytes,
}

impl ItemPayload {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: None,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Lowercased file extension, if the name has one.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

fn default_allowed_formats() -> Vec<String> {
    ["pdf", "docx", "doc", "txt", "md", "rtf"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_bytes() -> u64 {
    50 * 1024 * 1024
}

/// Acceptance rules applied before an item enters the queue.
///
/// `allowed_formats` entries containing a `/` match the declared media type;
/// all others match the file extension. Matching is case-insensitive. An
/// empty list accepts every format.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ItemPolicy {
    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: Vec<String>,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for ItemPolicy {
    fn default() -> Self {
        Self {
            allowed_formats: default_allowed_formats(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl ItemPolicy {
    pub fn check(&self, payload: &ItemPayload) -> Result<(), TasksDomainError> {
        if payload.content.is_empty() {
            return Err(TasksDomainError::EmptyPayload {
                name: payload.name.clone(),
            });
        }

        if payload.size() > self.max_bytes {
            return Err(TasksDomainError::TooLarge {
                name: payload.name.clone(),
                size: payload.size(),
                max: self.max_bytes,
            });
        }

        if !self.format_allowed(payload) {
            let format = payload
                .media_type
                .clone()
                .or_else(|| payload.extension())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(TasksDomainError::UnsupportedFormat {
                name: payload.name.clone(),
                format,
            });
        }

        Ok(())
    }

    fn format_allowed(&self, payload: &ItemPayload) -> bool {
        if self.allowed_formats.is_empty() {
            return true;
        }
        let extension = payload.extension();
        self.allowed_formats.iter().any(|allowed| {
            let allowed = allowed.trim_start_matches('.');
            if allowed.contains('/') {
                payload
                    .media_type
                    .as_deref()
                    .is_some_and(|mt| mt.eq_ignore_ascii_case(allowed))
            } else {
                extension
                    .as_deref()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(allowed))
            }
        })
    }
}

/// Terminal outcome of a queue item. Holding both in one enum keeps
/// result and error mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Completed(Value),
    Failed(String),
}

/// One entry in the submission queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub id: ItemId,
    pub payload: ItemPayload,
    state: ItemState,
    progress: u8,
    outcome: Option<ItemOutcome>,
}

impl QueueItem {
    #[must_use]
    pub fn new(payload: ItemPayload) -> Self {
        Self {
            id: ItemId::generate(),
            payload,
            state: ItemState::Pending,
            progress: 0,
            outcome: None,
        }
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn outcome(&self) -> Option<&ItemOutcome> {
        self.outcome.as_ref()
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Some(ItemOutcome::Completed(result)) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Some(ItemOutcome::Failed(error)) => Some(error),
            _ => None,
        }
    }

    pub fn begin_upload(&mut self) -> Result<(), TasksDomainError> {
        self.state = self.state.transition_to(ItemState::Uploading)?;
        self.progress = 0;
        Ok(())
    }

    pub fn enter_processing(&mut self) -> Result<(), TasksDomainError> {
        self.state = self.state.transition_to(ItemState::Processing)?;
        Ok(())
    }

    /// Raise the synthetic progress estimate. Ignored unless in flight;
    /// never lowers the value and never reaches 100.
    pub fn raise_progress(&mut self, to: u8) {
        if self.state.is_in_flight() {
            self.progress = self.progress.max(to.min(IN_FLIGHT_PROGRESS_MAX));
        }
    }

    /// Record a successful response. An item still in Uploading passes
    /// through Processing first.
    pub fn complete(&mut self, result: Value) -> Result<(), TasksDomainError> {
        if self.state == ItemState::Uploading {
            self.enter_processing()?;
        }
        self.state = self.state.transition_to(ItemState::Completed)?;
        self.progress = 100;
        self.outcome = Some(ItemOutcome::Completed(result));
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TasksDomainError> {
        self.state = self.state.transition_to(ItemState::Failed)?;
        self.progress = 0;
        self.outcome = Some(ItemOutcome::Failed(reason.into()));
        Ok(())
    }
}
