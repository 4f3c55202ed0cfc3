use bytes::Bytes;
use serde::Serialize;

use courier_tasks_domain::{ItemPayload, SubmitOptions};

/// JSON body of `POST /items`.
#[derive(Debug, Serialize)]
pub(crate) struct SubmitItemBody<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<&'a str>,
    #[serde(serialize_with = "base64_bytes::serialize")]
    pub content: &'a Bytes,
    #[serde(skip_serializing_if = "has_no_entries")]
    pub options: &'a SubmitOptions,
}

impl<'a> SubmitItemBody<'a> {
    pub fn new(payload: &'a ItemPayload, options: &'a SubmitOptions) -> Self {
        Self {
            name: &payload.name,
            media_type: payload.media_type.as_deref(),
            content: &payload.content,
            options,
        }
    }
}

fn has_no_entries(options: &&SubmitOptions) -> bool {
    options.entries.is_empty()
}

/// Serde helper: serialize bytes as base64 in JSON.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::Serializer;

    pub fn serialize<S: Serializer, T: AsRef<[u8]>>(data: &T, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(data.as_ref()))
    }
}
