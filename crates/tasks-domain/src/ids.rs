use crate::error::TasksDomainError;

const ITEM_PREFIX: &str = "item_";

/// Remote-assigned ids are opaque, but they end up in URL paths and log fields.
fn is_valid_remote_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 128
        && !s.chars().any(|c| c.is_whitespace() || c.is_control() || c == '/')
}

/// Locally generated ids: `item_` followed by a ULID.
fn is_valid_item_id(s: &str) -> bool {
    s.strip_prefix(ITEM_PREFIX)
        .is_some_and(|rest| ulid::Ulid::from_string(rest).is_ok())
}

macro_rules! validated_id {
    ($name:ident, $check:ident, $err:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: &str) -> Result<Self, TasksDomainError> {
                if !$check(raw) {
                    return Err(TasksDomainError::$err(raw.to_string()));
                }
                Ok(Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = TasksDomainError;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(&s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

validated_id!(TaskId, is_valid_remote_id, InvalidTaskId);
validated_id!(ItemId, is_valid_item_id, InvalidItemId);

impl ItemId {
    /// Fresh id for a newly accepted queue item.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{ITEM_PREFIX}{}", ulid::Ulid::new()))
    }
}
