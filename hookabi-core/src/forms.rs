//! Action shapes the host hands to hooks.
//!
//! Wire names are the snake_case field names below; they are part of each
//! entry point's contract and must not change.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{DynamicForm, Field};
use crate::rules::HookSubject;

/// Parameters of a post the host is about to create (or has just created).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostForm {
    pub name: String,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub community_id: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub url: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub body: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub alt_text: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub nsfw: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub language_id: Field<i32>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub creator_id: Field<i64>,
}

impl PostForm {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            community_id: Field::Absent,
            url: Field::Absent,
            body: Field::Absent,
            alt_text: Field::Absent,
            nsfw: Field::Absent,
            language_id: Field::Absent,
            creator_id: Field::Absent,
        }
    }

    fn text_slot(&mut self, field: &str) -> Option<&mut Field<String>> {
        match field {
            "url" => Some(&mut self.url),
            "body" => Some(&mut self.body),
            "alt_text" => Some(&mut self.alt_text),
            _ => None,
        }
    }
}

impl HookSubject for PostForm {
    const FIELDS: Option<&'static [&'static str]> = Some(&[
        "name",
        "community_id",
        "url",
        "body",
        "alt_text",
        "nsfw",
        "language_id",
        "creator_id",
    ]);
    const TEXT_FIELDS: Option<&'static [&'static str]> = Some(&["name", "url", "body", "alt_text"]);

    fn text(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(self.name.as_str()),
            "url" => self.url.as_value().map(String::as_str),
            "body" => self.body.as_value().map(String::as_str),
            "alt_text" => self.alt_text.as_value().map(String::as_str),
            _ => None,
        }
    }

    fn has(&self, field: &str) -> bool {
        match field {
            "name" => true,
            "community_id" => !self.community_id.is_absent(),
            "url" => !self.url.is_absent(),
            "body" => !self.body.is_absent(),
            "alt_text" => !self.alt_text.is_absent(),
            "nsfw" => !self.nsfw.is_absent(),
            "language_id" => !self.language_id.is_absent(),
            "creator_id" => !self.creator_id.is_absent(),
            _ => false,
        }
    }

    fn set_text(&mut self, field: &str, value: &str) -> bool {
        if field == "name" {
            self.name = value.to_string();
            return true;
        }
        match self.text_slot(field) {
            Some(slot) => {
                *slot = Field::Value(value.to_string());
                true
            }
            None => false,
        }
    }
}

/// Parameters of a comment the host is about to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentForm {
    pub content: String,
    pub post_id: i64,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub creator_id: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub language_id: Field<i32>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub parent_id: Field<i64>,
}

impl HookSubject for CommentForm {
    const FIELDS: Option<&'static [&'static str]> =
        Some(&["content", "post_id", "creator_id", "language_id", "parent_id"]);
    const TEXT_FIELDS: Option<&'static [&'static str]> = Some(&["content"]);

    fn text(&self, field: &str) -> Option<&str> {
        (field == "content").then_some(self.content.as_str())
    }

    fn has(&self, field: &str) -> bool {
        match field {
            "content" | "post_id" => true,
            "creator_id" => !self.creator_id.is_absent(),
            "language_id" => !self.language_id.is_absent(),
            "parent_id" => !self.parent_id.is_absent(),
            _ => false,
        }
    }

    fn set_text(&mut self, field: &str, value: &str) -> bool {
        if field != "content" {
            return false;
        }
        self.content = value.to_string();
        true
    }
}

/// Header every federated activity carries. The rest of the activity rides in [`Open`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl HookSubject for Activity {
    const FIELDS: Option<&'static [&'static str]> = Some(&["id", "type"]);
    const TEXT_FIELDS: Option<&'static [&'static str]> = Some(&["id", "type"]);

    fn text(&self, field: &str) -> Option<&str> {
        match field {
            "id" => Some(self.id.as_str()),
            "type" => Some(self.kind.as_str()),
            _ => None,
        }
    }

    fn has(&self, field: &str) -> bool {
        matches!(field, "id" | "type")
    }

    fn set_text(&mut self, field: &str, value: &str) -> bool {
        match field {
            "id" => self.id = value.to_string(),
            "type" => self.kind = value.to_string(),
            _ => return false,
        }
        true
    }
}

/// Typed shape `T` plus whatever other keys the host sent.
///
/// `T`'s required fields must be present and well-typed; keys `T` does not
/// name are kept, in wire order, and handed back untouched unless a rule
/// rewrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Open<T> {
    #[serde(flatten)]
    pub known: T,
    #[serde(flatten)]
    pub extra: DynamicForm,
}

impl<T: HookSubject> Open<T> {
    fn is_known(field: &str) -> bool {
        T::FIELDS.is_some_and(|fs| fs.iter().any(|k| *k == field))
    }
}

impl<T: HookSubject> HookSubject for Open<T> {
    const FIELDS: Option<&'static [&'static str]> = None;
    const TEXT_FIELDS: Option<&'static [&'static str]> = None;

    fn text(&self, field: &str) -> Option<&str> {
        if Self::is_known(field) {
            self.known.text(field)
        } else {
            self.extra.text(field)
        }
    }

    fn has(&self, field: &str) -> bool {
        if Self::is_known(field) {
            self.known.has(field)
        } else {
            self.extra.has(field)
        }
    }

    fn set_text(&mut self, field: &str, value: &str) -> bool {
        if Self::is_known(field) {
            self.known.set_text(field, value)
        } else {
            self.extra.set_text(field, value)
        }
    }
}

impl HookSubject for DynamicForm {
    const FIELDS: Option<&'static [&'static str]> = None;
    const TEXT_FIELDS: Option<&'static [&'static str]> = None;

    fn text(&self, field: &str) -> Option<&str> {
        self.get_str(field)
    }

    fn has(&self, field: &str) -> bool {
        self.contains(field)
    }

    /// Open shape: any field may be written, but an existing non-text value is left alone.
    fn set_text(&mut self, field: &str, value: &str) -> bool {
        let writable = matches!(
            self.get(field),
            None | Some(Value::String(_)) | Some(Value::Null)
        );
        if writable {
            self.set(field, value);
        }
        writable
    }
}
