//! This module defines the user-facing messages metadata can attach to plugins.

use serde::{Deserialize, Serialize};

/// How severe a message is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
	/// Plain information.
	#[default]
	Say,

	/// Something the user should probably act on.
	Warn,

	/// Something that will cause problems if left alone.
	Error,
}

/// A single localisation of a message's text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
	/// The message text.
	pub text: String,

	/// The language code the text is written in.
	#[serde(default = "MessageContent::default_language")]
	pub language: String,
}

impl MessageContent {
	/// The language assumed when none is given.
	pub fn default_language() -> String {
		"en".to_owned()
	}

	/// Builds content in the default language.
	pub fn new(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			language: Self::default_language(),
		}
	}
}

/// A message shown to the user, optionally gated by a condition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	/// The message's severity.
	#[serde(rename = "type", default)]
	pub message_type: MessageType,

	/// The message text, one entry per language.
	pub content: Vec<MessageContent>,

	/// An optional condition gating this message.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub condition: Option<String>,
}

impl Message {
	/// Builds a new message of the given severity with default-language content.
	pub fn new(message_type: MessageType, text: impl Into<String>) -> Self {
		Self {
			message_type,
			content: vec![MessageContent::new(text)],
			condition: None,
		}
	}

	/// Returns the content for the requested language, falling back to the
	/// default language, then to the first content entry present.
	pub fn content_for(&self, language: &str) -> Option<&MessageContent> {
		self.content
			.iter()
			.find(|c| c.language == language)
			.or_else(|| {
				self.content
					.iter()
					.find(|c| c.language == MessageContent::default_language())
			})
			.or_else(|| self.content.first())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn content_lookup_falls_back_to_default_language() {
		let message = Message {
			message_type: MessageType::Warn,
			content: vec![
				MessageContent::new("english text"),
				MessageContent {
					text: "deutscher Text".to_owned(),
					language: "de".to_owned(),
				},
			],
			condition: None,
		};

		assert_eq!(message.content_for("de").unwrap().text, "deutscher Text");
		assert_eq!(message.content_for("fr").unwrap().text, "english text");
	}
}
