//! This module defines Bash Tag suggestions attached to plugin metadata.

use serde::{Deserialize, Serialize};

/// A suggestion to add or remove a Bash Tag for a plugin.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
	/// The tag's name, without any addition or removal marker.
	pub name: String,

	/// Whether the tag is suggested for addition or for removal.
	#[serde(default = "Tag::default_addition")]
	pub addition: bool,

	/// An optional condition gating this suggestion.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub condition: Option<String>,
}

impl Tag {
	fn default_addition() -> bool {
		true
	}

	/// Builds a new tag-addition suggestion.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			addition: true,
			condition: None,
		}
	}

	/// Builds a new tag-removal suggestion.
	pub fn removal(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			addition: false,
			condition: None,
		}
	}
}
