//! This module defines references from one plugin's metadata to other files.

use std::fmt::Display;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::util::text;

/// A reference to a file from a plugin's metadata.
/// This is used for load-after entries, requirements, and incompatibilities.
///
/// Two references are equal when they name the same file, ignoring case;
/// the display string and condition do not participate in equality.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileRef {
	/// The filename being referred to.
	pub name: String,

	/// An optional human-friendly name to show instead of the filename.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub display: String,

	/// An optional condition gating this reference.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub condition: Option<String>,
}

impl FileRef {
	/// Builds a new reference to the named file.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Default::default()
		}
	}

	/// Returns the display string if one is set, and the filename otherwise.
	pub fn display_name(&self) -> &str {
		match self.display.is_empty() {
			true => &self.name,
			false => &self.display,
		}
	}
}

impl PartialEq for FileRef {
	fn eq(&self, other: &Self) -> bool {
		text::filenames_equal(&self.name, &other.name)
	}
}

impl Eq for FileRef {}

impl Hash for FileRef {
	fn hash<H: Hasher>(&self, state: &mut H) {
		text::casefold(&self.name).hash(state);
	}
}

impl Display for FileRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.display_name())
	}
}

/// A place a plugin can be acquired from, such as a mod hosting page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
	/// The URL the plugin is available at.
	pub url: String,

	/// An optional label for this location.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub name: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn file_refs_compare_by_case_folded_name_only() {
		let plain = FileRef::new("Hearthfire.esm");
		let decorated = FileRef {
			name: "hearthfire.ESM".to_owned(),
			display: "Hearthfire".to_owned(),
			condition: Some("file(\"Skyrim.esm\")".to_owned()),
		};

		assert_eq!(plain, decorated);
	}

	#[test]
	fn display_name_falls_back_to_filename() {
		let mut file = FileRef::new("Dragonborn.esm");
		assert_eq!(file.display_name(), "Dragonborn.esm");

		file.display = "Dragonborn DLC".to_owned();
		assert_eq!(file.display_name(), "Dragonborn DLC");
	}
}
