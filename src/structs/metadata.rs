//! This module defines per-plugin metadata entries and how they merge.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::util::text;

/// The metadata a masterlist or userlist carries for one plugin.
///
/// An entry is keyed either by an exact filename or, when the name contains
/// characters no real filename can, by a regex matched against filenames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
	/// The plugin filename or filename regex this entry applies to.
	pub name: String,

	/// Whether this entry should be applied at all.
	#[serde(default = "PluginMetadata::default_enabled")]
	pub enabled: bool,

	/// The ordering group the plugin belongs to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub group: Option<String>,

	/// Files the plugin must load after.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub load_after: Vec<FileRef>,

	/// Files the plugin requires. Requirements also impose load order.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub requirements: Vec<FileRef>,

	/// Files the plugin cannot coexist with.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub incompatibilities: Vec<FileRef>,

	/// Messages to show the user for this plugin.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub messages: Vec<Message>,

	/// Bash Tag suggestions for this plugin.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub tags: Vec<Tag>,

	/// Records describing dirty builds of this plugin.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub dirty_info: Vec<CleaningData>,

	/// Records vouching that specific builds are clean.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub clean_info: Vec<CleaningData>,

	/// Places the plugin can be acquired from.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub locations: Vec<Location>,
}

impl PluginMetadata {
	fn default_enabled() -> bool {
		true
	}

	/// Builds an empty entry for the named plugin.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			enabled: true,
			group: None,
			load_after: Vec::new(),
			requirements: Vec::new(),
			incompatibilities: Vec::new(),
			messages: Vec::new(),
			tags: Vec::new(),
			dirty_info: Vec::new(),
			clean_info: Vec::new(),
			locations: Vec::new(),
		}
	}

	/// Returns *true* if this entry is keyed by a regex rather than an exact
	/// filename.
	pub fn is_regex_entry(&self) -> bool {
		text::is_regex_like(&self.name)
	}

	/// Checks that a regex-keyed entry holds a valid pattern.
	/// Exact-name entries always pass.
	pub fn validate_name(&self) -> AppResult<()> {
		if !self.is_regex_entry() {
			return Ok(());
		}

		match build_name_regex(&self.name) {
			Ok(_) => Ok(()),
			Err(error) => Err(MetadataError::InvalidRegex {
				pattern: self.name.clone(),
				reason: error.to_string(),
			}
			.into()),
		}
	}

	/// Checks if this entry applies to the given plugin filename.
	/// Exact-name entries compare case-insensitively; regex entries must
	/// match the whole filename, also ignoring case.
	pub fn name_matches(&self, plugin_name: &str) -> bool {
		if !self.is_regex_entry() {
			return text::filenames_equal(&self.name, plugin_name);
		}

		match build_name_regex(&self.name) {
			Ok(regex) => regex.is_match(plugin_name),
			Err(_) => false,
		}
	}

	/// Returns *true* if this entry carries no metadata besides its name.
	pub fn has_name_only(&self) -> bool {
		self.enabled
			&& self.group.is_none()
			&& self.load_after.is_empty()
			&& self.requirements.is_empty()
			&& self.incompatibilities.is_empty()
			&& self.messages.is_empty()
			&& self.tags.is_empty()
			&& self.dirty_info.is_empty()
			&& self.clean_info.is_empty()
			&& self.locations.is_empty()
	}

	/// Merges another entry's metadata into this one.
	///
	/// Set-valued fields are unioned, preserving this entry's order and then
	/// the order of appearance in the other entry. The group is taken from
	/// the first entry that sets one, and the merged entry is enabled only
	/// if both entries are.
	pub fn merge(&mut self, other: &PluginMetadata) {
		if other.has_name_only() {
			return;
		}

		self.enabled = self.enabled && other.enabled;

		if self.group.is_none() {
			self.group = other.group.clone();
		}

		merge_files(&mut self.load_after, &other.load_after);
		merge_files(&mut self.requirements, &other.requirements);
		merge_files(&mut self.incompatibilities, &other.incompatibilities);

		self.messages.extend(other.messages.iter().cloned());

		for tag in &other.tags {
			if !self.tags.contains(tag) {
				self.tags.push(tag.clone());
			}
		}

		merge_cleaning(&mut self.dirty_info, &other.dirty_info);
		merge_cleaning(&mut self.clean_info, &other.clean_info);

		for location in &other.locations {
			if self.locations.iter().all(|l| l.url != location.url) {
				self.locations.push(location.clone());
			}
		}
	}
}

/// Compiles an entry name into an anchored, case-insensitive regex.
fn build_name_regex(pattern: &str) -> Result<regex::Regex, regex::Error> {
	RegexBuilder::new(&format!("^(?:{pattern})$"))
		.case_insensitive(true)
		.build()
}

/// Appends files from `other` that `existing` does not already name.
fn merge_files(existing: &mut Vec<FileRef>, other: &[FileRef]) {
	for file in other {
		if !existing.contains(file) {
			existing.push(file.clone());
		}
	}
}

/// Appends cleaning records for builds `existing` does not already cover.
fn merge_cleaning(existing: &mut Vec<CleaningData>, other: &[CleaningData]) {
	for info in other {
		if existing.iter().all(|i| i.crc != info.crc) {
			existing.push(info.clone());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn regex_entries_are_detected_by_invalid_filename_chars() {
		assert!(PluginMetadata::new(r"Foo.*\.esp").is_regex_entry());
		assert!(!PluginMetadata::new("Foo.esp").is_regex_entry());
	}

	#[test]
	fn regex_entries_match_whole_filenames_case_insensitively() {
		let entry = PluginMetadata::new(r"Foo.*\.esp");

		assert!(entry.name_matches("FooBar.esp"));
		assert!(entry.name_matches("FOOBAR.ESP"));
		assert!(!entry.name_matches("FooBar.esp.backup"));
		assert!(!entry.name_matches("BarFoo.esp"));
	}

	#[test]
	fn exact_entries_match_case_insensitively() {
		let entry = PluginMetadata::new("Foo.esp");

		assert!(entry.name_matches("foo.ESP"));
		assert!(!entry.name_matches("Foo.esm"));
	}

	#[test]
	fn invalid_regex_entries_are_rejected() {
		let entry = PluginMetadata::new(r"Foo(\.esp");

		assert!(entry.validate_name().is_err());
	}

	#[test]
	fn merge_unions_sets_and_keeps_first_group() {
		let mut base = PluginMetadata::new("Foo.esp");
		base.group = Some("early".to_owned());
		base.load_after.push(FileRef::new("A.esp"));

		let mut other = PluginMetadata::new("Foo.esp");
		other.group = Some("late".to_owned());
		other.load_after.push(FileRef::new("a.ESP"));
		other.load_after.push(FileRef::new("B.esp"));
		other.messages.push(Message::new(MessageType::Say, "hello"));

		base.merge(&other);

		assert_eq!(base.group.as_deref(), Some("early"));
		assert_eq!(base.load_after.len(), 2);
		assert_eq!(base.messages.len(), 1);
	}

	#[test]
	fn merge_ands_the_enabled_flag() {
		let mut base = PluginMetadata::new("Foo.esp");
		let mut other = PluginMetadata::new("Foo.esp");
		other.enabled = false;
		// A disabled entry is not name-only, so it participates in the merge.
		base.merge(&other);

		assert!(!base.enabled);
	}

	#[test]
	fn merge_dedupes_cleaning_records_by_crc() {
		let mut base = PluginMetadata::new("Foo.esp");
		base.dirty_info.push(CleaningData::new(0xDEADBEEF, "xEdit"));

		let mut other = PluginMetadata::new("Foo.esp");
		other.dirty_info.push(CleaningData::new(0xDEADBEEF, "xEdit 4"));
		other.dirty_info.push(CleaningData::new(0x0000_0001, "xEdit"));

		base.merge(&other);

		assert_eq!(base.dirty_info.len(), 2);
		assert_eq!(base.dirty_info[0].utility, "xEdit");
	}

	#[test]
	fn name_only_entries_do_not_affect_merge_targets() {
		let mut base = PluginMetadata::new("Foo.esp");
		base.group = Some("early".to_owned());

		let other = PluginMetadata::new("Foo.esp");
		base.merge(&other);

		assert_eq!(base.group.as_deref(), Some("early"));
		assert!(base.enabled);
	}
}
