//! This module defines immutable plugin snapshots and the adapter traits the
//! core consumes for plugin parsing and load-order access.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::util::text;

use super::GameType;

/// The identifier of a single record, qualified by the plugin that defines it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormId {
	/// The case-folded name of the plugin the record belongs to.
	plugin: String,

	/// The record's index within that plugin.
	object_index: u32,
}

impl FormId {
	/// Builds a new form ID. The plugin name is case-folded so that form IDs
	/// from differently-cased master references still compare equal.
	pub fn new(plugin: impl AsRef<str>, object_index: u32) -> Self {
		Self {
			plugin: text::casefold(plugin.as_ref()),
			object_index,
		}
	}
}

/// An immutable snapshot of one parsed plugin file.
///
/// Snapshots are produced by a *PluginReader* and shared through the game
/// cache; nothing in this crate mutates one after construction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
	name: String,
	is_master: bool,
	masters: Vec<String>,
	override_form_ids: HashSet<FormId>,
	version: Option<String>,
	crc: Option<u32>,
}

impl Plugin {
	/// Builds an empty snapshot with the given filename.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Default::default()
		}
	}

	/// Sets the master flag read from the plugin's header.
	pub fn with_master_flag(mut self, is_master: bool) -> Self {
		self.is_master = is_master;
		self
	}

	/// Sets the ordered list of masters the plugin declares.
	pub fn with_masters<I, S>(mut self, masters: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.masters = masters.into_iter().map(Into::into).collect();
		self
	}

	/// Sets the plugin's override records.
	pub fn with_override_form_ids(mut self, form_ids: HashSet<FormId>) -> Self {
		self.override_form_ids = form_ids;
		self
	}

	/// Sets the version string extracted from the plugin's description.
	pub fn with_version(mut self, version: impl Into<String>) -> Self {
		self.version = Some(version.into());
		self
	}

	/// Sets the CRC32 of the plugin file.
	pub fn with_crc(mut self, crc: u32) -> Self {
		self.crc = Some(crc);
		self
	}

	/// The plugin's filename.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Whether the plugin's header flags it as a master.
	pub fn is_master(&self) -> bool {
		self.is_master
	}

	/// The masters the plugin declares, in declaration order.
	pub fn masters(&self) -> &[String] {
		&self.masters
	}

	/// The records this plugin overrides in its masters.
	pub fn override_form_ids(&self) -> &HashSet<FormId> {
		&self.override_form_ids
	}

	/// How many records this plugin overrides.
	pub fn count_override_form_ids(&self) -> usize {
		self.override_form_ids.len()
	}

	/// Checks if this plugin and another override any record in common.
	pub fn do_form_ids_overlap(&self, other: &Plugin) -> bool {
		let (smaller, larger) = match self.override_form_ids.len() <= other.override_form_ids.len()
		{
			true => (&self.override_form_ids, &other.override_form_ids),
			false => (&other.override_form_ids, &self.override_form_ids),
		};

		smaller.iter().any(|id| larger.contains(id))
	}

	/// The version string embedded in the plugin's description, if any.
	pub fn version(&self) -> Option<&str> {
		self.version.as_deref()
	}

	/// The CRC32 of the plugin file, if it was computed.
	pub fn crc(&self) -> Option<u32> {
		self.crc
	}
}

/// Read access to the game's load order, provided by the host application.
pub trait LoadOrderProvider {
	/// Checks if the named plugin is active.
	fn is_plugin_active(&self, plugin_name: &str) -> bool;

	/// The plugins the game engine always activates, in their forced order.
	fn implicitly_active_plugins(&self) -> Vec<String>;

	/// The current load order.
	fn load_order(&self) -> Vec<String>;
}

/// Plugin parsing and file inspection, provided by the host application.
pub trait PluginReader {
	/// Checks if the file at the given path parses as a plugin for the game.
	fn is_valid(&self, game_type: GameType, path: &Path) -> bool;

	/// Parses the plugin at the given path. When `header_only` is set, the
	/// record set is not loaded and the snapshot's override form IDs are
	/// empty.
	fn read(&self, game_type: GameType, path: &Path, header_only: bool) -> AppResult<Plugin>;

	/// Computes the CRC32 of an arbitrary file.
	fn crc32(&self, path: &Path) -> AppResult<u32>;

	/// Extracts a version string from a non-plugin file's own metadata,
	/// such as an executable's resource block.
	fn file_version(&self, path: &Path) -> Option<String>;

	/// The version of the host executable.
	fn host_version(&self) -> Option<String>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn form_ids(plugin: &str, indices: &[u32]) -> HashSet<FormId> {
		indices.iter().map(|i| FormId::new(plugin, *i)).collect()
	}

	#[test]
	fn form_ids_case_fold_their_plugin_name() {
		assert_eq!(FormId::new("Skyrim.esm", 1), FormId::new("skyrim.ESM", 1));
	}

	#[test]
	fn overlap_requires_a_common_form_id() {
		let a = Plugin::new("A.esp").with_override_form_ids(form_ids("Skyrim.esm", &[1, 2, 3]));
		let b = Plugin::new("B.esp").with_override_form_ids(form_ids("Skyrim.esm", &[3, 4]));
		let c = Plugin::new("C.esp").with_override_form_ids(form_ids("Skyrim.esm", &[5]));

		assert!(a.do_form_ids_overlap(&b));
		assert!(b.do_form_ids_overlap(&a));
		assert!(!a.do_form_ids_overlap(&c));
	}
}
