//! This module owns the metadata documents: the masterlist and userlist.
//!
//! A document holds raw, unevaluated metadata. Evaluating conditions
//! filters a working copy that is rebuilt from an unevaluated shadow on
//! every pass, so toggling evaluation on and off never progressively
//! prunes the document.

use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::condition::ConditionEvaluator;
use crate::prelude::*;
use crate::util::text;

/// A metadata document: groups, bash tags, plugin entries and general
/// messages.
///
/// Plugin entries are keyed either by exact filename or by a regex over
/// filenames. Exact entries are unique under case-folding; regex entries
/// keep their document order because merge order matters.
#[derive(Default)]
pub struct MetadataList {
	groups: IndexMap<String, Group>,
	bash_tags: IndexSet<String>,
	plugins: IndexMap<String, PluginMetadata>,
	regex_plugins: Vec<PluginMetadata>,
	messages: Vec<Message>,

	unevaluated_plugins: IndexMap<String, PluginMetadata>,
	unevaluated_regex_plugins: Vec<PluginMetadata>,
	unevaluated_messages: Vec<Message>,
}

/// The on-disk shape of a metadata document.
#[derive(Default, Serialize, Deserialize)]
struct RawDocument {
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	groups: Vec<Group>,

	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	plugins: Vec<PluginMetadata>,

	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	globals: Vec<Message>,

	#[serde(default, skip_serializing_if = "IndexSet::is_empty")]
	bash_tags: IndexSet<String>,
}

impl MetadataList {
	/// Loads a document from a file, replacing this document's content.
	pub fn load(&mut self, filepath: &Path) -> AppResult<()> {
		let contents = fs::read_to_string(filepath).map_err(|error| AppError::FileAccess {
			path: filepath.to_path_buf(),
			reason: error.to_string(),
		})?;

		self.load_str(&contents)
	}

	/// Loads a document from text, replacing this document's content.
	pub fn load_str(&mut self, contents: &str) -> AppResult<()> {
		let raw: RawDocument = serde_yaml::from_str(contents)?;

		let mut loaded = MetadataList::default();

		for group in raw.groups {
			loaded.groups.entry(group.name.clone()).or_insert(group);
		}

		for plugin in raw.plugins {
			loaded.add_plugin(plugin)?;
		}

		loaded.messages = raw.globals.clone();
		loaded.unevaluated_messages = raw.globals;
		loaded.bash_tags = raw.bash_tags;

		*self = loaded;
		Ok(())
	}

	/// Saves the document's unevaluated content to a file.
	pub fn save(&self, filepath: &Path) -> AppResult<()> {
		let raw = RawDocument {
			groups: self.groups.values().cloned().collect(),
			plugins: self
				.unevaluated_plugins
				.values()
				.chain(self.unevaluated_regex_plugins.iter())
				.cloned()
				.collect(),
			globals: self.unevaluated_messages.clone(),
			bash_tags: self.bash_tags.clone(),
		};

		let contents = serde_yaml::to_string(&raw)?;

		fs::write(filepath, contents).map_err(|error| AppError::FileAccess {
			path: filepath.to_path_buf(),
			reason: error.to_string(),
		})
	}

	/// Drops all of the document's content.
	pub fn clear(&mut self) {
		*self = MetadataList::default();
	}

	/// The document's groups, keyed by name.
	pub fn groups(&self) -> &IndexMap<String, Group> {
		&self.groups
	}

	/// Replaces the document's groups. Duplicate names keep the first
	/// definition.
	pub fn set_groups(&mut self, groups: impl IntoIterator<Item = Group>) {
		self.groups.clear();
		for group in groups {
			self.groups.entry(group.name.clone()).or_insert(group);
		}
	}

	/// The document's bash tag names.
	pub fn bash_tags(&self) -> &IndexSet<String> {
		&self.bash_tags
	}

	/// The document's general messages.
	pub fn messages(&self) -> &[Message] {
		&self.messages
	}

	/// Appends a general message to the document.
	pub fn append_message(&mut self, message: Message) {
		self.messages.push(message.clone());
		self.unevaluated_messages.push(message);
	}

	/// Every plugin entry in the document, exact entries first, then regex
	/// entries in document order.
	pub fn plugins(&self) -> impl Iterator<Item = &PluginMetadata> {
		self.plugins.values().chain(self.regex_plugins.iter())
	}

	/// Returns the effective metadata for the named plugin, or *None* if
	/// the document has nothing for it.
	///
	/// The exact-name entry, if any, is the base; every regex entry whose
	/// pattern matches the name is then merged in, in document order.
	pub fn find_plugin(&self, plugin_name: &str) -> Option<PluginMetadata> {
		let mut found = match self.plugins.get(&text::casefold(plugin_name)) {
			Some(entry) => entry.clone(),
			None => PluginMetadata::new(plugin_name),
		};

		for regex_plugin in &self.regex_plugins {
			if regex_plugin.name_matches(plugin_name) {
				found.merge(regex_plugin);
			}
		}

		match found.has_name_only() {
			true => None,
			false => Some(found),
		}
	}

	/// Adds a plugin entry to the document.
	/// A second exact-name entry for the same plugin is a *DuplicateEntry*
	/// error; regex entries may repeat freely.
	pub fn add_plugin(&mut self, plugin: PluginMetadata) -> AppResult<()> {
		plugin.validate_name()?;

		if plugin.is_regex_entry() {
			self.regex_plugins.push(plugin.clone());
			self.unevaluated_regex_plugins.push(plugin);
			return Ok(());
		}

		let key = text::casefold(&plugin.name);
		if self.plugins.contains_key(&key) {
			return Err(MetadataError::DuplicateEntry(plugin.name).into());
		}

		self.plugins.insert(key.clone(), plugin.clone());
		self.unevaluated_plugins.insert(key, plugin);

		Ok(())
	}

	/// Removes the exact-name entry for the named plugin.
	/// Regex entries are left alone, as they may serve other plugins.
	pub fn erase_plugin(&mut self, plugin_name: &str) {
		let key = text::casefold(plugin_name);

		self.plugins.shift_remove(&key);
		self.unevaluated_plugins.shift_remove(&key);
	}

	/// Re-filters the working copy of every conditional piece of metadata
	/// from the unevaluated shadow.
	pub fn eval_all_conditions(&mut self, evaluator: &ConditionEvaluator) -> AppResult<()> {
		let mut plugins = IndexMap::new();
		for (key, plugin) in &self.unevaluated_plugins {
			plugins.insert(key.clone(), evaluator.evaluate_all(plugin)?);
		}
		self.plugins = plugins;

		let mut regex_plugins = Vec::new();
		for plugin in &self.unevaluated_regex_plugins {
			regex_plugins.push(evaluator.evaluate_all(plugin)?);
		}
		self.regex_plugins = regex_plugins;

		let mut messages = Vec::new();
		for message in &self.unevaluated_messages {
			let holds = match &message.condition {
				Some(condition) => evaluator.evaluate(condition)?,
				None => true,
			};

			if holds {
				messages.push(message.clone());
			}
		}
		self.messages = messages;

		Ok(())
	}
}

/// Revision information for a fetched masterlist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterlistInfo {
	/// The revision identifier, possibly shortened.
	pub revision_id: String,

	/// The date the revision was committed.
	pub revision_date: String,
}

/// Remote synchronisation of a masterlist file, provided by the host
/// application.
pub trait MasterlistRepo {
	/// Brings the masterlist at the given path up to date with a remote.
	/// Returns *true* if the file changed.
	fn update(&self, path: &Path, remote_url: &str, remote_branch: &str) -> AppResult<bool>;

	/// Reads the revision information of a fetched masterlist.
	fn info(&self, path: &Path, short_id: bool) -> AppResult<MasterlistInfo>;

	/// Checks if a fetched masterlist is at the tip of the given branch.
	fn is_latest(&self, path: &Path, remote_branch: &str) -> AppResult<bool>;
}

/// A metadata document that can be synchronised with a remote repository.
#[derive(Default)]
pub struct Masterlist {
	list: MetadataList,
}

impl Masterlist {
	/// Updates the masterlist file through the given repository adapter
	/// and reloads it. Returns *true* if the file changed.
	pub fn update(
		&mut self,
		path: &Path,
		remote_url: &str,
		remote_branch: &str,
		repo: &dyn MasterlistRepo,
	) -> AppResult<bool> {
		let changed = repo.update(path, remote_url, remote_branch)?;
		self.list.load(path)?;

		Ok(changed)
	}

	/// Reads the revision information of the masterlist at the given path.
	pub fn info(path: &Path, short_id: bool, repo: &dyn MasterlistRepo) -> AppResult<MasterlistInfo> {
		repo.info(path, short_id)
	}

	/// Checks if the masterlist at the given path is up to date.
	pub fn is_latest(path: &Path, remote_branch: &str, repo: &dyn MasterlistRepo) -> AppResult<bool> {
		repo.is_latest(path, remote_branch)
	}
}

impl Deref for Masterlist {
	type Target = MetadataList;

	fn deref(&self) -> &Self::Target {
		&self.list
	}
}

impl DerefMut for Masterlist {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.list
	}
}
