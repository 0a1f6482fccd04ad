//! This module provides the database façade over the loaded metadata.
//!
//! The database exclusively owns the masterlist and userlist documents,
//! composes them into effective per-plugin metadata, and scopes every
//! user-metadata mutation.

use std::path::Path;
use std::sync::Arc;

use crate::condition::ConditionEvaluator;
use crate::document::{Masterlist, MasterlistInfo, MasterlistRepo, MetadataList};
use crate::prelude::*;
use crate::sorting::group_sort;

/// Composed access to the masterlist and userlist.
pub struct Database {
	masterlist: Masterlist,
	userlist: MetadataList,
	evaluator: Arc<ConditionEvaluator>,
}

impl Database {
	/// Builds an empty database that evaluates conditions with the given
	/// evaluator.
	pub fn new(evaluator: Arc<ConditionEvaluator>) -> Self {
		Self {
			masterlist: Masterlist::default(),
			userlist: MetadataList::default(),
			evaluator,
		}
	}

	/// Loads the masterlist and userlist from the given paths. Either may
	/// be omitted. On any failure the previously loaded documents are left
	/// untouched.
	pub fn load_lists(
		&mut self,
		masterlist_path: Option<&Path>,
		userlist_path: Option<&Path>,
	) -> AppResult<()> {
		let mut masterlist = Masterlist::default();
		let mut userlist = MetadataList::default();

		if let Some(path) = masterlist_path {
			if !path.exists() {
				return Err(AppError::FileAccess {
					path: path.to_path_buf(),
					reason: "the given masterlist path does not exist".to_owned(),
				});
			}

			masterlist.load(path)?;
		}

		if let Some(path) = userlist_path {
			if !path.exists() {
				return Err(AppError::FileAccess {
					path: path.to_path_buf(),
					reason: "the given userlist path does not exist".to_owned(),
				});
			}

			userlist.load(path)?;
		}

		self.masterlist = masterlist;
		self.userlist = userlist;

		Ok(())
	}

	/// Writes the userlist out to a file.
	pub fn write_user_metadata(&self, output_file: &Path, overwrite: bool) -> AppResult<()> {
		check_output_path(output_file, overwrite)?;

		self.userlist.save(output_file)
	}

	/// Updates the masterlist file through the given repository adapter
	/// and reloads it. Returns *true* if the file changed.
	pub fn update_masterlist(
		&mut self,
		masterlist_path: &Path,
		remote_url: &str,
		remote_branch: &str,
		repo: &dyn MasterlistRepo,
	) -> AppResult<bool> {
		let parent_is_directory = masterlist_path.parent().map_or(false, Path::is_dir);
		if !parent_is_directory {
			return Err(AppError::InvalidArgument(format!(
				"Given masterlist path \"{}\" does not have a valid parent directory.",
				masterlist_path.display()
			)));
		}

		self.masterlist
			.update(masterlist_path, remote_url, remote_branch, repo)
	}

	/// Reads the revision information of the masterlist at the given path.
	pub fn masterlist_revision(
		&self,
		masterlist_path: &Path,
		short_id: bool,
		repo: &dyn MasterlistRepo,
	) -> AppResult<MasterlistInfo> {
		Masterlist::info(masterlist_path, short_id, repo)
	}

	/// Checks if the masterlist at the given path is at the tip of the
	/// given branch.
	pub fn is_latest_masterlist(
		&self,
		masterlist_path: &Path,
		remote_branch: &str,
		repo: &dyn MasterlistRepo,
	) -> AppResult<bool> {
		Masterlist::is_latest(masterlist_path, remote_branch, repo)
	}

	/// The union of the bash tag names both documents mention.
	pub fn known_bash_tags(&self) -> IndexSet<String> {
		self.masterlist
			.bash_tags()
			.clone()
			.tap_mut(|tags| tags.extend(self.userlist.bash_tags().iter().cloned()))
	}

	/// The general messages of both documents, masterlist first.
	///
	/// With evaluation enabled, conditions are re-evaluated from scratch
	/// against the current game state rather than from memoised results.
	pub fn general_messages(&self, evaluate_conditions: bool) -> AppResult<Vec<Message>> {
		let mut messages = self.masterlist.messages().to_vec();
		messages.extend(self.userlist.messages().iter().cloned());

		if !evaluate_conditions {
			return Ok(messages);
		}

		self.evaluator.clear_condition_cache();

		let mut kept = Vec::new();
		for message in messages {
			let holds = match &message.condition {
				Some(condition) => self.evaluator.evaluate(condition)?,
				None => true,
			};

			if holds {
				kept.push(message);
			}
		}

		Ok(kept)
	}

	/// The group definitions, merged across both documents when user
	/// metadata is included. The default group is always present.
	pub fn groups(&self, include_user_metadata: bool) -> IndexMap<String, Group> {
		match include_user_metadata {
			true => group_sort::merge_groups(self.masterlist.groups(), self.userlist.groups()),
			false => group_sort::merge_groups(self.masterlist.groups(), &IndexMap::new()),
		}
	}

	/// The masterlist's groups, with the default group included.
	pub fn masterlist_groups(&self) -> IndexMap<String, Group> {
		self.groups(false)
	}

	/// The userlist's groups, as defined.
	pub fn user_groups(&self) -> IndexMap<String, Group> {
		self.userlist.groups().clone()
	}

	/// Replaces the userlist's groups.
	pub fn set_user_groups(&mut self, groups: impl IntoIterator<Item = Group>) {
		self.userlist.set_groups(groups);
	}

	/// Finds a path between two groups through the merged group graph.
	pub fn groups_path(&self, from_group: &str, to_group: &str) -> AppResult<Vec<Vertex>> {
		group_sort::groups_path(
			&self.masterlist_groups(),
			&self.user_groups(),
			from_group,
			to_group,
		)
	}

	/// Returns the effective metadata for the named plugin.
	///
	/// The masterlist entry is the base; with `include_user_metadata`, the
	/// userlist entry is merged over it. With `evaluate_conditions`, every
	/// condition-gated piece of the result is filtered against game state.
	pub fn plugin_metadata(
		&self,
		plugin_name: &str,
		include_user_metadata: bool,
		evaluate_conditions: bool,
	) -> AppResult<Option<PluginMetadata>> {
		let mut metadata = self.masterlist.find_plugin(plugin_name);

		if include_user_metadata {
			metadata = match (metadata, self.userlist.find_plugin(plugin_name)) {
				(Some(mut base), Some(user)) => {
					base.merge(&user);
					Some(base)
				}
				(None, user) => user,
				(base, None) => base,
			};
		}

		self.maybe_evaluate(metadata, evaluate_conditions)
	}

	/// Returns the userlist's metadata for the named plugin.
	pub fn plugin_user_metadata(
		&self,
		plugin_name: &str,
		evaluate_conditions: bool,
	) -> AppResult<Option<PluginMetadata>> {
		let metadata = self.userlist.find_plugin(plugin_name);

		self.maybe_evaluate(metadata, evaluate_conditions)
	}

	/// Replaces the userlist's exact-name entry for a plugin.
	pub fn set_plugin_user_metadata(&mut self, metadata: PluginMetadata) -> AppResult<()> {
		self.userlist.erase_plugin(&metadata.name);
		self.userlist.add_plugin(metadata)
	}

	/// Removes the userlist's exact-name entry for the named plugin.
	pub fn discard_plugin_user_metadata(&mut self, plugin_name: &str) {
		self.userlist.erase_plugin(plugin_name);
	}

	/// Drops the whole userlist.
	pub fn discard_all_user_metadata(&mut self) {
		self.userlist.clear();
	}

	/// Writes a minimal document containing only the masterlist plugins
	/// that carry tag suggestions or dirty info, for export to external
	/// tag-consuming tools.
	pub fn write_minimal_list(&self, output_file: &Path, overwrite: bool) -> AppResult<()> {
		check_output_path(output_file, overwrite)?;

		let mut minimal = MetadataList::default();
		for plugin in self.masterlist.plugins() {
			if plugin.tags.is_empty() && plugin.dirty_info.is_empty() {
				continue;
			}

			let mut entry = PluginMetadata::new(&plugin.name);
			entry.tags = plugin.tags.clone();
			entry.dirty_info = plugin.dirty_info.clone();

			minimal.add_plugin(entry)?;
		}

		minimal.save(output_file)
	}

	fn maybe_evaluate(
		&self,
		metadata: Option<PluginMetadata>,
		evaluate_conditions: bool,
	) -> AppResult<Option<PluginMetadata>> {
		match (evaluate_conditions, metadata) {
			(true, Some(metadata)) => Ok(Some(self.evaluator.evaluate_all(&metadata)?)),
			(_, metadata) => Ok(metadata),
		}
	}
}

/// Checks that an output file's directory exists and that an existing file
/// may be replaced.
fn check_output_path(output_file: &Path, overwrite: bool) -> AppResult<()> {
	let parent_exists = output_file.parent().map_or(false, Path::exists);
	if !parent_exists {
		return Err(AppError::InvalidArgument(
			"Output directory does not exist.".to_owned(),
		));
	}

	if output_file.exists() && !overwrite {
		return Err(AppError::FileAccess {
			path: output_file.to_path_buf(),
			reason: "output file exists but overwrite is not set".to_owned(),
		});
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::structs::group::DEFAULT_GROUP_NAME;

	const MASTERLIST: &str = r#"
groups:
  - name: early
  - name: late
    after: [early]

bash_tags:
  - Delev

globals:
  - type: say
    content:
      - text: From the masterlist.

plugins:
  - name: 'Foo.*\.esp'
    requirements:
      - name: Framework.esm
  - name: Tagged.esp
    tags:
      - name: Delev
    dirty_info:
      - crc: 3735928559
        utility: xEdit
  - name: Plain.esp
    load_after:
      - name: Tagged.esp
"#;

	const USERLIST: &str = r#"
groups:
  - name: late
    after: [user-early]
  - name: user-early

bash_tags:
  - Relev

globals:
  - type: warn
    content:
      - text: From the userlist.

plugins:
  - name: FooBar.esp
    messages:
      - type: say
        content:
          - text: Patched by the user.
"#;

	fn database() -> Database {
		let dir = tempfile::TempDir::new().unwrap();
		let masterlist_path = dir.path().join("masterlist.yaml");
		let userlist_path = dir.path().join("userlist.yaml");
		std::fs::write(&masterlist_path, MASTERLIST).unwrap();
		std::fs::write(&userlist_path, USERLIST).unwrap();

		let mut database = Database::new(Arc::new(ConditionEvaluator::parse_only(
			GameType::Skyrim,
		)));
		database
			.load_lists(Some(&masterlist_path), Some(&userlist_path))
			.unwrap();

		database
	}

	#[test]
	fn missing_list_paths_are_file_access_errors() {
		let mut database = Database::new(Arc::new(ConditionEvaluator::parse_only(
			GameType::Skyrim,
		)));

		let result = database.load_lists(Some(Path::new("/nonexistent/masterlist.yaml")), None);

		assert!(matches!(result, Err(AppError::FileAccess { .. })));
	}

	#[test]
	fn a_regex_masterlist_entry_and_an_exact_userlist_entry_both_apply() {
		let database = database();

		let metadata = database
			.plugin_metadata("FooBar.esp", true, false)
			.unwrap()
			.unwrap();

		assert_eq!(metadata.requirements.len(), 1);
		assert_eq!(metadata.requirements[0].name, "Framework.esm");
		assert_eq!(metadata.messages.len(), 1);
	}

	#[test]
	fn user_metadata_can_be_excluded() {
		let database = database();

		let metadata = database
			.plugin_metadata("FooBar.esp", false, false)
			.unwrap()
			.unwrap();

		assert_eq!(metadata.requirements.len(), 1);
		assert!(metadata.messages.is_empty());
	}

	#[test]
	fn unknown_plugins_have_no_metadata() {
		let database = database();

		assert!(database
			.plugin_metadata("Unknown.esp", true, false)
			.unwrap()
			.is_none());
	}

	#[test]
	fn merged_groups_union_after_sets_and_keep_the_default() {
		let database = database();

		let groups = database.groups(true);

		assert_eq!(
			groups["late"].after,
			IndexSet::from(["early".to_owned(), "user-early".to_owned()])
		);
		assert!(groups.contains_key(DEFAULT_GROUP_NAME));

		let masterlist_only = database.groups(false);
		assert_eq!(
			masterlist_only["late"].after,
			IndexSet::from(["early".to_owned()])
		);
	}

	#[test]
	fn known_bash_tags_are_unioned() {
		let database = database();

		assert_eq!(
			database.known_bash_tags(),
			IndexSet::from(["Delev".to_owned(), "Relev".to_owned()])
		);
	}

	#[test]
	fn general_messages_concatenate_masterlist_first() {
		let database = database();

		let messages = database.general_messages(false).unwrap();

		assert_eq!(messages.len(), 2);
		assert_eq!(messages[0].content[0].text, "From the masterlist.");
		assert_eq!(messages[1].content[0].text, "From the userlist.");
	}

	#[test]
	fn user_metadata_mutations_are_scoped_to_the_userlist() {
		let mut database = database();

		let mut metadata = PluginMetadata::new("Plain.esp");
		metadata.group = Some("late".to_owned());
		database.set_plugin_user_metadata(metadata).unwrap();

		let user = database
			.plugin_user_metadata("Plain.esp", false)
			.unwrap()
			.unwrap();
		assert_eq!(user.group.as_deref(), Some("late"));

		// The masterlist's own entry is untouched.
		let base = database
			.plugin_metadata("Plain.esp", false, false)
			.unwrap()
			.unwrap();
		assert!(base.group.is_none());

		database.discard_plugin_user_metadata("Plain.esp");
		assert!(database
			.plugin_user_metadata("Plain.esp", false)
			.unwrap()
			.is_none());
	}

	#[test]
	fn the_minimal_list_keeps_only_tagged_or_dirty_plugins() {
		let database = database();

		let dir = tempfile::TempDir::new().unwrap();
		let output = dir.path().join("taglist.yaml");
		database.write_minimal_list(&output, false).unwrap();

		let mut minimal = MetadataList::default();
		minimal.load(&output).unwrap();

		let names: Vec<_> = minimal.plugins().map(|p| p.name.clone()).collect();
		assert_eq!(names, vec!["Tagged.esp".to_owned()]);

		let entry = minimal.find_plugin("Tagged.esp").unwrap();
		assert_eq!(entry.tags.len(), 1);
		assert_eq!(entry.dirty_info.len(), 1);
		assert!(entry.load_after.is_empty());
	}

	#[test]
	fn outputs_require_an_existing_directory_and_respect_overwrite() {
		let database = database();

		let result = database.write_user_metadata(Path::new("/nonexistent/dir/userlist.yaml"), true);
		assert!(matches!(result, Err(AppError::InvalidArgument(_))));

		let dir = tempfile::TempDir::new().unwrap();
		let output = dir.path().join("userlist.yaml");

		database.write_user_metadata(&output, false).unwrap();
		let result = database.write_user_metadata(&output, false);
		assert!(matches!(result, Err(AppError::FileAccess { .. })));

		database.write_user_metadata(&output, true).unwrap();
	}

	#[test]
	fn updating_the_masterlist_reloads_it() {
		use crate::document::{MasterlistInfo, MasterlistRepo};

		/// A repository that "fetches" a fixed document.
		struct CannedRepo;

		impl MasterlistRepo for CannedRepo {
			fn update(
				&self,
				path: &Path,
				_remote_url: &str,
				_remote_branch: &str,
			) -> AppResult<bool> {
				std::fs::write(path, "bash_tags:\n  - Fetched\n")?;
				Ok(true)
			}

			fn info(&self, _path: &Path, short_id: bool) -> AppResult<MasterlistInfo> {
				Ok(MasterlistInfo {
					revision_id: match short_id {
						true => "abc1234".to_owned(),
						false => "abc1234abc1234abc1234abc1234abc1234abc12".to_owned(),
					},
					revision_date: "2024-01-01".to_owned(),
				})
			}

			fn is_latest(&self, _path: &Path, _remote_branch: &str) -> AppResult<bool> {
				Ok(true)
			}
		}

		let mut database = database();
		let dir = tempfile::TempDir::new().unwrap();
		let path = dir.path().join("masterlist.yaml");

		let changed = database
			.update_masterlist(&path, "https://example.test/masterlist", "main", &CannedRepo)
			.unwrap();

		assert!(changed);
		assert_eq!(
			database.known_bash_tags(),
			IndexSet::from(["Fetched".to_owned(), "Relev".to_owned()])
		);

		let info = database
			.masterlist_revision(&path, true, &CannedRepo)
			.unwrap();
		assert_eq!(info.revision_id, "abc1234");
		assert!(database
			.is_latest_masterlist(&path, "main", &CannedRepo)
			.unwrap());

		let missing_parent = Path::new("/nonexistent/dir/masterlist.yaml");
		let result =
			database.update_masterlist(missing_parent, "https://example.test", "main", &CannedRepo);
		assert!(matches!(result, Err(AppError::InvalidArgument(_))));
	}

	#[test]
	fn groups_path_crosses_masterlist_and_userlist_edges() {
		let database = database();

		let path = database.groups_path("user-early", "late").unwrap();

		assert_eq!(path.len(), 2);
		assert_eq!(path[0].name(), "user-early");
		assert_eq!(path[0].edge_type_to_next(), Some(EdgeType::UserLoadAfter));
		assert_eq!(path[1].name(), "late");
	}
}
