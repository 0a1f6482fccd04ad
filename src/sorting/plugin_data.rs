//! This module defines the per-plugin view a sort run works on.

use std::sync::Arc;

use crate::game::plugin::Plugin;
use crate::prelude::*;
use crate::structs::group::DEFAULT_GROUP_NAME;
use crate::util::text;

/// Everything the sorter needs to know about one plugin, snapshotted at
/// the start of a sort run.
///
/// The masterlist and userlist contributions are kept separate so that
/// graph edges can carry the provenance of each constraint.
#[derive(Clone, Debug)]
pub struct PluginSortingData {
	plugin: Arc<Plugin>,
	group: String,
	masterlist_load_after: Vec<String>,
	user_load_after: Vec<String>,
	masterlist_requirements: Vec<String>,
	user_requirements: Vec<String>,
	after_group_plugins: IndexSet<String>,
	load_order_index: Option<usize>,
}

impl PluginSortingData {
	/// Builds the sorting view of a plugin from its snapshot, its merged
	/// masterlist metadata, its userlist metadata, and the current load
	/// order.
	pub fn new(
		plugin: Arc<Plugin>,
		masterlist_metadata: &PluginMetadata,
		user_metadata: &PluginMetadata,
		load_order: &[String],
	) -> Self {
		let group = user_metadata
			.group
			.clone()
			.or_else(|| masterlist_metadata.group.clone())
			.unwrap_or_else(|| DEFAULT_GROUP_NAME.to_owned());

		let load_order_index = load_order
			.iter()
			.position(|name| text::filenames_equal(name, plugin.name()));

		Self {
			group,
			masterlist_load_after: file_names(&masterlist_metadata.load_after),
			user_load_after: file_names(&user_metadata.load_after),
			masterlist_requirements: file_names(&masterlist_metadata.requirements),
			user_requirements: file_names(&user_metadata.requirements),
			after_group_plugins: IndexSet::new(),
			load_order_index,
			plugin,
		}
	}

	/// The plugin's filename.
	pub fn name(&self) -> &str {
		self.plugin.name()
	}

	/// Whether the plugin's header flags it as a master.
	pub fn is_master(&self) -> bool {
		self.plugin.is_master()
	}

	/// The masters the plugin declares.
	pub fn masters(&self) -> &[String] {
		self.plugin.masters()
	}

	/// How many records the plugin overrides.
	pub fn count_override_form_ids(&self) -> usize {
		self.plugin.count_override_form_ids()
	}

	/// Checks if this plugin and another override any record in common.
	pub fn do_form_ids_overlap(&self, other: &PluginSortingData) -> bool {
		self.plugin.do_form_ids_overlap(&other.plugin)
	}

	/// The name of the group the plugin belongs to.
	pub fn group(&self) -> &str {
		&self.group
	}

	/// The plugins this one must load after because of its group.
	pub fn after_group_plugins(&self) -> &IndexSet<String> {
		&self.after_group_plugins
	}

	/// Sets the plugins this one must load after because of its group.
	pub fn set_after_group_plugins(&mut self, plugins: IndexSet<String>) {
		self.after_group_plugins = plugins;
	}

	/// Files the masterlist says this plugin loads after.
	pub fn masterlist_load_after(&self) -> &[String] {
		&self.masterlist_load_after
	}

	/// Files the userlist says this plugin loads after.
	pub fn user_load_after(&self) -> &[String] {
		&self.user_load_after
	}

	/// Files the masterlist says this plugin requires.
	pub fn masterlist_requirements(&self) -> &[String] {
		&self.masterlist_requirements
	}

	/// Files the userlist says this plugin requires.
	pub fn user_requirements(&self) -> &[String] {
		&self.user_requirements
	}

	/// The plugin's position in the current load order, if it has one.
	pub fn load_order_index(&self) -> Option<usize> {
		self.load_order_index
	}
}

fn file_names(files: &[FileRef]) -> Vec<String> {
	files.iter().map(|file| file.name.clone()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn the_user_group_wins_over_the_masterlist_group() {
		let plugin = Arc::new(Plugin::new("a.esp"));

		let mut masterlist = PluginMetadata::new("a.esp");
		masterlist.group = Some("from masterlist".to_owned());
		let mut userlist = PluginMetadata::new("a.esp");
		userlist.group = Some("from userlist".to_owned());

		let data = PluginSortingData::new(plugin.clone(), &masterlist, &userlist, &[]);
		assert_eq!(data.group(), "from userlist");

		let data =
			PluginSortingData::new(plugin, &masterlist, &PluginMetadata::new("a.esp"), &[]);
		assert_eq!(data.group(), "from masterlist");
	}

	#[test]
	fn plugins_without_group_metadata_land_in_the_default_group() {
		let data = PluginSortingData::new(
			Arc::new(Plugin::new("a.esp")),
			&PluginMetadata::new("a.esp"),
			&PluginMetadata::new("a.esp"),
			&[],
		);

		assert_eq!(data.group(), DEFAULT_GROUP_NAME);
	}

	#[test]
	fn the_load_order_index_is_found_case_insensitively() {
		let load_order = vec!["Skyrim.esm".to_owned(), "other.esp".to_owned()];

		let data = PluginSortingData::new(
			Arc::new(Plugin::new("OTHER.esp")),
			&PluginMetadata::new("OTHER.esp"),
			&PluginMetadata::new("OTHER.esp"),
			&load_order,
		);

		assert_eq!(data.load_order_index(), Some(1));

		let missing = PluginSortingData::new(
			Arc::new(Plugin::new("unindexed.esp")),
			&PluginMetadata::new("unindexed.esp"),
			&PluginMetadata::new("unindexed.esp"),
			&load_order,
		);

		assert_eq!(missing.load_order_index(), None);
	}
}
