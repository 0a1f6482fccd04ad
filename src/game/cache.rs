//! This module provides the shared, mutex-protected cache of game state.
//!
//! The cache holds loaded plugin snapshots, memoised condition results,
//! file CRCs, and the paths of auxiliary archive files. It is the only
//! shared-state component in the crate; everything else is single-writer.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::game::plugin::Plugin;
use crate::util::text;

/// The shared store for loaded plugins, condition results, and file CRCs.
///
/// All four maps sit behind one mutex. Queries take the lock only for the
/// duration of the lookup; no caller-supplied code ever runs under it.
#[derive(Default)]
pub struct GameCache {
	inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
	plugins: HashMap<String, Arc<Plugin>>,
	conditions: HashMap<String, bool>,
	crcs: HashMap<String, u32>,
	archive_paths: BTreeSet<PathBuf>,
}

impl GameCache {
	/// Takes the lock. A poisoned lock only means another thread panicked
	/// mid-write; the map contents are still coherent, so recover the guard.
	fn lock(&self) -> MutexGuard<'_, CacheInner> {
		match self.inner.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}

	/// Stores a plugin snapshot, replacing any existing snapshot with the
	/// same case-folded name.
	pub fn add_plugin(&self, plugin: Plugin) {
		let key = text::casefold(plugin.name());
		self.lock().plugins.insert(key, Arc::new(plugin));
	}

	/// Retrieves the named plugin's snapshot, if it is loaded.
	pub fn plugin(&self, plugin_name: &str) -> Option<Arc<Plugin>> {
		self.lock().plugins.get(&text::casefold(plugin_name)).cloned()
	}

	/// Returns every loaded plugin, ordered by case-folded name so that
	/// callers iterate deterministically.
	pub fn plugins(&self) -> Vec<Arc<Plugin>> {
		let inner = self.lock();

		let mut plugins: Vec<_> = inner.plugins.values().cloned().collect();
		drop(inner);

		plugins.sort_by(|a, b| text::compare_filenames(a.name(), b.name()));
		plugins
	}

	/// Memoises the result of evaluating a condition string.
	pub fn cache_condition(&self, condition: &str, result: bool) {
		self.lock().conditions.insert(condition.to_owned(), result);
	}

	/// Looks up a memoised condition result. *None* means the condition has
	/// not been evaluated since the last cache clear.
	pub fn cached_condition(&self, condition: &str) -> Option<bool> {
		self.lock().conditions.get(condition).copied()
	}

	/// Memoises a file's CRC32 under its case-folded name.
	pub fn cache_crc(&self, file: &str, crc: u32) {
		self.lock().crcs.insert(text::casefold(file), crc);
	}

	/// Looks up a memoised CRC32.
	pub fn cached_crc(&self, file: &str) -> Option<u32> {
		self.lock().crcs.get(&text::casefold(file)).copied()
	}

	/// Records the path of an auxiliary archive file.
	pub fn cache_archive_path(&self, path: impl Into<PathBuf>) {
		self.lock().archive_paths.insert(path.into());
	}

	/// Returns every recorded archive path, in sorted order.
	pub fn archive_paths(&self) -> Vec<PathBuf> {
		self.lock().archive_paths.iter().cloned().collect()
	}

	/// Checks if an archive path has been recorded.
	pub fn has_archive_path(&self, path: &Path) -> bool {
		self.lock().archive_paths.contains(path)
	}

	/// Drops all memoised condition results and CRCs. Both derive from
	/// filesystem state that may change together, so they clear together.
	pub fn clear_cached_conditions(&self) {
		let mut inner = self.lock();

		inner.conditions.clear();
		inner.crcs.clear();
	}

	/// Drops all loaded plugin snapshots.
	pub fn clear_cached_plugins(&self) {
		self.lock().plugins.clear();
	}

	/// Drops all recorded archive paths.
	pub fn clear_cached_archive_paths(&self) {
		self.lock().archive_paths.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn plugins_are_keyed_and_replaced_by_case_folded_name() {
		let cache = GameCache::default();

		cache.add_plugin(Plugin::new("Skyrim.esm").with_crc(1));
		cache.add_plugin(Plugin::new("SKYRIM.ESM").with_crc(2));

		let plugin = cache.plugin("skyrim.esm").unwrap();
		assert_eq!(plugin.crc(), Some(2));
		assert_eq!(cache.plugins().len(), 1);
	}

	#[test]
	fn plugin_listing_is_sorted_by_name() {
		let cache = GameCache::default();

		cache.add_plugin(Plugin::new("b.esp"));
		cache.add_plugin(Plugin::new("A.esp"));
		cache.add_plugin(Plugin::new("c.esp"));

		let names: Vec<_> = cache.plugins().iter().map(|p| p.name().to_owned()).collect();
		assert_eq!(names, vec!["A.esp", "b.esp", "c.esp"]);
	}

	#[test]
	fn condition_cache_misses_are_none() {
		let cache = GameCache::default();

		assert_eq!(cache.cached_condition("file(\"a.esp\")"), None);

		cache.cache_condition("file(\"a.esp\")", false);
		assert_eq!(cache.cached_condition("file(\"a.esp\")"), Some(false));
	}

	#[test]
	fn clearing_conditions_also_clears_crcs() {
		let cache = GameCache::default();

		cache.cache_condition("file(\"a.esp\")", true);
		cache.cache_crc("a.esp", 0xDEADBEEF);

		cache.clear_cached_conditions();

		assert_eq!(cache.cached_condition("file(\"a.esp\")"), None);
		assert_eq!(cache.cached_crc("a.esp"), None);
	}

	#[test]
	fn archive_paths_are_recorded_until_cleared() {
		let cache = GameCache::default();

		cache.cache_archive_path("/data/textures.bsa");
		cache.cache_archive_path("/data/meshes.bsa");
		cache.cache_archive_path("/data/textures.bsa");

		assert_eq!(cache.archive_paths().len(), 2);
		assert!(cache.has_archive_path(Path::new("/data/meshes.bsa")));

		cache.clear_cached_archive_paths();
		assert!(cache.archive_paths().is_empty());
	}

	#[test]
	fn a_zero_crc_round_trips() {
		let cache = GameCache::default();

		cache.cache_crc("empty.esp", 0);
		assert_eq!(cache.cached_crc("EMPTY.esp"), Some(0));
	}
}
