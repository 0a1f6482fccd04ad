//! This module evaluates parsed conditions against live game state.
//!
//! Evaluation consults the shared game cache for plugin snapshots and
//! memoised results, the load-order adapter for activity queries, and the
//! filesystem for everything else. Without a cache and load-order adapter
//! the evaluator runs in parse-only mode: syntax is still checked, but
//! every predicate reports *false*.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::game::cache::GameCache;
use crate::game::plugin::{LoadOrderProvider, PluginReader};
use crate::game::version::Version;
use crate::prelude::*;
use crate::util::text;

use super::parser::{self, Comparator, Expr, PathRegex, Predicate};

/// The path literal that refers to the host application itself.
const HOST_PATH: &str = "LOOT";

/// Evaluates condition strings against one game's state.
pub struct ConditionEvaluator {
	game_type: GameType,
	data_path: PathBuf,
	cache: Option<Arc<GameCache>>,
	load_order: Option<Arc<dyn LoadOrderProvider>>,
	reader: Option<Arc<dyn PluginReader>>,
}

/// The adapters evaluation needs outside parse-only mode.
struct LiveState<'a> {
	cache: &'a GameCache,
	load_order: &'a dyn LoadOrderProvider,
	reader: &'a dyn PluginReader,
}

impl ConditionEvaluator {
	/// Builds an evaluator with no game attached.
	/// It validates condition syntax but evaluates every predicate to
	/// *false*, letting callers lint metadata without a live game.
	pub fn parse_only(game_type: GameType) -> Self {
		Self {
			game_type,
			data_path: PathBuf::new(),
			cache: None,
			load_order: None,
			reader: None,
		}
	}

	/// Builds an evaluator over live game state.
	pub fn with_game(
		game_type: GameType,
		data_path: impl AsRef<Path>,
		cache: Arc<GameCache>,
		load_order: Arc<dyn LoadOrderProvider>,
		reader: Arc<dyn PluginReader>,
	) -> Self {
		Self {
			game_type,
			data_path: data_path.as_ref().to_path_buf(),
			cache: Some(cache),
			load_order: Some(load_order),
			reader: Some(reader),
		}
	}

	fn live(&self) -> Option<LiveState<'_>> {
		Some(LiveState {
			cache: self.cache.as_deref()?,
			load_order: self.load_order.as_deref()?,
			reader: self.reader.as_deref()?,
		})
	}

	/// Evaluates a condition string.
	///
	/// The empty condition is *true*. Results are memoised in the game
	/// cache, so repeated evaluation is free until the cache is cleared.
	pub fn evaluate(&self, condition: &str) -> AppResult<bool> {
		if condition.is_empty() {
			return Ok(true);
		}

		let Some(live) = self.live() else {
			// Still check that the syntax is valid.
			parser::parse_condition(condition)?;
			return Ok(false);
		};

		trace!("Evaluating condition: {condition}");

		if let Some(cached) = live.cache.cached_condition(condition) {
			return Ok(cached);
		}

		let expr = parser::parse_condition(condition)?;
		let result = self.evaluate_expr(&live, &expr)?;

		live.cache.cache_condition(condition, result);

		Ok(result)
	}

	/// Checks whether a cleaning record applies to the named plugin, by
	/// comparing the record's CRC against the plugin's actual CRC.
	pub fn evaluate_cleaning(&self, data: &CleaningData, plugin_name: &str) -> AppResult<bool> {
		let Some(live) = self.live() else {
			return Ok(false);
		};

		if plugin_name.is_empty() {
			return Ok(false);
		}

		Ok(self.crc_of(&live, plugin_name)? == Some(data.crc))
	}

	/// Produces a copy of the given metadata with every condition-gated
	/// collection filtered down to the entries whose conditions hold.
	///
	/// Identity, group, enabled state and locations pass through unchanged.
	/// Dirty and clean info is only filtered for exact-name entries; a
	/// regex entry has no single CRC to compare against.
	pub fn evaluate_all(&self, metadata: &PluginMetadata) -> AppResult<PluginMetadata> {
		if self.live().is_none() {
			return Ok(metadata.clone());
		}

		let mut evaluated = PluginMetadata::new(&metadata.name);
		evaluated.enabled = metadata.enabled;
		evaluated.group = metadata.group.clone();
		evaluated.locations = metadata.locations.clone();

		evaluated.load_after = self.filter_files(&metadata.load_after)?;
		evaluated.requirements = self.filter_files(&metadata.requirements)?;
		evaluated.incompatibilities = self.filter_files(&metadata.incompatibilities)?;

		for message in &metadata.messages {
			if self.evaluate_opt(&message.condition)? {
				evaluated.messages.push(message.clone());
			}
		}

		for tag in &metadata.tags {
			if self.evaluate_opt(&tag.condition)? {
				evaluated.tags.push(tag.clone());
			}
		}

		if !metadata.is_regex_entry() {
			for info in &metadata.dirty_info {
				if self.evaluate_cleaning(info, &metadata.name)? {
					evaluated.dirty_info.push(info.clone());
				}
			}

			for info in &metadata.clean_info {
				if self.evaluate_cleaning(info, &metadata.name)? {
					evaluated.clean_info.push(info.clone());
				}
			}
		}

		Ok(evaluated)
	}

	/// Drops every memoised condition result and CRC.
	pub fn clear_condition_cache(&self) {
		if let Some(cache) = &self.cache {
			cache.clear_cached_conditions();
		}
	}

	/// Evaluates an optional condition; absence means *true*.
	fn evaluate_opt(&self, condition: &Option<String>) -> AppResult<bool> {
		match condition {
			Some(condition) => self.evaluate(condition),
			None => Ok(true),
		}
	}

	fn filter_files(&self, files: &[FileRef]) -> AppResult<Vec<FileRef>> {
		let mut kept = Vec::new();

		for file in files {
			if self.evaluate_opt(&file.condition)? {
				kept.push(file.clone());
			}
		}

		Ok(kept)
	}

	fn evaluate_expr(&self, live: &LiveState<'_>, expr: &Expr) -> AppResult<bool> {
		match expr {
			Expr::Or(terms) => {
				for term in terms {
					if self.evaluate_expr(live, term)? {
						return Ok(true);
					}
				}

				Ok(false)
			}

			Expr::And(terms) => {
				for term in terms {
					if !self.evaluate_expr(live, term)? {
						return Ok(false);
					}
				}

				Ok(true)
			}

			Expr::Not(term) => Ok(!self.evaluate_expr(live, term)?),

			Expr::Predicate(predicate) => self.evaluate_predicate(live, predicate),
		}
	}

	fn evaluate_predicate(&self, live: &LiveState<'_>, predicate: &Predicate) -> AppResult<bool> {
		match predicate {
			Predicate::FileExists(path) => Ok(self.file_exists(live, path)),

			Predicate::RegexMatchExists(path_regex) => {
				Ok(self.regex_match_in_data_dir(path_regex, |_| true))
			}

			Predicate::ManyMatchesExist(path_regex) => {
				Ok(self.many_matches_in_data_dir(path_regex, |_| true))
			}

			Predicate::PluginActive(name) => Ok(self.plugin_active(live, name)),

			Predicate::RegexPluginActive(path_regex) => Ok(self
				.regex_match_in_data_dir(path_regex, |name| live.load_order.is_plugin_active(name))),

			Predicate::ManyPluginsActive(path_regex) => Ok(self
				.many_matches_in_data_dir(path_regex, |name| live.load_order.is_plugin_active(name))),

			Predicate::ChecksumMatches { path, crc } => {
				Ok(self.crc_of(live, path)? == Some(*crc))
			}

			Predicate::VersionCompare {
				path,
				version,
				comparator,
			} => self.compare_versions(live, path, version, *comparator),
		}
	}

	fn file_exists(&self, live: &LiveState<'_>, path: &str) -> bool {
		if path == HOST_PATH {
			return true;
		}

		// Most file entries refer to plugins, so try the cache first.
		if live.cache.plugin(path).is_some() {
			return true;
		}

		let full_path = self.data_path.join(path);

		match text::has_plugin_extension(path) {
			true => full_path.exists() || text::ghosted(&full_path).exists(),
			false => full_path.exists(),
		}
	}

	fn plugin_active(&self, live: &LiveState<'_>, name: &str) -> bool {
		if name == HOST_PATH {
			return false;
		}

		live.load_order.is_plugin_active(name)
	}

	/// Checks if any filename in the scanned directory matches the regex
	/// and satisfies the extra predicate.
	fn regex_match_in_data_dir(
		&self,
		path_regex: &PathRegex,
		accept: impl Fn(&str) -> bool,
	) -> bool {
		self.data_dir_matches(path_regex)
			.any(|name| accept(&name))
	}

	/// Like *regex_match_in_data_dir*, but requires at least two matches.
	fn many_matches_in_data_dir(
		&self,
		path_regex: &PathRegex,
		accept: impl Fn(&str) -> bool,
	) -> bool {
		self.data_dir_matches(path_regex)
			.filter(|name| accept(name))
			.take(2)
			.count() == 2
	}

	/// Iterates the filenames in the regex's parent directory that match
	/// its pattern, in filename order.
	fn data_dir_matches(&self, path_regex: &PathRegex) -> impl Iterator<Item = String> + '_ {
		let directory = self.data_path.join(&path_regex.parent);

		if !directory.is_dir() {
			trace!("'{}' is not a game subdirectory.", directory.display());
		}

		let regex = path_regex.regex.clone();

		WalkDir::new(directory)
			.min_depth(1)
			.max_depth(1)
			.sort_by_file_name()
			.into_iter()
			.filter_map(|entry| entry.ok())
			.filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
			.filter(move |name| regex.is_match(name))
	}

	/// Retrieves a file's CRC32, consulting the caches before computing.
	fn crc_of(&self, live: &LiveState<'_>, file: &str) -> AppResult<Option<u32>> {
		if let Some(crc) = live.cache.cached_crc(file) {
			return Ok(Some(crc));
		}

		if file == HOST_PATH {
			let executable = std::env::current_exe()?;
			let crc = live.reader.crc32(&executable)?;
			live.cache.cache_crc(file, crc);
			return Ok(Some(crc));
		}

		let mut crc = live.cache.plugin(file).and_then(|plugin| plugin.crc());

		if crc.is_none() {
			let full_path = self.data_path.join(file);
			let ghost_path = text::ghosted(&full_path);

			if full_path.exists() {
				crc = Some(live.reader.crc32(&full_path)?);
			} else if text::has_plugin_extension(file) && ghost_path.exists() {
				crc = Some(live.reader.crc32(&ghost_path)?);
			}
		}

		if let Some(crc) = crc {
			live.cache.cache_crc(file, crc);
		}

		Ok(crc)
	}

	fn compare_versions(
		&self,
		live: &LiveState<'_>,
		path: &str,
		version: &str,
		comparator: Comparator,
	) -> AppResult<bool> {
		if !self.file_exists(live, path) {
			// An absent file has no version, which satisfies exactly the
			// comparisons an empty version would.
			return Ok(matches!(
				comparator,
				Comparator::NotEqual | Comparator::LessThan | Comparator::LessThanEqual
			));
		}

		let actual = self.version_of(live, path)?;
		let given = Version::from(version);

		trace!("Version extracted from '{path}': {actual}");

		Ok(comparator.accepts(actual.cmp(&given)))
	}

	/// Extracts the version of a file.
	///
	/// Plugins carry their version in their description field, so the
	/// cached snapshot is consulted first and an uncached plugin file is
	/// parsed header-only. Anything else falls back to the file's own
	/// metadata.
	fn version_of(&self, live: &LiveState<'_>, path: &str) -> AppResult<Version> {
		if path == HOST_PATH {
			return Ok(live
				.reader
				.host_version()
				.as_deref()
				.map(Version::from)
				.unwrap_or_default());
		}

		if let Some(plugin) = live.cache.plugin(path) {
			return Ok(plugin.version().map(Version::from).unwrap_or_default());
		}

		let full_path = self.data_path.join(path);

		if live.reader.is_valid(self.game_type, &full_path) {
			let plugin = live.reader.read(self.game_type, &full_path, true)?;
			return Ok(plugin.version().map(Version::from).unwrap_or_default());
		}

		Ok(live
			.reader
			.file_version(&full_path)
			.as_deref()
			.map(Version::from)
			.unwrap_or_default())
	}
}

