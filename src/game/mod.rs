//! This is the parent module for game-facing state: the supported game types,
//! the shared plugin cache, plugin snapshots, and the live *Game* handle a
//! sort runs against.

pub mod cache;
pub mod plugin;
pub mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::condition::ConditionEvaluator;
use crate::database::Database;
use crate::prelude::*;

use self::cache::GameCache;
use self::plugin::{LoadOrderProvider, PluginReader};

/// The games this crate can sort plugins for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
	/// The Elder Scrolls IV: Oblivion.
	Oblivion,

	/// The Elder Scrolls V: Skyrim.
	Skyrim,

	/// Fallout 3.
	Fallout3,

	/// Fallout: New Vegas.
	FalloutNV,
}

/// A handle over one game installation's live state.
///
/// This owns the shared plugin cache and the metadata database, and borrows
/// the load-order and plugin-reading adapters the host application provides.
pub struct Game {
	game_type: GameType,
	data_path: PathBuf,
	cache: Arc<GameCache>,
	load_order: Arc<dyn LoadOrderProvider>,
	reader: Arc<dyn PluginReader>,
	database: Database,
}

impl Game {
	/// Builds a new game handle around the provided adapters.
	pub fn new(
		game_type: GameType,
		data_path: impl Into<PathBuf>,
		load_order: Arc<dyn LoadOrderProvider>,
		reader: Arc<dyn PluginReader>,
	) -> Self {
		let data_path = data_path.into();
		let cache = Arc::new(GameCache::default());

		let evaluator = Arc::new(ConditionEvaluator::with_game(
			game_type,
			&data_path,
			cache.clone(),
			load_order.clone(),
			reader.clone(),
		));

		Self {
			game_type,
			data_path,
			cache,
			load_order,
			reader,
			database: Database::new(evaluator),
		}
	}

	/// The game this handle is for.
	pub fn game_type(&self) -> GameType {
		self.game_type
	}

	/// The game's plugin data directory.
	pub fn data_path(&self) -> &Path {
		&self.data_path
	}

	/// The shared plugin cache.
	pub fn cache(&self) -> &Arc<GameCache> {
		&self.cache
	}

	/// The load-order adapter.
	pub fn load_order(&self) -> &Arc<dyn LoadOrderProvider> {
		&self.load_order
	}

	/// The metadata database.
	pub fn database(&self) -> &Database {
		&self.database
	}

	/// The metadata database, mutably.
	pub fn database_mut(&mut self) -> &mut Database {
		&mut self.database
	}

	/// Parses the given plugin files and deposits their snapshots in the
	/// cache. Files that fail to parse are logged and skipped so one broken
	/// plugin does not abort loading the rest.
	pub fn load_plugins(&self, plugin_paths: &[PathBuf], header_only: bool) {
		for path in plugin_paths {
			if !self.reader.is_valid(self.game_type, path) {
				warn!("Skipping '{}': not a valid plugin file.", path.display());
				continue;
			}

			match self.reader.read(self.game_type, path, header_only) {
				Ok(plugin) => {
					trace!("Loaded plugin '{}'.", plugin.name());
					self.cache.add_plugin(plugin);
				}
				Err(error) => {
					warn!("Failed to load '{}': {error}", path.display());
				}
			}
		}
	}

	/// Computes a load order for every plugin currently in the cache.
	pub fn sort_plugins(&self) -> AppResult<Vec<String>> {
		crate::sorting::PluginSorter::new().sort(self)
	}
}
