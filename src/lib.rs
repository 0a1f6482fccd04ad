//! Loadstone is a load-order optimisation engine for Bethesda-style games
//! (Oblivion, Skyrim, Fallout 3 and Fallout: New Vegas).
//!
//! Given the installed plugins and two metadata documents, a
//! community-curated masterlist and a user-specific userlist, it computes a
//! deterministic, conflict-free total ordering of the plugins, or fails
//! with a precise diagnosis when the declared constraints are inconsistent.
//!
//! The crate is a library with no I/O of its own beyond reading the game's
//! data directory: plugin parsing, CRC computation, load-order access and
//! masterlist synchronisation are all supplied by the host application
//! through the adapter traits in [`game::plugin`] and [`document`].

mod prelude;


pub mod condition;
pub mod database;
pub mod document;
pub mod game;
pub mod sorting;
pub mod structs;
pub mod util;

pub use condition::ConditionEvaluator;
pub use database::Database;
pub use document::{Masterlist, MasterlistInfo, MasterlistRepo, MetadataList};
pub use game::cache::GameCache;
pub use game::plugin::{FormId, LoadOrderProvider, Plugin, PluginReader};
pub use game::version::Version;
pub use game::{Game, GameType};
pub use sorting::{EdgeType, PluginSorter, Vertex};
pub use structs::cleaning::CleaningData;
pub use structs::error::{AppError, AppResult, ConditionError, MetadataError, SortError};
pub use structs::file::{FileRef, Location};
pub use structs::group::{Group, DEFAULT_GROUP_NAME};
pub use structs::message::{Message, MessageContent, MessageType};
pub use structs::metadata::PluginMetadata;
pub use structs::tag::Tag;
