//! This module re-exports a bunch of utilities used across this crate.

#![allow(unused_imports)]

pub use tap::prelude::*;

pub use indexmap::{IndexMap, IndexSet};
pub use itertools::Itertools;
pub use thiserror::Error;

pub use log::debug;
pub use log::error;
pub use log::info;
pub use log::trace;
pub use log::warn;

pub use crate::structs::error::{AppError, AppResult, ConditionError, MetadataError, SortError};

pub use crate::structs::cleaning::CleaningData;
pub use crate::structs::file::{FileRef, Location};
pub use crate::structs::group::Group;
pub use crate::structs::message::{Message, MessageContent, MessageType};
pub use crate::structs::metadata::PluginMetadata;
pub use crate::structs::tag::Tag;

pub use crate::game::GameType;
pub use crate::sorting::{EdgeType, Vertex};
pub use crate::util::text;
