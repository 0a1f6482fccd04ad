//! This module defines ordering groups.
//!
//! A group is a named bucket plugins can be assigned to through their
//! metadata. Groups load after other groups, and plugins inherit the
//! transitive closure of that relation.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// The name of the implicit default group.
/// Plugins without explicit group metadata belong to it.
pub const DEFAULT_GROUP_NAME: &str = "";

/// A named ordering bucket with a set of groups it loads after.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
	/// The group's name. The empty name denotes the default group.
	#[serde(default)]
	pub name: String,

	/// The names of the groups this group loads after.
	#[serde(default, skip_serializing_if = "IndexSet::is_empty")]
	pub after: IndexSet<String>,
}

impl Group {
	/// Builds a new group with no after-groups.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			after: IndexSet::new(),
		}
	}

	/// Builds a new group that loads after the given groups.
	pub fn with_after<I, S>(name: impl Into<String>, after: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			name: name.into(),
			after: after.into_iter().map(Into::into).collect(),
		}
	}

	/// Returns *true* if this is the implicit default group.
	pub fn is_default(&self) -> bool {
		self.name == DEFAULT_GROUP_NAME
	}
}
