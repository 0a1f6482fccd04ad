//! This is the parent module for load-order computation: group resolution,
//! the per-sort plugin view, and the plugin sorter itself.

pub mod group_sort;
pub mod plugin_data;
pub mod sorter;

pub use group_sort::{groups_in_paths, groups_path, merge_groups, transitive_after_groups};
pub use plugin_data::PluginSortingData;
pub use sorter::PluginSorter;

use std::fmt::Display;

/// Why one plugin must load before another.
///
/// The tag is carried on every graph edge purely so that cycle reports can
/// tell the user which kind of constraint each step came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeType {
	/// The game engine forces the earlier plugin's position.
	Hardcoded,

	/// The earlier plugin is a master and the later one is not.
	MasterFlag,

	/// The later plugin lists the earlier one as a master.
	Master,

	/// A masterlist requirement entry.
	MasterlistRequirement,

	/// A userlist requirement entry.
	UserRequirement,

	/// A masterlist load-after entry.
	MasterlistLoadAfter,

	/// A userlist load-after entry.
	UserLoadAfter,

	/// A load-after relation between groups, used in the group graph.
	LoadAfter,

	/// The plugins' groups are ordered.
	Group,

	/// The plugins override overlapping records.
	Overlap,

	/// An arbitrary but stable edge that makes the order unique.
	TieBreak,
}

impl Display for EdgeType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let label = match self {
			EdgeType::Hardcoded => "Hardcoded",
			EdgeType::MasterFlag => "Master Flag",
			EdgeType::Master => "Master",
			EdgeType::MasterlistRequirement => "Masterlist Requirement",
			EdgeType::UserRequirement => "User Requirement",
			EdgeType::MasterlistLoadAfter => "Masterlist Load After",
			EdgeType::UserLoadAfter => "User Load After",
			EdgeType::LoadAfter => "Load After",
			EdgeType::Group => "Group",
			EdgeType::Overlap => "Overlap",
			EdgeType::TieBreak => "Tie Break",
		};

		write!(f, "{label}")
	}
}

/// One step of a path or cycle through a constraint graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vertex {
	name: String,
	out_edge: Option<EdgeType>,
}

impl Vertex {
	/// Builds a new vertex. The edge type is the type of the edge leading
	/// to the next vertex in the path, if there is one.
	pub fn new(name: impl Into<String>, out_edge: Option<EdgeType>) -> Self {
		Self {
			name: name.into(),
			out_edge,
		}
	}

	/// The plugin or group name at this step.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The type of the edge leading to the next vertex.
	pub fn edge_type_to_next(&self) -> Option<EdgeType> {
		self.out_edge
	}
}
