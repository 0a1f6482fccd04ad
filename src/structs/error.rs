//! This module contains the errors used all over this codebase.

use std::{io, path::PathBuf};

use crate::prelude::*;
use crate::sorting::Vertex;

/// Convenience wrapper around *Result<T, AppError>*.
pub type AppResult<T> = Result<T, AppError>;

/// Error returned by several functions in this crate.
#[derive(Error, Debug)]
pub enum AppError {
	/// Error returned by failing IO operations.
	/// Most of these will occur during filesystem interactions.
	#[error(transparent)]
	Io(#[from] io::Error),

	/// Error returned when failing to (de)serialize a metadata document.
	#[error(transparent)]
	Yaml(#[from] serde_yaml::Error),

	/// A file could not be read or written.
	#[error("Failed to access '{}': {reason}", .path.display())]
	FileAccess {
		/// The path that could not be accessed.
		path: PathBuf,

		/// Why the access failed.
		reason: String,
	},

	/// A malformed argument was passed at the API boundary.
	#[error("{0}")]
	InvalidArgument(String),

	/// Error returned by failing metadata document operations.
	#[error(transparent)]
	Metadata(#[from] MetadataError),

	/// Error returned while parsing or evaluating a condition string.
	#[error(transparent)]
	Condition(#[from] ConditionError),

	/// Error returned while resolving groups or sorting plugins.
	#[error(transparent)]
	Sort(#[from] SortError),

	/// Error converted from any error that does not have a matching *AppError* variant.
	#[error(transparent)]
	Unknown(#[from] anyhow::Error),
}

/// An error returned by failed operations on a metadata document.
#[derive(Error, Debug)]
pub enum MetadataError {
	/// An exact-name plugin entry with this name already exists in the document.
	#[error("An entry for '{0}' already exists in this document.")]
	DuplicateEntry(String),

	/// A regex-keyed plugin entry does not hold a valid pattern.
	#[error("The plugin entry '{pattern}' is not a valid regular expression: {reason}")]
	InvalidRegex {
		/// The offending pattern.
		pattern: String,

		/// The regex engine's complaint.
		reason: String,
	},
}

/// An error returned when a condition string cannot be parsed.
#[derive(Error, Debug)]
pub enum ConditionError {
	/// The condition text does not match the expected grammar.
	#[error("Failed to parse condition \"{text}\": {diagnostic}")]
	Syntax {
		/// The condition source text, or the offending part of it.
		text: String,

		/// What went wrong.
		diagnostic: String,
	},
}

/// An error returned by the group resolver or the plugin sorter.
#[derive(Error, Debug)]
pub enum SortError {
	/// A plugin or group refers to a group that is not defined anywhere.
	#[error("The group \"{0}\" does not exist.")]
	UndefinedGroup(String),

	/// The declared constraints contain a cycle.
	/// The payload holds the vertices on the cycle in order, each annotated
	/// with the type of the edge leading to the next vertex.
	#[error("Cyclic interaction detected: {}", describe_cycle(.0))]
	CyclicInteraction(Vec<Vertex>),
}

/// Renders a cycle as "a --[Load After]-> b --[Master]-> a" for error messages.
fn describe_cycle(cycle: &[Vertex]) -> String {
	let mut out = String::new();

	for vertex in cycle {
		out.push_str(vertex.name());
		if let Some(edge) = vertex.edge_type_to_next() {
			out.push_str(&format!(" --[{edge}]-> "));
		}
	}

	if let Some(first) = cycle.first() {
		out.push_str(first.name());
	}

	out
}
