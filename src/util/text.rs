//! This module provides helpers for comparing and classifying plugin filenames.
//!
//! Game plugins are identified by filename without regard for case, so every
//! lookup in this crate goes through these functions rather than comparing
//! strings directly.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Case-folds a filename for use as a lookup key.
pub fn casefold(name: &str) -> String {
	name.to_lowercase()
}

/// Compares two filenames without regard for case.
pub fn compare_filenames(lhs: &str, rhs: &str) -> Ordering {
	casefold(lhs).cmp(&casefold(rhs))
}

/// Checks if two filenames refer to the same file, ignoring case.
pub fn filenames_equal(lhs: &str, rhs: &str) -> bool {
	compare_filenames(lhs, rhs) == Ordering::Equal
}

/// Checks if a filename carries one of the game plugin extensions.
/// A trailing '.ghost' extension is stripped before checking.
pub fn has_plugin_extension(name: &str) -> bool {
	let name = trim_ghost_extension(name);
	let lower = casefold(name);

	lower.ends_with(".esp") || lower.ends_with(".esm")
}

/// Checks if a string can only be a regex, not a real filename.
/// The tell is a character Windows forbids in filenames.
pub fn is_regex_like(name: &str) -> bool {
	name.contains([':', '\\', '*', '?', '|', '"', '<', '>'])
}

/// Appends the '.ghost' extension to a path.
pub fn ghosted(path: &Path) -> PathBuf {
	let mut ghost = path.as_os_str().to_owned();
	ghost.push(".ghost");

	PathBuf::from(ghost)
}

/// Strips a single trailing '.ghost' extension, if present.
pub fn trim_ghost_extension(name: &str) -> &str {
	let lower = casefold(name);

	match lower.ends_with(".ghost") {
		true => &name[..name.len() - ".ghost".len()],
		false => name,
	}
}
