//! This module defines dirty- and clean-plugin records.
//!
//! Each record describes one specific build of a plugin, identified by CRC,
//! and either reports what a cleaning utility found in it or vouches that
//! that build is already clean.

use serde::{Deserialize, Serialize};

/// Cleaning data for one specific build of a plugin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningData {
	/// The CRC32 of the plugin build this record applies to.
	pub crc: u32,

	/// The number of identical-to-master records found.
	#[serde(default)]
	pub itm_count: u32,

	/// The number of deleted references found.
	#[serde(default)]
	pub deleted_references: u32,

	/// The number of deleted navmeshes found.
	#[serde(default)]
	pub deleted_navmeshes: u32,

	/// The name of the utility the record was produced with.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub utility: String,

	/// Freeform detail about the record.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub info: String,
}

impl CleaningData {
	/// Builds a new record for the given plugin build.
	pub fn new(crc: u32, utility: impl Into<String>) -> Self {
		Self {
			crc,
			utility: utility.into(),
			..Default::default()
		}
	}
}
