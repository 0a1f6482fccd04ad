//! This module computes a total load order over the loaded plugins.
//!
//! The sorter builds a directed graph whose vertices are per-plugin
//! sorting views and whose edges mean "must load before". Edges are added
//! in strict phases: specific relationships first, then the game's
//! hardcoded positions, then group-derived ordering, then record-overlap
//! heuristics, and finally tie-break edges that make the order unique.
//! Later phases skip any edge that would contradict the earlier ones.

use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;

use crate::game::Game;
use crate::prelude::*;
use crate::sorting::{group_sort, PluginSortingData};
use crate::structs::group::DEFAULT_GROUP_NAME;
use crate::util::text;

type PluginGraph = StableDiGraph<PluginSortingData, EdgeType>;

/// Builds the plugin graph for one sort run and topologically orders it.
#[derive(Default)]
pub struct PluginSorter {
	graph: PluginGraph,
	paths_cache: HashSet<(NodeIndex, NodeIndex)>,
	groups: IndexMap<String, Group>,
}

impl PluginSorter {
	/// Builds a new, empty sorter.
	pub fn new() -> Self {
		Self::default()
	}

	/// Computes a load order for every plugin in the game's cache.
	pub fn sort(&mut self, game: &Game) -> AppResult<Vec<String>> {
		self.graph.clear();
		self.paths_cache.clear();
		self.groups.clear();

		self.add_plugin_vertices(game)?;

		// Sorting assumes there is at least one plugin.
		if self.graph.node_count() == 0 {
			return Ok(Vec::new());
		}

		info!("Current load order:");
		for plugin in game.load_order().load_order() {
			info!("\t{plugin}");
		}

		self.add_specific_edges();
		self.add_hardcoded_edges(game);
		self.add_group_edges();
		self.add_overlap_edges();
		self.add_tie_break_edges();

		trace!("Performing topological sort on the plugin graph...");
		let sorted = self.topological_order()?;

		// The order is only unique if consecutive plugins are linked.
		trace!("Checking uniqueness of the calculated load order...");
		for (first, second) in sorted.iter().tuple_windows() {
			if self.graph.find_edge(*first, *second).is_none() {
				warn!(
					"The calculated load order is not unique. No edge exists between {} and {}.",
					self.graph[*first].name(),
					self.graph[*second].name()
				);
			}
		}

		let plugins = sorted
			.iter()
			.map(|vertex| self.graph[*vertex].name().to_owned())
			.collect_vec();

		info!("Calculated order:");
		for plugin in &plugins {
			info!("\t{plugin}");
		}

		Ok(plugins)
	}

	/// Adds one vertex per cached plugin and resolves group membership.
	///
	/// Plugins are taken from the cache in case-folded name order. Vertex
	/// insertion order feeds the pairwise scans and the tie-break phase,
	/// so it must be stable across runs and platforms.
	fn add_plugin_vertices(&mut self, game: &Game) -> AppResult<()> {
		let load_order = game.load_order().load_order();
		let mut group_plugins: IndexMap<String, Vec<String>> = IndexMap::new();

		for plugin in game.cache().plugins() {
			let masterlist_metadata = game
				.database()
				.plugin_metadata(plugin.name(), false, true)?
				.unwrap_or_else(|| PluginMetadata::new(plugin.name()));

			let user_metadata = game
				.database()
				.plugin_user_metadata(plugin.name(), true)?
				.unwrap_or_else(|| PluginMetadata::new(plugin.name()));

			let data = PluginSortingData::new(
				plugin.clone(),
				&masterlist_metadata,
				&user_metadata,
				&load_order,
			);

			group_plugins
				.entry(data.group().to_owned())
				.or_default()
				.push(data.name().to_owned());

			self.graph.add_node(data);
		}

		let masterlist_groups = game.database().masterlist_groups();
		let user_groups = game.database().user_groups();

		self.groups = group_sort::merge_groups(&masterlist_groups, &user_groups);

		// Map each group's transitive after-groups to the plugins that
		// belong to those groups.
		let closures = group_sort::transitive_after_groups(&masterlist_groups, &user_groups)?;

		let mut after_plugins: IndexMap<String, IndexSet<String>> = IndexMap::new();
		for (group_name, after_groups) in &closures {
			let mut transitive = IndexSet::new();
			for after_group in after_groups {
				if let Some(members) = group_plugins.get(after_group) {
					transitive.extend(members.iter().cloned());
				}
			}

			after_plugins.insert(group_name.clone(), transitive);
		}

		for vertex in self.graph.node_indices().collect_vec() {
			let group = self.graph[vertex].group().to_owned();
			trace!(
				"Plugin \"{}\" belongs to group \"{}\", setting after-group plugins.",
				self.graph[vertex].name(),
				group
			);

			match after_plugins.get(&group) {
				Some(plugins) => {
					let plugins = plugins.clone();
					self.graph[vertex].set_after_group_plugins(plugins);
				}
				None => return Err(SortError::UndefinedGroup(group).into()),
			}
		}

		Ok(())
	}

	fn vertex_by_name(&self, name: &str) -> Option<NodeIndex> {
		self.graph
			.node_indices()
			.find(|&vertex| text::filenames_equal(self.graph[vertex].name(), name))
	}

	/// Adds an edge unless the two vertices are already known to be
	/// connected in that direction.
	fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge_type: EdgeType) {
		if self.paths_cache.contains(&(from, to)) {
			return;
		}

		trace!(
			"Adding {} edge from \"{}\" to \"{}\".",
			edge_type,
			self.graph[from].name(),
			self.graph[to].name()
		);

		self.graph.add_edge(from, to, edge_type);
		self.paths_cache.insert((from, to));
	}

	/// Checks whether adding `from -> to` would close a cycle, using a
	/// bidirectional breadth-first search over the existing edges. Any
	/// reachability discovered along the way is deposited in the paths
	/// cache, which must never shrink while the graph exists.
	fn edge_creates_cycle(&mut self, from: NodeIndex, to: NodeIndex) -> bool {
		if self.paths_cache.contains(&(to, from)) {
			return true;
		}

		let start = to;
		let end = from;

		let mut forward_queue = VecDeque::from([start]);
		let mut reverse_queue = VecDeque::from([end]);
		let mut forward_visited = HashSet::from([start]);
		let mut reverse_visited = HashSet::from([end]);

		while !forward_queue.is_empty() && !reverse_queue.is_empty() {
			if let Some(vertex) = forward_queue.pop_front() {
				if vertex == end || reverse_visited.contains(&vertex) {
					return true;
				}

				for adjacent in self.graph.neighbors_directed(vertex, Direction::Outgoing) {
					if forward_visited.insert(adjacent) {
						self.paths_cache.insert((start, adjacent));
						forward_queue.push_back(adjacent);
					}
				}
			}

			if let Some(vertex) = reverse_queue.pop_front() {
				if vertex == start || forward_visited.contains(&vertex) {
					return true;
				}

				for adjacent in self.graph.neighbors_directed(vertex, Direction::Incoming) {
					if reverse_visited.insert(adjacent) {
						self.paths_cache.insert((adjacent, end));
						reverse_queue.push_back(adjacent);
					}
				}
			}
		}

		false
	}

	/// Phase 2: master-flag, master, requirement and load-after edges.
	fn add_specific_edges(&mut self) {
		let vertices = self.graph.node_indices().collect_vec();

		for (position, &vertex) in vertices.iter().enumerate() {
			for &other in &vertices[position..] {
				if self.graph[vertex].is_master() == self.graph[other].is_master() {
					continue;
				}

				let (parent, child) = match self.graph[other].is_master() {
					true => (other, vertex),
					false => (vertex, other),
				};

				self.add_edge(parent, child, EdgeType::MasterFlag);
			}

			for master in self.graph[vertex].masters().to_vec() {
				if let Some(parent) = self.vertex_by_name(&master) {
					self.add_edge(parent, vertex, EdgeType::Master);
				}
			}

			for file in self.graph[vertex].masterlist_requirements().to_vec() {
				if let Some(parent) = self.vertex_by_name(&file) {
					self.add_edge(parent, vertex, EdgeType::MasterlistRequirement);
				}
			}

			for file in self.graph[vertex].user_requirements().to_vec() {
				if let Some(parent) = self.vertex_by_name(&file) {
					self.add_edge(parent, vertex, EdgeType::UserRequirement);
				}
			}

			for file in self.graph[vertex].masterlist_load_after().to_vec() {
				if let Some(parent) = self.vertex_by_name(&file) {
					self.add_edge(parent, vertex, EdgeType::MasterlistLoadAfter);
				}
			}

			for file in self.graph[vertex].user_load_after().to_vec() {
				if let Some(parent) = self.vertex_by_name(&file) {
					self.add_edge(parent, vertex, EdgeType::UserLoadAfter);
				}
			}
		}
	}

	/// Phase 3: edges out of the game's implicitly-active plugins.
	///
	/// Skyrim's Update.esm appears in the implicitly-active list but has
	/// no hardcoded position, so it never gets hardcoded edges.
	fn add_hardcoded_edges(&mut self, game: &Game) {
		let implicitly_active = game.load_order().implicitly_active_plugins();

		let mut processed_paths: HashSet<PathBuf> = HashSet::new();
		for plugin in implicitly_active {
			let plugin_path = game.data_path().join(&plugin);

			match plugin_path.canonicalize() {
				Ok(canonical) => {
					processed_paths.insert(canonical);
				}
				Err(error) => {
					trace!(
						"Skipping hardcoded edges for \"{plugin}\": its canonical path could not \
						 be determined: {error}"
					);
					continue;
				}
			}

			if game.game_type() == GameType::Skyrim
				&& text::filenames_equal(&plugin, "Update.esm")
			{
				trace!("Skipping hardcoded edges for Update.esm.");
				continue;
			}

			let Some(plugin_vertex) = self.vertex_by_name(&plugin) else {
				trace!("Skipping hardcoded edges for \"{plugin}\": it has not been loaded.");
				continue;
			};

			for vertex in self.graph.node_indices().collect_vec() {
				let mut graph_plugin_path = game.data_path().join(self.graph[vertex].name());
				if !graph_plugin_path.exists() {
					graph_plugin_path = text::ghosted(&graph_plugin_path);
				}

				if !graph_plugin_path.exists() {
					continue;
				}

				let Ok(canonical) = graph_plugin_path.canonicalize() else {
					continue;
				};

				if !processed_paths.contains(&canonical) {
					self.add_edge(plugin_vertex, vertex, EdgeType::Hardcoded);
				}
			}
		}
	}

	/// Phase 4: group-derived edges, skipping any that would close a cycle.
	///
	/// The scan runs in two passes. The first pass queues cycle-free edges
	/// and, for each skipped edge involving a default-group plugin,
	/// records that plugin against every group on the paths between the
	/// two groups involved. The second pass adds the queued edges unless
	/// the ignore map mutes them, so a skip decision also mutes earlier
	/// queued edges that would now form a multi-group cycle.
	fn add_group_edges(&mut self) {
		let mut acyclic_edge_pairs: Vec<(NodeIndex, NodeIndex)> = Vec::new();
		let mut plugins_to_ignore: IndexMap<String, IndexSet<String>> = IndexMap::new();

		for vertex in self.graph.node_indices().collect_vec() {
			for plugin_name in self.graph[vertex].after_group_plugins().iter().cloned().collect_vec()
			{
				let Some(parent_vertex) = self.vertex_by_name(&plugin_name) else {
					continue;
				};

				if !self.edge_creates_cycle(parent_vertex, vertex) {
					acyclic_edge_pairs.push((parent_vertex, vertex));
					continue;
				}

				let from_plugin = &self.graph[parent_vertex];
				let to_plugin = &self.graph[vertex];

				trace!(
					"Skipping group edge from \"{}\" to \"{}\" as it would create a cycle.",
					from_plugin.name(),
					to_plugin.name()
				);

				// A non-master blocked before a master will produce its own
				// cycle through the master-flag edges; let that report it.
				if !from_plugin.is_master() && to_plugin.is_master() {
					continue;
				}

				// Only a default-group plugin can be singled out for
				// ignoring; with two explicit groups there is no way to
				// decide which one is wrong.
				let plugin_to_ignore = if to_plugin.group() == DEFAULT_GROUP_NAME {
					to_plugin.name().to_owned()
				} else if from_plugin.group() == DEFAULT_GROUP_NAME {
					from_plugin.name().to_owned()
				} else {
					continue;
				};

				let groups_in_paths = group_sort::groups_in_paths(
					&self.groups,
					from_plugin.group(),
					to_plugin.group(),
				);

				for group in groups_in_paths {
					plugins_to_ignore
						.entry(group)
						.or_default()
						.insert(plugin_to_ignore.clone());
				}
			}
		}

		for (from, to) in acyclic_edge_pairs {
			let ignore =
				should_ignore_group_edge(&self.graph[from], &self.graph[to], &plugins_to_ignore);

			match ignore {
				false => self.add_edge(from, to, EdgeType::Group),
				true => trace!(
					"Skipping group edge from \"{}\" to \"{}\" as it would create a multi-group \
					 cycle.",
					self.graph[from].name(),
					self.graph[to].name()
				),
			}
		}
	}

	/// Phase 5: overlap edges. The plugin overriding more records loads
	/// first.
	fn add_overlap_edges(&mut self) {
		let vertices = self.graph.node_indices().collect_vec();

		for (position, &vertex) in vertices.iter().enumerate() {
			if self.graph[vertex].count_override_form_ids() == 0 {
				trace!(
					"Skipping vertex for \"{}\": the plugin contains no override records.",
					self.graph[vertex].name()
				);
				continue;
			}

			for &other_vertex in &vertices[position + 1..] {
				if self.graph.find_edge(vertex, other_vertex).is_some()
					|| self.graph.find_edge(other_vertex, vertex).is_some()
					|| self.graph[vertex].count_override_form_ids()
						== self.graph[other_vertex].count_override_form_ids()
					|| !self.graph[vertex].do_form_ids_overlap(&self.graph[other_vertex])
				{
					continue;
				}

				let (from, to) = match self.graph[vertex].count_override_form_ids()
					> self.graph[other_vertex].count_override_form_ids()
				{
					true => (vertex, other_vertex),
					false => (other_vertex, vertex),
				};

				if !self.edge_creates_cycle(from, to) {
					self.add_edge(from, to, EdgeType::Overlap);
				}
			}
		}
	}

	/// Phase 6: tie-break edges between every still-unlinked pair, so that
	/// exactly one topological order exists.
	fn add_tie_break_edges(&mut self) {
		let vertices = self.graph.node_indices().collect_vec();

		for (position, &vertex) in vertices.iter().enumerate() {
			for &other_vertex in &vertices[position + 1..] {
				let (from, to) =
					match compare_plugins(&self.graph[vertex], &self.graph[other_vertex]) {
						Ordering::Less => (vertex, other_vertex),
						_ => (other_vertex, vertex),
					};

				if !self.edge_creates_cycle(from, to) {
					self.add_edge(from, to, EdgeType::TieBreak);
				}
			}
		}
	}

	/// Depth-first search producing a reverse post-order, which is a
	/// topological order when the graph is acyclic. A back edge means a
	/// cycle, reported with the full path around it.
	fn topological_order(&self) -> AppResult<Vec<NodeIndex>> {
		let mut colours: IndexMap<NodeIndex, Colour> = IndexMap::new();
		let mut finished: Vec<NodeIndex> = Vec::new();

		for root in self.graph.node_indices() {
			if colours.get(&root).copied().unwrap_or(Colour::White) == Colour::White {
				self.visit(root, &mut colours, &mut finished, &mut Vec::new())?;
			}
		}

		finished.reverse();
		Ok(finished)
	}

	fn visit(
		&self,
		node: NodeIndex,
		colours: &mut IndexMap<NodeIndex, Colour>,
		finished: &mut Vec<NodeIndex>,
		path: &mut Vec<NodeIndex>,
	) -> AppResult<()> {
		colours.insert(node, Colour::Grey);
		path.push(node);

		// Neighbours come out newest-first; flip them so traversal order
		// tracks edge insertion order.
		let mut neighbours = self.graph.neighbors(node).collect_vec();
		neighbours.reverse();

		for next in neighbours {
			match colours.get(&next).copied().unwrap_or(Colour::White) {
				Colour::White => self.visit(next, colours, finished, path)?,
				Colour::Grey => return Err(self.cycle_error(path, next)),
				Colour::Black => {}
			}
		}

		path.pop();
		colours.insert(node, Colour::Black);
		finished.push(node);

		Ok(())
	}

	/// Builds the cycle report for a back edge into `start`.
	fn cycle_error(&self, path: &[NodeIndex], start: NodeIndex) -> AppError {
		let position = path.iter().position(|&node| node == start).unwrap_or(0);
		let cycle_nodes = &path[position..];

		let mut cycle = Vec::new();
		for (offset, &node) in cycle_nodes.iter().enumerate() {
			let successor = cycle_nodes.get(offset + 1).copied().unwrap_or(start);
			let edge_type = self
				.graph
				.find_edge(node, successor)
				.and_then(|edge| self.graph.edge_weight(edge))
				.copied();

			cycle.push(Vertex::new(self.graph[node].name().to_owned(), edge_type));
		}

		SortError::CyclicInteraction(cycle).into()
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
	White,
	Grey,
	Black,
}

/// The stable tie-break ordering between two plugins.
///
/// Plugins with a current load-order position come first, in position
/// order. The rest order by basename, then by extension, both ignoring
/// case.
fn compare_plugins(first: &PluginSortingData, second: &PluginSortingData) -> Ordering {
	match (first.load_order_index(), second.load_order_index()) {
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(Some(first_index), Some(second_index)) => first_index.cmp(&second_index),
		(None, None) => {
			let (first_base, first_ext) = split_extension(first.name());
			let (second_base, second_ext) = split_extension(second.name());

			text::compare_filenames(first_base, second_base)
				.then_with(|| text::compare_filenames(first_ext, second_ext))
		}
	}
}

/// Splits a plugin filename into basename and its four-character extension.
fn split_extension(name: &str) -> (&str, &str) {
	match name.len() > 4 && name.is_char_boundary(name.len() - 4) {
		true => name.split_at(name.len() - 4),
		false => (name, ""),
	}
}

fn should_ignore_plugin(
	group: &str,
	plugin_name: &str,
	plugins_to_ignore: &IndexMap<String, IndexSet<String>>,
) -> bool {
	plugins_to_ignore
		.get(group)
		.map_or(false, |plugins| plugins.contains(plugin_name))
}

/// An edge is muted when either endpoint's group pairs with the other
/// endpoint's name in the ignore map.
fn should_ignore_group_edge(
	from_plugin: &PluginSortingData,
	to_plugin: &PluginSortingData,
	plugins_to_ignore: &IndexMap<String, IndexSet<String>>,
) -> bool {
	should_ignore_plugin(from_plugin.group(), to_plugin.name(), plugins_to_ignore)
		|| should_ignore_plugin(to_plugin.group(), from_plugin.name(), plugins_to_ignore)
}
