//! This module resolves the group graph: merging masterlist and userlist
//! group definitions, computing each group's transitive after-closure, and
//! answering path queries over the graph.

use std::collections::VecDeque;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

use crate::prelude::*;
use crate::structs::group::DEFAULT_GROUP_NAME;

/// Merges masterlist and userlist group definitions.
///
/// When both lists define a group of the same name, the after-group sets
/// are unioned. The implicit default group is always present in the result.
pub fn merge_groups(
	masterlist: &IndexMap<String, Group>,
	userlist: &IndexMap<String, Group>,
) -> IndexMap<String, Group> {
	let mut merged = masterlist.clone();

	for (name, group) in userlist {
		match merged.get_mut(name) {
			Some(existing) => existing.after.extend(group.after.iter().cloned()),
			None => {
				merged.insert(name.clone(), group.clone());
			}
		}
	}

	if !merged.contains_key(DEFAULT_GROUP_NAME) {
		merged.insert(DEFAULT_GROUP_NAME.to_owned(), Group::default());
	}

	merged
}

/// Computes the transitive after-group closure of every group.
///
/// A group referencing an undefined after-group is an *UndefinedGroup*
/// error, and a cycle in the after-relation is a *CyclicInteraction* error
/// carrying the groups on the cycle.
pub fn transitive_after_groups(
	masterlist: &IndexMap<String, Group>,
	userlist: &IndexMap<String, Group>,
) -> AppResult<IndexMap<String, IndexSet<String>>> {
	let groups = merge_groups(masterlist, userlist);

	let mut closures = IndexMap::new();
	for name in groups.keys() {
		visit(name, &groups, &mut closures, &mut Vec::new())?;
	}

	Ok(closures)
}

/// Depth-first closure computation. The stack holds the groups currently
/// being expanded, so a revisit of a stack member is a cycle.
fn visit(
	group_name: &str,
	groups: &IndexMap<String, Group>,
	closures: &mut IndexMap<String, IndexSet<String>>,
	stack: &mut Vec<String>,
) -> AppResult<()> {
	if closures.contains_key(group_name) {
		return Ok(());
	}

	if let Some(position) = stack.iter().position(|name| name == group_name) {
		let cycle = stack[position..]
			.iter()
			.map(|name| Vertex::new(name.clone(), Some(EdgeType::LoadAfter)))
			.collect();

		return Err(SortError::CyclicInteraction(cycle).into());
	}

	let Some(group) = groups.get(group_name) else {
		return Err(SortError::UndefinedGroup(group_name.to_owned()).into());
	};

	stack.push(group_name.to_owned());

	let mut closure = IndexSet::new();
	for after_name in &group.after {
		visit(after_name, groups, closures, stack)?;

		closure.insert(after_name.clone());
		if let Some(after_closure) = closures.get(after_name) {
			closure.extend(after_closure.iter().cloned());
		}
	}

	stack.pop();
	closures.insert(group_name.to_owned(), closure);

	Ok(())
}

/// Collects the names of every group lying on any path from `last_group`
/// back to `first_group` through the after-relation, excluding `last_group`
/// itself.
///
/// The sorter uses this to scope "ignore this plugin's group" decisions
/// when a group edge had to be skipped to avoid a cycle.
pub fn groups_in_paths(
	groups: &IndexMap<String, Group>,
	first_group: &str,
	last_group: &str,
) -> IndexSet<String> {
	let Some(last) = groups.get(last_group) else {
		return IndexSet::new();
	};

	let mut found = pathfinder(last, first_group, groups, IndexSet::new());
	found.shift_remove(last_group);

	found
}

/// Gathers the groups visited on paths from `group` to `target`. Visited
/// groups are passed by value so that sibling after-groups explore
/// independently.
fn pathfinder(
	group: &Group,
	target: &str,
	groups: &IndexMap<String, Group>,
	mut visited: IndexSet<String>,
) -> IndexSet<String> {
	if group.name == target {
		return visited;
	}

	if group.after.is_empty() {
		return IndexSet::new();
	}

	visited.insert(group.name.clone());

	let mut merged = IndexSet::new();
	for after_name in &group.after {
		let Some(after) = groups.get(after_name) else {
			continue;
		};

		merged.extend(pathfinder(after, target, groups, visited.clone()));
	}

	// An empty merge means none of the after-groups reached the target.
	if merged.is_empty() {
		return merged;
	}

	visited.extend(merged);
	visited
}

/// Finds a shortest path from one group to another through the merged
/// group graph, for "why does this load after that" diagnostics.
///
/// Each returned vertex is annotated with the type of the edge to the next
/// step: *UserLoadAfter* when the userlist introduced that after-relation,
/// *MasterlistLoadAfter* otherwise. An empty vector means no path exists.
pub fn groups_path(
	masterlist: &IndexMap<String, Group>,
	userlist: &IndexMap<String, Group>,
	from_group: &str,
	to_group: &str,
) -> AppResult<Vec<Vertex>> {
	let merged = merge_groups(masterlist, userlist);

	for name in [from_group, to_group] {
		if !merged.contains_key(name) {
			return Err(SortError::UndefinedGroup(name.to_owned()).into());
		}
	}

	let mut graph = StableDiGraph::<String, EdgeType>::default();
	let mut indices: IndexMap<&str, NodeIndex> = IndexMap::new();

	for name in merged.keys() {
		indices.insert(name, graph.add_node(name.clone()));
	}

	// An edge runs from each after-group to the group that loads after it.
	for (name, group) in &merged {
		for after_name in &group.after {
			let Some(&after_index) = indices.get(after_name.as_str()) else {
				continue;
			};

			let from_user = userlist
				.get(name)
				.map_or(false, |user_group| user_group.after.contains(after_name));
			let edge_type = match from_user {
				true => EdgeType::UserLoadAfter,
				false => EdgeType::MasterlistLoadAfter,
			};

			graph.add_edge(after_index, indices[name.as_str()], edge_type);
		}
	}

	let start = indices[from_group];
	let finish = indices[to_group];

	let mut predecessors: IndexMap<NodeIndex, (NodeIndex, EdgeType)> = IndexMap::new();
	let mut queue = VecDeque::from([start]);

	'search: while let Some(node) = queue.pop_front() {
		let mut edges = graph
			.edges(node)
			.map(|edge| (edge.target(), *edge.weight()))
			.collect_vec();
		edges.reverse();

		for (next, edge_type) in edges {
			if next == start || predecessors.contains_key(&next) {
				continue;
			}

			predecessors.insert(next, (node, edge_type));

			if next == finish {
				break 'search;
			}

			queue.push_back(next);
		}
	}

	if start != finish && !predecessors.contains_key(&finish) {
		return Ok(Vec::new());
	}

	// Walk the predecessor chain backwards, then flip it.
	let mut path = vec![Vertex::new(graph[finish].clone(), None)];
	let mut current = finish;
	while current != start {
		let (previous, edge_type) = predecessors[&current];
		path.push(Vertex::new(graph[previous].clone(), Some(edge_type)));
		current = previous;
	}

	path.reverse();
	Ok(path)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn group_map(groups: Vec<Group>) -> IndexMap<String, Group> {
		groups
			.into_iter()
			.map(|group| (group.name.clone(), group))
			.collect()
	}

	#[test]
	fn closure_is_transitive() {
		let groups = group_map(vec![
			Group::new("a"),
			Group::with_after("b", ["a"]),
			Group::with_after("c", ["b"]),
		]);

		let closures = transitive_after_groups(&groups, &IndexMap::new()).unwrap();

		assert!(closures["a"].is_empty());
		assert_eq!(closures["b"], IndexSet::from(["a".to_owned()]));
		assert_eq!(
			closures["c"],
			IndexSet::from(["b".to_owned(), "a".to_owned()])
		);
	}

	#[test]
	fn an_undefined_after_group_is_an_error() {
		let groups = group_map(vec![Group::with_after("b", ["a"])]);

		let result = transitive_after_groups(&groups, &IndexMap::new());

		assert!(matches!(
			result,
			Err(AppError::Sort(SortError::UndefinedGroup(name))) if name == "a"
		));
	}

	#[test]
	fn a_group_cycle_is_reported_with_load_after_edges() {
		let groups = group_map(vec![
			Group::with_after("a", ["c"]),
			Group::with_after("b", ["a"]),
			Group::with_after("c", ["b"]),
		]);

		let result = transitive_after_groups(&groups, &IndexMap::new());

		let Err(AppError::Sort(SortError::CyclicInteraction(cycle))) = result else {
			panic!("expected a cyclic interaction error");
		};

		assert_eq!(cycle.len(), 3);
		for vertex in &cycle {
			assert_eq!(vertex.edge_type_to_next(), Some(EdgeType::LoadAfter));
		}

		let names: IndexSet<_> = cycle.iter().map(|v| v.name().to_owned()).collect();
		assert_eq!(
			names,
			IndexSet::from(["a".to_owned(), "b".to_owned(), "c".to_owned()])
		);
	}

	#[test]
	fn merged_groups_union_after_sets_and_include_the_default() {
		let masterlist = group_map(vec![Group::with_after("b", ["a"]), Group::new("a")]);
		let userlist = group_map(vec![Group::with_after("b", ["c"]), Group::new("c")]);

		let merged = merge_groups(&masterlist, &userlist);

		assert_eq!(
			merged["b"].after,
			IndexSet::from(["a".to_owned(), "c".to_owned()])
		);
		assert!(merged.contains_key(DEFAULT_GROUP_NAME));
	}

	#[test]
	fn pathfinder_collects_intermediate_groups() {
		// d loads after c, c after b, b after a; also c after a directly.
		let groups = group_map(vec![
			Group::new("a"),
			Group::with_after("b", ["a"]),
			Group::with_after("c", ["b", "a"]),
			Group::with_after("d", ["c"]),
		]);

		let found = groups_in_paths(&groups, "a", "d");

		assert_eq!(
			found,
			IndexSet::from(["b".to_owned(), "c".to_owned()])
		);
	}

	#[test]
	fn pathfinder_returns_nothing_without_a_path() {
		let groups = group_map(vec![
			Group::new("a"),
			Group::new("isolated"),
			Group::with_after("b", ["a"]),
		]);

		assert!(groups_in_paths(&groups, "isolated", "b").is_empty());
	}

	#[test]
	fn groups_path_walks_the_merged_graph() {
		let masterlist = group_map(vec![
			Group::new("a"),
			Group::with_after("b", ["a"]),
		]);
		let userlist = group_map(vec![Group::with_after("c", ["b"])]);

		let path = groups_path(&masterlist, &userlist, "a", "c").unwrap();

		assert_eq!(path.len(), 3);
		assert_eq!(path[0].name(), "a");
		assert_eq!(
			path[0].edge_type_to_next(),
			Some(EdgeType::MasterlistLoadAfter)
		);
		assert_eq!(path[1].name(), "b");
		assert_eq!(path[1].edge_type_to_next(), Some(EdgeType::UserLoadAfter));
		assert_eq!(path[2].name(), "c");
		assert_eq!(path[2].edge_type_to_next(), None);
	}

	#[test]
	fn groups_path_reports_unknown_groups() {
		let masterlist = group_map(vec![Group::new("a")]);

		let result = groups_path(&masterlist, &IndexMap::new(), "a", "ghost");

		assert!(matches!(
			result,
			Err(AppError::Sort(SortError::UndefinedGroup(name))) if name == "ghost"
		));
	}

	#[test]
	fn groups_path_is_empty_when_unreachable() {
		let masterlist = group_map(vec![Group::new("a"), Group::new("b")]);

		let path = groups_path(&masterlist, &IndexMap::new(), "a", "b").unwrap();

		assert!(path.is_empty());
	}
}
