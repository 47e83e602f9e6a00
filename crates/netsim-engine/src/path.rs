//! Path resolution over the connection graph
//!
//! ## Algorithm
//!
//! 1. **UNKNOWN**: If either endpoint is not a device, the result is empty
//! 2. **DIRECT**: If a connected link joins source and destination, the
//!    path is `[source, destination]`
//! 3. **TRAVERSE**: Otherwise walk the undirected graph of connected links
//!    with the configured [`PathStrategy`]
//! 4. **UNREACHABLE**: If the walk never meets the destination, the result
//!    is empty
//!
//! An empty path is an ordinary answer, not an error: the packet layer
//! turns it into a dropped packet.
//!
//! Neighbors are visited in connection insertion order, which makes the
//! result a deterministic function of the topology. With
//! [`PathStrategy::DepthFirst`] the first path found is returned, which is
//! not necessarily a shortest one.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::trace;

use netsim_core::{Connection, DeviceId, SimulationState};

/// How to search when there is no direct edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathStrategy {
    /// First path found by depth-first search. Not guaranteed shortest.
    #[default]
    DepthFirst,
    /// Shortest path in hops
    BreadthFirst,
}

/// Undirected adjacency over connected links, in insertion order
struct Adjacency<'a> {
    neighbors: HashMap<&'a DeviceId, Vec<&'a DeviceId>>,
}

impl<'a> Adjacency<'a> {
    fn build(connections: &'a [Connection]) -> Self {
        let mut neighbors: HashMap<&DeviceId, Vec<&DeviceId>> = HashMap::new();
        for connection in connections.iter().filter(|c| c.is_connected()) {
            let (a, b) = (&connection.source_device_id, &connection.target_device_id);
            neighbors.entry(a).or_default().push(b);
            neighbors.entry(b).or_default().push(a);
        }
        trace!(nodes = neighbors.len(), "Built adjacency");
        Self { neighbors }
    }

    fn of(&self, device: &DeviceId) -> &[&'a DeviceId] {
        self.neighbors.get(device).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Resolve a path from `source` to `destination` in the given state
pub fn resolve_path(
    state: &SimulationState,
    source: &DeviceId,
    destination: &DeviceId,
    strategy: PathStrategy,
) -> Vec<DeviceId> {
    if !state.contains_device(source) || !state.contains_device(destination) {
        return Vec::new();
    }
    if source == destination {
        return vec![source.clone()];
    }

    let direct = state
        .connections
        .iter()
        .any(|c| c.is_connected() && c.links(source, destination));
    if direct {
        return vec![source.clone(), destination.clone()];
    }

    let adjacency = Adjacency::build(&state.connections);
    let path = match strategy {
        PathStrategy::DepthFirst => depth_first(&adjacency, source, destination),
        PathStrategy::BreadthFirst => breadth_first(&adjacency, source, destination),
    };
    path.unwrap_or_default()
}

/// Pre-order depth-first search; returns the first path that reaches
/// `destination`. Iterative, with one neighbor cursor per frame.
fn depth_first(adjacency: &Adjacency<'_>, source: &DeviceId, destination: &DeviceId) -> Option<Vec<DeviceId>> {
    let mut visited: HashSet<&DeviceId> = HashSet::new();
    let mut stack: Vec<(&DeviceId, usize)> = vec![(source, 0)];
    visited.insert(source);

    while let Some(&(node, cursor)) = stack.last() {
        if node == destination {
            return Some(stack.iter().map(|(id, _)| (*id).clone()).collect());
        }

        let neighbors = adjacency.of(node);
        let next = neighbors
            .iter()
            .skip(cursor)
            .position(|n| !visited.contains(*n));
        match next {
            Some(offset) => {
                let neighbor = neighbors[cursor + offset];
                if let Some(top) = stack.last_mut() {
                    top.1 = cursor + offset + 1;
                }
                visited.insert(neighbor);
                stack.push((neighbor, 0));
            }
            None => {
                stack.pop();
            }
        }
    }
    None
}

/// Breadth-first search; returns a shortest path in hops
fn breadth_first(adjacency: &Adjacency<'_>, source: &DeviceId, destination: &DeviceId) -> Option<Vec<DeviceId>> {
    let mut parent: HashMap<&DeviceId, &DeviceId> = HashMap::new();
    let mut visited: HashSet<&DeviceId> = HashSet::from([source]);
    let mut queue: VecDeque<&DeviceId> = VecDeque::from([source]);

    while let Some(node) = queue.pop_front() {
        if node == destination {
            let mut path = vec![node.clone()];
            let mut current = node;
            while let Some(prev) = parent.get(current) {
                path.push((*prev).clone());
                current = prev;
            }
            path.reverse();
            return Some(path);
        }
        for neighbor in adjacency.of(node) {
            if visited.insert(*neighbor) {
                parent.insert(*neighbor, node);
                queue.push_back(*neighbor);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use netsim_core::{ConnectionId, ConnectionStatus, DeviceKind, DeviceSpec};

    fn topology(devices: &[&str], edges: &[(&str, &str)]) -> SimulationState {
        let mut state = SimulationState::new();
        for id in devices {
            state
                .devices
                .push(DeviceSpec::new(DeviceKind::Router, *id).into_device(DeviceId::new(*id)));
        }
        for (i, (a, b)) in edges.iter().enumerate() {
            state.connections.push(Connection {
                id: ConnectionId::new(format!("c{i}")),
                source_device_id: DeviceId::new(*a),
                target_device_id: DeviceId::new(*b),
                source_interface: String::new(),
                target_interface: String::new(),
                status: ConnectionStatus::Connected,
                created_at: Utc::now(),
            });
        }
        state
    }

    fn ids(path: &[&str]) -> Vec<DeviceId> {
        path.iter().map(|id| DeviceId::new(*id)).collect()
    }

    fn dfs(state: &SimulationState, a: &str, b: &str) -> Vec<DeviceId> {
        resolve_path(state, &a.into(), &b.into(), PathStrategy::DepthFirst)
    }

    fn bfs(state: &SimulationState, a: &str, b: &str) -> Vec<DeviceId> {
        resolve_path(state, &a.into(), &b.into(), PathStrategy::BreadthFirst)
    }

    #[test]
    fn test_direct_edge_wins() {
        // The long way round is inserted first; the direct edge still wins
        let state = topology(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")]);
        assert_eq!(dfs(&state, "a", "d"), ids(&["a", "d"]));
        assert_eq!(dfs(&state, "d", "a"), ids(&["d", "a"]));
    }

    #[test]
    fn test_line_falls_through_to_traversal() {
        let state = topology(&["r1", "s1", "pc1"], &[("r1", "s1"), ("s1", "pc1")]);
        assert_eq!(dfs(&state, "r1", "pc1"), ids(&["r1", "s1", "pc1"]));
        assert_eq!(bfs(&state, "r1", "pc1"), ids(&["r1", "s1", "pc1"]));
    }

    #[test]
    fn test_unknown_endpoints_are_unreachable() {
        let state = topology(&["a", "b"], &[("a", "b")]);
        assert!(dfs(&state, "a", "zz").is_empty());
        assert!(dfs(&state, "zz", "a").is_empty());
    }

    #[test]
    fn test_disconnected_links_are_ignored() {
        let mut state = topology(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        state.connections[1].status = ConnectionStatus::Disconnected;
        assert!(dfs(&state, "a", "c").is_empty());
        assert!(bfs(&state, "a", "c").is_empty());
    }

    #[test]
    fn test_islands_are_unreachable() {
        let state = topology(&["a", "b", "c", "d"], &[("a", "b"), ("c", "d")]);
        assert!(dfs(&state, "a", "d").is_empty());
    }

    #[test]
    fn test_depth_first_is_not_shortest() {
        // a-b-c-e is discovered before a-d-e because a-b is inserted first
        let state = topology(
            &["a", "b", "c", "d", "e"],
            &[("a", "b"), ("b", "c"), ("c", "e"), ("a", "d"), ("d", "e")],
        );
        assert_eq!(dfs(&state, "a", "e"), ids(&["a", "b", "c", "e"]));
        assert_eq!(bfs(&state, "a", "e"), ids(&["a", "d", "e"]));
    }

    #[test]
    fn test_depth_first_backtracks_from_dead_ends() {
        let state = topology(
            &["a", "b", "x", "c", "d"],
            &[("a", "b"), ("b", "x"), ("a", "c"), ("c", "d")],
        );
        assert_eq!(dfs(&state, "a", "d"), ids(&["a", "c", "d"]));
    }

    #[test]
    fn test_cycles_terminate() {
        let state = topology(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        assert!(dfs(&state, "a", "d").is_empty());
        assert!(bfs(&state, "a", "d").is_empty());
    }

    #[test]
    fn test_self_path() {
        let state = topology(&["a"], &[]);
        assert_eq!(dfs(&state, "a", "a"), ids(&["a"]));
    }
}
