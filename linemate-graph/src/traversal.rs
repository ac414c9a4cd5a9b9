//! Breadth-first shortest path over the teammate index.

use std::collections::{HashMap, HashSet, VecDeque};

use linemate_core::types::PlayerId;

use crate::adjacency::TeammateIndex;

/// Find the shortest chain of teammate links between two players.
///
/// Level-order expansion with a visited set: the first path to reach
/// `target` is guaranteed minimum-edge-count. Ties resolve by ascending
/// neighbor order, so results are reproducible for a given index. Returns
/// the full path including both endpoints, or `None` when no chain of at
/// most `max_depth` links exists.
pub fn shortest_path(
    index: &TeammateIndex,
    source: PlayerId,
    target: PlayerId,
    max_depth: usize,
) -> Option<Vec<PlayerId>> {
    if source == target {
        return Some(vec![source]);
    }

    let mut seen = HashSet::new();
    let mut parent_map: HashMap<PlayerId, PlayerId> = HashMap::new();
    let mut queue: VecDeque<(PlayerId, usize)> = VecDeque::new();

    seen.insert(source);
    queue.push_back((source, 0));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        for &neighbor in index.neighbors(node) {
            if !seen.insert(neighbor) {
                continue;
            }
            parent_map.insert(neighbor, node);

            if neighbor == target {
                // Reconstruct path
                let mut path = vec![target];
                let mut current = target;
                while let Some(&parent) = parent_map.get(&current) {
                    path.push(parent);
                    current = parent;
                    if current == source {
                        break;
                    }
                }
                path.reverse();
                return Some(path);
            }

            queue.push_back((neighbor, depth + 1));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use linemate_core::types::{GameCategory, GameRecord, Roster, TeamToken};

    fn index_from_edges(edges: &[(PlayerId, PlayerId)]) -> TeammateIndex {
        let games: Vec<GameRecord> = edges
            .iter()
            .enumerate()
            .map(|(i, &(a, b))| GameRecord {
                game_id: 2023020001 + i as u64,
                season: 20232024,
                category: GameCategory::RegularSeason,
                home: Roster {
                    team: TeamToken::new("EDM", 20232024),
                    players: vec![a, b],
                },
                away: Roster {
                    team: TeamToken::new("VAN", 20232024),
                    players: vec![],
                },
            })
            .collect();
        TeammateIndex::build(&games)
    }

    fn linear_index() -> TeammateIndex {
        // 1 - 2 - 3 - 4
        index_from_edges(&[(1, 2), (2, 3), (3, 4)])
    }

    #[test]
    fn test_shortest_path_direct() {
        let index = linear_index();
        let path = shortest_path(&index, 1, 2, 10).unwrap();
        assert_eq!(path, vec![1, 2]);
    }

    #[test]
    fn test_shortest_path_multi_hop() {
        let index = linear_index();
        let path = shortest_path(&index, 1, 4, 10).unwrap();
        assert_eq!(path, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_shortest_path_same_node() {
        let index = linear_index();
        let path = shortest_path(&index, 1, 1, 10).unwrap();
        assert_eq!(path, vec![1]);
    }

    #[test]
    fn test_shortest_path_is_undirected() {
        let index = linear_index();
        let path = shortest_path(&index, 4, 1, 10).unwrap();
        assert_eq!(path, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_shortest_path_disconnected() {
        let index = index_from_edges(&[(1, 2), (3, 4)]);
        assert!(shortest_path(&index, 1, 4, 10).is_none());
    }

    #[test]
    fn test_shortest_path_unknown_players() {
        let index = linear_index();
        assert!(shortest_path(&index, 1, 99, 10).is_none());
        assert!(shortest_path(&index, 99, 1, 10).is_none());
    }

    #[test]
    fn test_shortest_path_max_depth_limit() {
        let index = linear_index();
        // 1 to 4 needs 3 hops.
        assert!(shortest_path(&index, 1, 4, 2).is_none());
        assert!(shortest_path(&index, 1, 4, 3).is_some());
    }

    #[test]
    fn test_shortest_path_takes_shortcut() {
        // Long way 1-2-3-5, short way 1-4-5.
        let index = index_from_edges(&[(1, 2), (2, 3), (3, 5), (1, 4), (4, 5)]);
        let path = shortest_path(&index, 1, 5, 10).unwrap();
        assert_eq!(path, vec![1, 4, 5]);
    }

    /// Depth-first enumeration of every simple path, used as the oracle.
    fn exhaustive_min_len(
        index: &TeammateIndex,
        current: PlayerId,
        target: PlayerId,
        visited: &mut HashSet<PlayerId>,
    ) -> Option<usize> {
        if current == target {
            return Some(0);
        }
        let mut best: Option<usize> = None;
        for &next in index.neighbors(current) {
            if !visited.insert(next) {
                continue;
            }
            if let Some(len) = exhaustive_min_len(index, next, target, visited) {
                let candidate = len + 1;
                best = Some(best.map_or(candidate, |b| b.min(candidate)));
            }
            visited.remove(&next);
        }
        best
    }

    #[test]
    fn test_shortest_path_matches_exhaustive_search() {
        let edges = [
            (1, 2),
            (1, 3),
            (2, 4),
            (3, 4),
            (4, 5),
            (5, 6),
            (2, 7),
            (7, 8),
            (8, 6),
            (3, 9),
            (9, 10),
            (10, 6),
            (5, 11),
            (11, 12),
            (1, 12),
        ];
        let index = index_from_edges(&edges);

        for source in 1..=12u64 {
            for target in 1..=12u64 {
                let bfs_len = shortest_path(&index, source, target, 20).map(|p| p.len() - 1);
                let mut visited = HashSet::from([source]);
                let oracle = exhaustive_min_len(&index, source, target, &mut visited);
                assert_eq!(bfs_len, oracle, "pair ({source}, {target})");
            }
        }
    }
}
