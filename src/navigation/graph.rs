use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::MalformedMapError;
use crate::navigation::map::{NavigationEdge, NavigationMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneNode {
    pub id: String,
    pub visited: bool,
}

/// Immutable, validated navigation graph.
///
/// Adjacency keeps the insertion order of the source map: the traversal
/// visits neighbours in exactly this order.
#[derive(Debug, Clone)]
pub struct NavigationGraph {
    adjacency: IndexMap<String, Vec<NavigationEdge>>,
    start: String,
    hub: Option<String>,
}

impl NavigationGraph {
    pub(crate) fn from_map(map: NavigationMap) -> Result<Self, MalformedMapError> {
        if map.scenes.is_empty() {
            return Err(MalformedMapError::NoScenes);
        }

        let mut adjacency: IndexMap<String, Vec<NavigationEdge>> = IndexMap::new();
        for scene in &map.scenes {
            if adjacency.insert(scene.clone(), Vec::new()).is_some() {
                return Err(MalformedMapError::DuplicateScene(scene.clone()));
            }
        }

        for edge in map.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !adjacency.contains_key(endpoint) {
                    return Err(MalformedMapError::DanglingEdge {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            if let Some(click) = edge.click {
                let in_range = |v: f32| (0.0..=1.0).contains(&v);
                if !in_range(click.x_pct) || !in_range(click.y_pct) {
                    return Err(MalformedMapError::ClickHintOutOfRange {
                        from: edge.from,
                        to: edge.to,
                        x_pct: click.x_pct,
                        y_pct: click.y_pct,
                    });
                }
            }
            if let Some(edges) = adjacency.get_mut(&edge.from) {
                edges.push(edge);
            }
        }

        let start = match map.start {
            Some(start) if adjacency.contains_key(&start) => start,
            Some(start) => return Err(MalformedMapError::UnknownStart(start)),
            None => map.scenes[0].clone(),
        };

        let hub = match map.hub {
            Some(hub) if adjacency.contains_key(&hub) => Some(hub),
            Some(hub) => return Err(MalformedMapError::UnknownHub(hub)),
            None => Self::infer_hub(&adjacency),
        };

        Ok(Self {
            adjacency,
            start,
            hub,
        })
    }

    // Largest fan-out of at least two; earliest declared wins ties.
    fn infer_hub(adjacency: &IndexMap<String, Vec<NavigationEdge>>) -> Option<String> {
        let mut best: Option<(&String, usize)> = None;
        for (scene, edges) in adjacency {
            if edges.len() < 2 {
                continue;
            }
            match best {
                Some((_, count)) if count >= edges.len() => {}
                _ => best = Some((scene, edges.len())),
            }
        }
        best.map(|(scene, _)| scene.clone())
    }

    pub fn scenes(&self) -> impl Iterator<Item = &String> {
        self.adjacency.keys()
    }

    pub fn scene_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn contains(&self, scene: &str) -> bool {
        self.adjacency.contains_key(scene)
    }

    pub fn edges_from(&self, scene: &str) -> &[NavigationEdge] {
        self.adjacency
            .get(scene)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn hub(&self) -> Option<&str> {
        self.hub.as_deref()
    }

    pub fn is_hub(&self, scene: &str) -> bool {
        self.hub.as_deref() == Some(scene)
    }

    /// Position of `edge` among the outgoing edges of its source scene.
    pub fn sibling_index(&self, edge: &NavigationEdge) -> Option<usize> {
        self.edges_from(&edge.from).iter().position(|e| e == edge)
    }

    /// Snapshot of every scene with its visited flag.
    pub fn nodes(&self, visited: &dyn Fn(&str) -> bool) -> Vec<SceneNode> {
        self.adjacency
            .keys()
            .map(|id| SceneNode {
                id: id.clone(),
                visited: visited(id),
            })
            .collect()
    }

    /// Scenes reachable from `start` by following edges, in BFS order.
    pub fn reachable_from(&self, start: &str) -> Vec<String> {
        if !self.contains(start) {
            return Vec::new();
        }
        let mut seen = HashSet::from([start.to_string()]);
        let mut order = vec![start.to_string()];
        let mut queue = VecDeque::from([start.to_string()]);
        while let Some(scene) = queue.pop_front() {
            for edge in self.edges_from(&scene) {
                if seen.insert(edge.to.clone()) {
                    order.push(edge.to.clone());
                    queue.push_back(edge.to.clone());
                }
            }
        }
        order
    }

    /// Shortest edge sequence from `from` to `to`. `Some(vec![])` when they
    /// are the same scene.
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<NavigationEdge>> {
        self.shortest_path_through(from, to, &|_| true)
    }

    /// Shortest path whose every step lands on a scene `allowed` accepts.
    /// The starting scene itself is not checked.
    pub fn shortest_path_through(
        &self,
        from: &str,
        to: &str,
        allowed: &dyn Fn(&str) -> bool,
    ) -> Option<Vec<NavigationEdge>> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        if from == to {
            return Some(Vec::new());
        }

        let mut came_from: HashMap<&str, &NavigationEdge> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        while let Some(scene) = queue.pop_front() {
            for edge in self.edges_from(scene) {
                if edge.to == from
                    || came_from.contains_key(edge.to.as_str())
                    || !allowed(&edge.to)
                {
                    continue;
                }
                came_from.insert(edge.to.as_str(), edge);
                if edge.to == to {
                    let mut path = Vec::new();
                    let mut cursor = to;
                    while let Some(step) = came_from.get(cursor) {
                        path.push((*step).clone());
                        cursor = step.from.as_str();
                        if cursor == from {
                            break;
                        }
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(edge.to.as_str());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::map::ClickHint;

    fn map(scenes: &[&str], edges: &[(&str, &str)]) -> NavigationMap {
        NavigationMap {
            scenes: scenes.iter().map(|s| s.to_string()).collect(),
            edges: edges
                .iter()
                .map(|(from, to)| NavigationEdge::new(*from, *to))
                .collect(),
            start: None,
            hub: None,
        }
    }

    #[test]
    fn test_dangling_edge_is_rejected() {
        let result = map(&["X"], &[("X", "Y")]).into_graph();
        match result {
            Err(MalformedMapError::DanglingEdge { from, to, missing }) => {
                assert_eq!((from.as_str(), to.as_str()), ("X", "Y"));
                assert_eq!(missing, "Y");
            }
            other => panic!("expected dangling edge error, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_source_is_rejected() {
        let result = map(&["Y"], &[("X", "Y")]).into_graph();
        assert!(matches!(
            result,
            Err(MalformedMapError::DanglingEdge { missing, .. }) if missing == "X"
        ));
    }

    #[test]
    fn test_duplicate_and_empty_scenes() {
        assert!(matches!(
            map(&["A", "A"], &[]).into_graph(),
            Err(MalformedMapError::DuplicateScene(s)) if s == "A"
        ));
        assert!(matches!(
            map(&[], &[]).into_graph(),
            Err(MalformedMapError::NoScenes)
        ));
    }

    #[test]
    fn test_unknown_start_and_hub() {
        let mut with_start = map(&["A"], &[]);
        with_start.start = Some("Z".to_string());
        assert!(matches!(
            with_start.into_graph(),
            Err(MalformedMapError::UnknownStart(_))
        ));

        let mut with_hub = map(&["A"], &[]);
        with_hub.hub = Some("Z".to_string());
        assert!(matches!(
            with_hub.into_graph(),
            Err(MalformedMapError::UnknownHub(_))
        ));
    }

    #[test]
    fn test_click_hint_out_of_range() {
        let mut m = map(&["A", "B"], &[]);
        m.edges.push(NavigationEdge::new("A", "B").with_click(ClickHint {
            x_pct: 1.5,
            y_pct: 0.5,
            button: Default::default(),
        }));
        assert!(matches!(
            m.into_graph(),
            Err(MalformedMapError::ClickHintOutOfRange { .. })
        ));
    }

    #[test]
    fn test_adjacency_preserves_insertion_order() {
        let graph = map(&["A", "B", "C", "D"], &[("A", "C"), ("A", "B"), ("A", "D")])
            .into_graph()
            .unwrap();
        let targets: Vec<&str> = graph.edges_from("A").iter().map(|e| e.to.as_str()).collect();
        assert_eq!(targets, vec!["C", "B", "D"]);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.edges_from("missing").is_empty());
    }

    #[test]
    fn test_start_defaults_to_first_scene() {
        let graph = map(&["Title", "Menu"], &[]).into_graph().unwrap();
        assert_eq!(graph.start(), "Title");
    }

    #[test]
    fn test_hub_inference() {
        let graph = map(
            &["Title", "Hub", "S1", "S2", "S3"],
            &[("Title", "Hub"), ("Hub", "S1"), ("Hub", "S2"), ("Hub", "S3")],
        )
        .into_graph()
        .unwrap();
        assert_eq!(graph.hub(), Some("Hub"));

        let linear = map(&["A", "B", "C"], &[("A", "B"), ("B", "C")])
            .into_graph()
            .unwrap();
        assert_eq!(linear.hub(), None);
    }

    #[test]
    fn test_declared_hub_wins() {
        let mut m = map(&["A", "B", "C"], &[("A", "B"), ("A", "C")]);
        m.hub = Some("C".to_string());
        let graph = m.into_graph().unwrap();
        assert!(graph.is_hub("C"));
        assert!(!graph.is_hub("A"));
    }

    #[test]
    fn test_reachable_from() {
        let graph = map(&["A", "B", "C", "D"], &[("A", "B"), ("B", "C")])
            .into_graph()
            .unwrap();
        assert_eq!(graph.reachable_from("A"), vec!["A", "B", "C"]);
        assert_eq!(graph.reachable_from("D"), vec!["D"]);
    }

    #[test]
    fn test_shortest_path() {
        let graph = map(
            &["A", "B", "C", "D"],
            &[("A", "B"), ("B", "C"), ("A", "C"), ("C", "D")],
        )
        .into_graph()
        .unwrap();
        let path = graph.shortest_path("A", "D").unwrap();
        let hops: Vec<(&str, &str)> = path
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        assert_eq!(hops, vec![("A", "C"), ("C", "D")]);
        assert_eq!(graph.shortest_path("B", "B"), Some(Vec::new()));
        assert_eq!(graph.shortest_path("D", "A"), None);
    }

    #[test]
    fn test_shortest_path_through_allowed_scenes_only() {
        let graph = map(
            &["A", "B", "C", "X"],
            &[("A", "B"), ("B", "X"), ("X", "C"), ("A", "C")],
        )
        .into_graph()
        .unwrap();
        let avoid_a = |scene: &str| scene != "A";
        let path = graph.shortest_path_through("B", "C", &avoid_a).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].to, "X");
        let avoid_x = |scene: &str| scene != "X";
        assert_eq!(graph.shortest_path_through("B", "C", &avoid_x), None);
        let direct = graph.shortest_path_through("A", "C", &avoid_x).unwrap();
        assert_eq!(direct.len(), 1);
    }

    #[test]
    fn test_sibling_index() {
        let graph = map(&["H", "S1", "S2"], &[("H", "S1"), ("H", "S2")])
            .into_graph()
            .unwrap();
        let second = graph.edges_from("H")[1].clone();
        assert_eq!(graph.sibling_index(&second), Some(1));
    }
}
