use crate::climate::{PARAMETER_COUNT, Param, ParamPoint, TargetPoint};
use crate::error::{Result, WorldgenError};
use std::cmp::Ordering;
use tracing::debug;

const CHILDREN_PER_NODE: usize = 6;

type Space = [Param; PARAMETER_COUNT];

/// Remembers the leaf of the previous lookup so that spatially coherent queries
/// start from a tight bound. A hint never changes which distance is found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchHint {
    last: Option<usize>,
}

impl SearchHint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Nearest-hypercube index over the seven climate axes.
#[derive(Debug)]
pub struct SearchTree<T> {
    root: Node,
    entries: Vec<(ParamPoint, T)>,
}

#[derive(Debug)]
enum Node {
    Leaf { index: usize, space: Space },
    Branch { children: Vec<Node>, space: Space },
}

impl<T> SearchTree<T> {
    pub fn new<I: IntoIterator<Item = (ParamPoint, T)>>(points: I) -> Result<SearchTree<T>> {
        let entries: Vec<(ParamPoint, T)> = points.into_iter().collect();
        if entries.is_empty() {
            return Err(WorldgenError::EmptySearchTree);
        }
        let leaves = entries
            .iter()
            .enumerate()
            .map(|(index, (point, _))| Node::Leaf {
                index,
                space: point.parameter_space(),
            })
            .collect();
        let root = build(leaves);
        debug!(entries = entries.len(), depth = root.depth(), "built climate search tree");
        Ok(SearchTree { root, entries })
    }

    pub fn entries(&self) -> &[(ParamPoint, T)] {
        &self.entries
    }

    /// Finds the entry with the smallest squared distance to `target`, updating `hint`.
    pub fn lookup(&self, target: &TargetPoint, hint: &mut SearchHint) -> &T {
        let query = target.to_parameter_array();
        let start = hint
            .last
            .filter(|index| *index < self.entries.len())
            .map(|index| (index, distance(&self.entries[index].0.parameter_space(), &query)));
        let index = self.root.search(&query, start).map_or(0, |(index, _)| index);
        hint.last = Some(index);
        &self.entries[index].1
    }

    pub fn search(&self, target: &TargetPoint) -> &T {
        self.lookup(target, &mut SearchHint::new())
    }

    /// Linear scan by fitness; the first entry wins ties.
    pub fn find_brute_force(&self, target: &TargetPoint) -> &T {
        let mut best = &self.entries[0];
        let mut best_fitness = best.0.fitness(target);
        for entry in &self.entries[1..] {
            let fitness = entry.0.fitness(target);
            if fitness < best_fitness {
                best_fitness = fitness;
                best = entry;
            }
        }
        &best.1
    }
}

fn distance(space: &Space, query: &[i64; PARAMETER_COUNT]) -> i64 {
    space
        .iter()
        .zip(query)
        .map(|(param, value)| {
            let d = param.distance(*value);
            d.wrapping_mul(d)
        })
        .fold(0i64, i64::wrapping_add)
}

fn union(nodes: impl IntoIterator<Item = Space>) -> Space {
    let mut nodes = nodes.into_iter();
    let mut space = nodes.next().unwrap_or([Param::from_quantized(0, 0); PARAMETER_COUNT]);
    for other in nodes {
        for (param, other) in space.iter_mut().zip(other.iter()) {
            *param = param.union(other);
        }
    }
    space
}

fn cost(space: &Space) -> i64 {
    space.iter().map(|param| (param.max() - param.min()).abs()).sum()
}

fn center(param: &Param, abs: bool) -> i64 {
    let center = (param.min() + param.max()) / 2;
    if abs { center.abs() } else { center }
}

/// Lexicographic on centres, starting at `axis` and wrapping around.
fn compare(a: &Space, b: &Space, axis: usize, abs: bool) -> Ordering {
    (0..PARAMETER_COUNT)
        .map(|k| (axis + k) % PARAMETER_COUNT)
        .map(|k| center(&a[k], abs).cmp(&center(&b[k], abs)))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn bucket_size(count: usize) -> usize {
    let exponent = ((count as f64 - 0.01).ln() / (CHILDREN_PER_NODE as f64).ln()).floor();
    (CHILDREN_PER_NODE as f64).powf(exponent) as usize
}

fn build(mut nodes: Vec<Node>) -> Node {
    if nodes.len() == 1
        && let Some(node) = nodes.pop()
    {
        return node;
    }
    if nodes.len() <= CHILDREN_PER_NODE {
        nodes.sort_by_key(|node| {
            node.space()
                .iter()
                .map(|param| center(param, true))
                .sum::<i64>()
        });
        return Node::branch(nodes);
    }

    let size = bucket_size(nodes.len());
    let mut order: Vec<usize> = (0..nodes.len()).collect();
    let mut best_cost = i64::MAX;
    let mut best_axis = 0;
    let mut best_order = order.clone();
    for axis in 0..PARAMETER_COUNT {
        order.sort_by(|a, b| compare(nodes[*a].space(), nodes[*b].space(), axis, false));
        let total: i64 = order
            .chunks(size)
            .map(|bucket| cost(&union(bucket.iter().map(|i| *nodes[*i].space()))))
            .sum();
        if best_cost > total {
            best_cost = total;
            best_axis = axis;
            best_order.clone_from(&order);
        }
    }

    let mut slots: Vec<Option<Node>> = nodes.into_iter().map(Some).collect();
    let mut buckets: Vec<(Space, Vec<Node>)> = best_order
        .chunks(size)
        .map(|bucket| {
            let children: Vec<Node> = bucket.iter().filter_map(|i| slots[*i].take()).collect();
            (union(children.iter().map(|node| *node.space())), children)
        })
        .collect();
    buckets.sort_by(|a, b| compare(&a.0, &b.0, best_axis, true));
    Node::branch(
        buckets
            .into_iter()
            .map(|(_, children)| build(children))
            .collect(),
    )
}

impl Node {
    fn branch(children: Vec<Node>) -> Node {
        let space = union(children.iter().map(|node| *node.space()));
        Node::Branch { children, space }
    }

    fn space(&self) -> &Space {
        match self {
            Node::Leaf { space, .. } | Node::Branch { space, .. } => space,
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Branch { children, .. } => {
                1 + children.iter().map(Node::depth).max().unwrap_or(0)
            }
        }
    }

    /// Returns the closest leaf and its distance. A child is only entered when its
    /// box could beat the current best, and only a strictly better leaf replaces it.
    fn search(
        &self,
        query: &[i64; PARAMETER_COUNT],
        mut best: Option<(usize, i64)>,
    ) -> Option<(usize, i64)> {
        match self {
            Node::Leaf { index, space } => Some((*index, distance(space, query))),
            Node::Branch { children, .. } => {
                for child in children {
                    let bound = best.map_or(i64::MAX, |(_, d)| d);
                    if bound <= distance(child.space(), query) {
                        continue;
                    }
                    if let Some(found) = child.search(query, best)
                        && bound > found.1
                    {
                        best = Some(found);
                    }
                }
                best
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::climate::search_tree::{SearchHint, SearchTree, bucket_size, distance};
    use crate::climate::{Param, ParamPoint, QuantizedCoord, TargetPoint};
    use mcrs_random::Random;
    use mcrs_random::xoroshiro::XoroshiroRandom;

    fn min_distance<T>(tree: &SearchTree<T>, target: &TargetPoint) -> i64 {
        tree.entries()
            .iter()
            .map(|(point, _)| distance(&point.parameter_space(), &target.to_parameter_array()))
            .min()
            .unwrap()
    }

    fn distance_of<T: PartialEq>(tree: &SearchTree<T>, value: &T, target: &TargetPoint) -> i64 {
        tree.entries()
            .iter()
            .filter(|(_, v)| v == value)
            .map(|(point, _)| distance(&point.parameter_space(), &target.to_parameter_array()))
            .min()
            .unwrap()
    }

    fn random_range(random: &mut XoroshiroRandom) -> Param {
        let a = random.next_f32() * 2.0 - 1.0;
        let b = random.next_f32() * 2.0 - 1.0;
        if random.next_bool() {
            Param::from(a)
        } else {
            Param::span(a.min(b), a.max(b)).unwrap()
        }
    }

    fn random_target(random: &mut XoroshiroRandom) -> TargetPoint {
        let mut next = || random.next_f32() * 2.4 - 1.2;
        TargetPoint::new(next(), next(), next(), next(), next(), next())
    }

    #[test]
    fn search_test() {
        let tree = SearchTree::new([
            (
                ParamPoint::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0),
                "red".to_owned(),
            ),
            (
                ParamPoint::new(1.0, 0.0, 0.0, 0.8, 0.0, 0.0, 0),
                "green".to_owned(),
            ),
            (
                ParamPoint::new(1.0, 0.0, 0.6, -0.8, -0.1, 0.0, 0),
                "blue".to_owned(),
            ),
        ])
        .unwrap();
        assert_eq!(tree.search(&TargetPoint::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0)), "red");
        assert_eq!(tree.search(&TargetPoint::new(1.0, 0.0, 0.0, 0.8, 0.0, 0.0)), "green");
        assert_eq!(tree.search(&TargetPoint::new(1.0, 0.0, 0.6, -0.8, -0.1, 0.0)), "blue");
    }

    #[test]
    fn complex_test_search() {
        let tree = SearchTree::new([
            (ParamPoint::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0), "red"),
            (ParamPoint::new(1.0, 0.0, 0.0, 0.8, 0.0, 0.0, 0), "green"),
            (ParamPoint::new(1.0, 0.0, 0.6, -0.8, -0.1, 0.0, 0), "blue"),
            (ParamPoint::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0), "blue"),
            (ParamPoint::new(0.0, 0.2, 0.0, 0.0, 0.0, 0.0, 0), "yellow"),
            (ParamPoint::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0), "orange"),
            (ParamPoint::new(0.0, 0.2, 0.0, 0.0, 0.0, 0.9, 0), "purple"),
            (ParamPoint::new(0.0, -0.3, 0.0, 0.0, 0.0, 0.0, 0), "cyan"),
            (ParamPoint::new(0.0, -0.9, 0.0, 0.0, 0.0, 0.5, 0), "brown"),
            (ParamPoint::new(0.0, -0.1, 0.5, 0.0, 0.0, 0.0, 0), "black"),
            (ParamPoint::new(0.0, 0.7, 0.0, 0.0, 0.0, 0.0, 0), "pink"),
        ])
        .unwrap();

        let origin = TargetPoint::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(distance_of(&tree, tree.search(&origin), &origin), 0);
        assert_eq!(*tree.search(&TargetPoint::new(0.0, 0.3, 0.0, -0.2, 0.0, 1.0)), "purple");
        assert_eq!(*tree.search(&TargetPoint::new(0.0, 0.0, 0.7, -0.2, 0.0, 0.1)), "black");
        assert_eq!(*tree.search(&TargetPoint::new(0.0, 0.6, 0.0, 0.0, 0.0, 0.0)), "pink");
    }

    #[test]
    fn full_range_matches_everything() {
        let range = Param::span(-1.0f32, 1.0).unwrap();
        let tree = SearchTree::new([
            (ParamPoint::new(range, range, range, range, range, range, 0.0f32), "plains"),
            (ParamPoint::new(0.9f32, 0.9, 0.9, 0.9, 0.9, 0.9, 0.0f32), "desert"),
        ])
        .unwrap();
        let target = TargetPoint::new(0.0f32, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(*tree.search(&target), "plains");
        assert_eq!(distance_of(&tree, &"plains", &target), 0);
    }

    #[test]
    fn offset_penalises_entries() {
        let tree = SearchTree::new([
            (ParamPoint::new(0.1f32, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0f32), "near"),
            (
                ParamPoint {
                    offset: QuantizedCoord::from(0.5f32),
                    ..ParamPoint::new(0.0f32, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0f32)
                },
                "offset",
            ),
        ])
        .unwrap();
        let target = TargetPoint::new(0.0f32, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(*tree.search(&target), "near");
    }

    #[test]
    fn matches_linear_scan() {
        let mut random = XoroshiroRandom::new(5150);
        let entries: Vec<(ParamPoint, usize)> = (0..600)
            .map(|i| {
                let offset = random.next_f32() * 0.2;
                let mut range = || random_range(&mut random);
                let point = ParamPoint::new(range(), range(), range(), range(), range(), range(), offset);
                (point, i)
            })
            .collect();
        let tree = SearchTree::new(entries).unwrap();
        let mut hint = SearchHint::new();
        for _ in 0..1000 {
            let target = random_target(&mut random);
            let expected = min_distance(&tree, &target);
            let cold = tree.search(&target);
            let warm = tree.lookup(&target, &mut hint);
            assert_eq!(distance_of(&tree, cold, &target), expected);
            assert_eq!(distance_of(&tree, warm, &target), expected);
            let brute = tree.find_brute_force(&target);
            assert_eq!(
                tree.entries()[*brute].0.fitness(&target),
                tree.entries()[*cold].0.fitness(&target)
            );
        }
    }

    #[test]
    fn coherent_queries_with_hint() {
        let mut random = XoroshiroRandom::new(77);
        let entries: Vec<(ParamPoint, usize)> = (0..200)
            .map(|i| {
                let mut range = || random_range(&mut random);
                (ParamPoint::new(range(), range(), range(), range(), range(), range(), 0.0f32), i)
            })
            .collect();
        let tree = SearchTree::new(entries).unwrap();
        let mut hint = SearchHint::new();
        let mut target = random_target(&mut random);
        for step in 0..500 {
            target.temperature = QuantizedCoord(target.temperature.0 + (step % 7) - 3);
            target.erosion = QuantizedCoord(target.erosion.0 + 5);
            let found = tree.lookup(&target, &mut hint);
            assert_eq!(distance_of(&tree, found, &target), min_distance(&tree, &target));
        }
        hint.reset();
        assert_eq!(hint, SearchHint::default());
    }

    #[test]
    fn stale_hint_is_ignored() {
        let tree = SearchTree::new([(ParamPoint::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0), 'a')]).unwrap();
        let mut hint = SearchHint { last: Some(40) };
        assert_eq!(*tree.lookup(&TargetPoint::default(), &mut hint), 'a');
        assert_eq!(hint, SearchHint { last: Some(0) });
    }

    #[test]
    fn empty_tree_fails() {
        assert!(SearchTree::<u8>::new([]).is_err());
    }

    #[test]
    fn buckets_are_powers_of_six() {
        assert_eq!(bucket_size(7), 6);
        assert_eq!(bucket_size(36), 6);
        assert_eq!(bucket_size(37), 36);
        assert_eq!(bucket_size(600), 216);
    }
}
