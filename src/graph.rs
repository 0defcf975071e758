//! Computation graph container.
//!
//! Holds the node, leaf and gradient handles of one graph build together with
//! the visited set that keeps shared sub-expressions from being registered
//! twice. The container does not evaluate anything: execution logic walks
//! [`ComputationGraph::nodes`] in the direction given by [`EvalOrder`].
//!
//! Capacities are fixed at construction. Node positions, once assigned, never
//! change, so consumers may hold on to indices across calls.

use tracing::debug;

use crate::config::CoreConfig;
use crate::hash_set::{hash_size, IdentityHashSet, IdentityKey};
use crate::log::print_debug;

// ---------------------------------------------------------------------------
// Node identity
// ---------------------------------------------------------------------------

/// Dense identity of a tensor node, assigned when the node is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl IdentityKey for NodeId {
    #[inline]
    fn identity(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out consecutive [`NodeId`]s for one tensor-creation session.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u32,
}

impl NodeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identity.
    ///
    /// # Panics
    /// Panics once all `u32` identities have been handed out.
    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next = self
            .next
            .checked_add(1)
            .expect("node identity space exhausted");
        id
    }

    /// Number of identities handed out so far.
    pub fn allocated(&self) -> usize {
        self.next as usize
    }
}

// ---------------------------------------------------------------------------
// Evaluation order
// ---------------------------------------------------------------------------

/// Direction in which consumers walk the node array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EvalOrder {
    #[default]
    LeftToRight,
    RightToLeft,
}

fn ordered<'a>(nodes: &'a [NodeId], order: EvalOrder) -> Box<dyn Iterator<Item = NodeId> + 'a> {
    match order {
        EvalOrder::LeftToRight => Box::new(nodes.iter().copied()),
        EvalOrder::RightToLeft => Box::new(nodes.iter().rev().copied()),
    }
}

// ---------------------------------------------------------------------------
// ComputationGraph
// ---------------------------------------------------------------------------

/// Fixed-capacity container of graph nodes, leafs and gradients.
#[derive(Debug, Clone)]
pub struct ComputationGraph {
    size: usize,
    /// Tensors whose data changes when the graph is evaluated.
    nodes: Vec<NodeId>,
    /// Tensors with constant data.
    leafs: Vec<NodeId>,
    /// Gradient of `nodes[i]`, when requested.
    grads: Option<Vec<Option<NodeId>>>,
    /// Gradient accumulator of `nodes[i]`, when requested.
    grad_accs: Option<Vec<Option<NodeId>>>,
    visited: IdentityHashSet<NodeId>,
    order: EvalOrder,
}

impl ComputationGraph {
    /// Create a graph holding up to `size` nodes and `size` leafs.
    ///
    /// When `grads` is true, gradient and accumulator slots are allocated
    /// alongside the node array.
    pub fn new(size: usize, grads: bool) -> Self {
        Self::with_order(size, grads, EvalOrder::default())
    }

    /// Create a graph with an explicit evaluation order.
    pub fn with_order(size: usize, grads: bool, order: EvalOrder) -> Self {
        let hash_size = hash_size(size);
        debug!(size, hash_size, grads, ?order, "created computation graph");
        print_debug(
            5,
            format_args!("graph: size = {}, visited slots = {}", size, hash_size),
        );
        Self {
            size,
            nodes: Vec::with_capacity(size),
            leafs: Vec::with_capacity(size),
            grads: grads.then(|| vec![None; size]),
            grad_accs: grads.then(|| vec![None; size]),
            visited: IdentityHashSet::new(hash_size),
            order,
        }
    }

    /// Create a graph sized by the configured default graph size.
    pub fn from_config(config: &CoreConfig, grads: bool) -> Self {
        Self::new(config.graph_size, grads)
    }

    /// Maximum number of nodes (and of leafs).
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn n_leafs(&self) -> usize {
        self.leafs.len()
    }

    /// Registered nodes, in registration order.
    #[inline]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Registered leafs, in registration order.
    #[inline]
    pub fn leafs(&self) -> &[NodeId] {
        &self.leafs
    }

    #[inline]
    pub fn order(&self) -> EvalOrder {
        self.order
    }

    pub fn set_order(&mut self, order: EvalOrder) {
        self.order = order;
    }

    /// Whether gradient slots were allocated.
    pub fn has_grads(&self) -> bool {
        self.grads.is_some()
    }

    /// The visited set shared by nodes and leafs.
    pub fn visited(&self) -> &IdentityHashSet<NodeId> {
        &self.visited
    }

    /// Whether `id` has been registered as a node or leaf.
    pub fn contains(&self, id: NodeId) -> bool {
        self.visited.contains(id)
    }

    /// Register `id` as a computed node.
    ///
    /// Returns `false` without changing anything when `id` was already
    /// visited, so shared sub-expressions are counted once.
    ///
    /// # Panics
    /// Panics if the node array is already at capacity.
    pub fn register_node(&mut self, id: NodeId) -> bool {
        if self.visited.contains(id) {
            return false;
        }
        assert!(
            self.nodes.len() < self.size,
            "graph is full: cannot register node {} (size {})",
            id,
            self.size
        );
        self.visited.insert(id);
        self.nodes.push(id);
        true
    }

    /// Register `id` as a constant leaf. Same semantics as [`register_node`](Self::register_node).
    ///
    /// # Panics
    /// Panics if the leaf array is already at capacity.
    pub fn register_leaf(&mut self, id: NodeId) -> bool {
        if self.visited.contains(id) {
            return false;
        }
        assert!(
            self.leafs.len() < self.size,
            "graph is full: cannot register leaf {} (size {})",
            id,
            self.size
        );
        self.visited.insert(id);
        self.leafs.push(id);
        true
    }

    /// Append `id` to the node array without visited-set bookkeeping.
    ///
    /// # Panics
    /// Panics if the node array is already at capacity.
    pub fn add_node(&mut self, id: NodeId) {
        assert!(
            self.nodes.len() < self.size,
            "graph is full: cannot add node {} (size {})",
            id,
            self.size
        );
        self.nodes.push(id);
    }

    /// Node at position `i`. Negative positions count from the end.
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    pub fn node(&self, i: isize) -> NodeId {
        let n = self.nodes.len() as isize;
        let idx = if i < 0 { n + i } else { i };
        assert!(
            (0..n).contains(&idx),
            "node index {} out of range for graph with {} nodes",
            i,
            n
        );
        self.nodes[idx as usize]
    }

    /// Gradient of `nodes[i]`, if one was recorded.
    pub fn grad(&self, i: usize) -> Option<NodeId> {
        self.grads.as_ref().and_then(|g| g[i])
    }

    /// Gradient accumulator of `nodes[i]`, if one was recorded.
    pub fn grad_acc(&self, i: usize) -> Option<NodeId> {
        self.grad_accs.as_ref().and_then(|g| g[i])
    }

    /// Record the gradient of `nodes[i]`.
    ///
    /// # Panics
    /// Panics if the graph has no gradient storage or `i >= n_nodes`.
    pub fn set_grad(&mut self, i: usize, grad: Option<NodeId>) {
        assert!(i < self.nodes.len(), "gradient index {} beyond {} nodes", i, self.nodes.len());
        let grads = self
            .grads
            .as_mut()
            .expect("graph was created without gradient storage");
        grads[i] = grad;
    }

    /// Record the gradient accumulator of `nodes[i]`.
    ///
    /// # Panics
    /// Panics if the graph has no gradient storage or `i >= n_nodes`.
    pub fn set_grad_acc(&mut self, i: usize, acc: Option<NodeId>) {
        assert!(i < self.nodes.len(), "gradient index {} beyond {} nodes", i, self.nodes.len());
        let accs = self
            .grad_accs
            .as_mut()
            .expect("graph was created without gradient storage");
        accs[i] = acc;
    }

    /// Forget all nodes and leafs. Capacity and storage are kept.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.leafs.clear();
        if let Some(grads) = self.grads.as_mut() {
            grads.fill(None);
        }
        if let Some(accs) = self.grad_accs.as_mut() {
            accs.fill(None);
        }
        self.visited.reset();
    }

    /// Copy nodes, leafs and gradients into `dst`, replacing its contents.
    ///
    /// The destination's visited set is rebuilt from the copied handles.
    ///
    /// # Panics
    /// Panics if `dst` is smaller than this graph's node or leaf count, or if
    /// this graph carries gradients and `dst` has no gradient storage.
    pub fn copy_into(&self, dst: &mut ComputationGraph) {
        assert!(
            dst.size >= self.nodes.len() && dst.size >= self.leafs.len(),
            "destination graph too small: size {} for {} nodes and {} leafs",
            dst.size,
            self.nodes.len(),
            self.leafs.len()
        );
        assert!(
            self.grads.is_none() || dst.grads.is_some(),
            "destination graph has no gradient storage"
        );

        dst.clear();
        for &leaf in &self.leafs {
            dst.visited.insert(leaf);
            dst.leafs.push(leaf);
        }
        for (i, &node) in self.nodes.iter().enumerate() {
            dst.visited.insert(node);
            dst.nodes.push(node);
            if let Some(grads) = dst.grads.as_mut() {
                grads[i] = self.grad(i);
            }
            if let Some(accs) = dst.grad_accs.as_mut() {
                accs[i] = self.grad_acc(i);
            }
        }
        dst.order = self.order;
        print_debug(
            10,
            format_args!(
                "graph copy: {} nodes, {} leafs into size {}",
                self.nodes.len(),
                self.leafs.len(),
                dst.size
            ),
        );
        debug!(
            n_nodes = dst.nodes.len(),
            n_leafs = dst.leafs.len(),
            "copied computation graph"
        );
    }

    /// Non-owning view over `nodes[i0..i1]`.
    ///
    /// # Panics
    /// Panics unless `i0 <= i1 <= n_nodes`.
    pub fn view(&self, i0: usize, i1: usize) -> GraphView<'_> {
        assert!(
            i0 <= i1 && i1 <= self.nodes.len(),
            "invalid graph view [{}, {}) over {} nodes",
            i0,
            i1,
            self.nodes.len()
        );
        GraphView {
            nodes: &self.nodes[i0..i1],
            order: self.order,
        }
    }

    /// Nodes in the direction given by [`order`](Self::order).
    pub fn nodes_in_eval_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        ordered(&self.nodes, self.order)
    }
}

// ---------------------------------------------------------------------------
// GraphView
// ---------------------------------------------------------------------------

/// Contiguous sub-range of a graph's nodes, sharing the parent's storage.
///
/// A view has no leafs, no gradients and no visited set of its own; tracking
/// visits while walking a view is up to the caller.
#[derive(Debug, Clone, Copy)]
pub struct GraphView<'a> {
    nodes: &'a [NodeId],
    order: EvalOrder,
}

impl<'a> GraphView<'a> {
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn nodes(&self) -> &'a [NodeId] {
        self.nodes
    }

    /// Node at local position `k`.
    pub fn node(&self, k: usize) -> NodeId {
        self.nodes[k]
    }

    #[inline]
    pub fn order(&self) -> EvalOrder {
        self.order
    }

    /// Nodes in the direction inherited from the parent graph.
    pub fn nodes_in_eval_order(&self) -> impl Iterator<Item = NodeId> + 'a {
        ordered(self.nodes, self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(range: std::ops::Range<u32>) -> Vec<NodeId> {
        range.map(NodeId).collect()
    }

    #[test]
    fn test_allocator_is_dense() {
        let mut alloc = NodeIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        assert_eq!((a, b, c), (NodeId(0), NodeId(1), NodeId(2)));
        assert_eq!(alloc.allocated(), 3);
        assert_eq!(c.index(), 2);
    }

    #[test]
    fn test_new_graph_is_empty() {
        let graph = ComputationGraph::new(16, false);
        assert_eq!(graph.size(), 16);
        assert_eq!(graph.n_nodes(), 0);
        assert_eq!(graph.n_leafs(), 0);
        assert!(!graph.has_grads());
        assert_eq!(graph.order(), EvalOrder::LeftToRight);
        assert!(graph.visited().size() >= 32);
    }

    #[test]
    fn test_register_node_is_idempotent() {
        let mut graph = ComputationGraph::new(8, false);
        assert!(graph.register_node(NodeId(3)));
        assert_eq!(graph.n_nodes(), 1);

        assert!(!graph.register_node(NodeId(3)));
        assert_eq!(graph.n_nodes(), 1);
        assert_eq!(graph.nodes(), &[NodeId(3)]);
    }

    #[test]
    fn test_nodes_and_leafs_share_visited_set() {
        let mut graph = ComputationGraph::new(8, false);
        assert!(graph.register_leaf(NodeId(1)));
        // Already visited as a leaf: not added again as a node.
        assert!(!graph.register_node(NodeId(1)));
        assert!(graph.register_node(NodeId(2)));
        assert_eq!(graph.leafs(), &[NodeId(1)]);
        assert_eq!(graph.nodes(), &[NodeId(2)]);
        assert!(graph.contains(NodeId(1)));
        assert!(graph.contains(NodeId(2)));
        assert!(!graph.contains(NodeId(3)));
    }

    #[test]
    fn test_diamond_dag_registers_shared_node_once() {
        // d = f(b(a), c(a)): `a` is reached twice during traversal.
        let mut alloc = NodeIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        let d = alloc.allocate();

        let mut graph = ComputationGraph::new(8, false);
        for id in [a, b, a, c, d] {
            if id == a {
                graph.register_leaf(id);
            } else {
                graph.register_node(id);
            }
        }
        assert_eq!(graph.leafs(), &[a]);
        assert_eq!(graph.nodes(), &[b, c, d]);
    }

    #[test]
    #[should_panic(expected = "graph is full")]
    fn test_register_beyond_capacity_panics() {
        let mut graph = ComputationGraph::new(2, false);
        for id in ids(0..3) {
            graph.register_node(id);
        }
    }

    #[test]
    #[should_panic(expected = "graph is full")]
    fn test_register_leaf_beyond_capacity_panics() {
        let mut graph = ComputationGraph::new(2, false);
        for id in ids(0..3) {
            graph.register_leaf(id);
        }
    }

    #[test]
    fn test_overflow_leaves_visited_set_untouched() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let mut graph = ComputationGraph::new(1, false);
        assert!(graph.register_leaf(NodeId(0)));
        assert!(graph.register_node(NodeId(10)));

        let leaf = catch_unwind(AssertUnwindSafe(|| graph.register_leaf(NodeId(1))));
        assert!(leaf.is_err());
        let node = catch_unwind(AssertUnwindSafe(|| graph.register_node(NodeId(11))));
        assert!(node.is_err());

        assert!(!graph.contains(NodeId(1)));
        assert!(!graph.contains(NodeId(11)));
        assert_eq!(graph.n_leafs(), 1);
        assert_eq!(graph.n_nodes(), 1);
        assert_eq!(graph.visited().len(), 2);

        // Re-registering a known handle on a full graph is still a no-op.
        assert!(!graph.register_leaf(NodeId(0)));
        assert!(!graph.register_node(NodeId(10)));
    }

    #[test]
    fn test_fill_to_capacity() {
        let size = 64;
        let mut graph = ComputationGraph::new(size, false);
        for id in ids(0..size as u32) {
            assert!(graph.register_node(id));
        }
        for id in ids(1000..1000 + size as u32) {
            assert!(graph.register_leaf(id));
        }
        assert_eq!(graph.n_nodes(), size);
        assert_eq!(graph.n_leafs(), size);
    }

    #[test]
    fn test_node_negative_index() {
        let mut graph = ComputationGraph::new(4, false);
        for id in ids(10..13) {
            graph.register_node(id);
        }
        assert_eq!(graph.node(0), NodeId(10));
        assert_eq!(graph.node(-1), NodeId(12));
        assert_eq!(graph.node(-3), NodeId(10));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_node_index_out_of_range() {
        let mut graph = ComputationGraph::new(4, false);
        graph.register_node(NodeId(0));
        graph.node(-2);
    }

    #[test]
    fn test_add_node_skips_visited_set() {
        let mut graph = ComputationGraph::new(4, false);
        graph.add_node(NodeId(7));
        assert_eq!(graph.n_nodes(), 1);
        assert!(!graph.contains(NodeId(7)));
    }

    #[test]
    fn test_gradients_are_positional() {
        let mut graph = ComputationGraph::new(4, true);
        for id in ids(0..3) {
            graph.register_node(id);
        }
        assert!(graph.has_grads());
        assert_eq!(graph.grad(0), None);

        graph.set_grad(1, Some(NodeId(101)));
        graph.set_grad_acc(1, Some(NodeId(201)));
        assert_eq!(graph.grad(1), Some(NodeId(101)));
        assert_eq!(graph.grad_acc(1), Some(NodeId(201)));
        assert_eq!(graph.grad(2), None);

        graph.set_grad(1, None);
        assert_eq!(graph.grad(1), None);
    }

    #[test]
    fn test_grad_without_storage_is_none() {
        let mut graph = ComputationGraph::new(4, false);
        graph.register_node(NodeId(0));
        assert_eq!(graph.grad(0), None);
        assert_eq!(graph.grad_acc(0), None);
    }

    #[test]
    #[should_panic(expected = "without gradient storage")]
    fn test_set_grad_without_storage_panics() {
        let mut graph = ComputationGraph::new(4, false);
        graph.register_node(NodeId(0));
        graph.set_grad(0, Some(NodeId(1)));
    }

    #[test]
    fn test_clear_allows_rebuild() {
        let mut graph = ComputationGraph::new(4, true);
        graph.register_leaf(NodeId(0));
        graph.register_node(NodeId(1));
        graph.set_grad(0, Some(NodeId(9)));

        graph.clear();
        assert_eq!(graph.n_nodes(), 0);
        assert_eq!(graph.n_leafs(), 0);
        assert!(!graph.contains(NodeId(1)));

        assert!(graph.register_node(NodeId(1)));
        assert_eq!(graph.grad(0), None);
    }

    #[test]
    fn test_copy_into() {
        let mut src = ComputationGraph::with_order(4, true, EvalOrder::RightToLeft);
        src.register_leaf(NodeId(0));
        src.register_node(NodeId(1));
        src.register_node(NodeId(2));
        src.set_grad(1, Some(NodeId(50)));

        let mut dst = ComputationGraph::new(8, true);
        dst.register_node(NodeId(99));
        src.copy_into(&mut dst);

        assert_eq!(dst.nodes(), src.nodes());
        assert_eq!(dst.leafs(), src.leafs());
        assert_eq!(dst.grad(1), Some(NodeId(50)));
        assert_eq!(dst.order(), EvalOrder::RightToLeft);
        assert!(dst.contains(NodeId(2)));
        assert!(!dst.contains(NodeId(99)));
        assert!(!dst.register_node(NodeId(1)));
    }

    #[test]
    #[should_panic(expected = "destination graph too small")]
    fn test_copy_into_too_small() {
        let mut src = ComputationGraph::new(4, false);
        for id in ids(0..3) {
            src.register_node(id);
        }
        let mut dst = ComputationGraph::new(2, false);
        src.copy_into(&mut dst);
    }

    #[test]
    fn test_view_correctness() {
        let mut graph = ComputationGraph::new(16, false);
        for id in ids(100..110) {
            graph.register_node(id);
        }
        let (i0, i1) = (3, 8);
        let view = graph.view(i0, i1);
        assert_eq!(view.n_nodes(), i1 - i0);
        for k in 0..view.n_nodes() {
            assert_eq!(view.node(k), graph.nodes()[i0 + k]);
        }
        // Shares storage with the parent.
        assert!(std::ptr::eq(view.nodes().as_ptr(), graph.nodes()[i0..].as_ptr()));
    }

    #[test]
    fn test_empty_and_full_views() {
        let mut graph = ComputationGraph::new(4, false);
        for id in ids(0..4) {
            graph.register_node(id);
        }
        assert_eq!(graph.view(2, 2).n_nodes(), 0);
        assert_eq!(graph.view(0, 4).nodes(), graph.nodes());
    }

    #[test]
    #[should_panic(expected = "invalid graph view")]
    fn test_view_past_end_panics() {
        let mut graph = ComputationGraph::new(4, false);
        graph.register_node(NodeId(0));
        graph.view(0, 2);
    }

    #[test]
    fn test_eval_order_iteration() {
        let mut graph = ComputationGraph::with_order(4, false, EvalOrder::RightToLeft);
        for id in ids(0..3) {
            graph.register_node(id);
        }
        let order: Vec<NodeId> = graph.nodes_in_eval_order().collect();
        assert_eq!(order, vec![NodeId(2), NodeId(1), NodeId(0)]);

        let view = graph.view(1, 3);
        assert_eq!(view.order(), EvalOrder::RightToLeft);
        let order: Vec<NodeId> = view.nodes_in_eval_order().collect();
        assert_eq!(order, vec![NodeId(2), NodeId(1)]);

        graph.set_order(EvalOrder::LeftToRight);
        let order: Vec<NodeId> = graph.nodes_in_eval_order().collect();
        assert_eq!(order, ids(0..3));
    }

    #[test]
    fn test_from_config() {
        let config = CoreConfig {
            graph_size: 32,
            ..CoreConfig::default()
        };
        let graph = ComputationGraph::from_config(&config, true);
        assert_eq!(graph.size(), 32);
        assert!(graph.has_grads());
    }
}
