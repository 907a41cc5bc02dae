//! Boykov–Kolmogorov augmenting-path max-flow with Kohli dynamic reuse.
//!
//! Two search trees rooted at the implicit terminals grow from FIFO active
//! fronts; when they touch, the bridging path is augmented and saturated
//! edges orphan their children; orphans are re-parented (or freed) before
//! growth resumes. Parent links are direction indices into the neighbourhood
//! table, so tree state is a few bytes per node.
//!
//! Terminal capacities are stored canonically as one signed excess per node:
//! `min(c_s, c_t)` is pushed through the terminal pair immediately and only
//! the difference remains. When capacities change between computes (the
//! Kohli reuse path) the stored per-node terminal flows reconstruct the new
//! residuals; where routed flow exceeds a shrunken capacity, both terminals
//! are padded equally — every s-t cut contains exactly one terminal edge per
//! node, so the partition is unchanged and the pad is subtracted from the
//! reported flow value.

use std::collections::VecDeque;

use super::grid_state::GridState;
use super::{MaxFlowEngine, Terminal};
use crate::error::SegError;
use crate::grid::Neighborhood;
use crate::Real;

const PARENT_NONE: u8 = u8::MAX;
const PARENT_TERMINAL: u8 = u8::MAX - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) enum Tree {
    #[default]
    Free,
    Source,
    Sink,
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct NodeState {
    pub tree: Tree,
    /// Direction index to the parent, or one of the sentinels above.
    pub parent: u8,
    /// Timestamp of the last root-path verification.
    pub time: u32,
    /// Cached distance to the terminal root (roots have distance 1).
    pub dist: u32,
}

/// Grid Boykov–Kolmogorov engine with Kohli dynamic reuse (`GRD-KO`).
#[derive(Debug)]
pub struct GridKohli<T> {
    pub(crate) g: GridState<T>,
    /// Residual signed terminal excess (canonical: one side is zero).
    pub(crate) excess: Vec<T>,
    /// Flow absorbed through each node's source / sink terminal edge.
    pub(crate) fterm_src: Vec<T>,
    pub(crate) fterm_snk: Vec<T>,
    pub(crate) nodes: Vec<NodeState>,
    active: VecDeque<u32>,
    orphans: VecDeque<u32>,
    time: u32,
    flow: T,
    pad: T,
    ran: bool,
    init_labels: Vec<u8>,
}

impl<T: Real> Default for GridKohli<T> {
    fn default() -> Self {
        Self {
            g: GridState::default(),
            excess: Vec::new(),
            fterm_src: Vec::new(),
            fterm_snk: Vec::new(),
            nodes: Vec::new(),
            active: VecDeque::new(),
            orphans: VecDeque::new(),
            time: 0,
            flow: T::zero(),
            pad: T::zero(),
            ran: false,
            init_labels: Vec::new(),
        }
    }
}

impl<T: Real> GridKohli<T> {
    fn build_trees(&mut self) {
        let zero = T::zero();
        self.time = 0;
        self.active.clear();
        self.orphans.clear();
        for v in 0..self.g.n {
            let e = self.excess[v];
            self.nodes[v] = if e > zero {
                self.active.push_back(v as u32);
                NodeState {
                    tree: Tree::Source,
                    parent: PARENT_TERMINAL,
                    time: 0,
                    dist: 1,
                }
            } else if e < zero {
                self.active.push_back(v as u32);
                NodeState {
                    tree: Tree::Sink,
                    parent: PARENT_TERMINAL,
                    time: 0,
                    dist: 1,
                }
            } else {
                NodeState {
                    tree: Tree::Free,
                    parent: PARENT_NONE,
                    time: 0,
                    dist: 0,
                }
            };
        }
    }

    /// Growth phase: expand both trees until they touch. Returns the bridge
    /// `(u, v, dir)` with `u` on the source side and `v = u + d_dir` on the
    /// sink side, or `None` once the active set is exhausted.
    fn grow(&mut self) -> Option<(usize, usize, usize)> {
        let zero = T::zero();
        let m = self.g.m;
        while let Some(p32) = self.active.pop_front() {
            let p = p32 as usize;
            let pt = self.nodes[p].tree;
            if pt == Tree::Free {
                continue; // stale queue entry
            }
            for i in 0..m {
                let Some(q) = self.g.neighbor(p, i) else {
                    continue;
                };
                let res = match pt {
                    Tree::Source => self.g.rc[self.g.edge(p, i)],
                    Tree::Sink => self.g.rc[self.g.edge(q, i ^ 1)],
                    Tree::Free => unreachable!(),
                };
                if !(res > zero) {
                    continue;
                }
                match self.nodes[q].tree {
                    Tree::Free => {
                        self.nodes[q] = NodeState {
                            tree: pt,
                            parent: (i ^ 1) as u8,
                            time: self.nodes[p].time,
                            dist: self.nodes[p].dist + 1,
                        };
                        self.active.push_back(q as u32);
                    }
                    t if t == pt => {
                        // Heuristic from the original solver: adopt a closer
                        // parent when the candidate's path is fresher.
                        if self.nodes[q].time <= self.nodes[p].time
                            && self.nodes[q].dist > self.nodes[p].dist + 1
                        {
                            self.nodes[q].parent = (i ^ 1) as u8;
                            self.nodes[q].time = self.nodes[p].time;
                            self.nodes[q].dist = self.nodes[p].dist + 1;
                        }
                    }
                    _ => {
                        // Trees touched; rescan p after the augmentation.
                        self.active.push_front(p32);
                        return Some(if pt == Tree::Source {
                            (p, q, i)
                        } else {
                            (q, p, i ^ 1)
                        });
                    }
                }
            }
        }
        None
    }

    /// Augmentation: bottleneck over the whole s-t path, then push, orphaning
    /// children whose parent edge saturates.
    fn augment(&mut self, u: usize, v: usize, dir: usize) -> T {
        let zero = T::zero();
        let m = self.g.m;

        // Bottleneck: bridge, source segment plus root excess, sink segment
        // plus root deficit.
        let mut delta = self.g.rc[u * m + dir];
        let mut x = u;
        loop {
            let p = self.nodes[x].parent;
            if p == PARENT_TERMINAL {
                delta = delta.min(self.excess[x]);
                break;
            }
            let j = p as usize;
            let pn = self.g.neighbor(x, j).expect("parent link stays on the grid");
            delta = delta.min(self.g.rc[pn * m + (j ^ 1)]);
            x = pn;
        }
        let mut x = v;
        loop {
            let p = self.nodes[x].parent;
            if p == PARENT_TERMINAL {
                delta = delta.min(-self.excess[x]);
                break;
            }
            let j = p as usize;
            let pn = self.g.neighbor(x, j).expect("parent link stays on the grid");
            delta = delta.min(self.g.rc[x * m + j]);
            x = pn;
        }
        debug_assert!(delta > zero, "bridge must carry positive residual");

        // Push along the bridge.
        self.g.rc[u * m + dir] -= delta;
        self.g.rc[v * m + (dir ^ 1)] += delta;

        // Source segment: flow runs parent -> child; saturation orphans the
        // child end of the edge.
        let mut x = u;
        loop {
            let p = self.nodes[x].parent;
            if p == PARENT_TERMINAL {
                self.excess[x] -= delta;
                self.fterm_src[x] += delta;
                if !(self.excess[x] > zero) {
                    self.make_orphan(x);
                }
                break;
            }
            let j = p as usize;
            let pn = self.g.neighbor(x, j).expect("parent link stays on the grid");
            self.g.rc[pn * m + (j ^ 1)] -= delta;
            self.g.rc[x * m + j] += delta;
            if !(self.g.rc[pn * m + (j ^ 1)] > zero) {
                self.make_orphan(x);
            }
            x = pn;
        }
        // Sink segment: flow runs child -> parent.
        let mut x = v;
        loop {
            let p = self.nodes[x].parent;
            if p == PARENT_TERMINAL {
                self.excess[x] += delta;
                self.fterm_snk[x] += delta;
                if !(self.excess[x] < zero) {
                    self.make_orphan(x);
                }
                break;
            }
            let j = p as usize;
            let pn = self.g.neighbor(x, j).expect("parent link stays on the grid");
            self.g.rc[x * m + j] -= delta;
            self.g.rc[pn * m + (j ^ 1)] += delta;
            if !(self.g.rc[x * m + j] > zero) {
                self.make_orphan(x);
            }
            x = pn;
        }

        self.flow += delta;
        delta
    }

    #[inline]
    fn make_orphan(&mut self, v: usize) {
        self.nodes[v].parent = PARENT_NONE;
        self.orphans.push_back(v as u32);
    }

    /// Adoption phase: re-parent orphans within their tree (origin-verified,
    /// closest first) or free them, re-activating the frontier around them.
    fn adopt(&mut self) {
        let zero = T::zero();
        let m = self.g.m;
        while let Some(o32) = self.orphans.pop_front() {
            let o = o32 as usize;
            if self.nodes[o].parent != PARENT_NONE {
                continue; // re-rooted since it was enqueued
            }
            let t = self.nodes[o].tree;
            if t == Tree::Free {
                continue;
            }
            let mut best_dir: Option<usize> = None;
            let mut best_dist = u32::MAX;
            for i in 0..m {
                let Some(q) = self.g.neighbor(o, i) else {
                    continue;
                };
                if self.nodes[q].tree != t {
                    continue;
                }
                let res = match t {
                    Tree::Source => self.g.rc[q * m + (i ^ 1)],
                    Tree::Sink => self.g.rc[o * m + i],
                    Tree::Free => unreachable!(),
                };
                if !(res > zero) {
                    continue;
                }
                let Some(d) = self.root_dist(q) else {
                    continue;
                };
                if d + 1 < best_dist {
                    best_dist = d + 1;
                    best_dir = Some(i);
                }
            }
            if let Some(i) = best_dir {
                self.nodes[o].parent = i as u8;
                self.nodes[o].time = self.time;
                self.nodes[o].dist = best_dist;
            } else {
                // No parent: free the orphan, re-activate the same-tree
                // frontier around it, cascade to its children.
                for i in 0..m {
                    let Some(q) = self.g.neighbor(o, i) else {
                        continue;
                    };
                    if self.nodes[q].tree != t {
                        continue;
                    }
                    let res_toward = match t {
                        Tree::Source => self.g.rc[q * m + (i ^ 1)],
                        Tree::Sink => self.g.rc[o * m + i],
                        Tree::Free => unreachable!(),
                    };
                    if res_toward > zero {
                        self.active.push_back(q as u32);
                    }
                    if self.nodes[q].parent == (i ^ 1) as u8 {
                        self.make_orphan(q);
                    }
                }
                self.nodes[o].tree = Tree::Free;
                self.nodes[o].parent = PARENT_NONE;
            }
        }
    }

    /// Verified distance of `q` to its terminal root, or `None` if the path
    /// dead-ends in an orphan. Stamps the walked prefix with the current
    /// timestamp so repeated checks stay cheap.
    fn root_dist(&mut self, q: usize) -> Option<u32> {
        let mut x = q;
        let mut steps = 0u32;
        let base;
        loop {
            if self.nodes[x].time == self.time {
                base = self.nodes[x].dist;
                break;
            }
            match self.nodes[x].parent {
                PARENT_NONE => return None,
                PARENT_TERMINAL => {
                    self.nodes[x].time = self.time;
                    self.nodes[x].dist = 1;
                    base = 1;
                    break;
                }
                j => {
                    x = self
                        .g
                        .neighbor(x, j as usize)
                        .expect("parent link stays on the grid");
                    steps += 1;
                }
            }
        }
        let dist_q = base + steps;
        let mut x = q;
        let mut d = dist_q;
        while self.nodes[x].time != self.time {
            self.nodes[x].time = self.time;
            self.nodes[x].dist = d;
            d -= 1;
            let j = self.nodes[x].parent as usize;
            x = self
                .g
                .neighbor(x, j)
                .expect("parent link stays on the grid");
        }
        Some(dist_q)
    }

    /// Kohli update path: rebuild a node's terminal residuals from the new
    /// capacities and the flow already routed through its terminal pair, then
    /// repair the trees locally.
    fn update_terminal(&mut self, v: usize, source: T, sink: T) {
        let zero = T::zero();
        let mut rs = source - self.fterm_src[v];
        let mut rt = sink - self.fterm_snk[v];
        // Routed flow exceeds a shrunken capacity: pad both terminals.
        let deficit = (-rs.min(rt)).max(zero);
        if deficit > zero {
            rs += deficit;
            rt += deficit;
            self.pad += deficit;
        }
        // Canonical push through the terminal pair.
        let through = rs.min(rt);
        if through > zero {
            self.flow += through;
            self.fterm_src[v] += through;
            self.fterm_snk[v] += through;
            rs -= through;
            rt -= through;
        }
        let e = rs - rt;
        let old = self.excess[v];
        self.excess[v] = e;
        if e == old && self.nodes[v].tree != Tree::Free {
            return;
        }
        if e > zero {
            if self.nodes[v].tree == Tree::Sink {
                self.orphan_children(v, Tree::Sink);
            }
            self.nodes[v] = NodeState {
                tree: Tree::Source,
                parent: PARENT_TERMINAL,
                time: self.time,
                dist: 1,
            };
            self.active.push_back(v as u32);
        } else if e < zero {
            if self.nodes[v].tree == Tree::Source {
                self.orphan_children(v, Tree::Source);
            }
            self.nodes[v] = NodeState {
                tree: Tree::Sink,
                parent: PARENT_TERMINAL,
                time: self.time,
                dist: 1,
            };
            self.active.push_back(v as u32);
        } else if self.nodes[v].parent == PARENT_TERMINAL {
            // Root lost its terminal feed; let adoption re-anchor or free it.
            self.make_orphan(v);
        }
    }

    fn orphan_children(&mut self, v: usize, tree: Tree) {
        let m = self.g.m;
        for i in 0..m {
            let Some(q) = self.g.neighbor(v, i) else {
                continue;
            };
            if self.nodes[q].tree == tree && self.nodes[q].parent == (i ^ 1) as u8 {
                self.make_orphan(q);
            }
        }
    }
}

impl<T: Real> MaxFlowEngine<T> for GridKohli<T> {
    fn init(&mut self, shape: &[usize], nbh: &Neighborhood) -> Result<(), SegError> {
        self.g.init(shape, nbh)?;
        debug_assert!(self.g.n <= u32::MAX as usize);
        let n = self.g.n;
        let zero = T::zero();
        self.excess.clear();
        self.excess.resize(n, zero);
        self.fterm_src.clear();
        self.fterm_src.resize(n, zero);
        self.fterm_snk.clear();
        self.fterm_snk.resize(n, zero);
        self.nodes.clear();
        self.nodes.resize(n, NodeState::default());
        self.active.clear();
        self.orphans.clear();
        self.time = 0;
        self.flow = zero;
        self.pad = zero;
        self.ran = false;
        self.init_labels.clear();
        Ok(())
    }

    fn set_terminal_caps(&mut self, node: usize, source: T, sink: T) {
        let zero = T::zero();
        debug_assert!(
            source >= zero && sink >= zero,
            "terminal capacities must be non-negative"
        );
        if self.ran {
            self.update_terminal(node, source, sink);
        } else {
            let through = source.min(sink);
            self.flow += through;
            self.fterm_src[node] = through;
            self.fterm_snk[node] = through;
            self.excess[node] = source - sink;
        }
    }

    fn set_edge_cap(&mut self, node: usize, dir: usize, cap: T) {
        debug_assert!(cap >= T::zero(), "edge capacities must be non-negative");
        debug_assert!(
            !self.ran,
            "edge capacities are fixed once the first compute has run"
        );
        let e = self.g.edge(node, dir);
        self.g.rc[e] = cap;
    }

    fn set_initial_labelling(&mut self, labels: &[u8]) {
        debug_assert_eq!(labels.len(), self.g.n);
        self.init_labels.clear();
        self.init_labels.extend_from_slice(labels);
    }

    fn compute(&mut self) -> T {
        if !self.ran {
            self.build_trees();
            self.ran = true;
        }
        if !self.orphans.is_empty() {
            self.adopt();
        }
        while let Some((u, v, dir)) = self.grow() {
            self.time += 1;
            let _delta = self.augment(u, v, dir);
            self.adopt();
        }
        let value = self.flow - self.pad;
        tracing::debug!(flow = %value, "grid max-flow converged");
        value
    }

    fn terminal_of(&self, node: usize) -> Terminal {
        match self.nodes[node].tree {
            Tree::Sink => Terminal::Sink,
            Tree::Source => Terminal::Source,
            // FREE nodes are unreachable from either terminal; either side is
            // a minimum cut, so follow the labelling hint when there is one.
            Tree::Free => {
                if !self.init_labels.is_empty() && self.init_labels[node] == 0 {
                    Terminal::Sink
                } else {
                    Terminal::Source
                }
            }
        }
    }

    fn residual(&self, node: usize, dir: usize) -> T {
        self.g.rc[self.g.edge(node, dir)]
    }

    fn flow(&self) -> T {
        self.flow - self.pad
    }
}
