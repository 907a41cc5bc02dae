//! Push-relabel max-flow on the grid (`GRD-PRF` FIFO, `GRD-PRH` highest
//! level).
//!
//! The terminals are implicit: source arcs are saturated up front (every node
//! starts with its source capacity as excess and can return surplus once it
//! has climbed past the source height n), sink arcs are admissible at height
//! one. Pristine capacities are kept separately and the working residuals are
//! rebuilt on every `compute`; the cut is read back by a reverse-residual
//! search from the sink.

use std::collections::VecDeque;

use super::grid_state::GridState;
use super::{MaxFlowEngine, Terminal};
use crate::error::SegError;
use crate::grid::Neighborhood;
use crate::Real;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flavor {
    Fifo,
    HighestLevel,
}

/// Grid push-relabel engine; the flavor picks the active-node discipline.
#[derive(Debug)]
pub struct GridPushRelabel<T> {
    g: GridState<T>,
    cap_edge: Vec<T>,
    cap_src: Vec<T>,
    cap_snk: Vec<T>,
    ex: Vec<T>,
    height: Vec<u32>,
    src_res: Vec<T>,
    snk_res: Vec<T>,
    cur_arc: Vec<u32>,
    sink_side: Vec<bool>,
    flavor: Flavor,
    flow: T,
}

impl<T: Real> GridPushRelabel<T> {
    pub fn fifo() -> Self {
        Self::with_flavor(Flavor::Fifo)
    }

    pub fn highest_level() -> Self {
        Self::with_flavor(Flavor::HighestLevel)
    }

    fn with_flavor(flavor: Flavor) -> Self {
        Self {
            g: GridState::default(),
            cap_edge: Vec::new(),
            cap_src: Vec::new(),
            cap_snk: Vec::new(),
            ex: Vec::new(),
            height: Vec::new(),
            src_res: Vec::new(),
            snk_res: Vec::new(),
            cur_arc: Vec::new(),
            sink_side: Vec::new(),
            flavor,
            flow: T::zero(),
        }
    }

    /// Breadth-first distances to the sink over reverse residuals; nodes that
    /// cannot reach the sink start at height n + 1 (source level plus one).
    fn heights_from_sink(&mut self) {
        let zero = T::zero();
        let n = self.g.n;
        let m = self.g.m;
        let far = (n + 1) as u32;
        for h in self.height.iter_mut() {
            *h = far;
        }
        let mut queue = VecDeque::new();
        for v in 0..n {
            if self.snk_res[v] > zero {
                self.height[v] = 1;
                queue.push_back(v as u32);
            }
        }
        while let Some(v32) = queue.pop_front() {
            let v = v32 as usize;
            let hv = self.height[v];
            for i in 0..m {
                let Some(q) = self.g.neighbor(v, i) else {
                    continue;
                };
                // q can push toward v along the reverse direction.
                if self.height[q] == far && self.g.rc[q * m + (i ^ 1)] > zero {
                    self.height[q] = hv + 1;
                    queue.push_back(q as u32);
                }
            }
        }
    }

    /// Fully discharge one active node: push downhill, relabel when stuck.
    fn discharge(&mut self, v: usize, activated: &mut Vec<u32>) {
        let zero = T::zero();
        let n = self.g.n;
        let m = self.g.m;
        while self.ex[v] > zero {
            let h = self.height[v];
            if h == 1 && self.snk_res[v] > zero {
                let d = self.ex[v].min(self.snk_res[v]);
                self.snk_res[v] -= d;
                self.ex[v] -= d;
                self.flow += d;
                continue;
            }
            if h == (n + 1) as u32 && self.src_res[v] > zero {
                let d = self.ex[v].min(self.src_res[v]);
                self.src_res[v] -= d;
                self.ex[v] -= d;
                continue;
            }
            let mut advanced = false;
            while (self.cur_arc[v] as usize) < m {
                let i = self.cur_arc[v] as usize;
                let e = v * m + i;
                if self.g.rc[e] > zero {
                    if let Some(q) = self.g.neighbor(v, i) {
                        if self.height[v] == self.height[q] + 1 {
                            let d = self.ex[v].min(self.g.rc[e]);
                            self.g.rc[e] -= d;
                            self.g.rc[q * m + (i ^ 1)] += d;
                            let was_inactive = !(self.ex[q] > zero);
                            self.ex[q] += d;
                            self.ex[v] -= d;
                            if was_inactive && self.ex[q] > zero {
                                activated.push(q as u32);
                            }
                            if !(self.ex[v] > zero) {
                                advanced = true;
                                break;
                            }
                            // Arc saturated, move on; otherwise keep pushing
                            // on it next round.
                            if !(self.g.rc[e] > zero) {
                                self.cur_arc[v] += 1;
                            }
                            continue;
                        }
                    }
                }
                self.cur_arc[v] += 1;
            }
            if advanced || !(self.ex[v] > zero) {
                break;
            }
            // Relabel: one above the lowest residual arc.
            let mut min_h = u32::MAX;
            for i in 0..m {
                if self.g.rc[v * m + i] > zero {
                    if let Some(q) = self.g.neighbor(v, i) {
                        min_h = min_h.min(self.height[q] + 1);
                    }
                }
            }
            if self.snk_res[v] > zero {
                min_h = min_h.min(1);
            }
            if self.src_res[v] > zero {
                min_h = min_h.min((n + 1) as u32);
            }
            debug_assert!(min_h != u32::MAX, "active node lost every residual arc");
            debug_assert!(min_h > self.height[v], "relabel must raise the height");
            self.height[v] = min_h;
            self.cur_arc[v] = 0;
        }
    }

    /// Classify nodes after the preflow phase: everything that can still
    /// reach the sink through residual capacity is on the sink side.
    fn read_cut(&mut self) {
        let zero = T::zero();
        let n = self.g.n;
        let m = self.g.m;
        for s in self.sink_side.iter_mut() {
            *s = false;
        }
        let mut queue = VecDeque::new();
        for v in 0..n {
            if self.snk_res[v] > zero {
                self.sink_side[v] = true;
                queue.push_back(v as u32);
            }
        }
        while let Some(v32) = queue.pop_front() {
            let v = v32 as usize;
            for i in 0..m {
                let Some(q) = self.g.neighbor(v, i) else {
                    continue;
                };
                if !self.sink_side[q] && self.g.rc[q * m + (i ^ 1)] > zero {
                    self.sink_side[q] = true;
                    queue.push_back(q as u32);
                }
            }
        }
    }
}

impl<T: Real> MaxFlowEngine<T> for GridPushRelabel<T> {
    fn init(&mut self, shape: &[usize], nbh: &Neighborhood) -> Result<(), SegError> {
        self.g.init(shape, nbh)?;
        let n = self.g.n;
        let zero = T::zero();
        self.cap_edge.clear();
        self.cap_edge.resize(n * self.g.m, zero);
        self.cap_src.clear();
        self.cap_src.resize(n, zero);
        self.cap_snk.clear();
        self.cap_snk.resize(n, zero);
        self.ex.clear();
        self.ex.resize(n, zero);
        self.height.clear();
        self.height.resize(n, 0);
        self.src_res.clear();
        self.src_res.resize(n, zero);
        self.snk_res.clear();
        self.snk_res.resize(n, zero);
        self.cur_arc.clear();
        self.cur_arc.resize(n, 0);
        self.sink_side.clear();
        self.sink_side.resize(n, false);
        self.flow = zero;
        Ok(())
    }

    fn set_terminal_caps(&mut self, node: usize, source: T, sink: T) {
        debug_assert!(
            source >= T::zero() && sink >= T::zero(),
            "terminal capacities must be non-negative"
        );
        self.cap_src[node] = source;
        self.cap_snk[node] = sink;
    }

    fn set_edge_cap(&mut self, node: usize, dir: usize, cap: T) {
        debug_assert!(cap >= T::zero(), "edge capacities must be non-negative");
        let e = self.g.edge(node, dir);
        self.cap_edge[e] = cap;
    }

    fn set_initial_labelling(&mut self, _labels: &[u8]) {
        // The reverse-residual search classifies every node; there are no
        // FREE nodes to tie-break here.
    }

    fn compute(&mut self) -> T {
        let zero = T::zero();
        let n = self.g.n;
        self.g.rc.copy_from_slice(&self.cap_edge);
        self.flow = zero;
        for v in 0..n {
            self.src_res[v] = self.cap_src[v];
            self.snk_res[v] = self.cap_snk[v];
            self.ex[v] = self.cap_src[v];
            self.cur_arc[v] = 0;
        }
        self.heights_from_sink();

        let mut activated: Vec<u32> = Vec::new();
        match self.flavor {
            Flavor::Fifo => {
                let mut queue: VecDeque<u32> = (0..n as u32)
                    .filter(|&v| self.ex[v as usize] > zero)
                    .collect();
                while let Some(v32) = queue.pop_front() {
                    let v = v32 as usize;
                    if !(self.ex[v] > zero) {
                        continue;
                    }
                    self.discharge(v, &mut activated);
                    for q in activated.drain(..) {
                        queue.push_back(q);
                    }
                }
            }
            Flavor::HighestLevel => {
                let levels = n + 2;
                let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); 2 * levels];
                let mut top = 0usize;
                for v in 0..n {
                    if self.ex[v] > zero {
                        let h = self.height[v] as usize;
                        buckets[h].push(v as u32);
                        top = top.max(h);
                    }
                }
                loop {
                    while top > 0 && buckets[top].is_empty() {
                        top -= 1;
                    }
                    let Some(v32) = buckets[top].pop() else {
                        if top == 0 {
                            break;
                        }
                        continue;
                    };
                    let v = v32 as usize;
                    if !(self.ex[v] > zero) || self.height[v] as usize != top {
                        // Stale entry: the node was drained or relabelled.
                        if self.ex[v] > zero {
                            let h = self.height[v] as usize;
                            buckets[h].push(v32);
                            top = top.max(h);
                        }
                        continue;
                    }
                    self.discharge(v, &mut activated);
                    if self.ex[v] > zero {
                        let h = self.height[v] as usize;
                        buckets[h].push(v32);
                        top = top.max(h);
                    }
                    for q in activated.drain(..) {
                        let h = self.height[q as usize] as usize;
                        buckets[h].push(q);
                        top = top.max(h);
                    }
                }
            }
        }
        debug_assert!(
            self.ex.iter().all(|e| !(*e > zero)),
            "preflow must settle into a flow"
        );
        self.read_cut();
        tracing::debug!(flow = %self.flow, "grid push-relabel converged");
        self.flow
    }

    fn terminal_of(&self, node: usize) -> Terminal {
        if self.sink_side[node] {
            Terminal::Sink
        } else {
            Terminal::Source
        }
    }

    fn residual(&self, node: usize, dir: usize) -> T {
        self.g.rc[self.g.edge(node, dir)]
    }

    fn flow(&self) -> T {
        self.flow
    }
}
