use super::grid_state::GridState;
use super::*;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Capacity assignment for one test instance.
#[derive(Clone, Debug)]
struct Caps {
    cs: Vec<f64>,
    ct: Vec<f64>,
    edge: Vec<f64>,
}

fn geometry(shape: &[usize], nbh: &Neighborhood) -> GridState<f64> {
    let mut g = GridState::default();
    g.init(shape, nbh).unwrap();
    g
}

fn random_caps(shape: &[usize], nbh: &Neighborhood, seed: u64) -> Caps {
    let g = geometry(shape, nbh);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut caps = Caps {
        cs: vec![0.0; g.n],
        ct: vec![0.0; g.n],
        edge: vec![0.0; g.n * g.m],
    };
    for v in 0..g.n {
        caps.cs[v] = rng.gen::<f64>();
        caps.ct[v] = rng.gen::<f64>();
        for i in 0..g.m {
            if g.neighbor(v, i).is_some() {
                caps.edge[v * g.m + i] = rng.gen::<f64>();
            }
        }
    }
    caps
}

fn load(
    engine: &mut dyn MaxFlowEngine<f64>,
    shape: &[usize],
    nbh: &Neighborhood,
    caps: &Caps,
) {
    let g = geometry(shape, nbh);
    engine.init(shape, nbh).unwrap();
    for v in 0..g.n {
        for i in 0..g.m {
            if g.neighbor(v, i).is_some() {
                engine.set_edge_cap(v, i, caps.edge[v * g.m + i]);
            }
        }
    }
    for v in 0..g.n {
        engine.set_terminal_caps(v, caps.cs[v], caps.ct[v]);
    }
}

/// Capacity of the cut induced by an engine's labelling.
fn cut_value(
    engine: &dyn MaxFlowEngine<f64>,
    shape: &[usize],
    nbh: &Neighborhood,
    caps: &Caps,
) -> f64 {
    let g = geometry(shape, nbh);
    let mut total = 0.0;
    for v in 0..g.n {
        match engine.terminal_of(v) {
            Terminal::Sink => total += caps.cs[v],
            Terminal::Source => total += caps.ct[v],
        }
        if engine.terminal_of(v) == Terminal::Source {
            for i in 0..g.m {
                if let Some(q) = g.neighbor(v, i) {
                    if engine.terminal_of(q) == Terminal::Sink {
                        total += caps.edge[v * g.m + i];
                    }
                }
            }
        }
    }
    total
}

#[test]
fn two_node_bottleneck() {
    let nbh = Neighborhood::from_symbol("N4").unwrap();
    let shape = [1usize, 2];
    let g = geometry(&shape, &nbh);
    let mut caps = Caps {
        cs: vec![5.0, 0.0],
        ct: vec![0.0, 3.0],
        edge: vec![0.0; g.n * g.m],
    };
    // Direction 0 is (0, 1): node 0 -> node 1; direction 1 is the reverse.
    caps.edge[0] = 2.0;
    caps.edge[g.m + 1] = 2.0;
    let mut eng = GridKohli::<f64>::default();
    load(&mut eng, &shape, &nbh, &caps);
    let flow = eng.compute();
    assert!((flow - 2.0).abs() < 1e-12);
    assert_eq!(eng.terminal_of(0), Terminal::Source);
    assert_eq!(eng.terminal_of(1), Terminal::Sink);
}

#[test]
fn lone_node_pushes_through_terminals() {
    let nbh = Neighborhood::from_symbol("N4").unwrap();
    let shape = [1usize, 1];
    let mut eng = GridKohli::<f64>::default();
    eng.init(&shape, &nbh).unwrap();
    eng.set_terminal_caps(0, 5.0, 3.0);
    let flow = eng.compute();
    assert!((flow - 3.0).abs() < 1e-12);
    assert_eq!(eng.terminal_of(0), Terminal::Source);
}

#[test]
fn terminal_limited_path_frees_and_regrows() {
    // s->0 carries 5, 0->1 carries 10, 1->t carries 7: the source arc is the
    // bottleneck, so node 0 ends on the sink side of the cut.
    let nbh = Neighborhood::from_symbol("N4").unwrap();
    let shape = [1usize, 2];
    let g = geometry(&shape, &nbh);
    let mut caps = Caps {
        cs: vec![5.0, 0.0],
        ct: vec![0.0, 7.0],
        edge: vec![0.0; g.n * g.m],
    };
    caps.edge[0] = 10.0;
    caps.edge[g.m + 1] = 10.0;
    let mut eng = GridKohli::<f64>::default();
    load(&mut eng, &shape, &nbh, &caps);
    let flow = eng.compute();
    assert!((flow - 5.0).abs() < 1e-12);
    assert_eq!(eng.terminal_of(0), Terminal::Sink);
    assert_eq!(eng.terminal_of(1), Terminal::Sink);
}

#[test]
fn engines_agree_on_random_grids() {
    let nbh = Neighborhood::from_symbol("N8").unwrap();
    let shape = [4usize, 5];
    for seed in 0..10u64 {
        let caps = random_caps(&shape, &nbh, seed);
        let mut flows = Vec::new();
        for sel in [
            MaxFlowSelector::GridKohli,
            MaxFlowSelector::GridPrFifo,
            MaxFlowSelector::GridPrHighest,
        ] {
            let mut eng = make_engine::<f64>(sel);
            load(eng.as_mut(), &shape, &nbh, &caps);
            let flow = eng.compute();
            let cut = cut_value(eng.as_ref(), &shape, &nbh, &caps);
            assert!(
                (flow - cut).abs() < 1e-9,
                "{}: flow {flow} vs cut {cut} (seed {seed})",
                sel.symbol()
            );
            flows.push(flow);
        }
        assert!((flows[0] - flows[1]).abs() < 1e-9, "seed {seed}");
        assert!((flows[0] - flows[2]).abs() < 1e-9, "seed {seed}");
    }
}

#[test]
fn engines_agree_in_three_dimensions() {
    let nbh = Neighborhood::from_symbol("N6").unwrap();
    let shape = [3usize, 3, 3];
    for seed in 0..4u64 {
        let caps = random_caps(&shape, &nbh, seed);
        let mut bk = make_engine::<f64>(MaxFlowSelector::GridKohli);
        let mut pr = make_engine::<f64>(MaxFlowSelector::GridPrHighest);
        load(bk.as_mut(), &shape, &nbh, &caps);
        load(pr.as_mut(), &shape, &nbh, &caps);
        let a = bk.compute();
        let b = pr.compute();
        assert!((a - b).abs() < 1e-9, "seed {seed}: {a} vs {b}");
    }
}

#[test]
fn flow_is_feasible_and_conserved() {
    let nbh = Neighborhood::from_symbol("N4").unwrap();
    let shape = [4usize, 4];
    let caps = random_caps(&shape, &nbh, 7);
    let g = geometry(&shape, &nbh);
    let mut eng = GridKohli::<f64>::default();
    load(&mut eng, &shape, &nbh, &caps);
    let _ = eng.compute();
    for v in 0..g.n {
        let mut net_out = 0.0;
        for i in 0..g.m {
            let Some(q) = g.neighbor(v, i) else { continue };
            let f_vi = caps.edge[v * g.m + i] - eng.residual(v, i);
            let f_rev = caps.edge[q * g.m + (i ^ 1)] - eng.residual(q, i ^ 1);
            // Residuals stay within capacity bounds and flows are skew.
            assert!(eng.residual(v, i) >= -1e-12);
            assert!((f_vi + f_rev).abs() < 1e-9, "edge ({v},{i}) not skew");
            net_out += f_vi;
        }
        // Conservation: grid outflow equals terminal inflow minus outflow.
        let expect = eng.fterm_src[v] - eng.fterm_snk[v];
        assert!(
            (net_out - expect).abs() < 1e-9,
            "node {v}: net {net_out} vs terminals {expect}"
        );
    }
}

#[test]
fn kohli_reuse_matches_fresh_solve() {
    let nbh = Neighborhood::from_symbol("N8").unwrap();
    let shape = [5usize, 4];
    for seed in 0..6u64 {
        let caps_a = random_caps(&shape, &nbh, seed);
        let mut caps_b = random_caps(&shape, &nbh, seed + 100);
        caps_b.edge = caps_a.edge.clone(); // only terminal capacities change
        let mut dynamic = GridKohli::<f64>::default();
        load(&mut dynamic, &shape, &nbh, &caps_a);
        let _ = dynamic.compute();
        let g = geometry(&shape, &nbh);
        for v in 0..g.n {
            dynamic.set_terminal_caps(v, caps_b.cs[v], caps_b.ct[v]);
        }
        let reused = dynamic.compute();

        let mut fresh = GridKohli::<f64>::default();
        load(&mut fresh, &shape, &nbh, &caps_b);
        let scratch = fresh.compute();
        assert!(
            (reused - scratch).abs() < 1e-9,
            "seed {seed}: reused {reused} vs scratch {scratch}"
        );
        // The reused labelling must induce a minimum cut of the new graph.
        let cut = cut_value(&dynamic, &shape, &nbh, &caps_b);
        assert!((cut - scratch).abs() < 1e-9, "seed {seed}: cut {cut}");
    }
}

#[test]
fn direction_role_swap_keeps_the_cut() {
    let nbh = Neighborhood::from_symbol("N4").unwrap();
    let swapped = {
        let mut offs = nbh.offsets().to_vec();
        for j in (0..offs.len()).step_by(2) {
            offs.swap(j, j + 1);
        }
        Neighborhood::from_offsets(2, offs)
    };
    let shape = [4usize, 4];
    let caps = random_caps(&shape, &nbh, 11);
    let g = geometry(&shape, &nbh);
    // Same physical graph under the swapped table: direction i becomes i^1.
    let mut caps_swapped = caps.clone();
    for v in 0..g.n {
        for i in 0..g.m {
            caps_swapped.edge[v * g.m + i] = caps.edge[v * g.m + (i ^ 1)];
        }
    }
    let mut a = GridKohli::<f64>::default();
    load(&mut a, &shape, &nbh, &caps);
    let mut b = GridKohli::<f64>::default();
    load(&mut b, &shape, &swapped, &caps_swapped);
    let fa = a.compute();
    let fb = b.compute();
    assert!((fa - fb).abs() < 1e-12);
    for v in 0..g.n {
        assert_eq!(a.terminal_of(v), b.terminal_of(v), "node {v}");
    }
}

#[test]
fn isolated_node_defaults_to_source_side() {
    let nbh = Neighborhood::from_symbol("N4").unwrap();
    let shape = [2usize, 2];
    let mut eng = GridKohli::<f64>::default();
    eng.init(&shape, &nbh).unwrap();
    for v in 0..4 {
        eng.set_terminal_caps(v, 0.0, 0.0);
    }
    let flow = eng.compute();
    assert_eq!(flow, 0.0);
    assert_eq!(eng.terminal_of(0), Terminal::Source);
    // With a labelling hint, FREE nodes follow it instead.
    eng.set_initial_labelling(&[0, 0, 1, 1]);
    assert_eq!(eng.terminal_of(0), Terminal::Sink);
    assert_eq!(eng.terminal_of(2), Terminal::Source);
}

#[test]
fn selector_symbols_parse() {
    assert_eq!(
        MaxFlowSelector::from_symbol("GRD-KO").unwrap(),
        MaxFlowSelector::GridKohli
    );
    assert_eq!(
        MaxFlowSelector::from_symbol("GRD-PRF").unwrap(),
        MaxFlowSelector::GridPrFifo
    );
    assert_eq!(
        MaxFlowSelector::from_symbol("GRD-PRH").unwrap(),
        MaxFlowSelector::GridPrHighest
    );
    assert!(MaxFlowSelector::from_symbol("GEN-BK").is_err());
    assert!(MaxFlowSelector::from_symbol("bogus").is_err());
}

#[test]
fn neighbor_lookup_respects_bounds() {
    let nbh = Neighborhood::from_symbol("N8").unwrap();
    let g = geometry(&[3, 3], &nbh);
    // Corner node (0,0) has exactly three in-bounds neighbours under N8.
    let corner = 0usize;
    let count = (0..g.m).filter(|&i| g.neighbor(corner, i).is_some()).count();
    assert_eq!(count, 3);
    // Centre node has all eight.
    let center = 4usize;
    let count = (0..g.m).filter(|&i| g.neighbor(center, i).is_some()).count();
    assert_eq!(count, 8);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn all_engines_agree_on_small_grids(rows in 2usize..4, cols in 2usize..5, seed in 0u64..1000) {
        let nbh = Neighborhood::from_symbol("N4").unwrap();
        let shape = [rows, cols];
        let caps = random_caps(&shape, &nbh, seed);
        let mut flows = Vec::new();
        for sel in [
            MaxFlowSelector::GridKohli,
            MaxFlowSelector::GridPrFifo,
            MaxFlowSelector::GridPrHighest,
        ] {
            let mut eng = make_engine::<f64>(sel);
            load(eng.as_mut(), &shape, &nbh, &caps);
            let flow = eng.compute();
            let cut = cut_value(eng.as_ref(), &shape, &nbh, &caps);
            prop_assert!((flow - cut).abs() < 1e-9);
            flows.push(flow);
        }
        prop_assert!((flows[0] - flows[1]).abs() < 1e-9);
        prop_assert!((flows[0] - flows[2]).abs() < 1e-9);
    }
}
