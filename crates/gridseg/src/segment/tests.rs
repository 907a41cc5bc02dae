use super::*;
use crate::array::{Image, NdArray};
use crate::grid::{crofton_weights, MetricTransform, Neighborhood};
use crate::maxflow::MaxFlowSelector;
use crate::synth;

/// Two-intensity image split at `split_col` (left 0.0, right 1.0).
fn split_image(rows: usize, cols: usize, split_col: usize) -> Image<f64> {
    let mut data = NdArray::filled(&[rows, cols], 0.0f64);
    for r in 0..rows {
        for c in split_col..cols {
            *data.at_mut(&[r, c]) = 1.0;
        }
    }
    Image::new(data)
}

fn cv_params(lambda: f64, mu: f64, nbh: &str) -> ChanVeseParams<f64> {
    ChanVeseParams {
        lambda1: lambda,
        lambda2: lambda,
        mu,
        neighborhood: nbh.to_string(),
        ..ChanVeseParams::default()
    }
}

#[test]
fn s1_half_split_recovers_ground_truth() {
    let image = split_image(4, 4, 2);
    let out = chan_vese(&image, &cv_params(10.0, 1.0, "N4"), None).unwrap();
    assert!(out.iterations <= 3);
    assert_eq!(out.status, RunStatus::Converged);
    assert!(out.c1.abs() < 1e-12);
    assert!((out.c2 - 1.0).abs() < 1e-12);
    for r in 0..4 {
        for c in 0..4 {
            let expect = u8::from(c >= 2);
            assert_eq!(*out.labels.at(&[r, c]), expect, "({r},{c})");
        }
    }
}

#[test]
fn s2_checkerboard_with_large_mu_goes_uniform() {
    let image = synth::checkerboard::<f64>(&[8, 8]);
    let out = chan_vese(&image, &cv_params(1.0, 10.0, "N4"), None).unwrap();
    let all0 = out.labels.iter().all(|&l| l == 0);
    let all1 = out.labels.iter().all(|&l| l == 1);
    assert!(all0 || all1, "regularizer must dominate");
    // Either uniform labelling pays exactly the data cost of the minority.
    assert!((out.energy - 32.0).abs() < 1e-9, "energy {}", out.energy);
    // One region is empty afterwards, which is the documented degeneracy.
    assert_eq!(out.status, RunStatus::Degenerate);
}

#[test]
fn s3_gaussian_blob_center_foreground_corners_background() {
    let image = synth::gaussian_blob::<f64>(&[16, 16], &[8.0, 8.0], 3.0);
    let mut params = cv_params(10.0, 1.0, "N8");
    params.convergence = 0.0; // run to the exact fixed point
    let out = chan_vese(&image, &params, None).unwrap();
    assert_eq!(out.status, RunStatus::Converged);
    assert_eq!(*out.labels.at(&[8, 8]), 1);
    for corner in [[0usize, 0usize], [0, 15], [15, 0], [15, 15]] {
        assert_eq!(*out.labels.at(&corner), 0, "{corner:?}");
    }
    // At the fixed point the labelling is the exact minimizer for the final
    // means: no centered disk can do better.
    let nbh = Neighborhood::from_symbol("N8").unwrap();
    let weights = crofton_weights::<f64>(&nbh, &[1.0, 1.0], &MetricTransform::Identity).unwrap();
    let mut geo = crate::maxflow::grid_state::GridState::<f64>::default();
    geo.init(image.shape(), &nbh).unwrap();
    let data = image.data.as_slice();
    for radius in 0..8 {
        let mut disk = NdArray::filled(&[16usize, 16], 0u8);
        for r in 0..16 {
            for c in 0..16 {
                let dr = r as f64 - 8.0;
                let dc = c as f64 - 8.0;
                if (dr * dr + dc * dc).sqrt() <= radius as f64 {
                    *disk.at_mut(&[r, c]) = 1;
                }
            }
        }
        let disk_energy = binary_energy(&geo, &weights, 1.0, &disk, |v, l| {
            let c = if l == 0 { out.c1 } else { out.c2 };
            let d = data[v] - c;
            10.0 * d * d
        });
        assert!(
            out.energy <= disk_energy + 1e-9,
            "disk r={radius}: {} < {}",
            disk_energy,
            out.energy
        );
    }
}

#[test]
fn s4_three_region_mumford_shah() {
    let image = synth::banded_regions::<f64>(10, &[10, 10, 10], &[0.0, 0.5, 1.0], 0.05, 42);
    let params = MumfordShahParams {
        k: 3,
        lambda: vec![10.0],
        neighborhood: "N4".to_string(),
        max_iter: 20,
        ..MumfordShahParams::default()
    };
    let out = mumford_shah(&image, &params).unwrap();
    assert!(out.iterations <= 20);
    // Means recovered within the scenario tolerance (classes sorted).
    let mut means = out.means.clone();
    means.sort_by(|a, b| a.partial_cmp(b).unwrap());
    for (got, want) in means.iter().zip([0.0, 0.5, 1.0]) {
        assert!((got - want).abs() < 0.05, "mean {got} vs {want}");
    }
    // At least 95% of the pixels carry the class of their band.
    let mut correct = 0usize;
    for r in 0..10 {
        for c in 0..30 {
            let band = [0.0, 0.5, 1.0][c / 10];
            let label_mean = out.means[*out.labels.at(&[r, c]) as usize];
            if (label_mean - band).abs() < 0.25 {
                correct += 1;
            }
        }
    }
    assert!(correct >= 285, "only {correct}/300 correct");
}

#[test]
fn s5_single_voxel_foreground_in_volume() {
    let mut data = NdArray::filled(&[4usize, 4, 4], 0.0f64);
    *data.at_mut(&[2, 2, 2]) = 1.0;
    let image = Image::new(data);
    let params = ChanVeseParams {
        lambda1: 10.0,
        lambda2: 10.0,
        mu: 0.1,
        neighborhood: "N6".to_string(),
        ..ChanVeseParams::default()
    };
    let out = chan_vese(&image, &params, None).unwrap();
    for x in 0..4 {
        for y in 0..4 {
            for z in 0..4 {
                let expect = u8::from([x, y, z] == [2, 2, 2]);
                assert_eq!(*out.labels.at(&[x, y, z]), expect, "({x},{y},{z})");
            }
        }
    }
}

#[test]
fn s6_fixed_columns_do_not_move_the_cut() {
    let image = split_image(16, 16, 8);
    let params = cv_params(10.0, 1.0, "N4");
    let unmasked = chan_vese(&image, &params, None).unwrap();

    let mut mask = NdArray::filled(&[16usize, 16], MASK_UNKNOWN);
    for r in 0..16 {
        *mask.at_mut(&[r, 0]) = MASK_BACKGROUND;
        *mask.at_mut(&[r, 15]) = MASK_FOREGROUND;
    }
    let masked = chan_vese(&image, &params, Some(&mask)).unwrap();
    for r in 0..16 {
        for c in 0..16 {
            assert_eq!(
                masked.labels.at(&[r, c]),
                unmasked.labels.at(&[r, c]),
                "({r},{c})"
            );
            assert_eq!(*masked.labels.at(&[r, c]), u8::from(c >= 8));
        }
    }
}

#[test]
fn all_unknown_mask_matches_no_mask() {
    let image = synth::gaussian_blob::<f64>(&[12, 12], &[6.0, 6.0], 2.5);
    let params = cv_params(10.0, 1.0, "N8");
    let plain = chan_vese(&image, &params, None).unwrap();
    let mask = NdArray::filled(&[12usize, 12], MASK_UNKNOWN);
    let masked = chan_vese(&image, &params, Some(&mask)).unwrap();
    assert_eq!(plain.labels, masked.labels);
    assert!((plain.energy - masked.energy).abs() < 1e-12);
}

#[test]
fn chan_vese_energy_is_monotone_in_iterations() {
    let image = synth::gaussian_blob::<f64>(&[16, 16], &[7.0, 9.0], 3.0);
    let mut last = f64::INFINITY;
    for max_iter in 1..=5 {
        let mut params = cv_params(10.0, 1.0, "N8");
        params.convergence = 0.0;
        params.max_iter = max_iter;
        let out = chan_vese(&image, &params, None).unwrap();
        assert!(
            out.energy <= last + 1e-9,
            "iter {max_iter}: {} after {last}",
            out.energy
        );
        last = out.energy;
    }
}

#[test]
fn mumford_shah_energy_is_monotone_in_iterations() {
    let image = synth::banded_regions::<f64>(8, &[8, 8], &[0.0, 1.0], 0.05, 7);
    let mut last = f64::INFINITY;
    for max_iter in 1..=3 {
        let params = MumfordShahParams {
            k: 2,
            lambda: vec![10.0],
            neighborhood: "N4".to_string(),
            max_iter,
            ..MumfordShahParams::default()
        };
        let out = mumford_shah(&image, &params).unwrap();
        assert!(out.energy <= last + 1e-9);
        last = out.energy;
    }
}

#[test]
fn solver_backends_agree_on_energy() {
    let image = synth::gaussian_blob::<f64>(&[14, 14], &[7.0, 7.0], 2.8);
    let mut energies = Vec::new();
    for solver in [
        MaxFlowSelector::GridKohli,
        MaxFlowSelector::GridPrFifo,
        MaxFlowSelector::GridPrHighest,
    ] {
        let mut params = cv_params(10.0, 1.0, "N8");
        params.solver = solver;
        let out = chan_vese(&image, &params, None).unwrap();
        energies.push(out.energy);
    }
    assert!((energies[0] - energies[1]).abs() < 1e-6);
    assert!((energies[0] - energies[2]).abs() < 1e-6);
}

#[test]
fn two_stage_band_refines_the_blob() {
    let image = synth::gaussian_blob::<f64>(&[16, 16], &[8.0, 8.0], 3.0);
    let params = TwoStageParams {
        base: cv_params(10.0, 1.0, "N4"),
        band_neighborhood: "N16".to_string(),
        band_radius: 2,
    };
    let out = chan_vese_two_stage(&image, &params, None).unwrap();
    assert_eq!(*out.labels.at(&[8, 8]), 1);
    for corner in [[0usize, 0usize], [0, 15], [15, 0], [15, 15]] {
        assert_eq!(*out.labels.at(&corner), 0);
    }
    assert_ne!(out.status, RunStatus::Degenerate);
}

#[test]
fn rousson_deriche_separates_noisy_bands() {
    let image = synth::banded_regions::<f64>(12, &[8, 8], &[0.0, 1.0], 0.05, 3);
    let params = RoussonDericheParams {
        lambda: 0.5,
        neighborhood: "N4".to_string(),
        ..RoussonDericheParams::default()
    };
    let out = rousson_deriche(&image, &params).unwrap();
    assert_eq!(out.status, RunStatus::Converged);
    assert!(out.c1.abs() < 0.05, "c1 {}", out.c1);
    assert!((out.c2 - 1.0).abs() < 0.05, "c2 {}", out.c2);
    assert!(out.var1 < 0.01 && out.var2 < 0.01);
    let mut correct = 0usize;
    for r in 0..12 {
        for c in 0..16 {
            if *out.labels.at(&[r, c]) == u8::from(c >= 8) {
                correct += 1;
            }
        }
    }
    assert!(correct * 10 >= 12 * 16 * 9, "only {correct} correct");
}

#[test]
fn chan_vese_works_in_f32() {
    let mut data = NdArray::filled(&[4usize, 4], 0.0f32);
    for r in 0..4 {
        for c in 2..4 {
            *data.at_mut(&[r, c]) = 1.0;
        }
    }
    let image = Image::new(data);
    let params = ChanVeseParams::<f32> {
        lambda1: 10.0,
        lambda2: 10.0,
        neighborhood: "N4".to_string(),
        ..ChanVeseParams::default()
    };
    let out = chan_vese(&image, &params, None).unwrap();
    assert!(out.c1.abs() < 1e-5);
    assert!((out.c2 - 1.0).abs() < 1e-5);
}

#[test]
fn validation_rejects_bad_parameters() {
    let image = split_image(4, 4, 2);
    let base = cv_params(10.0, 1.0, "N4");

    let mut p = base.clone();
    p.lambda1 = 0.0;
    assert!(chan_vese(&image, &p, None).is_err());

    let mut p = base.clone();
    p.max_iter = 0;
    assert!(chan_vese(&image, &p, None).is_err());

    let mut p = base.clone();
    p.convergence = -1.0;
    assert!(chan_vese(&image, &p, None).is_err());

    let mut p = base.clone();
    p.init_means = Some((1.0, 0.5));
    assert!(chan_vese(&image, &p, None).is_err());

    let mut p = base.clone();
    p.neighborhood = "N7".to_string();
    let err = chan_vese(&image, &p, None).unwrap_err();
    assert!(err.to_string().contains("Unsupported neighbourhood"));

    let mut p = base.clone();
    p.neighborhood = "N6".to_string(); // 3-D table against a 2-D image
    assert!(chan_vese(&image, &p, None).is_err());

    let mask = NdArray::filled(&[3usize, 3], MASK_UNKNOWN);
    assert!(chan_vese(&image, &base, Some(&mask)).is_err());

    let mut bad_values = NdArray::filled(&[4usize, 4], MASK_UNKNOWN);
    *bad_values.at_mut(&[0, 0]) = 9;
    assert!(chan_vese(&image, &base, Some(&bad_values)).is_err());

    let one_d = Image::new(NdArray::filled(&[16usize], 0.0f64));
    assert!(chan_vese(&one_d, &base, None).is_err());

    for k in [0usize, 1, 255, 300] {
        let p = MumfordShahParams {
            k,
            ..MumfordShahParams::default()
        };
        assert!(mumford_shah(&image, &p).is_err(), "k = {k}");
    }
    let p = MumfordShahParams {
        k: 3,
        lambda: vec![1.0, 1.0],
        ..MumfordShahParams::default()
    };
    assert!(mumford_shah(&image, &p).is_err(), "lambda arity");
}

#[test]
fn gibou_fedkiw_finds_the_two_modes() {
    let image = split_image(2, 8, 4);
    let (c1, c2) = init::gibou_fedkiw(&image, 1.0, 1.0, 1e-6, 50);
    assert!(c1.abs() < 1e-12);
    assert!((c2 - 1.0).abs() < 1e-12);
}

#[test]
fn lloyd_kmeans_recovers_exact_levels() {
    let mut data = NdArray::filled(&[1usize, 9], 0.0f64);
    for (i, &v) in [0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0].iter().enumerate() {
        *data.at_mut(&[0, i]) = v;
    }
    let image = Image::new(data);
    let (means, labels, degenerate) = init::lloyd_kmeans(&image, 3, &[1.0, 1.0, 1.0], 50);
    assert!(!degenerate);
    let mut sorted = means.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    for (got, want) in sorted.iter().zip([0.0, 0.5, 1.0]) {
        assert!((got - want).abs() < 1e-12);
    }
    // All members of one level share one class.
    assert_eq!(labels.as_slice()[0], labels.as_slice()[2]);
    assert_eq!(labels.as_slice()[3], labels.as_slice()[5]);
    assert_eq!(labels.as_slice()[6], labels.as_slice()[8]);
}

#[test]
fn cityblock_distance_marks_the_boundary() {
    let mut labels = NdArray::filled(&[4usize, 4], 0u8);
    for r in 0..4 {
        for c in 2..4 {
            *labels.at_mut(&[r, c]) = 1;
        }
    }
    let dist = cityblock_distance_to_boundary(&labels);
    for r in 0..4 {
        assert_eq!(*dist.at(&[r, 1]), 0);
        assert_eq!(*dist.at(&[r, 2]), 0);
        assert_eq!(*dist.at(&[r, 0]), 1);
        assert_eq!(*dist.at(&[r, 3]), 1);
    }
}
