use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polars::prelude::*;
use serde_json::json;
use std::path::Path;
use tracing_subscriber::fmt::SubscriberBuilder;

use gridseg::array::{Image, NdArray};
use gridseg::grid::{crofton_weights, MetricTransform, Neighborhood};
use gridseg::maxflow::MaxFlowSelector;
use gridseg::segment::{
    chan_vese, mumford_shah, rousson_deriche, ChanVeseParams, MumfordShahParams,
    RoussonDericheParams,
};

mod provenance;

#[derive(Parser)]
#[command(name = "cli")]
#[command(about = "Segmentation experiment runner")]
struct Cmd {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Segment a CSV image; writes the label field plus a provenance sidecar
    Segment {
        /// chan-vese | mumford-shah | rousson-deriche
        #[arg(long)]
        algo: String,
        #[arg(long)]
        input: String,
        #[arg(long)]
        out: String,
        #[arg(long, default_value_t = 1.0)]
        lambda: f64,
        /// Boundary weight (Chan–Vese)
        #[arg(long, default_value_t = 1.0)]
        mu: f64,
        /// Label count (Mumford–Shah)
        #[arg(long, default_value_t = 2)]
        k: usize,
        #[arg(long, default_value = "N8")]
        neighborhood: String,
        #[arg(long, default_value_t = 1e-3)]
        convergence: f64,
        #[arg(long, default_value_t = 100)]
        max_iter: u32,
        #[arg(long, default_value = "GRD-KO")]
        solver: String,
    },
    /// Dump a neighbourhood's offsets and Cauchy–Crofton weights as JSON
    Weights {
        #[arg(long)]
        neighborhood: String,
        #[arg(long)]
        out: String,
    },
    /// Print a small provenance JSON block
    Report,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Segment {
            algo,
            input,
            out,
            lambda,
            mu,
            k,
            neighborhood,
            convergence,
            max_iter,
            solver,
        } => segment(SegmentArgs {
            algo,
            input,
            out,
            lambda,
            mu,
            k,
            neighborhood,
            convergence,
            max_iter,
            solver,
        }),
        Action::Weights { neighborhood, out } => weights(neighborhood, out),
        Action::Report => report(),
    }
}

struct SegmentArgs {
    algo: String,
    input: String,
    out: String,
    lambda: f64,
    mu: f64,
    k: usize,
    neighborhood: String,
    convergence: f64,
    max_iter: u32,
    solver: String,
}

fn segment(args: SegmentArgs) -> Result<()> {
    tracing::info!(args.algo, args.input, args.out, "segment");
    let image = read_csv_image(&args.input)?;
    let solver = MaxFlowSelector::from_symbol(&args.solver)?;
    let (labels, summary) = match args.algo.as_str() {
        "chan-vese" => {
            let params = ChanVeseParams {
                lambda1: args.lambda,
                lambda2: args.lambda,
                mu: args.mu,
                convergence: args.convergence,
                max_iter: args.max_iter,
                neighborhood: args.neighborhood.clone(),
                solver,
                ..ChanVeseParams::default()
            };
            let r = chan_vese(&image, &params, None)?;
            (
                r.labels,
                json!({
                    "energy": r.energy,
                    "iterations": r.iterations,
                    "c": [r.c1, r.c2],
                    "status": format!("{:?}", r.status),
                }),
            )
        }
        "mumford-shah" => {
            let params = MumfordShahParams {
                k: args.k,
                lambda: vec![args.lambda],
                convergence: args.convergence,
                max_iter: args.max_iter,
                neighborhood: args.neighborhood.clone(),
                solver,
                ..MumfordShahParams::default()
            };
            let r = mumford_shah(&image, &params)?;
            (
                r.labels,
                json!({
                    "energy": r.energy,
                    "iterations": r.iterations,
                    "c": r.means,
                    "status": format!("{:?}", r.status),
                }),
            )
        }
        "rousson-deriche" => {
            let params = RoussonDericheParams {
                lambda: args.lambda,
                convergence: args.convergence,
                max_iter: args.max_iter,
                neighborhood: args.neighborhood.clone(),
                solver,
                ..RoussonDericheParams::default()
            };
            let r = rousson_deriche(&image, &params)?;
            (
                r.labels,
                json!({
                    "energy": r.energy,
                    "iterations": r.iterations,
                    "c": [r.c1, r.c2],
                    "var": [r.var1, r.var2],
                    "status": format!("{:?}", r.status),
                }),
            )
        }
        other => anyhow::bail!("unknown algorithm {other:?}"),
    };

    let out_path = Path::new(&args.out);
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(out_path, labels_csv(&labels))
        .with_context(|| format!("writing {}", args.out))?;

    provenance::write_sidecar(
        out_path,
        json!({
            "algo": args.algo,
            "input": args.input,
            "shape": image.shape(),
            "neighborhood": args.neighborhood,
            "result": summary,
        }),
    )?;
    Ok(())
}

fn weights(neighborhood: String, out: String) -> Result<()> {
    tracing::info!(neighborhood, out, "weights");
    let nbh = Neighborhood::from_symbol(&neighborhood)?;
    let spacing = vec![1.0f64; nbh.dim()];
    let w = crofton_weights::<f64>(&nbh, &spacing, &MetricTransform::Identity)?;
    let doc = json!({
        "symbol": nbh.symbol(),
        "dim": nbh.dim(),
        "offsets": nbh.offsets(),
        "weights": w.w,
    });
    let out_path = Path::new(&out);
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(out_path, serde_json::to_vec_pretty(&doc)?)
        .with_context(|| format!("writing {out}"))?;
    provenance::write_sidecar(out_path, json!({ "neighborhood": neighborhood }))?;
    Ok(())
}

fn report() -> Result<()> {
    let obj = json!({
        "code_rev": provenance::current_git_rev(),
        "gridseg": gridseg::VERSION,
        "params": {},
        "outputs": []
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}

/// Read a headerless CSV of intensities as a 2-D image.
fn read_csv_image(path: &str) -> Result<Image<f64>> {
    let lf = LazyCsvReader::new(path)
        .with_has_header(false)
        .with_infer_schema_length(Some(100))
        .finish()
        .with_context(|| format!("reading {path}"))?;
    let df = lf.collect()?;
    let (rows, cols) = df.shape();
    anyhow::ensure!(rows > 0 && cols > 0, "{path} holds an empty image");
    let mut data = vec![0.0f64; rows * cols];
    for (ci, series) in df.get_columns().iter().enumerate() {
        let casted = series.cast(&DataType::Float64)?;
        let values = casted.f64()?;
        for (ri, value) in values.into_iter().enumerate() {
            data[ri * cols + ci] = value.unwrap_or(0.0);
        }
    }
    let arr = NdArray::from_vec(&[rows, cols], data)?;
    Ok(Image::new(arr))
}

/// Render a 2-D label field as CSV.
fn labels_csv(labels: &NdArray<u8>) -> String {
    let shape = labels.shape();
    let mut out = String::new();
    for r in 0..shape[0] {
        for c in 0..shape[1] {
            if c > 0 {
                out.push(',');
            }
            out.push_str(&labels.at(&[r, c]).to_string());
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("img.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "0.0,0.0,1.0").unwrap();
        writeln!(f, "0.0,1.0,1.0").unwrap();
        drop(f);
        let image = read_csv_image(path.to_str().unwrap()).unwrap();
        assert_eq!(image.shape(), &[2, 3]);
        assert_eq!(*image.data.at(&[0, 2]), 1.0);
        assert_eq!(*image.data.at(&[1, 0]), 0.0);
    }

    #[test]
    fn labels_render_as_csv() {
        let mut labels = NdArray::filled(&[2usize, 2], 0u8);
        *labels.at_mut(&[0, 1]) = 1;
        assert_eq!(labels_csv(&labels), "0,1\n0,0\n");
    }
}
