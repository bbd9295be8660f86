use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use int8gemm::harness::{self, Problem, Scales};
use int8gemm::kernels::{self, KernelPath};
use int8gemm::{Backend, Gemm, GemmConfig, Index, ShiftedBackend, SignedBackend};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "crosscheck", about = "Differential test: signed and shifted backends against the reference multiply")]
struct Args {
    /// Number of random problems
    #[arg(long, default_value_t = 50)]
    runs: usize,

    /// Random seed
    #[arg(long, default_value_t = 1u64)]
    seed: u64,

    /// Smallest dimension drawn (before rounding up to --tile)
    #[arg(long, default_value_t = 64)]
    min_dim: Index,

    /// Largest dimension drawn (before rounding up to --tile)
    #[arg(long, default_value_t = 256)]
    max_dim: Index,

    /// Dimensions are rounded up to a multiple of this
    #[arg(long, default_value_t = 64)]
    tile: Index,

    /// Force a kernel path (scalar|avx2|neon); defaults to the environment / CPU detection
    #[arg(long)]
    kernel_path: Option<KernelPath>,

    /// Largest accepted mean squared error
    #[arg(long, default_value_t = 1e-7)]
    tolerance: f64,

    /// Optional: write the report as JSON to this path
    #[arg(long)]
    json: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    run: usize,
    rows: Index,
    width: Index,
    cols: Index,
    signed_mse: f64,
    shifted_mse: f64,
    signed_select_mse: f64,
    shifted_select_mse: f64,
    quantized_transposed_mse: f64,
}

impl RunReport {
    fn worst(&self) -> f64 {
        [self.signed_mse, self.shifted_mse, self.signed_select_mse, self.shifted_select_mse, self.quantized_transposed_mse]
            .into_iter()
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    config: GemmConfig,
    kernel_path: KernelPath,
    seed: u64,
    tolerance: f64,
    failures: usize,
    worst_mse: f64,
    runs: Vec<RunReport>,
}

fn round_up(v: Index, tile: Index) -> Index { v.div_ceil(tile) * tile }

fn check_one(run: usize, rng: &mut SmallRng, args: &Args, signed: &Gemm<SignedBackend>, shifted: &Gemm<ShiftedBackend>) -> Result<RunReport> {
    let mut dim = || round_up(rng.gen_range(args.min_dim..=args.max_dim), args.tile);
    let (rows, width, cols) = (dim(), dim(), dim());
    let p: Problem = harness::generate_integral_input(rng, rows, width, cols);
    let (m, n, k) = (rows as usize, width as usize, cols as usize);
    let reference = harness::reference_multiply(&p.a, &p.b, &p.bias, m, n, k);
    let unit = Scales::unit();

    let out_signed = harness::run_pipeline(signed, &p, unit).context("signed pipeline")?;
    let out_shifted = harness::run_pipeline(shifted, &p, unit).context("shifted pipeline")?;

    let selected = harness::random_columns(rng, cols, (cols as usize / 2).max(8) & !7);
    let b_sel = harness::index_select(&p.b, n, k, &selected);
    let bias_sel = harness::index_select(&p.bias, 1, k, &selected);
    let reference_sel = harness::reference_multiply(&p.a, &b_sel, &bias_sel, m, n, selected.len());
    let sel_signed = harness::run_selected(signed, &p, unit, &selected).context("signed select")?;
    let sel_shifted = harness::run_selected(shifted, &p, unit, &selected).context("shifted select")?;

    let qt_signed = harness::run_from_quantized_transposed(signed, &p, unit).context("signed from quantized transposed")?;
    let qt_shifted = harness::run_from_quantized_transposed(shifted, &p, unit).context("shifted from quantized transposed")?;

    Ok(RunReport {
        run,
        rows,
        width,
        cols,
        signed_mse: harness::mean_squared_error(&out_signed, &reference),
        shifted_mse: harness::mean_squared_error(&out_shifted, &reference),
        signed_select_mse: harness::mean_squared_error(&sel_signed, &reference_sel),
        shifted_select_mse: harness::mean_squared_error(&sel_shifted, &reference_sel),
        quantized_transposed_mse: harness::mean_squared_error(&qt_signed, &qt_shifted),
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.tile == 0 || args.min_dim == 0 || args.min_dim > args.max_dim {
        bail!("need 0 < min_dim <= max_dim and tile > 0");
    }

    let mut config = GemmConfig::from_env();
    if args.kernel_path.is_some() {
        config.kernel_path = args.kernel_path;
    }
    let kernel_path = kernels::select(&config).path();
    let signed = Gemm::new(SignedBackend::with_config(&config));
    let shifted = Gemm::new(ShiftedBackend::with_config(&config));
    log::info!("crosscheck: {} runs, kernel path {}, seed {}", args.runs, kernel_path, args.seed);

    let pb = ProgressBar::new(args.runs as u64);
    pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let mut runs = Vec::with_capacity(args.runs);
    let mut failures = 0usize;
    for run in 0..args.runs {
        let report = check_one(run, &mut rng, &args, &signed, &shifted)?;
        if report.worst() > args.tolerance {
            failures += 1;
            pb.println(format!("run {} ({}x{}x{}): mse {:.3e} over tolerance", run, report.rows, report.width, report.cols, report.worst()));
        }
        pb.set_message(format!("failures {}", failures));
        pb.inc(1);
        runs.push(report);
    }
    pb.finish_with_message(format!("failures {}", failures));

    let worst_mse = runs.iter().map(RunReport::worst).fold(0.0, f64::max);
    println!("{} runs, {} failures, worst mse {:.3e} ({} kernels)", runs.len(), failures, worst_mse, kernel_path);

    let summary = Summary { config, kernel_path, seed: args.seed, tolerance: args.tolerance, failures, worst_mse, runs };
    if let Some(path) = args.json.as_deref() {
        let payload = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, payload).with_context(|| format!("writing {}", path))?;
    }
    if summary.failures > 0 {
        bail!("{} of {} runs exceeded mse {}", summary.failures, summary.runs.len(), summary.tolerance);
    }
    Ok(())
}
