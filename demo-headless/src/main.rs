use adi_filter_core::{
    run_sequence, AnisotropicFilter, EdgeStopping, FilterConfig, FilterMode, TestPattern,
    DEFAULT_STEPS,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Edge-preserving filter demo on a synthetic noisy square
#[derive(Parser, Debug)]
#[command(name = "adi-filter-demo")]
#[command(about = "Anisotropic diffusion filter demo (ADI scheme)", long_about = None)]
struct Args {
    /// JSON file with filter settings; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective filter settings as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Image width in pixels
    #[arg(long, default_value_t = 300)]
    width: usize,

    /// Image height in pixels
    #[arg(long, default_value_t = 200)]
    height: usize,

    /// Upper bound of the uniform noise
    #[arg(long, default_value_t = 16384.0)]
    noise: f64,

    /// Intensity of the square
    #[arg(long, default_value_t = 32768.0)]
    signal: f64,

    /// Square side relative to the shorter image side (0.1-1)
    #[arg(long, default_value_t = 0.5)]
    scale: f64,

    /// Noise seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of filter steps (1-1000)
    #[arg(short = 'n', long, default_value_t = DEFAULT_STEPS)]
    steps: usize,

    /// Filter mode
    #[arg(short, long, value_enum, default_value_t = Mode::Nonlinear)]
    mode: Mode,

    /// Base diffusion coefficient D0
    #[arg(short, long)]
    diffusion: Option<f64>,

    /// Gradient scale of the edge-stopping function
    #[arg(long)]
    nonlinearity_scale: Option<f64>,

    /// Convergence tolerance of the nonlinear iteration
    #[arg(short, long)]
    tolerance: Option<f64>,

    /// Anisotropy weighting of x- against y-gradients (0-1)
    #[arg(short, long)]
    anisotropy: Option<f64>,

    /// Worker threads
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Extrapolation coefficient of the diffusivity seed
    #[arg(short = 'k', long)]
    acceleration: Option<f64>,

    /// Edge-stopping function
    #[arg(short, long, value_enum)]
    function: Option<Function>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Linear,
    Nonlinear,
}

impl From<Mode> for FilterMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Linear => FilterMode::Linear,
            Mode::Nonlinear => FilterMode::NonLinear,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Function {
    /// 1 / (1 + x)
    Rational,
    /// exp(-x)
    Exponential,
}

impl From<Function> for EdgeStopping {
    fn from(function: Function) -> Self {
        match function {
            Function::Rational => EdgeStopping::Rational,
            Function::Exponential => EdgeStopping::Exponential,
        }
    }
}

/// Settings file first, then command-line overrides
fn load_config(args: &Args) -> Result<FilterConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let config: FilterConfig = serde_json::from_str(&text)?;
            info!("Loaded filter settings from {}", path.display());
            config
        }
        None => FilterConfig::default(),
    };

    if let Some(d) = args.diffusion {
        config.base_diffusion = d;
    }
    if let Some(s) = args.nonlinearity_scale {
        config.nonlinearity_scale = s;
    }
    if let Some(eps) = args.tolerance {
        config.tolerance = eps;
    }
    if let Some(a) = args.anisotropy {
        config.anisotropy = a;
    }
    if let Some(n) = args.threads {
        config.worker_count = n;
    }
    if let Some(k) = args.acceleration {
        config.acceleration = k;
    }
    if let Some(f) = args.function {
        config.edge_stopping = f.into();
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("=== Anisotropic Diffusion Filter Demo ===\n");

    let pattern = TestPattern {
        width: args.width,
        height: args.height,
        noise: args.noise,
        signal: args.signal,
        scale: args.scale,
        seed: args.seed,
    };
    let image = pattern.generate()?;
    let stats = image.stats();
    println!(
        "Test image {}x{}: min {:.1}, max {:.1}, mean {:.1}",
        args.width, args.height, stats.min, stats.max, stats.mean
    );

    let mut filter = AnisotropicFilter::new(config)?;
    let settings = filter.config();
    println!(
        "Filter: D0={}, scale={}, eps={:e}, anisotropy={}, k={}, f={:?}, {} threads",
        settings.base_diffusion,
        settings.nonlinearity_scale,
        settings.tolerance,
        settings.anisotropy,
        settings.acceleration,
        settings.edge_stopping,
        filter.worker_threads()
    );
    println!("Running {} {:?} steps\n", args.steps, args.mode);

    let result = run_sequence(&filter, &image, args.steps, args.mode.into(), |step, frame| {
        let s = frame.stats();
        println!(
            "Frame {:>4}: min {:>12.3}  max {:>12.3}  mean {:>12.3}",
            step, s.min, s.max, s.mean
        );
    });
    filter.shutdown();
    let report = result?;

    println!(
        "\n{} frames in {:.3} s{}",
        report.frames.len(),
        report.elapsed.as_secs_f64(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
