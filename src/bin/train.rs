use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;

use cemlake::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHECKPOINT_EVERY, DEFAULT_GAMMA, DEFAULT_LEARNING_RATE,
    DEFAULT_PERCENTILE, DEFAULT_POOL_CAPACITY, DEFAULT_SEED, DEFAULT_SUCCESS_THRESHOLD,
    sampler_seed,
};
use cemlake::{
    CrossEntropyConfig, CrossEntropyTrainer, CsvMetrics, DEFAULT_HIDDEN, Environment,
    FileCheckpointer, LakeConfig, MapKind, NoopMetrics, PoolRetention, render_training_curves,
};

type TrainBackend = Autodiff<NdArray<f32>>;

#[derive(Parser, Debug)]
#[command(
    about = "Train a FrozenLake policy with the cross-entropy method",
    version,
    author
)]
struct TrainArgs {
    /// Lake layout to train on.
    #[arg(long, value_enum, default_value_t = MapArg::FourByFour)]
    map: MapArg,
    /// Side length of generated maps (only with --map random).
    #[arg(long, default_value_t = 8)]
    map_size: usize,
    /// Probability of a frozen tile in generated maps (only with --map random).
    #[arg(long, default_value_t = 0.8)]
    frozen_probability: f64,
    /// Disable slippery ice so every move goes where it is pointed.
    #[arg(long)]
    not_slippery: bool,
    /// Override the episode time limit (100 for 4x4, 200 otherwise).
    #[arg(long)]
    max_episode_steps: Option<usize>,
    /// Hidden layer width for the policy network.
    #[arg(long, default_value_t = DEFAULT_HIDDEN)]
    hidden: usize,
    /// Episodes sampled per iteration.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
    /// Percentile of discounted scores used as the elite bound.
    #[arg(long, default_value_t = DEFAULT_PERCENTILE)]
    percentile: f32,
    /// Per-step discount applied to episode length when scoring.
    #[arg(long, default_value_t = DEFAULT_GAMMA)]
    gamma: f32,
    /// Maximum number of episodes kept between iterations.
    #[arg(long, default_value_t = DEFAULT_POOL_CAPACITY)]
    pool_capacity: usize,
    /// Which episodes the pool keeps after filtering.
    #[arg(long, value_enum, default_value_t = RetentionArg::Elite)]
    retention: RetentionArg,
    /// Learning rate passed to the Adam optimizer.
    #[arg(long, default_value_t = DEFAULT_LEARNING_RATE)]
    learning_rate: f64,
    /// Save parameters every N iterations.
    #[arg(long, default_value_t = DEFAULT_CHECKPOINT_EVERY)]
    checkpoint_every: usize,
    /// Print a progress line every N iterations.
    #[arg(long, default_value_t = 1)]
    report_every: usize,
    /// Stop once the mean batch reward exceeds this value.
    #[arg(long, default_value_t = DEFAULT_SUCCESS_THRESHOLD)]
    success_threshold: f32,
    /// Master seed controlling reproducibility.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
    /// Directory where checkpoints and metrics are written.
    #[arg(long, default_value = "model")]
    output: PathBuf,
    /// Write a PNG chart of reward mean and bound when training ends.
    #[arg(long)]
    plot: Option<PathBuf>,
    /// Skip writing the metrics CSV.
    #[arg(long)]
    no_metrics: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MapArg {
    #[value(name = "4x4")]
    FourByFour,
    #[value(name = "8x8")]
    EightByEight,
    Random,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RetentionArg {
    Elite,
    All,
}

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = TrainArgs::parse();
    let (config, lake) = resolve_configs(&args);
    config.validate()?;
    lake.validate()?;
    fs::create_dir_all(&args.output)?;

    let env = lake.build()?;
    let observation_size = env.observation_space().flat_dim();
    let n_actions = env
        .action_space()
        .cardinality()
        .ok_or("the lake must have a discrete action space")?;
    let checkpoints =
        FileCheckpointer::new(&args.output, observation_size, n_actions, config.clone())?;
    let report_every = config.report_every;
    let rng = StdRng::seed_from_u64(sampler_seed(config.seed));

    let trainer = CrossEntropyTrainer::<TrainBackend, _, _>::new(config, env, rng)?
        .with_checkpoints(checkpoints);
    let mut trainer = if args.no_metrics {
        trainer.with_metrics(NoopMetrics)
    } else {
        let metrics_path = args.output.join("metrics.csv");
        println!("metrics -> {}", display_path(&metrics_path));
        trainer.with_metrics(CsvMetrics::create(&metrics_path)?)
    };

    println!(
        "training on a {} lake ({} states, {} actions)",
        match lake.map {
            MapKind::FourByFour => "4x4".to_string(),
            MapKind::EightByEight => "8x8".to_string(),
            MapKind::Random { size, .. } => format!("random {size}x{size}"),
        },
        observation_size,
        n_actions
    );
    let summary = trainer.run(|report| {
        if report.iteration % report_every == 0 || report.solved {
            println!("{report}");
        }
        if report.solved {
            println!("solved");
        }
        true
    })?;

    if let Some(path) = args.plot.as_ref() {
        render_training_curves(path, &summary.history)?;
        println!("chart saved -> {}", display_path(path));
    }
    Ok(())
}

fn resolve_configs(args: &TrainArgs) -> (CrossEntropyConfig, LakeConfig) {
    let config = CrossEntropyConfig {
        hidden_size: args.hidden,
        batch_size: args.batch_size,
        percentile: args.percentile,
        gamma: args.gamma,
        pool_capacity: args.pool_capacity,
        learning_rate: args.learning_rate,
        checkpoint_every: args.checkpoint_every,
        report_every: args.report_every,
        success_threshold: args.success_threshold,
        retention: match args.retention {
            RetentionArg::Elite => PoolRetention::Elite,
            RetentionArg::All => PoolRetention::All,
        },
        seed: args.seed,
    };
    let lake = LakeConfig {
        map: match args.map {
            MapArg::FourByFour => MapKind::FourByFour,
            MapArg::EightByEight => MapKind::EightByEight,
            MapArg::Random => MapKind::Random {
                size: args.map_size,
                frozen_probability: args.frozen_probability,
            },
        },
        slippery: !args.not_slippery,
        max_episode_steps: args.max_episode_steps,
        seed: args.seed,
    };
    (config, lake)
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
