use std::error::Error;
use std::process;

use clap::{ArgAction, Parser};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use cemlake::env::{Environment, FrozenLake, LakeMap, Move};
use cemlake::config::sampler_seed;
use cemlake::visualize::{LakeOptions, describe_move, render_lake_with_options};
use cemlake::{EpisodeSampler, LakeConfig, MapKind, OneHot, UniformPolicy, discounted_score};

const DEFAULT_SEED: u64 = 0xDEC0_1DED_5EED_F00D;

#[derive(Parser, Debug)]
#[command(
    name = "rollout",
    about = "Roll out uniformly random episodes on FrozenLake."
)]
struct Args {
    /// Number of episodes to play.
    #[arg(short = 'e', long = "episodes", default_value_t = 100)]
    episodes: usize,

    /// Seed for the lake and the action sampler.
    #[arg(short = 's', long = "seed", default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Use the 8x8 map instead of the 4x4 map.
    #[arg(long = "large", action = ArgAction::SetTrue)]
    large: bool,

    /// Disable slippery ice.
    #[arg(long = "not-slippery", action = ArgAction::SetTrue)]
    not_slippery: bool,

    /// Print the lake after every step of the first episode.
    #[arg(long = "visualize", action = ArgAction::SetTrue)]
    visualize: bool,

    /// Discount used when printing the best discounted score.
    #[arg(long = "gamma", default_value_t = 0.9)]
    gamma: f32,
}

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(err) = run(Args::parse()) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    if args.episodes == 0 {
        return Err("episodes must be positive".into());
    }
    let lake_config = LakeConfig {
        map: if args.large {
            MapKind::EightByEight
        } else {
            MapKind::FourByFour
        },
        slippery: !args.not_slippery,
        max_episode_steps: None,
        seed: args.seed,
    };
    lake_config.validate()?;

    if args.visualize {
        show_single_episode(&lake_config, args.seed)?;
    }

    let env = lake_config.build()?;
    let n_actions = env
        .action_space()
        .cardinality()
        .ok_or("the lake must have a discrete action space")?;
    let rng = StdRng::seed_from_u64(sampler_seed(args.seed));
    let mut sampler = EpisodeSampler::new(env, rng, args.episodes)?;
    let batch = sampler.next_batch(&UniformPolicy::new(n_actions))?;

    let successes = batch.iter().filter(|episode| episode.reward() > 0.0).count();
    let mean_length =
        batch.iter().map(|episode| episode.len()).sum::<usize>() as f64 / batch.len() as f64;
    let best_score = batch
        .iter()
        .map(|episode| discounted_score(episode, args.gamma))
        .fold(0.0_f32, f32::max);
    println!(
        "{} episodes: {} reached the goal ({:.1}%), mean length {:.1}, best discounted score {:.3}",
        batch.len(),
        successes,
        successes as f64 * 100.0 / batch.len() as f64,
        mean_length,
        best_score
    );
    Ok(())
}

fn show_single_episode(config: &LakeConfig, seed: u64) -> Result<(), Box<dyn Error>> {
    let map = match config.map {
        MapKind::EightByEight => LakeMap::eight_by_eight(),
        _ => LakeMap::four_by_four(),
    };
    let lake = FrozenLake::builder(map)
        .with_seed(seed)
        .slippery(config.slippery)
        .with_time_limit(Some(config.time_limit()))
        .build()?;
    let mut env = OneHot::new(lake)?;
    let mut rng = StdRng::seed_from_u64(sampler_seed(seed));
    let moves = [Move::Left, Move::Down, Move::Right, Move::Up];
    let options = LakeOptions {
        show_last_move: true,
        show_elapsed: true,
    };
    println!("{}", render_lake_with_options(env.inner(), options));
    loop {
        let direction = *moves.choose(&mut rng).ok_or("no moves available")?;
        println!("Chosen move: {}", describe_move(direction));
        let transition = env.step(direction.index())?;
        println!("{}", render_lake_with_options(env.inner(), options));
        if transition.done {
            break;
        }
    }
    Ok(())
}
