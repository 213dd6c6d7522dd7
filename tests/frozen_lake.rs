use cemlake::env::{Environment, FrozenLake, LakeMap, Move, Tile};
use cemlake::{EnvError, LakeConfig, MapKind};

fn lake(slippery: bool, seed: u64) -> FrozenLake {
    FrozenLake::builder(LakeMap::four_by_four())
        .with_seed(seed)
        .slippery(slippery)
        .with_time_limit(Some(100))
        .build()
        .expect("lake")
}

#[test]
fn shortest_path_reaches_the_goal() -> Result<(), EnvError> {
    let mut lake = lake(false, 0);
    let path = [
        Move::Down,
        Move::Down,
        Move::Right,
        Move::Down,
        Move::Right,
        Move::Right,
    ];
    let mut last = None;
    for (index, direction) in path.iter().enumerate() {
        let transition = lake.step(direction.index())?;
        assert_eq!(transition.done, index == path.len() - 1);
        assert_eq!(transition.info.probability, 1.0);
        last = Some(transition);
    }
    let last = last.expect("at least one step");
    assert_eq!(last.observation, 15);
    assert_eq!(last.reward, 1.0);
    assert!(!last.info.truncated);
    assert_eq!(lake.map().tile(lake.position()), Tile::Goal);
    Ok(())
}

#[test]
fn time_limit_truncates_the_episode() -> Result<(), EnvError> {
    let mut lake = FrozenLake::builder(LakeMap::four_by_four())
        .slippery(false)
        .with_time_limit(Some(5))
        .build()?;
    for _ in 0..4 {
        let transition = lake.step(Move::Left.index())?;
        assert!(!transition.done);
    }
    let last = lake.step(Move::Left.index())?;
    assert!(last.done);
    assert!(last.info.truncated);
    assert_eq!(last.reward, 0.0);
    Ok(())
}

#[test]
fn slippery_moves_stay_perpendicular_to_intent() -> Result<(), EnvError> {
    let mut lake = lake(true, 17);
    let mut seen = Vec::new();
    for _ in 0..200 {
        lake.reset();
        let transition = lake.step(Move::Right.index())?;
        assert!((transition.info.probability - 1.0 / 3.0).abs() < 1e-6);
        seen.push(transition.observation);
    }
    // From the start, Right may deflect Up (stay at 0) or Down (state 4).
    assert!(seen.iter().all(|state| [0, 1, 4].contains(state)));
    for state in [0, 1, 4] {
        assert!(seen.contains(&state), "state {state} never reached");
    }
    Ok(())
}

#[test]
fn invalid_actions_are_rejected() {
    let mut lake = lake(false, 0);
    assert_eq!(
        lake.step(4),
        Err(EnvError::InvalidAction {
            action: 4,
            n_actions: 4
        })
    );
}

#[test]
fn same_seed_reproduces_slippery_trajectory() -> Result<(), EnvError> {
    let mut first = lake(true, 99);
    let mut second = lake(true, 99);
    for step in 0..50 {
        if first.is_finished() {
            assert_eq!(first.reset(), second.reset());
        }
        let action = step % Move::COUNT;
        assert_eq!(first.step(action)?, second.step(action)?);
    }
    Ok(())
}

#[test]
fn random_lake_config_builds() {
    let config = LakeConfig {
        map: MapKind::Random {
            size: 5,
            frozen_probability: 0.75,
        },
        ..LakeConfig::default()
    };
    let env = config.build().expect("env");
    assert_eq!(env.observation_space().flat_dim(), 25);
    assert_eq!(env.inner().map().tile(24), Tile::Goal);
}
