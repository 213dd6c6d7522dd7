use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{Environment, Space, StepInfo, Transition};
use crate::error::EnvError;

const DEFAULT_SEED: u64 = 0xF1A2_E5EE_D00D_1A4E;

const FOUR_BY_FOUR: [&str; 4] = ["SFFF", "FHFH", "FFFH", "HFFG"];

const EIGHT_BY_EIGHT: [&str; 8] = [
    "SFFFFFFF", "FFFFFFFF", "FFFHFFFF", "FFFFFHFF", "FFFHFFFF", "FHHFFFHF", "FHFFHFHF",
    "FFFHFFFG",
];

/// Single cell of the lake.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Tile {
    Start,
    Frozen,
    Hole,
    Goal,
}

impl Tile {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'S' => Some(Tile::Start),
            'F' => Some(Tile::Frozen),
            'H' => Some(Tile::Hole),
            'G' => Some(Tile::Goal),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Tile::Start => 'S',
            Tile::Frozen => 'F',
            Tile::Hole => 'H',
            Tile::Goal => 'G',
        }
    }

    /// Hole and goal tiles end the episode.
    pub fn is_terminal(self) -> bool {
        matches!(self, Tile::Hole | Tile::Goal)
    }
}

/// Movement requested by the agent. Discriminants match the action ids.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Move {
    Left = 0,
    Down = 1,
    Right = 2,
    Up = 3,
}

impl Move {
    pub const COUNT: usize = 4;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Move::Left),
            1 => Some(Move::Down),
            2 => Some(Move::Right),
            3 => Some(Move::Up),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// The two perpendicular directions a slippery step may deflect into.
    fn perpendicular(self) -> [Move; 2] {
        let index = self.index();
        [
            Move::from_index((index + Self::COUNT - 1) % Self::COUNT).unwrap_or(self),
            Move::from_index((index + 1) % Self::COUNT).unwrap_or(self),
        ]
    }
}

/// Rectangular grid of tiles.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LakeMap {
    rows: usize,
    cols: usize,
    tiles: Vec<Tile>,
}

impl LakeMap {
    pub fn four_by_four() -> Self {
        Self::parse(&FOUR_BY_FOUR).expect("built-in 4x4 map is valid")
    }

    pub fn eight_by_eight() -> Self {
        Self::parse(&EIGHT_BY_EIGHT).expect("built-in 8x8 map is valid")
    }

    /// Parses rows of `S`, `F`, `H` and `G` characters.
    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Self, EnvError> {
        let cols = rows
            .first()
            .map(|row| row.as_ref().chars().count())
            .ok_or(EnvError::InvalidMap("map has no rows"))?;
        if cols == 0 {
            return Err(EnvError::InvalidMap("map has no columns"));
        }
        let mut tiles = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.chars().count() != cols {
                return Err(EnvError::InvalidMap("rows must have equal length"));
            }
            for c in row.chars() {
                tiles.push(Tile::from_char(c).ok_or(EnvError::InvalidMap("unknown tile"))?);
            }
        }
        let map = Self {
            rows: rows.len(),
            cols,
            tiles,
        };
        if map.starts().is_empty() {
            return Err(EnvError::InvalidMap("map needs a start tile"));
        }
        if !map.tiles.contains(&Tile::Goal) {
            return Err(EnvError::InvalidMap("map needs a goal tile"));
        }
        Ok(map)
    }

    /// Generates a square map whose cells are frozen with `frozen_probability`,
    /// retrying until the goal is reachable from the start.
    pub fn random<R: Rng>(size: usize, frozen_probability: f64, rng: &mut R) -> Result<Self, EnvError> {
        if size < 2 {
            return Err(EnvError::InvalidMap("random maps need a size of at least 2"));
        }
        if !(frozen_probability > 0.0 && frozen_probability <= 1.0) {
            return Err(EnvError::InvalidMap("frozen probability must be in (0, 1]"));
        }
        loop {
            let mut tiles: Vec<Tile> = (0..size * size)
                .map(|_| {
                    if rng.gen_bool(frozen_probability) {
                        Tile::Frozen
                    } else {
                        Tile::Hole
                    }
                })
                .collect();
            tiles[0] = Tile::Start;
            tiles[size * size - 1] = Tile::Goal;
            let map = Self {
                rows: size,
                cols: size,
                tiles,
            };
            if map.goal_reachable() {
                return Ok(map);
            }
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile(&self, state: usize) -> Tile {
        self.tiles[state]
    }

    pub fn tile_at(&self, row: usize, col: usize) -> Tile {
        self.tiles[row * self.cols + col]
    }

    pub fn starts(&self) -> Vec<usize> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| **tile == Tile::Start)
            .map(|(state, _)| state)
            .collect()
    }

    /// State reached by moving from `state` in `direction`, clamped to the grid.
    pub fn neighbor(&self, state: usize, direction: Move) -> usize {
        let (row, col) = (state / self.cols, state % self.cols);
        let (row, col) = match direction {
            Move::Left => (row, col.saturating_sub(1)),
            Move::Down => ((row + 1).min(self.rows - 1), col),
            Move::Right => (row, (col + 1).min(self.cols - 1)),
            Move::Up => (row.saturating_sub(1), col),
        };
        row * self.cols + col
    }

    fn goal_reachable(&self) -> bool {
        let mut visited = vec![false; self.tiles.len()];
        let mut frontier = self.starts();
        while let Some(state) = frontier.pop() {
            if visited[state] {
                continue;
            }
            visited[state] = true;
            for direction in [Move::Left, Move::Down, Move::Right, Move::Up] {
                let next = self.neighbor(state, direction);
                match self.tiles[next] {
                    Tile::Goal => return true,
                    Tile::Hole => {}
                    _ => frontier.push(next),
                }
            }
        }
        false
    }
}

/// Builder mirroring the usual FrozenLake registration defaults.
pub struct FrozenLakeBuilder {
    map: LakeMap,
    slippery: bool,
    max_episode_steps: Option<usize>,
    seed: u64,
}

impl FrozenLakeBuilder {
    pub fn new(map: LakeMap) -> Self {
        Self {
            map,
            slippery: true,
            max_episode_steps: None,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn slippery(mut self, slippery: bool) -> Self {
        self.slippery = slippery;
        self
    }

    /// End episodes with `truncated = true` after this many steps.
    pub fn with_time_limit(mut self, max_episode_steps: Option<usize>) -> Self {
        self.max_episode_steps = max_episode_steps;
        self
    }

    pub fn build(self) -> Result<FrozenLake, EnvError> {
        if self.max_episode_steps == Some(0) {
            return Err(EnvError::InvalidMap("time limit must be positive"));
        }
        let starts = self.map.starts();
        let mut lake = FrozenLake {
            map: self.map,
            starts,
            slippery: self.slippery,
            max_episode_steps: self.max_episode_steps,
            position: 0,
            elapsed: 0,
            finished: false,
            last_move: None,
            rng: StdRng::seed_from_u64(self.seed),
        };
        lake.reset();
        Ok(lake)
    }
}

/// Grid world where the agent walks from the start to the goal without
/// falling into a hole. Observations are state ids `row * cols + col`.
pub struct FrozenLake {
    map: LakeMap,
    starts: Vec<usize>,
    slippery: bool,
    max_episode_steps: Option<usize>,
    position: usize,
    elapsed: usize,
    finished: bool,
    last_move: Option<Move>,
    rng: StdRng,
}

impl FrozenLake {
    pub fn builder(map: LakeMap) -> FrozenLakeBuilder {
        FrozenLakeBuilder::new(map)
    }

    pub fn map(&self) -> &LakeMap {
        &self.map
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn elapsed_steps(&self) -> usize {
        self.elapsed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_slippery(&self) -> bool {
        self.slippery
    }

    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }
}

impl Environment for FrozenLake {
    type Observation = usize;

    fn observation_space(&self) -> Space {
        Space::Discrete { n: self.map.len() }
    }

    fn action_space(&self) -> Space {
        Space::Discrete { n: Move::COUNT }
    }

    fn reset(&mut self) -> usize {
        self.position = self.starts[self.rng.gen_range(0..self.starts.len())];
        self.elapsed = 0;
        self.finished = false;
        self.last_move = None;
        self.position
    }

    fn step(&mut self, action: usize) -> Result<Transition<usize>, EnvError> {
        if self.finished {
            return Err(EnvError::EpisodeFinished);
        }
        let intended = Move::from_index(action).ok_or(EnvError::InvalidAction {
            action,
            n_actions: Move::COUNT,
        })?;
        let (direction, probability) = if self.slippery {
            let [left, right] = intended.perpendicular();
            let options = [left, intended, right];
            (options[self.rng.gen_range(0..options.len())], 1.0 / 3.0)
        } else {
            (intended, 1.0)
        };
        self.position = self.map.neighbor(self.position, direction);
        self.elapsed += 1;
        self.last_move = Some(intended);

        let tile = self.map.tile(self.position);
        let reward = if tile == Tile::Goal { 1.0 } else { 0.0 };
        let mut done = tile.is_terminal();
        let mut truncated = false;
        if !done && self.max_episode_steps.is_some_and(|limit| self.elapsed >= limit) {
            done = true;
            truncated = true;
        }
        self.finished = done;
        Ok(Transition {
            observation: self.position,
            reward,
            done,
            info: StepInfo {
                probability,
                truncated,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic_lake() -> FrozenLake {
        FrozenLake::builder(LakeMap::four_by_four())
            .slippery(false)
            .build()
            .expect("lake")
    }

    #[test]
    fn builtin_maps_have_expected_shape() {
        let small = LakeMap::four_by_four();
        assert_eq!((small.rows(), small.cols()), (4, 4));
        assert_eq!(small.tile_at(1, 1), Tile::Hole);
        assert_eq!(small.tile_at(3, 3), Tile::Goal);
        let large = LakeMap::eight_by_eight();
        assert_eq!(large.len(), 64);
        assert_eq!(large.tile(63), Tile::Goal);
    }

    #[test]
    fn moves_clamp_at_the_border() {
        let map = LakeMap::four_by_four();
        assert_eq!(map.neighbor(0, Move::Left), 0);
        assert_eq!(map.neighbor(0, Move::Up), 0);
        assert_eq!(map.neighbor(3, Move::Right), 3);
        assert_eq!(map.neighbor(15, Move::Down), 15);
        assert_eq!(map.neighbor(5, Move::Up), 1);
    }

    #[test]
    fn walking_into_a_hole_ends_the_episode() {
        let mut lake = deterministic_lake();
        let first = lake.step(Move::Down.index()).expect("step");
        assert_eq!(first.observation, 4);
        assert!(!first.done);
        let second = lake.step(Move::Right.index()).expect("step");
        assert_eq!(second.observation, 5);
        assert!(second.done);
        assert_eq!(second.reward, 0.0);
        assert_eq!(lake.step(Move::Left.index()), Err(EnvError::EpisodeFinished));
    }

    #[test]
    fn perpendicular_moves_wrap_around() {
        assert_eq!(Move::Left.perpendicular(), [Move::Up, Move::Down]);
        assert_eq!(Move::Up.perpendicular(), [Move::Right, Move::Left]);
    }

    #[test]
    fn random_map_has_reachable_goal() {
        let mut rng = StdRng::seed_from_u64(3);
        let map = LakeMap::random(6, 0.7, &mut rng).expect("map");
        assert_eq!(map.tile(0), Tile::Start);
        assert_eq!(map.tile(35), Tile::Goal);
        assert!(map.goal_reachable());
    }

    #[test]
    fn parse_rejects_ragged_rows() {
        assert!(LakeMap::parse(&["SF", "F"]).is_err());
        assert!(LakeMap::parse(&["FF", "FG"]).is_err());
        assert!(LakeMap::parse(&["SX", "FG"]).is_err());
    }
}
