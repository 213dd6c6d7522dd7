use std::fmt::Write;
use std::path::Path;

use plotters::prelude::*;

use crate::env::{FrozenLake, Move, Tile};
use crate::error::TrainError;
use crate::trainer::IterationReport;

/// Customize lake rendering for CLI visualization.
#[derive(Clone, Copy, Debug)]
pub struct LakeOptions {
    pub show_last_move: bool,
    pub show_elapsed: bool,
}

impl Default for LakeOptions {
    fn default() -> Self {
        Self {
            show_last_move: true,
            show_elapsed: false,
        }
    }
}

pub fn describe_move(direction: Move) -> &'static str {
    match direction {
        Move::Left => "Left",
        Move::Down => "Down",
        Move::Right => "Right",
        Move::Up => "Up",
    }
}

pub fn render_lake(lake: &FrozenLake) -> String {
    render_lake_with_options(lake, LakeOptions::default())
}

/// Text grid with the agent's cell wrapped in brackets.
pub fn render_lake_with_options(lake: &FrozenLake, options: LakeOptions) -> String {
    let mut out = String::new();
    if options.show_last_move {
        if let Some(direction) = lake.last_move() {
            let _ = writeln!(out, "  ({})", describe_move(direction));
        }
    }
    let map = lake.map();
    let position = lake.position();
    for row in 0..map.rows() {
        for col in 0..map.cols() {
            let state = row * map.cols() + col;
            let tile = map.tile_at(row, col).as_char();
            if state == position {
                let _ = write!(out, "[{tile}]");
            } else {
                let _ = write!(out, " {tile} ");
            }
        }
        out.push('\n');
    }
    if options.show_elapsed {
        let status = match (lake.is_finished(), map.tile(position)) {
            (true, Tile::Goal) => "reached the goal",
            (true, Tile::Hole) => "fell into a hole",
            (true, _) => "ran out of time",
            (false, _) => "walking",
        };
        let _ = writeln!(out, "steps: {} ({status})", lake.elapsed_steps());
    }
    out
}

/// Draws reward mean and reward bound per iteration as a PNG line chart.
pub fn render_training_curves(out: &Path, history: &[IterationReport]) -> Result<(), TrainError> {
    let last_iteration = history.last().map(|report| report.iteration).unwrap_or(0);
    let max_value = history
        .iter()
        .flat_map(|report| [report.reward_mean, report.reward_bound])
        .filter(|value| value.is_finite())
        .fold(1.0_f32, f32::max);

    let root = BitMapBackend::new(out, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| TrainError::Plot(format!("{e}")))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Cross-entropy training progress", ("sans-serif", 28).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0..last_iteration.max(1), 0.0f32..max_value)
        .map_err(|e| TrainError::Plot(format!("{e}")))?;

    chart
        .configure_mesh()
        .x_desc("Iteration")
        .y_desc("Reward")
        .y_label_formatter(&|v| format!("{v:.2}"))
        .draw()
        .map_err(|e| TrainError::Plot(format!("{e}")))?;

    let finite = |value: f32| value.is_finite().then_some(value);
    chart
        .draw_series(LineSeries::new(
            history
                .iter()
                .filter_map(|report| finite(report.reward_mean).map(|v| (report.iteration, v))),
            &BLUE,
        ))
        .map_err(|e| TrainError::Plot(format!("{e}")))?
        .label("reward_mean")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart
        .draw_series(LineSeries::new(
            history
                .iter()
                .filter_map(|report| finite(report.reward_bound).map(|v| (report.iteration, v))),
            &RED,
        ))
        .map_err(|e| TrainError::Plot(format!("{e}")))?
        .label("reward_bound")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| TrainError::Plot(format!("{e}")))?;

    root.present().map_err(|e| TrainError::Plot(format!("{e}")))?;
    Ok(())
}
