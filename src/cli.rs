//! Command dispatch: `generate`, `generate-reroll`, and `calculate-ev`. Argument
//! parsing uses `clap`'s builder API (`Command`/`Arg`), the style `pure-chance-greed`'s
//! CLI entry point uses rather than the derive macros.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::{Arg, Command};
use tracing::{debug, info};

use crate::dice::{DiceCodec, NUM_HANDS};
use crate::error::{Result, YumError};
use crate::reroll::RerollTable;
use crate::solver::{self, TURNS_PER_ROUND};
use crate::state_map::StateIndexMap;

pub struct Config {
    pub output_dir: PathBuf,
}

impl Config {
    fn state_mapping_path(&self) -> PathBuf {
        self.output_dir.join("state_mapping.dat")
    }

    fn reroll_path(&self) -> PathBuf {
        self.output_dir.join("reroll_probabilities.dat")
    }

    fn actions_path(&self) -> PathBuf {
        self.output_dir.join("optimal_actions.dat")
    }

    fn ev_path(&self) -> PathBuf {
        self.output_dir.join("optimal_actions_ev.dat")
    }
}

pub fn command() -> Command {
    Command::new("yum-solver")
        .about("Computes the optimal backward-induction policy for Yum")
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .help("Directory holding the generated and solved artifacts")
                .default_value("output"),
        )
        .subcommand(Command::new("generate").about("Builds the state index map"))
        .subcommand(Command::new("generate-reroll").about("Builds the reroll probability table"))
        .subcommand(
            Command::new("calculate-ev")
                .about("Runs backward induction over all rounds")
                .arg(
                    Arg::new("save-ev")
                        .long("save-ev")
                        .help("Also write the expected-value stream alongside actions")
                        .num_args(0),
                ),
        )
}

/// Runs the parsed command; the caller maps the returned error kind to an exit code.
pub fn run(matches: &clap::ArgMatches) -> Result<()> {
    let output_dir = PathBuf::from(
        matches
            .get_one::<String>("output-dir")
            .expect("has a default value"),
    );
    std::fs::create_dir_all(&output_dir)?;
    let config = Config { output_dir };

    match matches.subcommand() {
        Some(("generate", _)) => generate(&config),
        Some(("generate-reroll", _)) => generate_reroll(&config),
        Some(("calculate-ev", sub)) => {
            let save_ev = sub.get_flag("save-ev");
            calculate_ev(&config, save_ev)
        }
        _ => Err(YumError::InvalidIndex(
            "no subcommand given; see --help".to_string(),
        )),
    }
}

fn generate(config: &Config) -> Result<()> {
    info!("generating state index map");
    let map = StateIndexMap::generate();
    info!(states = map.num_states(), "state enumeration complete");
    map.save(config.state_mapping_path())?;
    Ok(())
}

fn generate_reroll(config: &Config) -> Result<()> {
    info!("generating reroll probability table");
    let codec = DiceCodec::new();
    let table = RerollTable::build(&codec)?;
    info!("reroll table build complete");
    table.save(config.reroll_path())?;
    Ok(())
}

fn calculate_ev(config: &Config, save_ev: bool) -> Result<()> {
    let state_map = StateIndexMap::load(config.state_mapping_path())?;
    let reroll = RerollTable::load(config.reroll_path())?;
    let codec = DiceCodec::new();

    info!(states = state_map.num_states(), "loaded inputs, starting backward induction");

    let actions_file = File::create(config.actions_path())?;
    let mut actions_writer = BufWriter::new(actions_file);
    let mut ev_writer = if save_ev {
        Some(BufWriter::new(File::create(config.ev_path())?))
    } else {
        None
    };

    let mut future = vec![0.0f32; state_map.num_states()];

    // Categories filled descending: 11, 10, ..., 0 — rounds 12 down to 1.
    for categories_filled in (0..crate::category::NUM_CATEGORIES as u32).rev() {
        let round = categories_filled + 1;
        let results = solver::solve_round(categories_filled, &codec, &reroll, &state_map, &future)?;
        info!(round, states = results.len(), "round solved");
        debug!(
            round,
            states = results.len(),
            dice = NUM_HANDS,
            turns = TURNS_PER_ROUND,
            cells = results.len() * NUM_HANDS * TURNS_PER_ROUND,
            "round slab size"
        );

        write_round(&mut actions_writer, ev_writer.as_mut(), &results)?;
        solver::update_future(&mut future, &reroll, &results);
    }

    actions_writer.flush()?;
    if let Some(w) = ev_writer.as_mut() {
        w.flush()?;
    }

    info!("backward induction complete");
    Ok(())
}

fn write_round(
    actions: &mut BufWriter<File>,
    mut evs: Option<&mut BufWriter<File>>,
    results: &[solver::StateResult],
) -> Result<()> {
    for result in results {
        for dice_index in 0..NUM_HANDS {
            for turn in 0..TURNS_PER_ROUND {
                let idx = dice_index * TURNS_PER_ROUND + turn;
                crate::persist::write_u8(actions, result.actions[idx])?;
                if let Some(w) = evs.as_mut() {
                    crate::persist::write_f32(w, result.evs[idx])?;
                }
            }
        }
    }
    Ok(())
}

pub fn exit_code_for(error: &YumError) -> i32 {
    match error {
        YumError::MissingInput(_) | YumError::InvalidTable(_) | YumError::InvalidMap(_) => 2,
        YumError::InvalidDice(_) | YumError::InvalidIndex(_) => 1,
        YumError::InvariantViolation(_) => 3,
        YumError::IoFailure(_) => 2,
    }
}

