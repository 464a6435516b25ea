use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use engine::grid::CellState;
use engine::items::ItemKind;
use engine::milestones::LocationId;
use engine::progression::{AbilityKind, GameMode};
use game::blockfit_core::{BlockfitCore, TickOutcome};
use game::logging::init_logging;
use game::persistence::{JsonFileCell, SaveFile, SaveStore, default_save_path};
use game::randomizer::{ConnectionState, ItemDelivery, RandomizerLink};
use game::settings::{ConfigStore, SlotData};

#[derive(Debug, Parser)]
#[command(name = "blockfit")]
#[command(about = "Headless block-fit puzzle player operating on a save file")]
struct Cli {
    /// Save file (defaults to BLOCKFIT_SAVE_PATH or the XDG data dir).
    #[arg(long, global = true)]
    save: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    FreePlay,
    Randomizer,
}

impl From<ModeArg> for GameMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::FreePlay => GameMode::FreePlay,
            ModeArg::Randomizer => GameMode::Randomizer,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AbilityArg {
    Rotate,
    Mirror,
    Shrink,
    Hold,
    Undo,
    RemoveBlock,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Starts a fresh save, replacing any existing one.
    New {
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        #[arg(long)]
        grid_size: Option<usize>,
    },
    Show {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    Place {
        piece_id: u64,
        row: usize,
        col: usize,
        /// Leave the clear pending instead of committing it immediately.
        #[arg(long, default_value_t = false)]
        defer: bool,
    },
    Ability {
        #[arg(value_enum)]
        kind: AbilityArg,
        #[arg(long)]
        piece: Option<u64>,
        #[arg(long)]
        row: Option<usize>,
        #[arg(long)]
        col: Option<usize>,
    },
    Tick {
        #[arg(default_value_t = 100)]
        ms: u32,
    },
    /// Applies deliveries as a connected client and prints outbound reports.
    Receive {
        item_ids: Vec<i64>,
        #[arg(long, default_value_t = 0)]
        start: u64,
    },
    /// Replays the full delivered item list after a reconnect.
    Resync { item_ids: Vec<i64> },
    Slot {
        #[arg(long)]
        goal_score: Option<u64>,
        #[arg(long)]
        starting_slots: Option<usize>,
    },
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },
    ResetAll,
}

/// Prints reports as JSON lines for a bridge process to forward.
struct StdoutLink;

impl RandomizerLink for StdoutLink {
    fn report_location_checks(&mut self, ids: &[LocationId]) {
        println!("{}", serde_json::json!({ "type": "locationChecks", "ids": ids }));
    }

    fn report_goal_complete(&mut self) {
        println!("{}", serde_json::json!({ "type": "goalComplete" }));
    }
}

fn main() -> Result<()> {
    init_logging("warn");
    let cli = Cli::parse();
    let path = cli
        .save
        .unwrap_or_else(|| default_save_path(|k| std::env::var_os(k).map(PathBuf::from)));
    let mut store = SaveStore::at_path(&path);

    if let Commands::New {
        seed,
        mode,
        grid_size,
    } = cli.command
    {
        return cmd_new(&mut store, seed, mode, grid_size);
    }

    let mut core = load_session(&store, &path)?;
    match cli.command {
        Commands::New { .. } => unreachable!("handled above"),
        Commands::Show { json } => return cmd_show(&core, json),
        Commands::Place {
            piece_id,
            row,
            col,
            defer,
        } => cmd_place(&mut core, piece_id, row, col, defer)?,
        Commands::Ability {
            kind,
            piece,
            row,
            col,
        } => cmd_ability(&mut core, kind, piece, row, col)?,
        Commands::Tick { ms } => match core.tick(ms)? {
            TickOutcome::Idle => println!("no clear pending"),
            TickOutcome::Pending { remaining_ms } => println!("clear pending: {remaining_ms}ms left"),
            TickOutcome::Committed(report) => println!("cleared for {} points", report.points),
            TickOutcome::Discarded => println!("stale clear discarded"),
        },
        Commands::Receive { item_ids, start } => {
            core.connection_state_changed(ConnectionState::Connected);
            let items: Vec<ItemDelivery> = item_ids.into_iter().map(ItemDelivery::new).collect();
            let applied = core.items_received(&items, start);
            println!("applied {applied} of {} item(s)", items.len());
            for item in &items {
                if let Some(kind) = ItemKind::from_id(item.item_id) {
                    println!("  {} ({})", kind.display_name(), item.item_id);
                }
            }
            core.flush_outbound(&mut StdoutLink);
        }
        Commands::Resync { item_ids } => {
            core.connection_state_changed(ConnectionState::Connected);
            let items: Vec<ItemDelivery> = item_ids.into_iter().map(ItemDelivery::new).collect();
            let replayed = core.resync(&items)?;
            println!("resynced {replayed} item(s)");
            core.flush_outbound(&mut StdoutLink);
        }
        Commands::Slot {
            goal_score,
            starting_slots,
        } => {
            core.apply_slot_data(&SlotData {
                goal_score,
                starting_piece_slots: starting_slots,
            });
            println!(
                "goal {} with {} piece slot(s)",
                core.config().goal_score,
                core.max_piece_slots()
            );
        }
        Commands::Mode { mode } => {
            core.set_mode(mode.into());
            println!("mode set to {:?}; new game started", core.mode());
        }
        Commands::ResetAll => {
            core.reset_all_progress();
            println!("all progress reset");
        }
    }

    store
        .save(&core)
        .with_context(|| format!("failed to write save {}", path.display()))?;
    Ok(())
}

fn load_session(store: &SaveStore<JsonFileCell<SaveFile>>, path: &Path) -> Result<BlockfitCore> {
    store
        .load()
        .with_context(|| format!("failed to read save {}", path.display()))?
        .with_context(|| format!("no save at {}; run `blockfit new` first", path.display()))
}

fn cmd_new(
    store: &mut SaveStore<JsonFileCell<SaveFile>>,
    seed: u64,
    mode: Option<ModeArg>,
    grid_size: Option<usize>,
) -> Result<()> {
    let config = ConfigStore::from_env().load();
    let mut core = BlockfitCore::with_config(seed, config);
    if let Some(size) = grid_size {
        core.set_grid_size(size)?;
    }
    match mode {
        Some(mode) => core.set_mode(mode.into()),
        None => core.initialize_game(),
    }
    store.save(&core).context("failed to write new save")?;
    println!("{}", render_text(&core));
    Ok(())
}

fn cmd_show(core: &BlockfitCore, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(core)?);
    } else {
        println!("{}", render_text(core));
    }
    Ok(())
}

fn cmd_place(core: &mut BlockfitCore, piece_id: u64, row: usize, col: usize, defer: bool) -> Result<()> {
    let outcome = core.place_piece(piece_id, row, col)?;
    if !outcome.clear_pending() {
        println!("placed piece {piece_id}");
    } else if defer {
        println!("placed piece {piece_id}; {} cell(s) clearing", outcome.clearing_cells.len());
    } else if let TickOutcome::Committed(report) = core.flush_pending_clear()? {
        println!(
            "placed piece {piece_id}; cleared {} line(s) and {} box(es) for {} points",
            report.clears.lines(),
            report.clears.boxes.len(),
            report.points
        );
    }
    if core.is_game_over() {
        println!("game over");
    }
    Ok(())
}

fn cmd_ability(
    core: &mut BlockfitCore,
    kind: AbilityArg,
    piece: Option<u64>,
    row: Option<usize>,
    col: Option<usize>,
) -> Result<()> {
    let piece_arg = || piece.context("--piece is required for this ability");
    match kind {
        AbilityArg::Rotate => core.rotate_piece(piece_arg()?)?,
        AbilityArg::Mirror => core.mirror_piece(piece_arg()?)?,
        AbilityArg::Shrink => core.shrink_piece(piece_arg()?)?,
        AbilityArg::Hold => core.hold_piece(piece_arg()?)?,
        AbilityArg::Undo => core.undo()?,
        AbilityArg::RemoveBlock => {
            let (Some(row), Some(col)) = (row, col) else {
                bail!("--row and --col are required for remove-block");
            };
            core.remove_block(row, col)?;
        }
    }
    let label = match kind {
        AbilityArg::Rotate => AbilityKind::Rotate,
        AbilityArg::Mirror => AbilityKind::Mirror,
        AbilityArg::Shrink => AbilityKind::Shrink,
        AbilityArg::Hold => AbilityKind::Hold,
        AbilityArg::Undo => AbilityKind::Undo,
        AbilityArg::RemoveBlock => AbilityKind::RemoveBlock,
    }
    .label();
    println!("{label} applied; gems left {}", core.gem_balance());
    Ok(())
}

fn render_text(core: &BlockfitCore) -> String {
    let clearing = core.pending_clear_cells();
    let mut out = String::new();
    for (r, row) in core.grid().rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let glyph = match cell {
                _ if clearing.contains(&(r, c)) => '~',
                CellState::Empty => '.',
                CellState::Filled => '#',
                CellState::Gem => '*',
            };
            out.push(glyph);
            out.push(' ');
        }
        out.push('\n');
    }
    let stats = core.stats();
    out.push_str(&format!(
        "mode {:?}  score {}  x{:.2}  lines {}  boxes {}  combos {}  gems {}\n",
        core.mode(),
        stats.total_score,
        core.score_multiplier(),
        stats.lines_cleared,
        stats.boxes_cleared,
        stats.combos,
        core.gem_balance()
    ));
    for piece in core.current_pieces() {
        out.push_str(&format!("piece {} {}\n", piece.instance_id, piece.kind.name()));
    }
    if let Some(held) = core.held_piece() {
        out.push_str(&format!("held {} {}\n", held.instance_id, held.kind.name()));
    }
    if core.is_game_over() {
        out.push_str("game over\n");
    }
    out
}
