mod script;

use clap::{Parser, Subcommand};
use pns_common::db::board::Board;
use pns_common::db::io;
use pns_common::geom::coord::to_mm;
use pns_common::geom::IPoint;
use pns_common::util::config::{Config, OutputConfig};
use pns_common::util::profiler::ScopedTimer;
use pns_common::util::{generator, logger, visualization};
use pns_router::item::kind;
use pns_router::{BoardIface, Item, ItemKind, Router, RouterMode, RouterState};
use script::{Script, Step, to_point};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an interaction script against a board.
    Route {
        #[arg(long)]
        board: PathBuf,
        #[arg(long)]
        script: PathBuf,
        #[arg(long, default_value = "output/routed.toml")]
        output: String,
        #[arg(long)]
        snapshot: Option<String>,
    },
    /// List clearance violations on a board.
    Check {
        #[arg(long)]
        board: PathBuf,
    },
    Info {
        #[arg(long)]
        board: PathBuf,
    },
    Generate {
        #[arg(long, default_value_t = 20)]
        footprints: usize,
        #[arg(long, default_value_t = 10)]
        nets: usize,
        #[arg(long, default_value_t = 50.0)]
        size_mm: f64,
        #[arg(long, default_value = "inputs/random.toml")]
        output: String,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    match args.command {
        Commands::Route {
            board,
            script,
            output,
            snapshot,
        } => {
            let board = load_board(&board)?;
            let script = Script::load(&script)?;
            run_session(&config, board, &script, &output, snapshot.as_deref())?;
        }
        Commands::Check { board } => {
            let board = load_board(&board)?;
            let violations = run_check(&config, board)?;
            if violations > 0 {
                std::process::exit(1);
            }
        }
        Commands::Info { board } => {
            let board = load_board(&board)?;
            print_info(&config, board)?;
        }
        Commands::Generate {
            footprints,
            nets,
            size_mm,
            output,
        } => {
            if size_mm <= 0.0 {
                return Err(anyhow::anyhow!("Board size must be positive, got {}", size_mm));
            }
            log::info!(
                "Generating random board (Footprints: {}, Nets: {}, Size: {:.1}mm)...",
                footprints,
                nets,
                size_mm
            );
            let board = generator::generate_random_board(footprints, nets, size_mm);
            save_board(&board, &output)?;
            log::info!("Generated: {}", output);
        }
    }

    Ok(())
}

fn load_board(path: &Path) -> anyhow::Result<Board> {
    log::info!("Loading board: {:?}", path);
    io::load_board(path)
}

fn prepare_output_dir(path_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path_str).parent() {
        if !parent.exists() && !parent.as_os_str().is_empty() {
            log::info!("Creating output directory: {:?}", parent);
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn save_board(board: &Board, filename: &str) -> anyhow::Result<()> {
    prepare_output_dir(filename)?;
    io::save_board(board, Path::new(filename))
}

fn save_snapshot(iface: &BoardIface, output: &OutputConfig, filename: &str) -> anyhow::Result<()> {
    let Some(board) = iface.board() else {
        return Ok(());
    };
    prepare_output_dir(filename)?;
    log::info!("Generating snapshot: {}", filename);
    visualization::draw_board(
        board,
        &iface.overlays(),
        filename,
        output.snapshot_width,
        output.snapshot_height,
    )
    .map_err(|e| anyhow::anyhow!("Failed to write snapshot {}: {}", filename, e))
}

fn open_router(config: &Config, board: Board) -> anyhow::Result<Router<BoardIface>> {
    let mut router = Router::new(BoardIface::with_board(board), config);
    router.sync_world().map_err(|e| anyhow::anyhow!(e))?;
    Ok(router)
}

fn pads_first(kind: ItemKind) -> u8 {
    match kind {
        ItemKind::Solid => 0,
        ItemKind::Via => 1,
        _ => 2,
    }
}

fn tracks_first(kind: ItemKind) -> u8 {
    match kind {
        ItemKind::Segment => 0,
        ItemKind::Via => 1,
        _ => 2,
    }
}

/// Item under the cursor with the lowest rank.
fn pick(router: &Router<BoardIface>, p: IPoint, rank: fn(ItemKind) -> u8) -> Option<Item> {
    let world = router.world();
    router
        .query_hover_items(p)
        .into_iter()
        .filter_map(|id| world.item(id).cloned())
        .min_by_key(|item| rank(item.kind()))
}

fn start(router: &mut Router<BoardIface>, mode: RouterMode, at: [f64; 2], layer: u8) -> bool {
    let p = to_point(at);
    let rank = if mode == RouterMode::TuneSingle {
        tracks_first
    } else {
        pads_first
    };
    let item = pick(router, p, rank);
    let p = router.snap_to_item(item.as_ref(), p);
    router.set_mode(mode);
    router.start_routing(p, item.as_ref(), layer)
}

/// Cursor position and end item for a move. Drags follow the raw cursor.
fn cursor(router: &Router<BoardIface>, at: [f64; 2]) -> (IPoint, Option<Item>) {
    let p = to_point(at);
    if router.state() == RouterState::DragSegment {
        return (p, None);
    }
    let item = pick(router, p, pads_first);
    (router.snap_to_item(item.as_ref(), p), item)
}

fn run_step(router: &mut Router<BoardIface>, step: &Step) -> anyhow::Result<bool> {
    let ok = match *step {
        Step::Route { at, layer } => start(router, RouterMode::RouteSingle, at, layer),
        Step::DiffPair { at, layer } => start(router, RouterMode::RouteDiffPair, at, layer),
        Step::Tune { at } => {
            let layer = router.current_layer();
            start(router, RouterMode::TuneSingle, at, layer)
        }
        Step::Drag { at } => {
            let p = to_point(at);
            match pick(router, p, tracks_first) {
                Some(item) => router.start_dragging(p, &item),
                None => {
                    log::warn!("nothing to drag at ({:.3}, {:.3})", at[0], at[1]);
                    false
                }
            }
        }
        Step::Move { to } => {
            let (p, item) = cursor(router, to);
            router.move_to(p, item.as_ref())
        }
        Step::Fix { at } => {
            let (p, item) = cursor(router, at);
            router.move_to(p, item.as_ref());
            router.fix_route(p, item.as_ref()).map_err(|e| anyhow::anyhow!(e))?
        }
        Step::Cancel => {
            router.stop_routing();
            true
        }
        Step::FlipPosture => {
            router.flip_posture();
            true
        }
        Step::ToggleVia => router.toggle_via_placement(),
        Step::SwitchLayer { layer } => router.switch_layer(layer),
    };
    Ok(ok)
}

fn run_session(
    config: &Config,
    board: Board,
    script: &Script,
    output: &str,
    snapshot: Option<&str>,
) -> anyhow::Result<()> {
    let _timer = ScopedTimer::new("session");
    let mut router = open_router(config, board)?;

    let mut failed = 0;
    for (i, step) in script.step.iter().enumerate() {
        log::debug!("step {}: {:?}", i, step);
        match run_step(&mut router, step) {
            Ok(true) => {}
            Ok(false) => {
                failed += 1;
                log::warn!("step {} ({:?}) failed: {}", i, step, router.failure_reason());
            }
            Err(e) => {
                failed += 1;
                log::error!("step {} ({:?}): {}", i, step, e);
            }
        }
        if let Some(status) = router.tuning_status() {
            log::info!("tuning: {:?}", status);
        }
    }
    log::info!(
        "Replayed {} steps ({} failed)",
        script.step.len(),
        failed
    );

    if let Some(filename) = snapshot {
        save_snapshot(router.iface(), &config.output, filename)?;
    }

    if router.routing_in_progress() {
        log::warn!("Script ended with an unfixed route; discarding it");
        router.stop_routing();
    }

    let board = router
        .iface_mut()
        .take_board()
        .ok_or_else(|| anyhow::anyhow!("Board lost during session"))?;
    log::info!(
        "Writing board to {} ({} tracks, {} vias)",
        output,
        board.tracks.len(),
        board.vias.len()
    );
    save_board(&board, output)
}

fn describe(item: &Item) -> String {
    match item.parent() {
        Some(handle) => format!("{} {:?}", item.kind().name(), handle),
        None => item.kind().name().to_string(),
    }
}

fn run_check(config: &Config, board: Board) -> anyhow::Result<usize> {
    let _timer = ScopedTimer::new("check");
    let router = open_router(config, board)?;
    let world = router.world();

    let mut seen = BTreeSet::new();
    for (id, item) in world.items() {
        for obstacle in world.query_colliding(item, kind::ANY) {
            let key = (id.min(obstacle.id), id.max(obstacle.id));
            if !seen.insert(key) {
                continue;
            }
            println!(
                "violation: {} <-> {} (clearance {:.3}mm, layers {}-{})",
                describe(item),
                describe(&obstacle.item),
                to_mm(obstacle.clearance),
                item.layers().start(),
                item.layers().end()
            );
        }
    }

    if seen.is_empty() {
        log::info!("No clearance violations.");
    } else {
        log::warn!("{} clearance violation(s)", seen.len());
    }
    Ok(seen.len())
}

fn print_info(config: &Config, board: Board) -> anyhow::Result<()> {
    println!("copper layers: {}", board.copper_layers);
    println!("net classes:");
    for class in &board.net_classes {
        println!(
            "  {:<12} clearance {:.3}mm, track {:.3}mm, via {:.3}/{:.3}mm, pair gap {:.3}mm",
            class.name,
            to_mm(class.clearance),
            to_mm(class.track_width),
            to_mm(class.via_diameter),
            to_mm(class.via_drill),
            to_mm(class.diff_pair_gap)
        );
    }
    println!("nets: {}", board.nets.len());
    println!("footprints: {}", board.footprints.len());
    println!("pads: {}", board.pads().count());
    println!("tracks: {}", board.tracks.len());
    println!("vias: {}", board.vias.len());

    let router = open_router(config, board)?;
    let world = router.world();
    println!(
        "router items: {} (max clearance {:.3}mm)",
        world.item_count(),
        to_mm(world.max_clearance())
    );
    Ok(())
}
