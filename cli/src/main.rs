use clap::{Parser, Subcommand};
use fabric_common::db::core::DeviceDb;
use fabric_common::db::delay::Delay;
use fabric_common::util::config::Config;
use fabric_common::util::generator::{GridLayout, generate_grid_device};
use fabric_common::util::{check, logger, visualization};
use fabric_router::type_wire::TypeWirePair;
use fabric_router::{DeviceGraph, Lookahead, RoutingGraph};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Writes a synthetic grid device to `input.device_file`.
    Generate {
        #[arg(long)]
        width: Option<i32>,
        #[arg(long)]
        height: Option<i32>,
        /// Splits the fabric after this column.
        #[arg(long)]
        cut_after: Option<i32>,
    },
    /// Loads the lookahead cache or builds it from the device.
    Build {
        #[arg(long)]
        rebuild: bool,
        #[arg(long)]
        csv: Option<String>,
    },
    /// Estimates the delay between two wires named `TILE/WIRE`.
    Query { src: String, dst: String },
    /// Renders one cost map entry as a PNG heat map.
    Heatmap {
        /// `SRC_TYPE/SRC_WIRE:DST_TYPE/DST_WIRE`, first entry if omitted.
        #[arg(long)]
        pair: Option<String>,
        #[arg(long, default_value = "output/cost_map.png")]
        output: String,
        #[arg(long, default_value_t = 16)]
        cell_px: u32,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let mut config: Config = if args.config.exists() {
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

    let command = args.command.unwrap_or(Commands::Build {
        rebuild: false,
        csv: None,
    });

    match command {
        Commands::Generate {
            width,
            height,
            cut_after,
        } => {
            let width = width.unwrap_or(config.generate.width);
            let height = height.unwrap_or(config.generate.height);
            if width < 2 || height < 1 {
                return Err(anyhow::anyhow!(
                    "Grid {}x{} is too small, need at least 2x1",
                    width,
                    height
                ));
            }
            let mut layout = GridLayout::new(width, height, Delay::new(config.generate.pip_delay));
            layout.cut_after_column = cut_after;

            let db = generate_grid_device(&layout);
            check::check_device(&db).map_err(|e| anyhow::anyhow!(e))?;

            let output = Path::new(&config.input.device_file);
            prepare_output_dir(output)?;
            db.save(output)?;
            log::info!("Generated: {}", output.display());
        }
        Commands::Build { rebuild, csv } => {
            config.lookahead.rebuild |= rebuild;
            if csv.is_some() {
                config.lookahead.csv_dump = csv;
            }
            let db = load_device(&config)?;
            let graph = DeviceGraph::new(&db)?;
            let lookahead = init_lookahead(&graph, &config)?;
            log::info!(
                "Lookahead ready: {} cost maps, {} input site wires, {} output site wires, {} site to site costs",
                lookahead.cost_map().len(),
                lookahead.input_site_wires().len(),
                lookahead.output_site_wires().len(),
                lookahead.site_to_site_cost().len()
            );
        }
        Commands::Query { src, dst } => {
            let db = load_device(&config)?;
            let src_wire = db
                .find_wire(&src)
                .ok_or_else(|| anyhow::anyhow!("Unknown wire '{}'", src))?;
            let dst_wire = db
                .find_wire(&dst)
                .ok_or_else(|| anyhow::anyhow!("Unknown wire '{}'", dst))?;

            let graph = DeviceGraph::new(&db)?;
            let lookahead = init_lookahead(&graph, &config)?;
            match lookahead.estimate_delay(&graph, src_wire, dst_wire) {
                Some(delay) => println!("{} -> {}: {}", src, dst, delay),
                None => println!("{} -> {}: unreachable", src, dst),
            }
        }
        Commands::Heatmap {
            pair,
            output,
            cell_px,
        } => {
            let db = load_device(&config)?;
            let graph = DeviceGraph::new(&db)?;
            let lookahead = init_lookahead(&graph, &config)?;

            let entries = lookahead.cost_map().sorted_entries();
            let (key, entry) = match &pair {
                Some(wanted) => entries
                    .into_iter()
                    .find(|(key, _)| pair_name(&graph, key) == *wanted)
                    .ok_or_else(|| anyhow::anyhow!("No cost map for '{}'", wanted))?,
                None => entries
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Cost map is empty"))?,
            };

            prepare_output_dir(Path::new(&output))?;
            log::info!(
                "Drawing {} ({}x{}, penalty {}) to {}",
                pair_name(&graph, key),
                entry.x_dim(),
                entry.y_dim(),
                entry.penalty(),
                output
            );
            visualization::draw_delay_matrix(
                entry.cells(),
                entry.x_dim(),
                entry.y_dim(),
                entry.origin(),
                &output,
                cell_px,
            );
        }
    }

    Ok(())
}

fn pair_name<G: RoutingGraph + ?Sized>(graph: &G, pair: &TypeWirePair) -> String {
    format!("{}:{}", pair.src.name(graph), pair.dst.name(graph))
}

fn load_device(config: &Config) -> anyhow::Result<DeviceDb> {
    let path = Path::new(&config.input.device_file);
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Device file missing: '{}'. Did you run 'generate'?",
            path.display()
        ));
    }
    log::info!("Loading device: {}", path.display());
    let db = DeviceDb::load(path)?;
    check::check_device(&db).map_err(|e| anyhow::anyhow!("Verification Failed: {}", e))?;
    Ok(db)
}

fn init_lookahead(graph: &DeviceGraph, config: &Config) -> anyhow::Result<Lookahead> {
    let mut rng = StdRng::seed_from_u64(config.lookahead.seed);
    let cache = Path::new(&config.input.lookahead_cache);
    Ok(Lookahead::init(graph, &config.lookahead, cache, &mut rng)?)
}

fn prepare_output_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.exists()
        && !parent.as_os_str().is_empty()
    {
        log::info!("Creating output directory: {:?}", parent);
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
