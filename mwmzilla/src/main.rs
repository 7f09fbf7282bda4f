use anyhow::Result;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use std::path::PathBuf;
use tracing::Level;

mod commands;

use commands::{
    dump::dump_features,
    geom_stats::{collect_geom_stats, print_geom_stats},
    info::{print_info, read_info},
    stress::stress_decode,
    Archive,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "mwmzilla")]
#[command(about = "Inspect MWM map feature containers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Classification tree (indented text)
    #[arg(long, default_value = "classificator.txt")]
    classificator: PathBuf,

    /// Type mapping, one `|`-joined type path per line
    #[arg(long, default_value = "types.txt")]
    types: PathBuf,

    /// Print progress every N features (0 disables)
    #[arg(long, default_value_t = 100_000)]
    progress_every: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Container header: scales, coding params, sections
    Info {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// One line per feature
    Dump {
        #[arg(short, long)]
        input: PathBuf,

        /// Display scale geometry is resolved for
        #[arg(long, default_value_t = 17)]
        scale: i32,

        /// Device language code for readable names
        #[arg(long, default_value = "en")]
        lang: String,

        /// Output path (defaults to stdout)
        #[arg(long)]
        out: Option<PathBuf>,

        /// If set, stop after N features
        #[arg(long)]
        limit: Option<u64>,

        /// Also print points / triangles
        #[arg(long, default_value_t = false)]
        geometry: bool,
    },

    /// Outer geometry bytes and elements per scale bucket
    GeomStats {
        #[arg(short, long)]
        input: PathBuf,

        /// If set, stop after N features
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Decode every feature from many threads and compare with one pass
    Stress {
        #[arg(short, long)]
        input: PathBuf,

        /// Worker threads (0 = rayon default)
        #[arg(long, default_value_t = 0)]
        threads: usize,

        /// Passes over the container per thread
        #[arg(long, default_value_t = 4)]
        rounds: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Info { input } => {
            let archive = Archive::open(&input, &cli.classificator, &cli.types)?;
            read_info(&archive).map(|r| print_info(&r))
        }
        Commands::Dump {
            input,
            scale,
            lang,
            out,
            limit,
            geometry,
        } => {
            let archive = Archive::open(&input, &cli.classificator, &cli.types)?;
            dump_features(
                &archive,
                scale,
                &lang,
                out.as_deref(),
                limit,
                cli.progress_every,
                geometry,
            )
        }
        Commands::GeomStats { input, limit } => {
            let archive = Archive::open(&input, &cli.classificator, &cli.types)?;
            collect_geom_stats(&archive, limit, cli.progress_every).map(|r| print_geom_stats(&r))
        }
        Commands::Stress {
            input,
            threads,
            rounds,
        } => {
            let archive = Archive::open(&input, &cli.classificator, &cli.types)?;
            stress_decode(&archive, threads, rounds)
        }
    }
}
