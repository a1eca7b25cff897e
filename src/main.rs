mod config;
mod fs;
mod list_cmd;
mod mirror_cmd;
mod replay;
mod sanitize;
mod skeleton;
mod test_util;
mod text_encoding;
mod tree_listing;

use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// If true, don't do anything, just print what would be done.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Settings remembered between runs
    #[arg(long, default_value = "config.yaml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild a folder skeleton with empty files from a 115 directory tree export
    Mirror {
        #[arg(short, long, help = "Directory tree file exported by 115, last used if not specified")]
        tree: Option<String>,

        #[arg(
            short,
            long,
            help = "Folder to create the mirror in, it is deleted first. Last used if not specified"
        )]
        output: Option<String>,

        #[arg(
            long,
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "true",
            help = "Replace '*' in created paths with 's', --fix-garbled=false turns it off. Last used if not specified"
        )]
        fix_garbled: Option<bool>,

        #[arg(
            long,
            default_value_t = false,
            help = "Skip a failing entry and everything below it instead of stopping"
        )]
        keep_going: bool,
    },
    /// Write the path of every file below a folder to a text file
    List {
        #[arg(short, long, help = "Folder to list")]
        directory: String,

        #[arg(long, default_value = "mergeLog", help = "Folder the list file is written to")]
        output_dir: String,
    },
}

fn main() {
    match go() {
        Ok(_) => {}
        Err(e) => {
            error!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn go() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let dry_run = cli.dry_run;
    let debug = cli.debug > 0;
    let tracing_level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        // disable printing the name of the module in every log line.
        .with_target(false)
        .init();
    if debug {
        info!("Debug mode is on");
    }

    match cli.command {
        Commands::Mirror {
            tree,
            output,
            fix_garbled,
            keep_going,
        } => mirror_cmd::main(
            &tree,
            &output,
            &fix_garbled,
            &keep_going,
            &cli.config,
            &debug,
            &dry_run,
        )?,
        Commands::List {
            directory,
            output_dir,
        } => list_cmd::main(&directory, &output_dir, &dry_run)?,
    }

    Ok(())
}
