//! Kukini CLI - create, validate, and maintain BagIt bags.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "kukini")]
#[command(
    author,
    version,
    about = "BagIt packaging tool for digital archive submissions"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, text)
    #[arg(long, global = true, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new bag from a source directory
    Create {
        /// Directory whose contents become the bag payload
        source: PathBuf,

        /// Path of the bag to create
        #[arg(long, short)]
        out: PathBuf,

        /// Compress the finished bag to a zip archive
        #[arg(long)]
        zip: bool,
    },

    /// Validate a bag (directory or zip archive)
    Validate {
        /// Bag path
        bag: PathBuf,
    },

    /// Regenerate missing required bag files
    Complete {
        /// Bag path
        bag: PathBuf,
    },

    /// Rescan the payload and rewrite every manifest
    UpdateManifests {
        /// Bag path
        bag: PathBuf,
    },

    /// Add a payload file to a bag
    AddData {
        /// Bag path
        bag: PathBuf,

        /// File to add
        file: PathBuf,

        /// Destination directory inside data/, e.g. "testfiles"
        #[arg(long, default_value = "")]
        dest_dir: String,
    },

    /// Remove a payload file from a bag
    RemoveData {
        /// Bag path
        bag: PathBuf,

        /// Payload path relative to the bag root, e.g. data/file.txt
        path: String,
    },

    /// Add tag files at the bag root
    AddTags {
        /// Bag path
        bag: PathBuf,

        /// Tag files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove tag files from the bag root
    RemoveTags {
        /// Bag path
        bag: PathBuf,

        /// Tag file names to remove
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Move a bag into a destination directory
    Move {
        /// Bag path
        bag: PathBuf,

        /// Destination directory
        dest_dir: PathBuf,
    },

    /// Copy a bag into a destination directory
    Copy {
        /// Bag path
        bag: PathBuf,

        /// Destination directory
        dest_dir: PathBuf,
    },

    /// Compress files or directories into a zip archive
    Compress {
        /// Output archive path (defaults to a sibling of the first source)
        #[arg(long, short)]
        out: Option<PathBuf>,

        /// Files or directories to compress
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Expand a zip archive into a sibling directory
    Expand {
        /// Archive path
        archive: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match cli.command {
        Commands::Create { source, out, zip } => {
            let bag = kukini_bagit::create_bag(&source, &out, zip)?;
            info!("Bag created at {:?}", bag);
        }

        Commands::Validate { bag } => {
            let result = kukini_bagit::validate(&bag)?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.is_valid() {
                println!("Bag is valid");
            } else {
                println!("Bag validation failed:");
                for violation in &result.violations {
                    println!("  - {violation}");
                }
            }

            if !result.is_valid() {
                std::process::exit(1);
            }
        }

        Commands::Complete { bag } => {
            kukini_bagit::make_complete(&bag)?;
            info!("Bag completed: {:?}", bag);
        }

        Commands::UpdateManifests { bag } => {
            kukini_bagit::update_all_manifests(&bag)?;
            info!("Manifests updated: {:?}", bag);
        }

        Commands::AddData {
            bag,
            file,
            dest_dir,
        } => {
            kukini_bagit::add_data_to_bag(&bag, &dest_dir, &file)?;
            info!("Added {:?} to {:?}", file, bag);
        }

        Commands::RemoveData { bag, path } => {
            kukini_bagit::remove_data_from_bag(&bag, &path)?;
            info!("Removed {path} from {:?}", bag);
        }

        Commands::AddTags { bag, files } => {
            let refs: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
            kukini_bagit::add_tag_files_to_bag(&bag, &refs)?;
            info!("Added {} tag file(s) to {:?}", refs.len(), bag);
        }

        Commands::RemoveTags { bag, names } => {
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            kukini_bagit::remove_tag_files_from_bag(&bag, &refs)?;
            info!("Removed {} tag file(s) from {:?}", refs.len(), bag);
        }

        Commands::Move { bag, dest_dir } => {
            let target = kukini_bagit::move_bag(&bag, &dest_dir)?;
            info!("Bag moved to {:?}", target);
        }

        Commands::Copy { bag, dest_dir } => {
            let target = kukini_bagit::copy_bag(&bag, &dest_dir)?;
            info!("Bag copied to {:?}", target);
        }

        Commands::Compress { out, paths } => {
            let refs: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
            let archive = kukini_bagit::compress(out.as_deref(), &refs)?;
            info!("Archive written to {:?}", archive);
        }

        Commands::Expand { archive } => {
            let dest = kukini_bagit::expand(&archive)?;
            info!("Archive expanded to {:?}", dest);
        }
    }

    Ok(())
}
