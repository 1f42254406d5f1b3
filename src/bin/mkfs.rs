use std::path::PathBuf;

use clap::Parser;
use ssfs::fs::Volume;
use ssfs::storage::file::FileStorage;

/// Installs a filesystem on a disk image.
#[derive(Parser)]
struct Cli {
    /// Disk image to format
    image: PathBuf,

    /// Minimum number of inodes
    #[arg(long, short, default_value_t = 32)]
    inodes: i32,

    /// Create the image with this many 1024-byte blocks first
    #[arg(long, short)]
    blocks: Option<u64>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let storage = match cli.blocks {
        Some(blocks) => FileStorage::create(&cli.image, blocks),
        None => FileStorage::open(&cli.image),
    };
    let storage = match storage {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!(
                "mkfs.ssfs: failed to open image {}: {:?}",
                cli.image.display(),
                e
            );
            std::process::exit(1);
        }
    };

    match Volume::format(storage, cli.inodes) {
        Ok(()) => {
            eprintln!(
                "mkfs.ssfs: formatted {} with at least {} inodes",
                cli.image.display(),
                cli.inodes.max(1)
            );
        }
        Err(e) => {
            eprintln!(
                "mkfs.ssfs: failed to format {}: {:?}",
                cli.image.display(),
                e
            );
            std::process::exit(1);
        }
    }
}
