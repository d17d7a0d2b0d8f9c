use std::env;

use hashfs::{Entry, Reader, Result};
use tracing::{debug, info, subscriber::set_global_default, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_file(false)
        .with_line_number(true)
        .finish();

    #[allow(clippy::expect_used)]
    set_global_default(subscriber).expect("setting default subscriber failed");

    let path = env::args().nth(1).unwrap_or_else(|| "./resources/base.scs".to_string());
    let force_entry_table_at_end = env::args().any(|a| a == "--force-entry-table-at-end");

    let mut archive = Reader::open_path(&path, force_entry_table_at_end)?;

    info!("opened {path:?}: version={:?} salt={}", archive.version(), archive.salt());

    let mut hashes: Vec<u64> = archive.entries().keys().copied().collect();
    hashes.sort_unstable();

    for hash in hashes {
        let entry = &archive.entries()[&hash];
        debug!("{hash:#018x}");
        debug!("   offset: {}", entry.offset());
        debug!("   size: {}", entry.size());
        debug!("   compressed_size: {}", entry.compressed_size());
        debug!("   is_directory: {}", entry.is_directory());
        debug!("   is_compressed: {}", entry.is_compressed());

        if let Some(texture) = entry.texture() {
            debug!("   texture: {}x{} mips={} cube={} format={:?}", texture.width, texture.height, texture.mipmap_count, texture.is_cube, texture.format);
        }
    }

    let listing = archive.get_directory_listing("/", false, true)?;
    info!("root listing ({} entries): {listing:?}", listing.len());

    Ok(())
}
