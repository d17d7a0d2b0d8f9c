use std::env;

use hashfs::{AddressMode, MipFilter, Reader, Result, TextureFilter, TextureSampling, WriterV2};
use tracing::{info, subscriber::set_global_default, Level};
use tracing_subscriber::FmtSubscriber;

/// Packs a `.tobj`/`.dds` pair into a fresh v2 archive, then reopens it and
/// writes the reconstructed descriptor + surface back out next to the
/// input, so the repack can be diffed by hand against the source files.
fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_file(false)
        .with_line_number(true)
        .finish();

    #[allow(clippy::expect_used)]
    set_global_default(subscriber).expect("setting default subscriber failed");

    let mut args = env::args().skip(1);
    let surface_path = args.next().unwrap_or_else(|| "./resources/texture/cube.dds".to_string());
    let archive_path = args.next().unwrap_or_else(|| "/model/cube.tobj".to_string());

    let mut writer = WriterV2::new();
    writer.add_texture(
        &archive_path,
        TextureSampling {
            mag_filter: TextureFilter::Linear,
            min_filter: TextureFilter::Linear,
            mip_filter: MipFilter::Trilinear,
            addr_u: AddressMode::Repeat,
            addr_v: AddressMode::Repeat,
            addr_w: AddressMode::Clamp,
        },
        &surface_path,
    )?;

    let mut out = Vec::new();
    writer.save(&mut std::io::Cursor::new(&mut out))?;
    info!("packed {surface_path:?} into a {} byte archive", out.len());

    let mut reader = Reader::open(std::io::Cursor::new(out), false)?;
    let entry = reader.get_entry(&archive_path)?;
    let texture = entry.texture().cloned().expect("add_texture always produces a texture entry");
    info!(
        "repacked: {}x{} mips={} faces={} format={:?}",
        texture.width, texture.height, texture.mipmap_count, texture.face_count, texture.format
    );

    let descriptor_path = format!("{surface_path}.repacked.tobj");
    reader.extract_to_file(&archive_path, &descriptor_path)?;

    info!("wrote {descriptor_path} and its sibling .dds");

    Ok(())
}
