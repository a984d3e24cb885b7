//! Command registration and shared handler helpers.
//!
//! Handlers are closures over a shared [`FsContext`] (geometry plus write
//! policy), registered into the engine's three scopes:
//!
//! - general commands are always available (`help`, `setdevice`, offset
//!   movement, the write gate, `writedata`, …),
//! - filesystem commands need detected/assumed geometry (`super`, `group`,
//!   `inode`, the bitmaps),
//! - type commands come with each descriptor-catalogue entry and override
//!   by name (`show`, `entry`, `next`, `allocate`, …).

pub mod ext2;
pub mod general;
pub mod typed;

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use fscope_engine::{Engine, MetaDevice, Session};
use fscope_ext2::Geometry;

/// Mutable filesystem-level state shared by handlers through `Rc<RefCell>`.
pub struct FsContext {
    pub geometry: Geometry,
    /// Startup policy: whether `enablewrite` may be used at all.
    pub allow_writes: bool,
    pub force_ext2: bool,
    pub force_default: bool,
    pub default_block_size: u64,
    pub default_total_blocks: u64,
    pub default_blocks_per_group: u64,
}

pub type SharedFsContext = Rc<RefCell<FsContext>>;

/// Structure-kind names the typed command sets bind to. Descriptor files
/// are free to define more kinds; extras get the generic command set only.
pub const TYPE_SUPER_BLOCK: &str = "super_block";
pub const TYPE_GROUP_DESCRIPTOR: &str = "group_descriptor";
pub const TYPE_INODE: &str = "inode";
pub const TYPE_BLOCK_BITMAP: &str = "block_bitmap";
pub const TYPE_INODE_BITMAP: &str = "inode_bitmap";

/// Parse a decimal or `0x`-prefixed hexadecimal number.
pub fn parse_u64(text: &str) -> Result<u64> {
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    parsed.map_err(|_| anyhow!("bad number `{text}`"))
}

pub fn device_mut<'a>(session: &'a mut Session) -> Result<&'a mut Box<dyn MetaDevice>> {
    session
        .device
        .as_mut()
        .ok_or_else(|| anyhow!("no device open (use `setdevice PATH`)"))
}

/// Reload the session buffer from the current offset. The buffer size is
/// the active type's layout size, or one block for kinds with no fields
/// (the bitmaps).
pub fn load_buffer(engine: &Engine, session: &mut Session, ctx: &FsContext) -> Result<()> {
    let layout_size = session
        .active
        .map(|id| engine.registry().get(id).layout.size())
        .unwrap_or(0);
    let size = if layout_size == 0 {
        ctx.geometry.block_size as usize
    } else {
        layout_size
    };
    let offset = session.offset();
    let device = device_mut(session)?;
    let mut buffer = vec![0u8; size];
    device.read_at(offset, &mut buffer)?;
    session.buffer = buffer;
    Ok(())
}

/// Record the current location before jumping elsewhere, so `recall` can
/// come back to it. A no-op until a structure is active.
pub fn remember_current(session: &mut Session) {
    if let Some(active) = session.active {
        let offset = session.offset();
        session.history.push(active, offset);
    }
}

/// Jump to `offset` viewing structure kind `type_name`.
pub fn goto(
    engine: &Engine,
    session: &mut Session,
    ctx: &FsContext,
    type_name: &str,
    offset: u64,
) -> Result<()> {
    let id = engine.registry().find(type_name).ok_or_else(|| {
        anyhow!("structure kind `{type_name}` is not in the descriptor catalogue")
    })?;
    device_mut(session)?.set_offset(offset);
    engine.activate(session, id);
    load_buffer(engine, session, ctx)?;
    let name = &engine.registry().get(id).layout.name;
    session.report(&format!("{name} at 0x{offset:x}"));
    Ok(())
}

/// Open a device/image, enforce the mounted-open policy, work out the
/// geometry, and install it as the session device. Used both at startup and
/// by `setdevice`.
pub fn open_device(
    session: &mut Session,
    ctx: &SharedFsContext,
    path: &std::path::Path,
) -> Result<()> {
    let device = fscope_ext2::Device::open(path)?;
    session
        .gate
        .check_open_policy(device.mounted(), &path.display().to_string())?;
    if device.mounted() {
        session.report("warning: device is mounted; treat what you see as shifting sand");
    }
    if device.read_only() {
        session.report("note: device opened read-only");
    }

    let mut boxed: Box<dyn MetaDevice> = Box::new(device);
    let geometry = resolve_geometry(&mut *boxed, &ctx.borrow(), session.sink.as_mut());
    session.device = Some(boxed);
    session.active = None;
    session.buffer.clear();
    ctx.borrow_mut().geometry = geometry;
    session.report(&format!("device is now `{}`", path.display()));
    Ok(())
}

/// Autodetect ext2 geometry unless configuration says otherwise; fall back
/// to the configured defaults when detection is skipped or fails.
fn resolve_geometry(
    device: &mut dyn MetaDevice,
    ctx: &FsContext,
    sink: &mut dyn fscope_engine::RenderSink,
) -> Geometry {
    let fallback = Geometry::fallback(
        ctx.default_block_size,
        ctx.default_total_blocks,
        ctx.default_blocks_per_group,
    );
    if ctx.force_default {
        sink.line("autodetection skipped, using configured defaults");
        return fallback;
    }
    match fscope_ext2::superblock::detect(device) {
        Ok(superblock) => {
            sink.line(&format!(
                "detected ext2: {} blocks of {} bytes, {} per group",
                superblock.blocks_count, superblock.block_size, superblock.blocks_per_group
            ));
            Geometry::from_superblock(&superblock)
        }
        Err(err) if ctx.force_ext2 => {
            sink.line(&format!("{err}; forced on, using configured defaults"));
            fallback
        }
        Err(err) => {
            sink.line(&format!("{err}; using configured defaults"));
            fallback
        }
    }
}

/// Field-wise decoded listing of the active structure.
pub fn show_fields(engine: &Engine, session: &mut Session) -> Result<()> {
    let id = session
        .active
        .ok_or_else(|| anyhow!("no structure is active"))?;
    let layout = &engine.registry().get(id).layout;
    let offset = session.offset();

    let mut lines = vec![format!("{} at 0x{offset:x}:", layout.name)];
    for field in &layout.fields {
        let value = field
            .display_value(&session.buffer)
            .unwrap_or_else(|| "<beyond buffer>".to_string());
        let suffix = if field.is_array() && !matches!(field.kind, fscope_descriptors::FieldKind::Char)
        {
            format!("[{}]", field.count)
        } else {
            String::new()
        };
        lines.push(format!(
            "  {:<24} +0x{:<4x} {value}{suffix}",
            field.name, field.offset
        ));
    }
    for line in lines {
        session.report(&line);
    }
    Ok(())
}

/// Classic 16-bytes-per-line hex dump of the session buffer.
pub fn hex_dump(session: &mut Session) {
    let base = session.offset();
    let chunks: Vec<String> = session
        .buffer
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            let ascii: String = chunk
                .iter()
                .map(|b| {
                    if b.is_ascii_graphic() || *b == b' ' {
                        *b as char
                    } else {
                        '.'
                    }
                })
                .collect();
            format!(
                "{:08x}  {:<47}  |{ascii}|",
                base + (i * 16) as u64,
                hex.join(" ")
            )
        })
        .collect();
    if chunks.is_empty() {
        session.report("<empty buffer>");
    }
    for line in chunks {
        session.report(&line);
    }
}
