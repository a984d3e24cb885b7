//! Type-scope command sets, bound to descriptor-catalogue entries by name.
//!
//! Every known kind overrides `show` with a decoded view (shadowing the
//! general hex dump); the navigable kinds add their own movement commands.
//! Descriptor-file kinds without a dedicated set here still work — they get
//! the empty table and fall through to the filesystem/general scopes.

use std::rc::Rc;

use anyhow::{anyhow, bail, Result};
use fscope_engine::words;
use fscope_engine::{CommandTable, Engine, Session};
use fscope_ext2::geometry::GROUP_DESCRIPTOR_SIZE;

use super::{
    device_mut, goto, load_buffer, parse_u64, remember_current, show_fields, SharedFsContext,
    TYPE_BLOCK_BITMAP, TYPE_GROUP_DESCRIPTOR, TYPE_INODE, TYPE_INODE_BITMAP, TYPE_SUPER_BLOCK,
};

/// The type-specific command table for structure kind `name`.
pub fn table_for(name: &str, ctx: &SharedFsContext, capacity: usize) -> Result<CommandTable> {
    match name {
        TYPE_SUPER_BLOCK => super_block(ctx, capacity),
        TYPE_GROUP_DESCRIPTOR => group_descriptor(ctx, capacity),
        TYPE_INODE => inode(ctx, capacity),
        TYPE_BLOCK_BITMAP | TYPE_INODE_BITMAP => bitmap(capacity),
        _ => Ok(CommandTable::new(capacity)),
    }
}

fn show_handler() -> fscope_engine::Handler {
    Rc::new(|engine: &Engine, session: &mut Session, _line: &str| show_fields(engine, session))
}

fn super_block(ctx: &SharedFsContext, capacity: usize) -> Result<CommandTable> {
    let mut table = CommandTable::new(capacity);
    table.register("show", show_handler())?;

    let c = ctx.clone();
    table.register(
        "gocopy",
        Rc::new(move |engine: &Engine, session: &mut Session, line: &str| {
            let copy = words::words(line)
                .nth(1)
                .map(parse_u64)
                .transpose()?
                .ok_or_else(|| anyhow!("usage: gocopy COPY (0 is the primary)"))?;
            let offset = c.borrow().geometry.superblock_copy_offset(copy)?;
            remember_current(session);
            goto(engine, session, &c.borrow(), TYPE_SUPER_BLOCK, offset)?;
            session.report(&format!("viewing superblock copy {copy}"));
            Ok(())
        }),
    )?;
    Ok(table)
}

fn group_descriptor(ctx: &SharedFsContext, capacity: usize) -> Result<CommandTable> {
    let mut table = CommandTable::new(capacity);
    table.register("show", show_handler())?;

    let c = ctx.clone();
    table.register(
        "entry",
        Rc::new(move |engine: &Engine, session: &mut Session, line: &str| {
            let group = words::words(line)
                .nth(1)
                .map(parse_u64)
                .transpose()?
                .ok_or_else(|| anyhow!("usage: entry GROUP"))?;
            jump_to_group(engine, session, &c, group)
        }),
    )?;

    let c = ctx.clone();
    table.register(
        "next",
        Rc::new(move |engine: &Engine, session: &mut Session, _line: &str| {
            step_group(engine, session, &c, 1)
        }),
    )?;
    let c = ctx.clone();
    table.register(
        "prev",
        Rc::new(move |engine: &Engine, session: &mut Session, _line: &str| {
            step_group(engine, session, &c, -1)
        }),
    )?;
    Ok(table)
}

fn jump_to_group(
    engine: &Engine,
    session: &mut Session,
    ctx: &SharedFsContext,
    group: u64,
) -> Result<()> {
    let offset = ctx.borrow().geometry.group_descriptor_offset(group)?;
    goto(engine, session, &ctx.borrow(), TYPE_GROUP_DESCRIPTOR, offset)?;
    session.report(&format!("group descriptor {group}"));
    Ok(())
}

fn step_group(
    engine: &Engine,
    session: &mut Session,
    ctx: &SharedFsContext,
    direction: i64,
) -> Result<()> {
    let table_offset = ctx.borrow().geometry.descriptor_table_offset();
    let offset = session.offset();
    let index = offset.saturating_sub(table_offset) / GROUP_DESCRIPTOR_SIZE;
    let target = if direction < 0 {
        index.checked_sub(1).ok_or_else(|| anyhow!("already at group 0"))?
    } else {
        index + 1
    };
    jump_to_group(engine, session, ctx, target)
}

fn inode(ctx: &SharedFsContext, capacity: usize) -> Result<CommandTable> {
    let mut table = CommandTable::new(capacity);
    table.register("show", show_handler())?;

    let c = ctx.clone();
    table.register(
        "next",
        Rc::new(move |engine: &Engine, session: &mut Session, _line: &str| {
            step_inode(engine, session, &c, 1)
        }),
    )?;
    let c = ctx.clone();
    table.register(
        "prev",
        Rc::new(move |engine: &Engine, session: &mut Session, _line: &str| {
            step_inode(engine, session, &c, -1)
        }),
    )?;
    Ok(table)
}

fn step_inode(
    engine: &Engine,
    session: &mut Session,
    ctx: &SharedFsContext,
    direction: i64,
) -> Result<()> {
    let stride = ctx.borrow().geometry.inode_size;
    let offset = session.offset();
    let target = if direction < 0 {
        offset
            .checked_sub(stride)
            .ok_or_else(|| anyhow!("already at the first inode slot"))?
    } else {
        offset + stride
    };
    device_mut(session)?.set_offset(target);
    load_buffer(engine, session, &ctx.borrow())?;
    show_fields(engine, session)
}

/// Shared command set for the block and inode bitmaps. The buffer holds one
/// whole bitmap block; bits are edited in memory and hit the device on
/// `writedata`.
fn bitmap(capacity: usize) -> Result<CommandTable> {
    let mut table = CommandTable::new(capacity);

    table.register(
        "show",
        Rc::new(|_engine: &Engine, session: &mut Session, _line: &str| {
            let offset = session.offset();
            let total_bits = session.buffer.len() * 8;
            let set_bits: usize = session
                .buffer
                .iter()
                .map(|b| b.count_ones() as usize)
                .sum();
            let mut lines = vec![format!(
                "bitmap at 0x{offset:x}: {set_bits} of {total_bits} bits set"
            )];
            // First 512 bits, 64 per row, densest view that stays readable.
            for (row, chunk) in session.buffer.chunks(8).take(8).enumerate() {
                let bits: String = chunk
                    .iter()
                    .flat_map(|byte| (0..8).map(move |i| if byte >> i & 1 == 1 { '1' } else { '0' }))
                    .collect();
                lines.push(format!("  {:>5}  {bits}", row * 64));
            }
            for line in lines {
                session.report(&line);
            }
            Ok(())
        }),
    )?;

    table.register(
        "entry",
        Rc::new(|_engine: &Engine, session: &mut Session, line: &str| {
            let bit = required_bit(line, "entry BIT")?;
            let state = read_bit(&session.buffer, bit)?;
            session.report(&format!("bit {bit} is {}", if state { "set" } else { "clear" }));
            Ok(())
        }),
    )?;

    table.register(
        "allocate",
        Rc::new(|_engine: &Engine, session: &mut Session, line: &str| {
            flip_bits(session, line, true, "allocate BIT [COUNT]")
        }),
    )?;

    table.register(
        "deallocate",
        Rc::new(|_engine: &Engine, session: &mut Session, line: &str| {
            flip_bits(session, line, false, "deallocate BIT [COUNT]")
        }),
    )?;

    Ok(table)
}

fn required_bit(line: &str, usage: &str) -> Result<u64> {
    words::words(line)
        .nth(1)
        .map(parse_u64)
        .transpose()?
        .ok_or_else(|| anyhow!("usage: {usage}"))
}

fn read_bit(buffer: &[u8], bit: u64) -> Result<bool> {
    let byte = buffer
        .get((bit / 8) as usize)
        .ok_or_else(|| anyhow!("bit {bit} lies beyond this bitmap block"))?;
    Ok(byte >> (bit % 8) & 1 == 1)
}

fn flip_bits(session: &mut Session, line: &str, set: bool, usage: &str) -> Result<()> {
    let mut args = words::words(line).skip(1);
    let first = args
        .next()
        .map(parse_u64)
        .transpose()?
        .ok_or_else(|| anyhow!("usage: {usage}"))?;
    let count = args.next().map(parse_u64).transpose()?.unwrap_or(1).max(1);

    let limit = session.buffer.len() as u64 * 8;
    if first + count > limit {
        bail!("bits {first}..{} lie beyond this bitmap block", first + count);
    }
    for bit in first..first + count {
        let byte = &mut session.buffer[(bit / 8) as usize];
        if set {
            *byte |= 1 << (bit % 8);
        } else {
            *byte &= !(1 << (bit % 8));
        }
    }
    session.report(&format!(
        "{} bits {first}..{} (buffered, not yet written)",
        if set { "set" } else { "cleared" },
        first + count
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_addressing_is_lsb_first_within_bytes() {
        let buffer = vec![0b0000_0101u8, 0b1000_0000];
        assert!(read_bit(&buffer, 0).unwrap());
        assert!(!read_bit(&buffer, 1).unwrap());
        assert!(read_bit(&buffer, 2).unwrap());
        assert!(read_bit(&buffer, 15).unwrap());
        assert!(read_bit(&buffer, 16).is_err());
    }
}
