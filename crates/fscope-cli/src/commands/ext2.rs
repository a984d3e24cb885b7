//! Filesystem-scope commands: jump to a structure by filesystem coordinates.

use std::rc::Rc;

use anyhow::{anyhow, Result};
use fscope_engine::words;
use fscope_engine::{CommandTable, Engine, Session};
use fscope_ext2::geometry::{locate_block_bitmap, locate_inode, locate_inode_bitmap};
use fscope_ext2::SUPERBLOCK_OFFSET;

use super::{
    device_mut, goto, parse_u64, remember_current, SharedFsContext, TYPE_BLOCK_BITMAP,
    TYPE_GROUP_DESCRIPTOR, TYPE_INODE, TYPE_INODE_BITMAP, TYPE_SUPER_BLOCK,
};

pub fn build(ctx: &SharedFsContext, capacity: usize) -> Result<CommandTable> {
    let mut table = CommandTable::new(capacity);

    let c = ctx.clone();
    table.register(
        "super",
        Rc::new(move |engine: &Engine, session: &mut Session, _line: &str| {
            remember_current(session);
            goto(engine, session, &c.borrow(), TYPE_SUPER_BLOCK, SUPERBLOCK_OFFSET)
        }),
    )?;

    let c = ctx.clone();
    table.register(
        "group",
        Rc::new(move |engine: &Engine, session: &mut Session, line: &str| {
            let group = optional_index(line)?.unwrap_or(0);
            let offset = c.borrow().geometry.group_descriptor_offset(group)?;
            remember_current(session);
            goto(engine, session, &c.borrow(), TYPE_GROUP_DESCRIPTOR, offset)
        }),
    )?;

    let c = ctx.clone();
    table.register(
        "inode",
        Rc::new(move |engine: &Engine, session: &mut Session, line: &str| {
            let inode = optional_index(line)?
                .ok_or_else(|| anyhow!("usage: inode NUMBER (inodes are 1-based)"))?;
            let geometry = c.borrow().geometry.clone();
            let offset = locate_inode(device_mut(session)?.as_mut(), &geometry, inode)?;
            remember_current(session);
            goto(engine, session, &c.borrow(), TYPE_INODE, offset)
        }),
    )?;

    let c = ctx.clone();
    table.register(
        "blockbitmap",
        Rc::new(move |engine: &Engine, session: &mut Session, line: &str| {
            let group = optional_index(line)?.unwrap_or(0);
            let geometry = c.borrow().geometry.clone();
            let offset = locate_block_bitmap(device_mut(session)?.as_mut(), &geometry, group)?;
            remember_current(session);
            goto(engine, session, &c.borrow(), TYPE_BLOCK_BITMAP, offset)
        }),
    )?;

    let c = ctx.clone();
    table.register(
        "inodebitmap",
        Rc::new(move |engine: &Engine, session: &mut Session, line: &str| {
            let group = optional_index(line)?.unwrap_or(0);
            let geometry = c.borrow().geometry.clone();
            let offset = locate_inode_bitmap(device_mut(session)?.as_mut(), &geometry, group)?;
            remember_current(session);
            goto(engine, session, &c.borrow(), TYPE_INODE_BITMAP, offset)
        }),
    )?;

    Ok(table)
}

fn optional_index(line: &str) -> Result<Option<u64>> {
    words::words(line).nth(1).map(parse_u64).transpose()
}
