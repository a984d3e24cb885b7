//! General-scope commands: always available, whatever is being viewed.

use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};
use fscope_engine::words;
use fscope_engine::{CommandTable, Engine, Session};

use super::{
    device_mut, hex_dump, load_buffer, open_device, parse_u64, remember_current, show_fields,
    SharedFsContext,
};

pub fn build(ctx: &SharedFsContext, capacity: usize) -> Result<CommandTable> {
    let mut table = CommandTable::new(capacity);

    table.register("help", Rc::new(cmd_help))?;

    let c = ctx.clone();
    table.register(
        "setdevice",
        Rc::new(move |_engine: &Engine, session: &mut Session, line: &str| {
            let path = words::words(line)
                .nth(1)
                .ok_or_else(|| anyhow!("usage: setdevice PATH"))?;
            open_device(session, &c, Path::new(path))
        }),
    )?;

    let c = ctx.clone();
    table.register(
        "setoffset",
        Rc::new(move |engine: &Engine, session: &mut Session, line: &str| {
            let offset = parse_u64(
                words::words(line)
                    .nth(1)
                    .ok_or_else(|| anyhow!("usage: setoffset OFFSET"))?,
            )?;
            device_mut(session)?.set_offset(offset);
            if session.active.is_some() {
                load_buffer(engine, session, &c.borrow())?;
            }
            session.report(&format!("offset is now 0x{offset:x}"));
            Ok(())
        }),
    )?;

    table.register("set", Rc::new(cmd_set))?;

    table.register(
        "show",
        Rc::new(|_engine: &Engine, session: &mut Session, _line: &str| {
            hex_dump(session);
            Ok(())
        }),
    )?;

    let c = ctx.clone();
    table.register(
        "next",
        Rc::new(move |engine: &Engine, session: &mut Session, _line: &str| {
            step(engine, session, &c, 1)
        }),
    )?;
    let c = ctx.clone();
    table.register(
        "prev",
        Rc::new(move |engine: &Engine, session: &mut Session, _line: &str| {
            step(engine, session, &c, -1)
        }),
    )?;

    let c = ctx.clone();
    table.register(
        "pgdown",
        Rc::new(move |engine: &Engine, session: &mut Session, _line: &str| {
            page(engine, session, &c, 1)
        }),
    )?;
    let c = ctx.clone();
    table.register(
        "pgup",
        Rc::new(move |engine: &Engine, session: &mut Session, _line: &str| {
            page(engine, session, &c, -1)
        }),
    )?;

    table.register(
        "redraw",
        Rc::new(|_engine: &Engine, session: &mut Session, _line: &str| {
            session.sink.refresh();
            Ok(())
        }),
    )?;

    table.register(
        "remember",
        Rc::new(|_engine: &Engine, session: &mut Session, _line: &str| {
            if session.active.is_none() {
                bail!("nothing to remember: no structure is active");
            }
            remember_current(session);
            let offset = session.offset();
            session.report(&format!("remembered location 0x{offset:x}"));
            Ok(())
        }),
    )?;

    let c = ctx.clone();
    table.register(
        "recall",
        Rc::new(move |engine: &Engine, session: &mut Session, _line: &str| {
            let Some(entry) = session.history.pop() else {
                session.report("nothing remembered");
                return Ok(());
            };
            device_mut(session)?.set_offset(entry.offset);
            engine.activate(session, entry.type_id);
            load_buffer(engine, session, &c.borrow())?;
            let name = &engine.registry().get(entry.type_id).layout.name;
            session.report(&format!("back at {name}, offset 0x{:x}", entry.offset));
            Ok(())
        }),
    )?;

    let c = ctx.clone();
    table.register(
        "enablewrite",
        Rc::new(move |_engine: &Engine, session: &mut Session, _line: &str| {
            if !c.borrow().allow_writes {
                bail!("write access is not permitted by the current configuration");
            }
            session.gate.set_write_enabled(true);
            session.report("write access enabled; changes go to the device on `writedata`");
            Ok(())
        }),
    )?;

    table.register(
        "disablewrite",
        Rc::new(|_engine: &Engine, session: &mut Session, _line: &str| {
            session.gate.set_write_enabled(false);
            session.report("write access disabled");
            Ok(())
        }),
    )?;

    table.register("writedata", Rc::new(cmd_writedata))?;

    Ok(table)
}

fn cmd_help(engine: &Engine, session: &mut Session, _line: &str) -> Result<()> {
    let mut lines = Vec::new();
    if let Some(id) = session.active {
        let descriptor = engine.registry().get(id);
        let names: Vec<&str> = descriptor.commands.names().collect();
        lines.push(format!("{} commands: {}", descriptor.name, names.join(" ")));
    }
    let fs: Vec<&str> = engine.filesystem().names().collect();
    lines.push(format!("filesystem commands: {}", fs.join(" ")));
    let general: Vec<&str> = engine.general().names().collect();
    lines.push(format!("general commands: {}", general.join(" ")));
    lines.push("type `quit` to leave".to_string());
    for line in lines {
        session.report(&line);
    }
    Ok(())
}

/// `set FIELD VALUE` — patch one field of the active structure in the
/// session buffer. Nothing reaches the device until `writedata`.
fn cmd_set(engine: &Engine, session: &mut Session, line: &str) -> Result<()> {
    let mut args = words::words(line).skip(1);
    let (Some(field_name), Some(value)) = (args.next(), args.next()) else {
        bail!("usage: set FIELD VALUE");
    };
    let id = session
        .active
        .ok_or_else(|| anyhow!("no structure is active"))?;
    let layout = &engine.registry().get(id).layout;
    let field = layout
        .field(field_name)
        .ok_or_else(|| anyhow!("`{}` has no field `{field_name}`", layout.name))?
        .clone();

    let value = parse_u64(value)?;
    if !field.write_scalar(&mut session.buffer, value) {
        bail!("field `{field_name}` lies beyond the loaded buffer");
    }
    let shown = field
        .display_value(&session.buffer)
        .unwrap_or_else(|| value.to_string());
    session.report(&format!("{field_name} = {shown} (buffered, not yet written)"));
    Ok(())
}

/// Flush the session buffer to the device through the safety gate, then
/// append one audit record. A log failure is reported but does not undo the
/// write that already succeeded.
fn cmd_writedata(engine: &Engine, session: &mut Session, _line: &str) -> Result<()> {
    session.gate.check_write_allowed()?;
    if session.buffer.is_empty() {
        bail!("nothing loaded to write");
    }

    let offset = session.offset();
    let buffer = std::mem::take(&mut session.buffer);
    let write_result = device_mut(session)?.write_at(offset, &buffer);
    session.buffer = buffer;
    write_result?;

    let name = session
        .active
        .map(|id| engine.registry().get(id).layout.name.clone())
        .unwrap_or_else(|| "raw".to_string());
    let description = format!(
        "wrote {} bytes of {name} at offset 0x{offset:x}",
        session.buffer.len()
    );
    if let Err(err) = session.gate.record(&description) {
        session.report(&format!("warning: audit log not updated: {err}"));
    }
    session.report(&description);
    Ok(())
}

/// Move by one structure stride (the active layout's size, else one byte).
fn step(engine: &Engine, session: &mut Session, ctx: &SharedFsContext, direction: i64) -> Result<()> {
    let stride = session
        .active
        .map(|id| engine.registry().get(id).layout.size().max(1))
        .unwrap_or(1) as u64;
    shift(engine, session, ctx, direction, stride)
}

/// Move by one block.
fn page(engine: &Engine, session: &mut Session, ctx: &SharedFsContext, direction: i64) -> Result<()> {
    let stride = ctx.borrow().geometry.block_size;
    shift(engine, session, ctx, direction, stride)
}

fn shift(
    engine: &Engine,
    session: &mut Session,
    ctx: &SharedFsContext,
    direction: i64,
    stride: u64,
) -> Result<()> {
    let device = device_mut(session)?;
    let offset = if direction < 0 {
        device.offset().saturating_sub(stride)
    } else {
        device.offset().saturating_add(stride)
    };
    device.set_offset(offset);
    if session.active.is_some() {
        load_buffer(engine, session, &ctx.borrow())?;
        show_fields(engine, session)?;
    } else {
        session.report(&format!("offset is now 0x{offset:x}"));
    }
    Ok(())
}
