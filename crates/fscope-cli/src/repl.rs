//! The interactive session loop.
//!
//! By default we use `rustyline` for line editing, persistent history and
//! tab completion. A minimal stdin-based fallback exists behind
//! `--no-default-features`. Script mode drives the same dispatcher without
//! a terminal.
//!
//! Loop contract: a pending redraw request (terminal resize) is serviced at
//! the top of each iteration by a synthetic `redraw` + `show`; an empty
//! input line re-runs the last command (one-slot cache); the line is
//! recorded into the cache and the line-editor history *before* dispatch,
//! so a command that quits the session is still recorded.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use colored::Colorize;
use fscope_engine::{Control, Engine, Session};

pub fn run(engine: &Engine, session: &mut Session) -> Result<()> {
    #[cfg(feature = "repl-rustyline")]
    {
        run_rustyline(engine, session)
    }
    #[cfg(not(feature = "repl-rustyline"))]
    {
        run_simple(engine, session)
    }
}

/// Execute scripted command lines (from a file, `-` for stdin, and/or
/// repeated `--command` flags) through the dispatcher.
pub fn run_script(
    engine: &Engine,
    session: &mut Session,
    script: Option<&PathBuf>,
    commands: &[String],
    continue_on_error: bool,
    quiet: bool,
) -> Result<()> {
    let mut lines: Vec<String> = Vec::new();

    if let Some(script_path) = script {
        let text = if script_path.as_os_str() == "-" {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(script_path)?
        };
        lines.extend(text.lines().map(str::to_string));
    }
    lines.extend(commands.iter().cloned());

    for (index, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !quiet {
            println!("fscope> {line}");
        }
        match engine.dispatch(session, line) {
            Ok(Control::Continue) => {}
            Ok(Control::Quit) => break,
            Err(err) => {
                if continue_on_error {
                    eprintln!("{} {err:#}", "error:".red().bold());
                } else {
                    return Err(anyhow!("script failed at line {}: {err:#}", index + 1));
                }
            }
        }
    }

    Ok(())
}

fn service_redraw(engine: &Engine, session: &mut Session) {
    if session.take_redraw_request() {
        engine.dispatch_and_report(session, "redraw");
        engine.dispatch_and_report(session, "show");
    }
}

fn dispatch_reported(engine: &Engine, session: &mut Session, line: &str) -> Control {
    match engine.dispatch(session, line) {
        Ok(control) => control,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            Control::Continue
        }
    }
}

#[cfg(not(feature = "repl-rustyline"))]
fn run_simple(engine: &Engine, session: &mut Session) -> Result<()> {
    use std::io::{BufRead, Write};

    println!("{}", "fscope".green().bold());
    println!("Type `help` for commands. Type `quit` to leave.\n");

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    loop {
        service_redraw(engine, session);

        print!("{}", "fscope> ".cyan().bold());
        std::io::stdout().flush()?;

        let mut raw = String::new();
        if input.read_line(&mut raw)? == 0 {
            break;
        }
        let raw = raw.trim_end_matches(['\n', '\r']);

        let line = session.resolve_command_line(raw);
        if let Control::Quit = dispatch_reported(engine, session, &line) {
            break;
        }
    }

    Ok(())
}

#[cfg(feature = "repl-rustyline")]
fn run_rustyline(engine: &Engine, session: &mut Session) -> Result<()> {
    use rustyline::error::ReadlineError;
    use rustyline::Editor;

    println!("{}", "fscope".green().bold());
    println!("Tab-completion enabled. Type `help` for commands. Type `quit` to leave.\n");

    let active = std::sync::Arc::new(std::sync::RwLock::new(None));
    let helper = completion::ReplLineHelper::new(engine, active.clone());
    let mut rl: Editor<completion::ReplLineHelper, rustyline::history::DefaultHistory> =
        Editor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
    rl.set_helper(Some(helper));

    loop {
        service_redraw(engine, session);

        // Keep the completer's view of the active type current.
        *active.write().expect("completion lock poisoned") = session.active;

        let raw = match rl.readline("fscope> ") {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        // One-slot cache: an empty input repeats the previous command. The
        // (possibly substituted) line goes into the cache and the editor
        // history before dispatch, so a quitting command is still recorded.
        let line = session.resolve_command_line(&raw);
        if !line.is_empty() {
            rl.add_history_entry(&line)
                .map_err(|e| anyhow!("failed to record history: {e}"))?;
        }
        if let Control::Quit = dispatch_reported(engine, session, &line) {
            break;
        }
    }

    Ok(())
}

#[cfg(feature = "repl-rustyline")]
mod completion {
    use std::sync::{Arc, RwLock};

    use fscope_engine::{Engine, TypeId};

    pub struct ReplLineHelper<'e> {
        engine: &'e Engine,
        active: Arc<RwLock<Option<TypeId>>>,
        files: rustyline::completion::FilenameCompleter,
    }

    impl<'e> ReplLineHelper<'e> {
        pub fn new(engine: &'e Engine, active: Arc<RwLock<Option<TypeId>>>) -> Self {
            Self {
                engine,
                active,
                files: rustyline::completion::FilenameCompleter::new(),
            }
        }
    }

    impl rustyline::Helper for ReplLineHelper<'_> {}
    impl rustyline::highlight::Highlighter for ReplLineHelper<'_> {}
    impl rustyline::validate::Validator for ReplLineHelper<'_> {}

    impl rustyline::hint::Hinter for ReplLineHelper<'_> {
        type Hint = String;
        fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
            None
        }
    }

    impl rustyline::completion::Completer for ReplLineHelper<'_> {
        type Candidate = rustyline::completion::Pair;

        fn complete(
            &self,
            line: &str,
            pos: usize,
            ctx: &rustyline::Context<'_>,
        ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
            let start = line[..pos]
                .rfind(|c: char| c.is_whitespace())
                .map(|i| i + 1)
                .unwrap_or(0);
            let word = &line[start..pos];

            // Later tokens: only path-taking commands get completion.
            if start > 0 {
                let command = line[..start].split_whitespace().next().unwrap_or("");
                if command.eq_ignore_ascii_case("setdevice") {
                    return self.files.complete(line, pos, ctx);
                }
                return Ok((start, Vec::new()));
            }

            // First token: enumerate the engine's candidates one index at a
            // time, the same walk an indexed readline completer would do.
            let active = *self.active.read().expect("completion lock poisoned");
            let mut pairs = Vec::new();
            while let Some(candidate) = self.engine.complete(active, word, pairs.len()) {
                pairs.push(rustyline::completion::Pair {
                    display: candidate.to_string(),
                    replacement: candidate.to_string(),
                });
            }
            Ok((start, pairs))
        }
    }
}
