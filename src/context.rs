// Top-level `Debugger`: owns the registries, engine state, ambient log and
// settings, and ties the step/break engine (C7) to whichever front end is
// active - the local interactive console (C8) or an RSP session (C10). This
// is the `Context`-equivalent the rest of the crate is threaded through.

use std::io::{BufRead, Write};

use crate::breakpoints::BreakpointRegistry;
use crate::console::{CommandContext, Console, Outcome};
use crate::engine::{self, Decision, EngineState, RunMode};
use crate::inspector::FormatOverrides;
use crate::log::Log;
use crate::metadata::DebugMetadata;
use crate::rsp::session::{RegisterSnapshot, Session};
use crate::rsp::transport::Framer;
use crate::settings::Settings;
use crate::vm::{AddressSpace, Cell, ContextRegistry, FrameIterator, UCell, Watchdog};
use crate::watches::WatchRegistry;

pub trait ConsoleIo {
    fn read_line(&mut self) -> Option<String>;
    fn print(&mut self, line: &str);
}

// The default front end: blocking reads from stdin, per the concurrency
// model's "a single global stdin is assumed".
pub struct StdIo;

impl ConsoleIo for StdIo {
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }

    fn print(&mut self, line: &str) {
        let mut out = std::io::stdout();
        let _ = writeln!(out, "{}", line);
    }
}

pub struct Debugger {
    pub settings: Settings,
    pub log: Log,
    pub engine: EngineState,
    pub breakpoints: BreakpointRegistry,
    pub watches: WatchRegistry,
    pub overrides: FormatOverrides,
}

impl Debugger {
    pub fn new(settings: Settings) -> Debugger {
        Debugger {
            settings,
            log: Log::new(),
            engine: EngineState::new(),
            breakpoints: BreakpointRegistry::new(),
            watches: WatchRegistry::new(),
            overrides: FormatOverrides::new(),
        }
    }

    pub fn deactivate(&mut self) {
        self.engine.active = false;
    }

    // The per-debug-point entry point the VM calls, front-ended by a local
    // console. Returns the run mode the VM should continue with.
    pub fn on_break_local(
        &mut self,
        meta: &dyn DebugMetadata,
        space: &mut dyn AddressSpace,
        frames: &dyn FrameIterator,
        contexts: &dyn ContextRegistry,
        watchdog: &mut dyn Watchdog,
        io: &mut dyn ConsoleIo,
        cip: UCell,
        frm: Cell,
    ) -> RunMode {
        let decision = engine::on_break(&mut self.engine, &mut self.breakpoints, meta, cip, frm, self.settings.break_count_limit);
        let hit = match decision {
            Decision::Continue => return self.engine.run_mode,
            Decision::Enter { hit } => hit,
        };

        watchdog.pause();
        let (mut console, banner_lines) = Console::enter(meta, frames, contexts, hit, &self.engine.current_file, cip);
        for line in &banner_lines {
            io.print(line);
        }
        {
            let mut cmd_ctx = CommandContext {
                meta,
                space,
                frames,
                contexts,
                breakpoints: &mut self.breakpoints,
                watches: &mut self.watches,
                overrides: &mut self.overrides,
                settings: &self.settings,
            };
            // Unconditional watch listing on entry, per the original's
            // `ListWatches()` call at the top of `HandleInput`.
            let mut entry_lines = Vec::new();
            crate::console::list_watches(&cmd_ctx, console.selected.cip, console.selected.frm, &mut entry_lines);
            for line in &entry_lines {
                io.print(line);
            }

            let new_mode = loop {
                let input = match io.read_line() {
                    Some(s) => s,
                    None => break RunMode::Running,
                };
                match console.dispatch(&mut cmd_ctx, &self.engine.current_file, &input) {
                    Outcome::Stay(lines) => {
                        for line in &lines {
                            io.print(line);
                        }
                    }
                    Outcome::Resume(mode, lines) => {
                        for line in &lines {
                            io.print(line);
                        }
                        break mode;
                    }
                }
            };
            engine::finish_halt(&mut self.engine, new_mode, console.selected.frm);
        }
        watchdog.resume();
        self.engine.run_mode
    }

    // Front-ends a halt through an already-negotiated RSP session instead of
    // the local console: captures a register snapshot, sends the
    // unsolicited stop-reply, then services packets until the peer resumes
    // execution. `regs` are sampled by the caller from the VM at `cip`/`frm`.
    pub fn on_break_rsp(
        &mut self,
        meta: &dyn DebugMetadata,
        watchdog: &mut dyn Watchdog,
        session: &mut Session,
        framer: &mut Framer,
        regs: RegisterSnapshot,
        mut send: impl FnMut(&[u8]),
        mut recv_packet: impl FnMut() -> Option<Vec<u8>>,
        cip: UCell,
        frm: Cell,
    ) -> RunMode {
        let decision = engine::on_break(&mut self.engine, &mut self.breakpoints, meta, cip, frm, self.settings.break_count_limit);
        if matches!(decision, Decision::Continue) {
            return self.engine.run_mode;
        }

        watchdog.pause();
        session.regs = regs;
        send(&framer.encode(session.regs.encode_stop_reply().as_bytes()));

        let new_mode = loop {
            let payload = match recv_packet() {
                Some(p) => p,
                None => break RunMode::Running,
            };
            let reply = session.dispatch(&payload);
            if !reply.is_empty() {
                send(&framer.encode(reply.as_bytes()));
            }
            if payload == b"vCont;c" || payload.starts_with(b"c") {
                break RunMode::Running;
            }
            if payload.starts_with(b"s") {
                break RunMode::Stepping;
            }
        };
        engine::finish_halt(&mut self.engine, new_mode, frm);
        watchdog.resume();
        self.engine.run_mode
    }
}
