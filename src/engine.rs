// C7: Step/Break Engine. The per-debug-point decision function: whether to
// halt, and how `run_mode` evolves across consecutive halts.

use crate::breakpoints::BreakpointRegistry;
use crate::metadata::DebugMetadata;
use crate::vm::{Cell, UCell};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Running,
    Stepping,
    StepOver,
    StepOut,
}

pub struct EngineState {
    pub active: bool,
    pub run_mode: RunMode,
    pub last_frame: Cell,
    pub last_line: Option<u32>,
    pub current_file: String,
    pub break_count: u32,
}

impl EngineState {
    pub fn new() -> EngineState {
        EngineState {
            active: true,
            run_mode: RunMode::Running,
            last_frame: 0,
            last_line: None,
            current_file: String::new(),
            break_count: 0,
        }
    }
}

impl Default for EngineState {
    fn default() -> EngineState { EngineState::new() }
}

// Result of `on_break`: either continue without entering the front end, or
// enter it, carrying whether the halt was a real breakpoint hit (for the
// STOP/BREAK banner wording) and whether the run mode must latch `last_frame`
// on exit.
pub enum Decision {
    Continue,
    Enter { hit: bool },
}

// `selected_frm` is the frame pointer of the currently selected frame
// (computed by C6 before this call, since STEPOVER/STEPOUT compare against
// it). `break_count_limit` comes from `Settings`.
pub fn on_break(state: &mut EngineState, registry: &mut BreakpointRegistry, meta: &dyn DebugMetadata, cip: UCell, selected_frm: Cell, break_count_limit: u32) -> Decision {
    if !state.active {
        return Decision::Continue;
    }

    if state.run_mode == RunMode::StepOut && selected_frm > state.last_frame {
        state.run_mode = RunMode::Stepping;
    }

    let prior_run_mode = state.run_mode;
    let hit;
    if matches!(state.run_mode, RunMode::Running | RunMode::StepOut) {
        let (was_hit, _was_temp) = registry.check(cip);
        if !was_hit {
            return Decision::Continue;
        }
        hit = true;
        state.run_mode = RunMode::Stepping;
    } else {
        hit = false;
    }

    let line = meta.lookup_line(cip);
    if line.is_some() && line == state.last_line && state.break_count < break_count_limit {
        state.break_count += 1;
        state.run_mode = prior_run_mode;
        return Decision::Continue;
    }
    state.last_line = line;
    state.break_count = 0;

    if state.run_mode == RunMode::StepOver && selected_frm < state.last_frame {
        return Decision::Continue; // still inside the callee
    }

    state.current_file = meta.lookup_file(cip).unwrap_or_default();
    Decision::Enter { hit }
}

// Called after the front end returns a new run mode and (if relevant) a
// fresh selected frame pointer - latches `last_frame` for STEPOVER/STEPOUT.
pub fn finish_halt(state: &mut EngineState, new_mode: RunMode, selected_frm: Cell) {
    state.run_mode = new_mode;
    if matches!(new_mode, RunMode::StepOver | RunMode::StepOut) {
        state.last_frame = selected_frm;
    }
}
