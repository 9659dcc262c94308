// C8: Interactive Console. Line-oriented command parser driving the local
// front end: breakpoints, watches, frame selection, variable display, and
// the step/next run-mode handoff back to the engine.

use crate::breakpoints::BreakpointRegistry;
use crate::engine::RunMode;
use crate::frames::{self, SelectedFrame};
use crate::inspector::{self, FormatOverrides};
use crate::metadata::{DebugMetadata, DisplayFormat, Symbol};
use crate::settings::Settings;
use crate::util::display_basename;
use crate::vm::{AddressSpace, Cell, ContextRegistry, FrameIterator, UCell};
use crate::watches::WatchRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Step,
    Next,
}

// Per-entry console state. Reset every time the front end is entered, per
// the design note that selection state must never leak across halts.
pub struct Console {
    pub selected: SelectedFrame,
    pub last_repeat: Option<Repeat>,
}

// Everything a command needs but that doesn't belong in `Console` itself:
// shared registries and the read-only VM view for the current halt.
pub struct CommandContext<'a> {
    pub meta: &'a dyn DebugMetadata,
    pub space: &'a mut dyn AddressSpace,
    pub frames: &'a dyn FrameIterator,
    pub contexts: &'a dyn ContextRegistry,
    pub breakpoints: &'a mut BreakpointRegistry,
    pub watches: &'a mut WatchRegistry,
    pub overrides: &'a mut FormatOverrides,
    pub settings: &'a Settings,
}

pub enum Outcome {
    // Stay in the console; print `lines` to the user.
    Stay(Vec<String>),
    // Return control to the VM with this run mode; print `lines` first.
    Resume(RunMode, Vec<String>),
}

impl Console {
    pub fn enter(meta: &dyn DebugMetadata, frames: &dyn FrameIterator, contexts: &dyn ContextRegistry, hit: bool, current_file: &str, cip: UCell) -> (Console, Vec<String>) {
        let selected = frames::enter(frames, contexts).unwrap_or(SelectedFrame { index: 0, context: contexts_first_id(contexts), cip, frm: 0 });
        let mut lines = Vec::new();
        // The original distinguishes a real breakpoint hit ("BREAK") from a
        // halt for any other reason - unhandled error, single step - ("STOP").
        let banner = if hit { "BREAK" } else { "STOP" };
        let line = meta.lookup_line(cip).map(|l| l + 1).unwrap_or(0);
        lines.push(format!("{} at line {} in {}", banner, line, display_basename(current_file)));
        (Console { selected, last_repeat: None }, lines)
    }

    pub fn dispatch(&mut self, ctx: &mut CommandContext, current_file: &str, input: &str) -> Outcome {
        let input = input.trim();
        if input.is_empty() {
            return match self.last_repeat {
                Some(Repeat::Step) => Outcome::Resume(RunMode::Stepping, vec![]),
                Some(Repeat::Next) => Outcome::Resume(RunMode::StepOver, vec![]),
                None => Outcome::Stay(vec!["(no previous step/next command)".to_string()]),
            };
        }
        let mut parts = input.splitn(2, char::is_whitespace);
        let cmd = parts.next().unwrap_or("").to_lowercase();
        let rest = parts.next().unwrap_or("").trim();

        let mut lines = Vec::new();
        let mutated;
        let outcome = match cmd.as_str() {
            "?" => { lines.push(help(if rest.is_empty() { None } else { Some(rest) })); mutated = false; None }
            "g" | "go" => {
                mutated = false;
                if rest.is_empty() {
                    return Outcome::Resume(RunMode::Running, lines);
                }
                return Outcome::Resume(RunMode::StepOut, lines);
            }
            "s" | "step" => { self.last_repeat = Some(Repeat::Step); mutated = false; return Outcome::Resume(RunMode::Stepping, lines); }
            "n" | "next" => { self.last_repeat = Some(Repeat::Next); mutated = false; return Outcome::Resume(RunMode::StepOver, lines); }
            "bt" | "backtrace" => { backtrace(ctx.frames, self.selected.index, &mut lines); mutated = false; None }
            "f" | "frame" => {
                mutated = false;
                match rest.parse::<usize>() {
                    Ok(n) => match frames::select(ctx.frames, ctx.contexts, n) {
                        Some(sel) => { self.selected = sel; lines.push(format!("selected frame {}", n)); }
                        None => lines.push("(invalid frame)".to_string()),
                    },
                    Err(_) => lines.push("(invalid frame)".to_string()),
                }
                None
            }
            "break" | "tbreak" => { cmd_break(ctx, current_file, self.selected.cip, rest, cmd == "tbreak", &mut lines); mutated = true; None }
            "cbreak" => { cmd_cbreak(ctx, rest, &mut lines); mutated = true; None }
            "disp" | "d" => { cmd_disp(ctx, self.selected.cip, self.selected.frm, rest, &mut lines); mutated = false; None }
            "set" => { cmd_set(ctx, self.selected.cip, self.selected.frm, rest, &mut lines); mutated = true; None }
            "type" => { cmd_type(ctx, self.selected.cip, rest, &mut lines); mutated = true; None }
            "files" => { for f in ctx.meta.files() { lines.push(f); } mutated = false; None }
            "funcs" => { cmd_funcs(ctx, &mut lines); mutated = false; None }
            "pos" => { cmd_pos(ctx, &self.selected, current_file, &mut lines); mutated = false; None }
            "w" | "watch" => {
                mutated = true;
                if ctx.watches.add(rest) { lines.push(format!("watch added: {}", rest)); } else { lines.push("(already watched)".to_string()); }
                None
            }
            "cw" | "cwatch" => { cmd_cwatch(ctx, rest, &mut lines); mutated = true; None }
            "quit" => { return Outcome::Resume(RunMode::Running, lines); }
            other => { lines.push(format!("(unknown command: {})", other)); mutated = false; None }
        };
        if let Some(o) = outcome {
            return o;
        }
        if mutated {
            list_watches(ctx, self.selected.cip, self.selected.frm, &mut lines);
        }
        Outcome::Stay(lines)
    }
}

fn contexts_first_id(_contexts: &dyn ContextRegistry) -> crate::vm::ContextId {
    crate::vm::ContextId(0)
}

fn backtrace(frames: &dyn FrameIterator, selected: usize, lines: &mut Vec<String>) {
    for i in 0..frames.len() {
        let marker = if i == selected { "->" } else { "  " };
        let name = frames.function_name(i).unwrap_or_else(|| "??".to_string());
        let loc = match (frames.file_path(i), frames.line_number(i)) {
            (Some(f), Some(l)) => format!(" ({}:{})", display_basename(&f), l + 1),
            _ => String::new(),
        };
        lines.push(format!("{} #{} {}{}", marker, i, name, loc));
    }
}

fn cmd_funcs(ctx: &CommandContext, lines: &mut Vec<String>) {
    for sym in ctx.meta.iterate_symbols() {
        if sym.ident == crate::metadata::SymbolKind::Function {
            let file = ctx.meta.lookup_file(sym.codestart).unwrap_or_default();
            lines.push(format!("{}  ({})", sym.name, display_basename(&file)));
        }
    }
}

fn cmd_pos(ctx: &CommandContext, selected: &SelectedFrame, current_file: &str, lines: &mut Vec<String>) {
    let file = ctx.meta.lookup_file(selected.cip).unwrap_or_else(|| current_file.to_string());
    let func = ctx.meta.lookup_function(selected.cip).unwrap_or_else(|| "??".to_string());
    let line = ctx.meta.lookup_line(selected.cip).map(|l| l + 1).unwrap_or(0);
    lines.push(format!("{} {}:{} (frame {})", func, display_basename(&file), line, selected.index));
}

fn cmd_break(ctx: &mut CommandContext, current_file: &str, cip: UCell, spec: &str, temporary: bool, lines: &mut Vec<String>) {
    if spec.is_empty() {
        lines.push("(usage: break [file:]line|func|.)".to_string());
        return;
    }
    let (file, rest) = match spec.rfind(':') {
        Some(i) => (Some(&spec[..i]), &spec[i + 1..]),
        None => (None, spec),
    };
    // `.` means the current line, per the command table.
    let is_here = rest == ".";
    let result = if is_here {
        let line = ctx.meta.lookup_line(cip).map(|l| l + 1).unwrap_or(1);
        ctx.breakpoints.add_line(ctx.meta, file, current_file, line, temporary)
    } else {
        match rest.parse::<u32>() {
            Ok(line) => ctx.breakpoints.add_line(ctx.meta, file, current_file, line, temporary),
            Err(_) => ctx.breakpoints.add_function(ctx.meta, file, current_file, rest, temporary),
        }
    };
    match result {
        Ok(bp) => {
            let bline = ctx.meta.lookup_line(bp.addr).map(|l| l + 1).unwrap_or(0);
            let bfile = ctx.meta.lookup_file(bp.addr).unwrap_or_else(|| current_file.to_string());
            lines.push(format!("BREAK {} at line {} in {}", bp.number, bline, display_basename(&bfile)));
        }
        Err(e) => lines.push(format!("({})", e)),
    }
}

fn cmd_cbreak(ctx: &mut CommandContext, spec: &str, lines: &mut Vec<String>) {
    if spec == "*" {
        ctx.breakpoints.clear_all();
        lines.push("all breakpoints cleared".to_string());
        return;
    }
    match spec.parse::<u32>() {
        Ok(n) => {
            if ctx.breakpoints.clear_by_number(n) {
                lines.push(format!("breakpoint {} cleared", n));
            } else {
                lines.push("(no such breakpoint)".to_string());
            }
        }
        Err(_) => lines.push("(usage: cbreak n|*)".to_string()),
    }
}

fn cmd_cwatch(ctx: &mut CommandContext, spec: &str, lines: &mut Vec<String>) {
    if spec == "*" {
        ctx.watches.clear_all();
        lines.push("all watches cleared".to_string());
        return;
    }
    let cleared = match spec.parse::<usize>() {
        Ok(n) => ctx.watches.clear_by_index(n),
        Err(_) => ctx.watches.clear_by_name(spec),
    };
    lines.push(if cleared { "watch cleared".to_string() } else { "(no such watch)".to_string() });
}

// Parses `name[i][j]...`, capping the index count at `max_dimensions`.
fn parse_expr(expr: &str, max_dimensions: usize) -> Result<(String, Vec<i32>), String> {
    let expr = expr.trim();
    let bracket = match expr.find('[') {
        None => return Ok((expr.to_string(), vec![])),
        Some(i) => i,
    };
    let name = expr[..bracket].to_string();
    let mut indices = Vec::new();
    let mut rest = &expr[bracket..];
    while rest.starts_with('[') {
        let close = rest.find(']').ok_or("unmatched '['")?;
        let idx_str = rest[1..close].trim();
        let idx = idx_str.parse::<i32>().map_err(|_| "bad index")?;
        indices.push(idx);
        rest = &rest[close + 1..];
        if indices.len() > max_dimensions {
            return Err("too many dimensions".to_string());
        }
    }
    Ok((name, indices))
}

fn lookup_symbol(meta: &dyn DebugMetadata, name: &str, cip: UCell) -> Option<Symbol> {
    meta.get_variable(name, cip)
}

fn cmd_disp(ctx: &mut CommandContext, cip: UCell, frm: Cell, arg: &str, lines: &mut Vec<String>) {
    if arg.is_empty() {
        for sym in ctx.meta.iterate_symbols() {
            if sym.in_scope(cip) {
                let text = inspector::display_variable(ctx.meta, &*ctx.space, ctx.overrides, &sym, cip, frm, &[], ctx.settings);
                lines.push(format!("{:<12} {}", sym.name, text));
            }
        }
        return;
    }
    let (name, indices) = match parse_expr(arg, ctx.settings.max_dimensions) {
        Ok(v) => v,
        Err(e) => { lines.push(format!("({})", e)); return; }
    };
    match lookup_symbol(ctx.meta, &name, cip) {
        Some(sym) => {
            let text = inspector::display_variable(ctx.meta, &*ctx.space, ctx.overrides, &sym, cip, frm, &indices, ctx.settings);
            lines.push(format!("{:<12} {}", sym.name, text));
        }
        None => lines.push(format!("(unknown symbol: {})", name)),
    }
}

fn cmd_set(ctx: &mut CommandContext, cip: UCell, frm: Cell, arg: &str, lines: &mut Vec<String>) {
    let eq = match arg.rfind('=') {
        Some(i) => i,
        None => { lines.push("(usage: set name[=idx]=value)".to_string()); return; }
    };
    let lhs = arg[..eq].trim();
    let value = match arg[eq + 1..].trim().parse::<Cell>() {
        Ok(v) => v,
        Err(_) => { lines.push("(bad value)".to_string()); return; }
    };
    let (name, indices) = match parse_expr(lhs, ctx.settings.max_dimensions) {
        Ok(v) => v,
        Err(e) => { lines.push(format!("({})", e)); return; }
    };
    let sym = match lookup_symbol(ctx.meta, &name, cip) {
        Some(s) => s,
        None => { lines.push(format!("(unknown symbol: {})", name)); return; }
    };
    let index = indices.first().copied().unwrap_or(0);
    match inspector::set(&sym, frm, ctx.space, index, value) {
        Ok(()) => lines.push(format!("{} = {}", name, value)),
        Err(e) => lines.push(format!("({})", e)),
    }
}

fn cmd_type(ctx: &mut CommandContext, cip: UCell, arg: &str, lines: &mut Vec<String>) {
    let mut parts = arg.split_whitespace();
    let name = match parts.next() { Some(n) => n, None => { lines.push("(usage: type name fmt)".to_string()); return; } };
    let fmt_str = match parts.next() { Some(f) => f, None => { lines.push("(usage: type name fmt)".to_string()); return; } };
    let format = match fmt_str.to_lowercase().as_str() {
        "default" | "dec" => DisplayFormat::Default,
        "hex" => DisplayFormat::Hex,
        "bool" => DisplayFormat::Bool,
        "float" => DisplayFormat::Float,
        "string" | "str" => DisplayFormat::String,
        "bin" => DisplayFormat::Bin,
        _ => { lines.push("(unknown format)".to_string()); return; }
    };
    match lookup_symbol(ctx.meta, name, cip) {
        Some(sym) => { ctx.overrides.set(&sym, format); lines.push(format!("{} display format set", name)); }
        None => lines.push(format!("(unknown symbol: {})", name)),
    }
}

pub fn list_watches(ctx: &CommandContext, cip: UCell, frm: Cell, lines: &mut Vec<String>) {
    if ctx.watches.is_empty() {
        return;
    }
    for (n, expr) in ctx.watches.list() {
        let (name, indices) = match parse_expr(expr, ctx.settings.max_dimensions) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let text = match lookup_symbol(ctx.meta, &name, cip) {
            Some(sym) => inspector::display_variable(ctx.meta, &*ctx.space, &*ctx.overrides, &sym, cip, frm, &indices, ctx.settings),
            None => "(unknown symbol)".to_string(),
        };
        lines.push(format!("{}  {:<12} {}", n, expr, text));
    }
}

pub fn help(topic: Option<&str>) -> String {
    match topic {
        None => "commands: ? g s n bt f break tbreak cbreak disp set type files funcs pos w cw quit (type '? cmd' for details)".to_string(),
        Some("?") => "? [cmd] - show this list, or help for one command".to_string(),
        Some("break") => "break [file:]line|func|. - set a breakpoint; '.' means the current line".to_string(),
        Some("tbreak") => "tbreak [file:]line|func|. - like break, but clears itself after the first hit".to_string(),
        Some("cbreak") => "cbreak n|* - clear breakpoint n, or all breakpoints".to_string(),
        Some("cw") | Some("cwatch") => "cw n|name|* - clear watch n (1-based), by name, or all watches".to_string(),
        Some("disp") | Some("d") => "disp [expr] - show one variable (name[i][j]...), or all in-scope variables".to_string(),
        Some("frame") | Some("f") => "frame n - select frame n for disp/set/pos".to_string(),
        Some("bt") | Some("backtrace") => "bt - dump the frame chain, marking the selected frame with '->'".to_string(),
        Some("go") | Some("g") => "go [func] - with no args, resume running; with func, step out and return".to_string(),
        Some("step") | Some("s") => "step - single-step one source line and return; repeats on empty input".to_string(),
        Some("next") | Some("n") => "next - step over a call on the current line and return; repeats on empty input".to_string(),
        Some("set") => "set name[=idx]=value - write a cell, scalar or indexed".to_string(),
        Some("type") => "type name fmt - change a variable's display format (default/hex/bool/float/string/bin)".to_string(),
        Some("files") => "files - list the file table".to_string(),
        Some("funcs") => "funcs - list known functions".to_string(),
        Some("pos") => "pos - show the selected frame's function, file, line".to_string(),
        Some("watch") | Some("w") => "watch expr - add an expression to the watch list, shown after every command".to_string(),
        Some("quit") => "quit - deactivate the debugger and resume running".to_string(),
        Some(other) => format!("(no help for {})", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_expr_splits_name_and_indices() {
        let (name, idx) = parse_expr("a[1][2]", 3).unwrap();
        assert_eq!(name, "a");
        assert_eq!(idx, vec![1, 2]);
    }

    #[test]
    fn parse_expr_no_brackets_is_scalar() {
        let (name, idx) = parse_expr("x", 3).unwrap();
        assert_eq!(name, "x");
        assert!(idx.is_empty());
    }

    #[test]
    fn parse_expr_rejects_too_many_dimensions() {
        assert!(parse_expr("a[1][2][3][4]", 3).is_err());
    }

    #[test]
    fn help_without_topic_lists_commands() {
        assert!(help(None).contains("break"));
    }
}


