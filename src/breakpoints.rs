// C3: Breakpoint Registry. Address-indexed, de-duplicated by address, with
// a per-registry monotonic numbering scheme: `number` is stored rather than
// derived from position, and never reused after clear_all.

use crate::error::Result;
use crate::metadata::DebugMetadata;
use crate::resolver;
use crate::vm::UCell;

#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub addr: UCell,
    pub name: Option<String>,
    pub temporary: bool,
    pub number: u32,
}

pub struct BreakpointRegistry {
    entries: Vec<Breakpoint>,
    next_number: u32,
}

impl BreakpointRegistry {
    pub fn new() -> BreakpointRegistry {
        BreakpointRegistry { entries: Vec::new(), next_number: 1 }
    }

    fn find_index_by_addr(&self, addr: UCell) -> Option<usize> {
        self.entries.iter().position(|b| b.addr == addr)
    }

    fn insert(&mut self, addr: UCell, name: Option<String>, temporary: bool) -> &Breakpoint {
        if let Some(idx) = self.find_index_by_addr(addr) {
            return &self.entries[idx];
        }
        let number = self.next_number;
        self.next_number += 1;
        self.entries.push(Breakpoint { addr, name, temporary, number });
        self.entries.last().unwrap()
    }

    pub fn add_line(&mut self, meta: &dyn DebugMetadata, file: Option<&str>, current_file: &str, line: u32, temporary: bool) -> Result<&Breakpoint> {
        let (_, addr) = resolver::resolve_line(meta, file, current_file, line)?;
        Ok(self.insert(addr, None, temporary))
    }

    pub fn add_function(&mut self, meta: &dyn DebugMetadata, file: Option<&str>, current_file: &str, function: &str, temporary: bool) -> Result<&Breakpoint> {
        let (_, addr) = resolver::resolve_function(meta, file, current_file, function)?;
        let realname = meta.lookup_function(addr);
        Ok(self.insert(addr, realname, temporary))
    }

    pub fn clear_by_number(&mut self, number: u32) -> bool {
        if let Some(idx) = self.entries.iter().position(|b| b.number == number) {
            self.entries.remove(idx);
            true
        } else {
            false
        }
    }

    pub fn clear_by_address(&mut self, addr: UCell) -> bool {
        if let Some(idx) = self.find_index_by_addr(addr) {
            self.entries.remove(idx);
            true
        } else {
            false
        }
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
        // next_number intentionally not reset.
    }

    // Accepts `[file:]{line|function}`. Returns the matching breakpoint
    // number, or -1 if there's no match.
    pub fn find_by_spec(&self, meta: &dyn DebugMetadata, current_file: &str, spec: &str) -> i64 {
        let spec = spec.trim();
        let (file, rest) = match spec.rfind(':') {
            Some(i) => (Some(&spec[..i]), &spec[i + 1..]),
            None => (None, spec),
        };
        let target_file = match resolver::resolve_file(meta, file, current_file) {
            Some(f) => f,
            None => return -1,
        };
        for bp in &self.entries {
            let bp_file = match meta.lookup_file(bp.addr) {
                Some(f) => f,
                None => continue,
            };
            if bp_file != target_file {
                continue;
            }
            if let Some(name) = &bp.name {
                if name == rest {
                    return bp.number as i64;
                }
            }
            if let Ok(line) = rest.parse::<u32>() {
                if let Some(bp_line) = meta.lookup_line(bp.addr) {
                    if bp_line == line.saturating_sub(1) {
                        return bp.number as i64;
                    }
                }
            }
        }
        -1
    }

    pub fn list(&self, meta: &dyn DebugMetadata) -> Vec<(u32, &Breakpoint, Option<String>, Option<u32>)> {
        self.entries.iter().map(|bp| (bp.number, bp, meta.lookup_file(bp.addr), meta.lookup_line(bp.addr))).collect()
    }

    // Single hot-path lookup from the step/break engine. If the hit
    // breakpoint is temporary, it's removed before returning.
    pub fn check(&mut self, cip: UCell) -> (bool, bool) {
        match self.find_index_by_addr(cip) {
            None => (false, false),
            Some(idx) => {
                let temporary = self.entries[idx].temporary;
                if temporary {
                    self.entries.remove(idx);
                }
                (true, temporary)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for BreakpointRegistry {
    fn default() -> BreakpointRegistry { BreakpointRegistry::new() }
}
