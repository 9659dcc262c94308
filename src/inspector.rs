// C5: Symbol Inspector. The crate's largest component: address computation
// through the reference/array indirection chain, typed read/write, and the
// full variable-display state machine (scope, array layout, string
// auto-detect). Every indirection step goes through `AddressSpace::translate`
// rather than chasing a raw pointer, per the checked-address-space design
// note.

use std::collections::HashMap;

use crate::error::{Error, ErrorKind, Result};
use crate::metadata::{DebugMetadata, DisplayFormat, Symbol, SymbolKind};
use crate::settings::Settings;
use crate::util::CELL_SIZE;
use crate::vm::{AddressSpace, Cell, UCell};

// Display-format overrides set by the `type` command. Kept outside
// `DebugMetadata` - that trait models a read-only view of the loaded image,
// and the `type` command must not reach back into it. Keyed on symbol
// identity (address + scope bounds), since two shadowing symbols can share
// an address.
#[derive(Default)]
pub struct FormatOverrides(HashMap<(i32, UCell, UCell), DisplayFormat>);

impl FormatOverrides {
    pub fn new() -> FormatOverrides {
        FormatOverrides::default()
    }

    fn key(sym: &Symbol) -> (i32, UCell, UCell) {
        (sym.addr, sym.codestart, sym.codeend)
    }

    pub fn set(&mut self, sym: &Symbol, format: DisplayFormat) {
        self.0.insert(Self::key(sym), format);
    }

    pub fn get(&self, sym: &Symbol) -> Option<DisplayFormat> {
        self.0.get(&Self::key(sym)).copied()
    }
}

// Resolves the symbol's base VM-local address, applying the local/frame
// offset and a single reference dereference. Does not apply any index.
fn resolve_base(sym: &Symbol, frm: Cell, space: &dyn AddressSpace) -> Result<Cell> {
    let mut base = sym.addr;
    if sym.is_local() {
        base += frm;
    }
    if matches!(sym.ident, SymbolKind::Reference | SymbolKind::RefArray) {
        base = space.read_cell(base).ok_or_else(|| Error::new(ErrorKind::OutOfScope, "bad reference"))?;
    }
    Ok(base)
}

// Reads the cell at flat index `index` (in cells) from `sym`'s base address.
pub fn get(sym: &Symbol, frm: Cell, space: &dyn AddressSpace, index: i32) -> Result<Cell> {
    let base = resolve_base(sym, frm, space)?;
    let addr = base + index * CELL_SIZE as i32;
    space.read_cell(addr).ok_or_else(|| Error::new(ErrorKind::OutOfScope, "address out of range"))
}

pub fn set(sym: &Symbol, frm: Cell, space: &mut dyn AddressSpace, index: i32, value: Cell) -> Result<()> {
    let base = resolve_base(sym, frm, space)?;
    let addr = base + index * CELL_SIZE as i32;
    if space.write_cell(addr, value) {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::OutOfScope, "address out of range"))
    }
}

pub fn get_string(sym: &Symbol, frm: Cell, space: &dyn AddressSpace, max_len: usize) -> Result<Vec<u8>> {
    let base = resolve_base(sym, frm, space)?;
    space.read_cstring(base, max_len).ok_or_else(|| Error::new(ErrorKind::OutOfScope, "address out of range"))
}

fn format_cell(value: Cell, format: DisplayFormat) -> String {
    match format {
        DisplayFormat::Hex => format!("{:x}", value as u32),
        DisplayFormat::Bool => match value {
            0 => "false".to_string(),
            1 => "true".to_string(),
            n => format!("{} (false)", n),
        },
        DisplayFormat::Float => format!("{}", f32::from_bits(value as u32)),
        // DISP_BIN was never implemented upstream either; falls through to
        // Default along with Fixed (reserved, unused by this language).
        DisplayFormat::Default | DisplayFormat::Bin | DisplayFormat::Fixed | DisplayFormat::String => format!("{}", value),
    }
}

// True iff `bytes` (NUL-terminated) looks like a printable C string: first
// byte alphabetic, remaining bytes either tab/newline/CR or in the printable
// ASCII range.
fn looks_like_string(bytes: &[u8]) -> bool {
    match bytes.split_first() {
        None => false,
        Some((first, rest)) => {
            if !first.is_ascii_alphabetic() {
                return false;
            }
            rest.iter().all(|b| matches!(b, b'\t' | b'\n' | b'\r') || (0x20..0x7f).contains(b))
        }
    }
}

fn is_auto_string(sym: &Symbol, meta: &dyn DebugMetadata, frm: Cell, space: &dyn AddressSpace, settings: &Settings) -> bool {
    if sym.dimcount() != 1 || sym.tagid != 0 && meta.tag_name(sym.tagid).is_some() {
        return false;
    }
    match get_string(sym, frm, space, settings.max_line_length.saturating_sub(1)) {
        Ok(bytes) => looks_like_string(&bytes),
        Err(_) => false,
    }
}

fn effective_format(sym: &Symbol, overrides: &FormatOverrides, meta: &dyn DebugMetadata, frm: Cell, space: &dyn AddressSpace, settings: &Settings) -> DisplayFormat {
    if let Some(f) = overrides.get(sym) {
        return f;
    }
    if let Some(f) = sym.explicit_format() {
        return f;
    }
    if sym.tagid != 0 {
        match meta.tag_name(sym.tagid).as_deref() {
            Some("bool") => return DisplayFormat::Bool,
            Some("float") => return DisplayFormat::Float,
            _ => {}
        }
    }
    if is_auto_string(sym, meta, frm, space, settings) {
        return DisplayFormat::String;
    }
    DisplayFormat::Default
}

const MAX_ARRAY_PREVIEW: usize = 5;

// The full display state machine described in the symbol inspector's
// scope/array rules. `indices` is the user-supplied index vector
// (`name[i][j]` -> `[i, j]`); empty means no indexing was requested.
pub fn display_variable(meta: &dyn DebugMetadata, space: &dyn AddressSpace, overrides: &FormatOverrides, sym: &Symbol, cip: UCell, frm: Cell, indices: &[i32], settings: &Settings) -> String {
    if !sym.in_scope(cip) {
        return "(not in scope)".to_string();
    }

    let idxlevel = indices.len();
    let dimcount = sym.dimcount();

    if idxlevel == 0 {
        if dimcount == 0 {
            return match get(sym, frm, space, 0) {
                Ok(v) => format_cell(v, effective_format(sym, overrides, meta, frm, space, settings)),
                Err(e) => format!("({})", e),
            };
        }
        if dimcount > 1 {
            return "(multi-dimensional array)".to_string();
        }
        // Single-dimension array: string display or element preview.
        let format = effective_format(sym, overrides, meta, frm, space, settings);
        if format == DisplayFormat::String {
            return match get_string(sym, frm, space, settings.max_line_length) {
                Ok(bytes) => format!("\"{}\"", String::from_utf8_lossy(&bytes)),
                Err(e) => format!("({})", e),
            };
        }
        let known_size = sym.dims[0].size as usize;
        let preview_len = if known_size == 0 { MAX_ARRAY_PREVIEW } else { known_size.min(MAX_ARRAY_PREVIEW) };
        let mut values = Vec::with_capacity(preview_len);
        let mut read_failed = false;
        for k in 0..preview_len {
            match get(sym, frm, space, k as i32) {
                Ok(v) => values.push(format_cell(v, format)),
                Err(_) => { read_failed = true; break; }
            }
        }
        let truncated = read_failed || known_size == 0 || known_size > MAX_ARRAY_PREVIEW;
        let body = values.join(",");
        return if truncated { format!("{{{},...}}", body) } else { format!("{{{}}}", body) };
    }

    if dimcount == 0 {
        return "(invalid index, not an array)".to_string();
    }
    if idxlevel != dimcount {
        return "(invalid number of dimensions)".to_string();
    }

    // Walk the indirect dimension chain: every dimension but the last stores
    // a cell holding a byte offset to the next dimension's sub-array. Each
    // step scales `idx` by CELL_SIZE like the final dimension does, reads
    // the stored offset, and adds it unscaled (it's already a byte offset).
    let base0 = match resolve_base(sym, frm, space) {
        Ok(b) => b,
        Err(e) => return format!("({})", e),
    };
    let mut base = base0;
    for (d, &idx) in indices.iter().enumerate() {
        let dim = &sym.dims[d];
        if dim.size != 0 && (idx as u32) >= dim.size {
            return "(index out of range)".to_string();
        }
        if d + 1 < dimcount {
            let addr = base + idx * CELL_SIZE as i32;
            let phys = match space.translate(addr) {
                Some(p) => p,
                None => return "(invalid index, not an array)".to_string(),
            };
            let offset = match space.read_cell_phys(phys) {
                Some(v) => v,
                None => return "(invalid index, not an array)".to_string(),
            };
            base += offset;
        } else {
            base += idx * CELL_SIZE as i32;
        }
    }
    match space.read_cell(base) {
        Some(v) => format_cell(v, effective_format(sym, overrides, meta, frm, space, settings)),
        None => "(invalid index, not an array)".to_string(),
    }
}
