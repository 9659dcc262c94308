// Capability sets the debugger core depends on. Anything the VM integration
// layer can supply implementations for - no inheritance hierarchy, no
// concrete image/frame-iterator type baked in here. Keeps `Out of scope`
// collaborators (interpreter/JIT, image loader, calling-convention
// trampolines, platform glue, host logging) on the other side of a trait
// boundary, per the design notes on "inheritance-based interfaces".

use crate::metadata::DebugMetadata;

pub type Cell = i32;
pub type UCell = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

// A checked, bounds-respecting view of one VM context's address space.
// Every step of a reference/array indirection chain goes through `translate`
// and returns `None` rather than chasing a raw pointer.
pub trait AddressSpace {
    // Translate a VM-local cell address into a physical cell index into this
    // context's memory, or None if it's out of range.
    fn translate(&self, addr: Cell) -> Option<usize>;

    fn read_cell(&self, addr: Cell) -> Option<Cell> {
        let phys = self.translate(addr)?;
        self.read_cell_phys(phys)
    }
    fn write_cell(&mut self, addr: Cell, value: Cell) -> bool {
        match self.translate(addr) {
            Some(phys) => self.write_cell_phys(phys, value),
            None => false,
        }
    }

    fn read_cell_phys(&self, phys: usize) -> Option<Cell>;
    fn write_cell_phys(&mut self, phys: usize, value: Cell) -> bool;

    // Reads a NUL-terminated string starting at a VM-local address, up to
    // `max_len` bytes. Mirrors `LocalToStringNULL`.
    fn read_cstring(&self, addr: Cell, max_len: usize) -> Option<Vec<u8>>;
}

pub trait VmContext {
    fn id(&self) -> ContextId;
    fn frm(&self) -> Cell;
    fn address_space(&self) -> &dyn AddressSpace;
    fn address_space_mut(&mut self) -> &mut dyn AddressSpace;
    fn image(&self) -> &dyn DebugMetadata;
}

// Looks up VM contexts by id, since a halt can be re-entered from a context
// other than the top of the native<->script call stack.
pub trait ContextRegistry {
    fn context(&self, id: ContextId) -> Option<&dyn VmContext>;
    fn context_mut(&mut self, id: ContextId) -> Option<&mut dyn VmContext>;
}

// Frames are enumerated caller-direction from the top (index 0). Mixes
// scripted and native frames, as in a re-entrant native<->script call stack.
pub trait FrameIterator {
    fn len(&self) -> usize;
    fn is_scripted(&self, index: usize) -> bool;
    fn context_id(&self, index: usize) -> ContextId;
    fn function_name(&self, index: usize) -> Option<String>;
    fn file_path(&self, index: usize) -> Option<String>;
    fn line_number(&self, index: usize) -> Option<u32>;
    fn cip(&self, index: usize) -> UCell;
}

pub trait Watchdog {
    fn pause(&mut self);
    fn resume(&mut self);
}


