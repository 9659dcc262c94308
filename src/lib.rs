//! Source-level debugger core for a managed bytecode VM.
//!
//! Four tightly coupled subsystems, re-exported as modules: the step/break
//! engine (`engine`), the breakpoint/watch registries (`breakpoints`,
//! `watches`), the symbol inspector (`inspector`), and the remote serial
//! front-end (`rsp`). `context::Debugger` ties them together; everything
//! else (the VM interpreter, the image loader, the platform glue) is an
//! external collaborator reached through the traits in `vm`.

pub mod breakpoints;
pub mod console;
pub mod context;
pub mod engine;
pub mod error;
pub mod error_report;
pub mod frames;
pub mod inspector;
pub mod log;
pub mod metadata;
pub mod resolver;
pub mod rsp;
pub mod settings;
pub mod util;
pub mod vm;
pub mod watches;

pub use context::Debugger;
pub use error::{Error, ErrorKind, Result};
pub use settings::Settings;
