// Plain struct threaded through the debugger, the way `Context` is threaded
// through every subsystem - no file or argv parsing here, since this crate
// is a library embedded into a VM host rather than a CLI.

#[derive(Debug, Clone)]
pub struct Settings {
    // If set, the RSP transport listens on this TCP port. None = local console only.
    pub rsp_port: Option<u16>,

    pub trace_logging: bool,

    // Clamp on consecutive halts suppressed at the same source line before
    // forcing a real halt anyway, so a single-line loop can't starve the
    // front end. See engine::on_break.
    pub break_count_limit: u32,

    // Max array index nesting depth accepted from `disp`/`watch`/`set` expressions.
    pub max_dimensions: usize,

    // Cap on string auto-detection / array preview scanning length.
    pub max_line_length: usize,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            rsp_port: None,
            trace_logging: false,
            break_count_limit: 5,
            max_dimensions: 3,
            max_line_length: 128,
        }
    }
}


