// C10: RSP Session. Packet dispatch for the minimum GDB subset this crate
// speaks, plus the halt/resume handoff between the VM thread and the
// transport thread. The handoff is message passing over a `Condvar`
// (`HaltChannel`) rather than the cyclic `Debugger`<->`RSPSession` pointers
// and busy-poll sleep loop in the original `ServerThread.cpp` - see the
// design note on message-passing Halt/Resume coupling.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::engine::RunMode;
use crate::vm::{Cell, UCell};

pub const TARGET_XML: &str = concat!(
    "<?xml version=\"1.0\"?>\n",
    "<!DOCTYPE feature SYSTEM \"gdb-target.dtd\">\n",
    "<feature name=\"org.gnu.gdb.sourcepawn.core\">\n",
    "  <reg name=\"pri\" bitsize=\"32\" type=\"int32\"/>\n",
    "  <reg name=\"alt\" bitsize=\"32\" type=\"int32\"/>\n",
    "  <reg name=\"cip\" bitsize=\"32\" type=\"code_ptr\"/>\n",
    "  <reg name=\"sp\"  bitsize=\"32\" type=\"data_ptr\"/>\n",
    "  <reg name=\"frm\" bitsize=\"32\" type=\"data_ptr\"/>\n",
    "</feature>\n",
);

#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterSnapshot {
    pub pri: Cell,
    pub alt: Cell,
    pub cip: UCell,
    pub sp: UCell,
    pub frm: Cell,
}

impl RegisterSnapshot {
    // `g` reply: five registers as 8-hex-digit big-endian words, concatenated.
    pub fn encode_g(&self) -> String {
        format!("{:08x}{:08x}{:08x}{:08x}{:08x}", self.pri as u32, self.alt as u32, self.cip, self.sp, self.frm as u32)
    }

    // Unsolicited stop-reply sent right after a halt, so a real GDB client
    // doesn't have to poll `?` to notice the target stopped. Signal 05 is
    // SIGTRAP, the conventional "stopped at a breakpoint" signal.
    pub fn encode_stop_reply(&self) -> String {
        format!(
            "T05pri:{:08x};alt:{:08x};cip:{:08x};sp:{:08x};frm:{:08x};",
            self.pri as u32, self.alt as u32, self.cip, self.sp, self.frm as u32
        )
    }
}

fn qxfer_target_xml(off: usize, len: usize) -> String {
    let bytes = TARGET_XML.as_bytes();
    if off > bytes.len() {
        return "E00".to_string();
    }
    let end = (off + len).min(bytes.len());
    let chunk = &bytes[off..end];
    let marker = if end >= bytes.len() { 'l' } else { 'm' };
    format!("{}{}", marker, String::from_utf8_lossy(chunk))
}

// Parses `qXfer:features:read:target.xml:off,len` into (off, len).
fn parse_qxfer_offsets(rest: &str) -> Option<(usize, usize)> {
    let (off, len) = rest.split_once(',')?;
    Some((usize::from_str_radix(off, 16).ok()?, usize::from_str_radix(len, 16).ok()?))
}

pub struct Session {
    pub no_ack: bool,
    pub regs: RegisterSnapshot,
}

impl Session {
    pub fn new() -> Session {
        Session { no_ack: false, regs: RegisterSnapshot::default() }
    }

    // Returns the reply payload (unframed). `None` means no reply is sent
    // (not used by this subset, kept for completeness of the dispatch shape).
    pub fn dispatch(&mut self, payload: &[u8]) -> String {
        let text = String::from_utf8_lossy(payload);
        if text == "?" {
            return "S00".to_string();
        }
        if text == "g" {
            return self.regs.encode_g();
        }
        if let Some(rest) = text.strip_prefix("qSupported") {
            let client_multiprocess = rest.contains("multiprocess+");
            let mut reply = String::new();
            if client_multiprocess {
                reply.push_str("multiprocess-;");
            }
            reply.push_str("PacketSize=1024;QStartNoAckMode+;xmlRegisters=;qXfer:features:read+");
            return reply;
        }
        if text == "qC" {
            return "QC0".to_string();
        }
        if text == "qAttached" {
            return "1".to_string();
        }
        if let Some(rest) = text.strip_prefix("qXfer:features:read:target.xml:") {
            return match parse_qxfer_offsets(rest) {
                Some((off, len)) => qxfer_target_xml(off, len),
                None => "E01".to_string(),
            };
        }
        if text == "QStartNoAckMode" {
            self.no_ack = true;
            return "OK".to_string();
        }
        if text.starts_with('H') {
            return "OK".to_string();
        }
        String::new()
    }
}

impl Default for Session {
    fn default() -> Session { Session::new() }
}

enum HaltState {
    Running,
    Halted(RegisterSnapshot),
    ResumeRequested(RunMode),
}

// Message-passing handoff between the VM thread (which halts and waits) and
// the RSP session thread (which services packets and eventually requests a
// resume). Replaces the original's `execution_stopped` flag plus
// `Sleep(100)` poll loop.
pub struct HaltChannel {
    state: Mutex<HaltState>,
    cv: Condvar,
}

impl HaltChannel {
    pub fn new() -> HaltChannel {
        HaltChannel { state: Mutex::new(HaltState::Running), cv: Condvar::new() }
    }

    // Called from the VM thread: publishes the halt and blocks until the
    // session thread requests a resume, returning the run mode it chose.
    pub fn halt_and_wait(&self, regs: RegisterSnapshot) -> RunMode {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *guard = HaltState::Halted(regs);
        self.cv.notify_all();
        loop {
            guard = self.cv.wait(guard).unwrap_or_else(|e| e.into_inner());
            if let HaltState::ResumeRequested(mode) = *guard {
                *guard = HaltState::Running;
                return mode;
            }
        }
    }

    // Called from the session thread once the halt is published; blocks up
    // to `timeout` waiting for it (used so the RSP accept loop can still
    // poll for shutdown between halts).
    pub fn wait_for_halt(&self, timeout: Duration) -> Option<RegisterSnapshot> {
        let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = self.cv.wait_timeout_while(guard, timeout, |s| !matches!(s, HaltState::Halted(_))).unwrap_or_else(|e| e.into_inner());
        match *guard {
            HaltState::Halted(regs) => Some(regs),
            _ => None,
        }
    }

    pub fn resume(&self, mode: RunMode) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *guard = HaltState::ResumeRequested(mode);
        self.cv.notify_all();
    }
}

impl Default for HaltChannel {
    fn default() -> HaltChannel { HaltChannel::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_halt_status_replies_s00() {
        let mut session = Session::new();
        assert_eq!(session.dispatch(b"?"), "S00");
    }

    #[test]
    fn g_concatenates_five_registers_big_endian() {
        let mut session = Session::new();
        session.regs = RegisterSnapshot { pri: 1, alt: 2, cip: 3, sp: 4, frm: 5 };
        assert_eq!(session.dispatch(b"g"), "0000000100000002000000030000000400000005");
    }

    #[test]
    fn q_supported_echoes_multiprocess_when_client_advertised_it() {
        let mut session = Session::new();
        let reply = session.dispatch(b"qSupported:multiprocess+;xmlRegisters=i386");
        assert!(reply.starts_with("multiprocess-;PacketSize=1024;QStartNoAckMode+"));
    }

    #[test]
    fn q_supported_omits_multiprocess_when_not_advertised() {
        let mut session = Session::new();
        let reply = session.dispatch(b"qSupported:xmlRegisters=i386");
        assert!(reply.starts_with("PacketSize=1024"));
    }

    #[test]
    fn start_no_ack_mode_flips_flag_and_replies_ok() {
        let mut session = Session::new();
        assert_eq!(session.dispatch(b"QStartNoAckMode"), "OK");
        assert!(session.no_ack);
    }

    #[test]
    fn qxfer_target_xml_reports_last_chunk_when_offset_covers_remainder() {
        let len = TARGET_XML.len();
        let reply = qxfer_target_xml(0, len);
        assert!(reply.starts_with('l'));
        assert!(reply[1..].contains("sourcepawn.core"));
    }

    #[test]
    fn qxfer_target_xml_reports_more_when_truncated() {
        let reply = qxfer_target_xml(0, 4);
        assert!(reply.starts_with('m'));
    }

    #[test]
    fn qxfer_target_xml_offset_past_end_is_last_with_empty_body() {
        let len = TARGET_XML.len();
        let reply = qxfer_target_xml(len, 10);
        assert_eq!(reply, "l");
    }

    #[test]
    fn halt_channel_round_trips_run_mode() {
        use std::sync::Arc;
        use std::thread;

        let channel = Arc::new(HaltChannel::new());
        let vm_channel = channel.clone();
        let vm_thread = thread::spawn(move || vm_channel.halt_and_wait(RegisterSnapshot::default()));

        let regs = loop {
            if let Some(r) = channel.wait_for_halt(Duration::from_secs(1)) {
                break r;
            }
        };
        let _ = regs;
        channel.resume(RunMode::Stepping);
        assert_eq!(vm_thread.join().unwrap(), RunMode::Stepping);
    }
}
