//! Terminal rendering for telemetry, log entries and conversation messages.

use chrono::{Local, TimeZone};
use colored::Colorize;
use opsdeck_core::TelemetryState;
use opsdeck_core::types::{AgentMessage, LogEntry, LogKind, Role};
use std::io::{self, Write};

/// One-line telemetry summary.
pub fn telemetry_line(state: &TelemetryState, load: f64) -> String {
    let temp = format!("{:.1}°C", state.gpu_temp);
    let temp = if state.gpu_temp >= 75.0 {
        temp.red().to_string()
    } else if state.gpu_temp >= 60.0 {
        temp.yellow().to_string()
    } else {
        temp.green().to_string()
    };

    format!(
        "VRAM {:>4.1}/{:.0} GB  GPU {}  RAM {:>4.1}/{:.0} GB  load {:.2}  {}",
        state.vram_usage,
        state.vram_total,
        temp,
        state.ram_usage,
        state.ram_total,
        load,
        if state.is_simulated {
            "● live".green().to_string()
        } else {
            "○ paused".dimmed().to_string()
        }
    )
}

pub fn log_line(entry: &LogEntry) -> String {
    let tag = match entry.kind {
        LogKind::Info => "INFO".cyan(),
        LogKind::Warn => "WARN".yellow(),
        LogKind::Error => "ERR ".red(),
        LogKind::Net => "NET ".magenta(),
    };
    format!("{} {} {}", entry.timestamp.dimmed(), tag, entry.message)
}

fn message_header(message: &AgentMessage) -> String {
    let time = Local
        .timestamp_millis_opt(message.timestamp)
        .single()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();

    match (&message.role, &message.snapshot) {
        (Role::User, Some(snap)) => format!(
            "{} {} {}",
            time.dimmed(),
            "you ›".bold(),
            format!("[{} GB · {} °C]", snap.vram, snap.temp).dimmed()
        ),
        (Role::User, None) => format!("{} {}", time.dimmed(), "you ›".bold()),
        (Role::Assistant, _) => format!("{} {}", time.dimmed(), "agent ›".cyan().bold()),
    }
}

/// Full rendering of one message.
pub fn message_block(message: &AgentMessage) -> String {
    format!("{}\n{}", message_header(message), message.text)
}

/// Prints history changes incrementally, so streamed text appears as it arrives.
pub struct ReplyPrinter<W: Write> {
    out: W,
    /// Index of the message currently being printed.
    next: usize,
    /// Bytes of that message already printed.
    written: usize,
    header_shown: bool,
}

impl ReplyPrinter<io::Stdout> {
    /// Printer that starts after the first `skip` messages.
    pub fn stdout(skip: usize) -> Self {
        Self::new(io::stdout(), skip)
    }
}

impl<W: Write> ReplyPrinter<W> {
    pub fn new(out: W, skip: usize) -> Self {
        Self {
            out,
            next: skip,
            written: 0,
            header_shown: false,
        }
    }

    /// Print whatever is new in `history` since the last call.
    pub fn render(&mut self, history: &[AgentMessage]) -> io::Result<()> {
        if history.len() < self.next {
            // History was cleared underneath us.
            if self.header_shown {
                writeln!(self.out)?;
            }
            self.next = history.len();
            self.written = 0;
            self.header_shown = false;
        }

        while let Some(message) = history.get(self.next) {
            if !self.header_shown {
                writeln!(self.out, "{}", message_header(message))?;
                self.header_shown = true;
            }

            if let Some(fresh) = message.text.get(self.written..) {
                write!(self.out, "{}", fresh)?;
                self.written = message.text.len();
            }

            if self.next + 1 < history.len() {
                writeln!(self.out)?;
                self.next += 1;
                self.written = 0;
                self.header_shown = false;
            } else {
                break;
            }
        }
        self.out.flush()
    }

    /// Terminate the last line.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.header_shown {
            writeln!(self.out)?;
            self.header_shown = false;
            self.next += 1;
            self.written = 0;
        }
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Tracks which log entries were already shown.
#[derive(Debug, Default)]
pub struct LogCursor {
    last_id: Option<String>,
}

impl LogCursor {
    /// Entries newer than the last one returned.
    pub fn fresh<'a>(&mut self, logs: &'a [LogEntry]) -> &'a [LogEntry] {
        let start = self
            .last_id
            .as_ref()
            .and_then(|id| logs.iter().position(|e| &e.id == id))
            .map(|pos| pos + 1)
            .unwrap_or(0);

        if let Some(last) = logs.last() {
            self.last_id = Some(last.id.clone());
        }
        &logs[start.min(logs.len())..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdeck_core::types::MessageSnapshot;

    fn message(id: i64, role: Role, text: &str) -> AgentMessage {
        AgentMessage {
            id,
            role,
            text: text.to_string(),
            timestamp: 0,
            snapshot: match role {
                Role::User => Some(MessageSnapshot::new(4.2, 42.0)),
                Role::Assistant => None,
            },
        }
    }

    fn printed(printer: ReplyPrinter<Vec<u8>>) -> String {
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn test_streamed_text_is_printed_once() {
        colored::control::set_override(false);
        let mut printer = ReplyPrinter::new(Vec::new(), 0);

        let mut history = vec![message(1, Role::User, "hi"), message(2, Role::Assistant, "")];
        printer.render(&history).unwrap();
        history[1].text.push_str("Hel");
        printer.render(&history).unwrap();
        history[1].text.push_str("lo");
        printer.render(&history).unwrap();
        printer.render(&history).unwrap();
        printer.finish().unwrap();

        let out = printed(printer);
        assert_eq!(out.matches("agent ›").count(), 1);
        assert_eq!(out.matches("you ›").count(), 1);
        assert!(out.contains("[4.2 GB · 42.0 °C]"));
        assert!(out.ends_with("Hello\n"));
    }

    #[test]
    fn test_skips_existing_messages() {
        colored::control::set_override(false);
        let mut printer = ReplyPrinter::new(Vec::new(), 1);
        let history = vec![
            message(1, Role::User, "old question"),
            message(2, Role::User, "new question"),
        ];
        printer.render(&history).unwrap();
        printer.finish().unwrap();

        let out = printed(printer);
        assert!(!out.contains("old question"));
        assert!(out.contains("new question"));
    }

    #[test]
    fn test_log_cursor_returns_only_new_entries() {
        let mut cursor = LogCursor::default();
        let mut logs = vec![
            LogEntry::new("one", LogKind::Info),
            LogEntry::new("two", LogKind::Warn),
        ];
        assert_eq!(cursor.fresh(&logs).len(), 2);
        assert!(cursor.fresh(&logs).is_empty());

        logs.push(LogEntry::new("three", LogKind::Net));
        let fresh = cursor.fresh(&logs);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].message, "three");
    }

    #[test]
    fn test_log_cursor_restarts_when_entry_evicted() {
        let mut cursor = LogCursor::default();
        let first = vec![LogEntry::new("gone", LogKind::Info)];
        cursor.fresh(&first);

        let rotated = vec![LogEntry::new("a", LogKind::Info), LogEntry::new("b", LogKind::Info)];
        assert_eq!(cursor.fresh(&rotated).len(), 2);
    }

    #[test]
    fn test_telemetry_line_mentions_state() {
        colored::control::set_override(false);
        let state = TelemetryState::default();
        let line = telemetry_line(&state, 0.1);
        assert!(line.contains("VRAM  4.2/24 GB"));
        assert!(line.contains("42.0°C"));
        assert!(line.contains("load 0.10"));
        assert!(line.contains("live"));
    }
}
