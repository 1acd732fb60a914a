use chrono::Local;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub time: String,
    pub message: String,
}

/// On-screen log for one action family. Hidden until an action resets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPanel {
    visible: bool,
    entries: Vec<LogEntry>,
}

impl LogPanel {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }

    pub(crate) fn reset(&mut self) {
        self.visible = true;
        self.entries.clear();
    }

    /// Appends when the panel is active; returns the entry that was added.
    pub(crate) fn push(&mut self, level: LogLevel, message: impl Into<String>) -> Option<LogEntry> {
        if !self.visible {
            return None;
        }
        let entry = LogEntry {
            level,
            time: Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
        };
        self.entries.push(entry.clone());
        Some(entry)
    }
}
