//! Line-based feedback for the raw-mode terminal

use std::io::Write;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use spotify_window::model::{PlaybackSource, TrackMetadata};
use spotify_window::session::{CancelPrompt, EntryId, ErrorSink, ProgressSink};

/// Raw mode needs explicit carriage returns
pub fn print_line(text: &str) {
    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "{text}\r\n");
    let _ = stdout.flush();
}

#[derive(Default)]
pub struct TerminalFeedback {
    pending_cancel: Mutex<Option<CancellationToken>>,
}

impl TerminalFeedback {
    /// Cancel the slow download the prompt is showing, if any
    pub fn cancel_pending(&self) -> bool {
        let token = match self.pending_cancel.lock() {
            Ok(mut pending) => pending.take(),
            Err(_) => None,
        };
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl ProgressSink for TerminalFeedback {
    fn report(&self, source: PlaybackSource, completed: usize, total: usize, _context_key: u64) {
        if total > 0 {
            print_line(&format!("[{source}] loading {completed}/{total}"));
        }
    }

    fn report_message(&self, text: &str, _context_key: u64) {
        if !text.is_empty() {
            print_line(text);
        }
    }
}

impl ErrorSink for TerminalFeedback {
    fn show(&self, message: &str, _context_key: u64) {
        print_line(&format!("error: {message}"));
    }
}

impl CancelPrompt for TerminalFeedback {
    fn show(&self, track_name: &str, token: CancellationToken, _context_key: u64) {
        if let Ok(mut pending) = self.pending_cancel.lock() {
            *pending = Some(token);
        }
        print_line(&format!("Still downloading \"{track_name}\", press c to skip it"));
    }

    fn hide(&self, _context_key: u64) {
        if let Ok(mut pending) = self.pending_cancel.lock() {
            *pending = None;
        }
    }
}

pub fn print_window(entries: &[(EntryId, TrackMetadata)], current: Option<usize>) {
    print_line("---");
    for (i, (_, meta)) in entries.iter().enumerate() {
        let marker = if Some(i) == current { ">" } else { " " };
        print_line(&format!("{marker} {} - {} ({})", meta.name, meta.artist, meta.album));
    }
}
