//! Replayable audit trail built from the change feed.

use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeKind};
use std::io::{self, Write};
use std::sync::mpsc::{Receiver, TryRecvError};

/// Turns change events into one line per user action.
///
/// Committed commands contribute their trace, undo and redo contribute the
/// bare keywords, so replaying the lines in order reproduces the session.
#[derive(Debug)]
pub struct ScriptRecorder {
    receiver: Receiver<ChangeEvent>,
    lines: Vec<String>,
}

impl ScriptRecorder {
    /// Starts recording events emitted from now on.
    #[must_use]
    pub fn attach(feed: &ChangeFeed) -> Self {
        Self {
            receiver: feed.subscribe(),
            lines: Vec::new(),
        }
    }

    /// Pulls every pending event. Returns how many lines were added.
    pub fn drain(&mut self) -> usize {
        let before = self.lines.len();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => self.lines.push(line(&event)),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        self.lines.len() - before
    }

    /// Recorded lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Writes the recorded lines, one per line.
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        for line in &self.lines {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

fn line(event: &ChangeEvent) -> String {
    match event.kind {
        ChangeKind::Committed => event.description.clone(),
        ChangeKind::Undone => "undo".to_string(),
        ChangeKind::Redone => "redo".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommandId;

    #[test]
    fn records_commits_and_history_moves() {
        let feed = ChangeFeed::new();
        let mut recorder = ScriptRecorder::attach(&feed);
        feed.emit(CommandId::new(1), ChangeKind::Committed, "create vertex Pt0000".into(), Vec::new());
        feed.emit(CommandId::new(1), ChangeKind::Undone, "create vertex Pt0000".into(), Vec::new());
        feed.emit(CommandId::new(1), ChangeKind::Redone, "create vertex Pt0000".into(), Vec::new());

        assert_eq!(recorder.drain(), 3);
        assert_eq!(recorder.lines(), ["create vertex Pt0000", "undo", "redo"]);

        let mut out = Vec::new();
        recorder.write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "create vertex Pt0000\nundo\nredo\n");
    }

    #[test]
    fn drain_without_events() {
        let feed = ChangeFeed::new();
        let mut recorder = ScriptRecorder::attach(&feed);
        assert_eq!(recorder.drain(), 0);
        drop(feed);
        assert_eq!(recorder.drain(), 0);
    }
}
