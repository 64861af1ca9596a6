//! Scripted input for headless annotation passes.
//!
//! A script is JSON Lines, one step per line:
//!
//! ```text
//! # open a grooming bout
//! {"op":"seek","ms":2000}
//! {"op":"key","key":"w"}
//! {"op":"jump","ms":2500}
//! {"op":"key","key":"w"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use serde::{Deserialize, Serialize};

use ethogram_common::playback::PlaybackCursor;

use crate::session::{AnnotationSession, SessionResult};

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InputStep {
    /// Absolute seek.
    Seek { ms: u64 },
    /// Relative seek, negative to rewind.
    Jump { ms: i64 },
    /// Frame step at the slowest source rate.
    Step { frames: i64 },
    /// A key press, routed through the session keymap.
    Key { key: char },
    Undo,
    Delete,
}

/// A script line that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("Invalid input step on line {line}: {source}")]
pub struct InputLogError {
    pub line: usize,
    #[source]
    pub source: serde_json::Error,
}

/// Parse a JSONL input script.
pub fn parse_input_log(text: &str) -> Result<Vec<InputStep>, InputLogError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line.trim()).map_err(|source| InputLogError {
                line: index + 1,
                source,
            })
        })
        .collect()
}

/// Counts from a replayed script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub steps: usize,
    pub triggers: usize,
    pub ignored_keys: usize,
}

/// Drive a session and cursor through a script.
///
/// Stops at the first step the session rejects.
pub fn replay(
    session: &mut AnnotationSession,
    cursor: &mut PlaybackCursor,
    steps: &[InputStep],
) -> SessionResult<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for step in steps {
        match step {
            InputStep::Seek { ms } => {
                cursor.seek_to(*ms);
            }
            InputStep::Jump { ms } => {
                cursor.seek_relative(*ms);
            }
            InputStep::Step { frames } => {
                cursor.step_frames(*frames);
            }
            InputStep::Key { key } => match session.handle_key(*key, cursor.current_ms())? {
                Some(_) => summary.triggers += 1,
                None => {
                    tracing::warn!(%key, "Key is not bound, skipping");
                    summary.ignored_keys += 1;
                }
            },
            InputStep::Undo => {
                session.undo()?;
                summary.triggers += 1;
            }
            InputStep::Delete => {
                session.delete_at(cursor.current_ms())?;
                summary.triggers += 1;
            }
        }
        summary.steps += 1;
    }

    tracing::debug!(
        steps = summary.steps,
        triggers = summary.triggers,
        ignored = summary.ignored_keys,
        position_ms = cursor.current_ms(),
        "Replayed input script"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        let script = r#"
# comment
{"op":"seek","ms":1500}
{"op":"jump","ms":-200}

{"op":"step","frames":3}
{"op":"key","key":"q"}
{"op":"undo"}
{"op":"delete"}
"#;
        let steps = parse_input_log(script).unwrap();
        assert_eq!(
            steps,
            vec![
                InputStep::Seek { ms: 1500 },
                InputStep::Jump { ms: -200 },
                InputStep::Step { frames: 3 },
                InputStep::Key { key: 'q' },
                InputStep::Undo,
                InputStep::Delete,
            ]
        );
    }

    #[test]
    fn test_parse_reports_line_number() {
        let script = "{\"op\":\"seek\",\"ms\":1}\n\n{\"op\":\"fly\"}\n";
        let err = parse_input_log(script).unwrap_err();
        assert_eq!(err.line, 3);
    }
}
