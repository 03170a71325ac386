//! Capture event sources.
//!
//! Events arrive either from a JSON script (an array of
//! `{"kind": "point_click", "x": .., "y": ..}` / `{"kind": "commit"}` objects)
//! or line by line from a terminal:
//!
//! ```text
//! 12.5 40      click at x=12.5, y=40 (a comma also separates)
//! c            commit (also: commit, close, enter)
//! q            stop without closing (also: quit, end of input)
//! ```
use std::io::BufRead;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::{CaptureEvent, RasterStack};

/// Supplies the capture event stream for one input raster.
pub trait EventProvider {
    type Events: IntoIterator<Item = Result<CaptureEvent>>;

    fn events_for(&mut self, input: &Path, stack: &RasterStack) -> Result<Self::Events>;
}

impl<F, E> EventProvider for F
where
    F: FnMut(&Path, &RasterStack) -> Result<E>,
    E: IntoIterator<Item = Result<CaptureEvent>>,
{
    type Events = E;

    fn events_for(&mut self, input: &Path, stack: &RasterStack) -> Result<E> {
        self(input, stack)
    }
}

/// Read a JSON event script.
pub fn load_event_script(path: &Path) -> Result<Vec<CaptureEvent>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Replays the same scripted events for every input.
#[derive(Debug, Clone)]
pub struct ScriptedEvents {
    events: Vec<CaptureEvent>,
}

impl ScriptedEvents {
    pub fn new(events: Vec<CaptureEvent>) -> Self {
        Self { events }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(load_event_script(path)?))
    }
}

impl EventProvider for ScriptedEvents {
    type Events = Vec<Result<CaptureEvent>>;

    fn events_for(&mut self, _input: &Path, _stack: &RasterStack) -> Result<Self::Events> {
        Ok(self.events.iter().copied().map(Ok).collect())
    }
}

/// Looks up `<dir>/<input stem>.json` for each input. A missing script yields an
/// empty stream, so that input ends up without a polygon and is skipped.
#[derive(Debug, Clone)]
pub struct ScriptDirectory {
    dir: PathBuf,
}

impl ScriptDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn script_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dir.join(format!("{}.json", stem))
    }
}

impl EventProvider for ScriptDirectory {
    type Events = Vec<Result<CaptureEvent>>;

    fn events_for(&mut self, input: &Path, _stack: &RasterStack) -> Result<Self::Events> {
        let script = self.script_path(input);
        if !script.is_file() {
            warn!("No event script for {:?} (looked for {:?})", input, script);
            return Ok(Vec::new());
        }
        info!("Replaying capture events from {:?}", script);
        Ok(load_event_script(&script)?.into_iter().map(Ok).collect())
    }
}

enum Line {
    Skip,
    Quit,
    Event(CaptureEvent),
}

fn parse_line(line: &str) -> Option<Line> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Some(Line::Skip);
    }
    match line.to_ascii_lowercase().as_str() {
        "q" | "quit" => return Some(Line::Quit),
        "c" | "commit" | "close" | "enter" => return Some(Line::Event(CaptureEvent::Commit)),
        _ => {}
    }
    let mut parts = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty());
    let x = parts.next()?.parse::<f64>().ok()?;
    let y = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Line::Event(CaptureEvent::PointClick { x, y }))
}

/// Line-oriented event stream over any buffered reader.
///
/// In strict mode an unparsable line yields `Error::EventParse`; otherwise it is
/// logged and skipped.
pub struct LineEvents<R> {
    reader: R,
    line_no: usize,
    strict: bool,
    finished: bool,
}

impl<R: BufRead> LineEvents<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            strict: true,
            finished: false,
        }
    }

    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }
}

impl<R: BufRead> Iterator for LineEvents<R> {
    type Item = Result<CaptureEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let mut buf = String::new();
            match self.reader.read_line(&mut buf) {
                Ok(0) => self.finished = true,
                Ok(_) => {
                    self.line_no += 1;
                    match parse_line(&buf) {
                        Some(Line::Skip) => {}
                        Some(Line::Quit) => self.finished = true,
                        Some(Line::Event(event)) => return Some(Ok(event)),
                        None if self.strict => {
                            return Some(Err(Error::EventParse {
                                line: self.line_no,
                                input: buf.trim().to_string(),
                            }));
                        }
                        None => warn!("Ignoring unrecognized input: {:?}", buf.trim()),
                    }
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(Error::Io(e)));
                }
            }
        }
        None
    }
}

/// Human-driven capture on the terminal: prints a short raster summary and
/// reads vertices from standard input.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalEvents;

impl EventProvider for TerminalEvents {
    type Events = LineEvents<std::io::StdinLock<'static>>;

    fn events_for(&mut self, input: &Path, stack: &RasterStack) -> Result<Self::Events> {
        let (lo, hi) = stack
            .band(0)
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        eprintln!(
            "{}: {}x{} pixels, {} band(s), band 1 range [{}, {}]",
            input.display(),
            stack.width(),
            stack.height(),
            stack.band_count(),
            lo,
            hi
        );
        eprintln!("Enter panel vertices as `x y` (pixels); `c` closes, `q` skips this file.");
        Ok(LineEvents::new(std::io::stdin().lock()).lenient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_clicks_commit_and_quit() {
        let input = "# panel\n10 20\n30.5,20\n\n  40\t41 \nc\n50 50\n";
        let events: Vec<CaptureEvent> = LineEvents::new(Cursor::new(input))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            events,
            vec![
                CaptureEvent::PointClick { x: 10.0, y: 20.0 },
                CaptureEvent::PointClick { x: 30.5, y: 20.0 },
                CaptureEvent::PointClick { x: 40.0, y: 41.0 },
                CaptureEvent::Commit,
                CaptureEvent::PointClick { x: 50.0, y: 50.0 },
            ]
        );

        let stopped: Vec<_> = LineEvents::new(Cursor::new("1 2\nq\n3 4\n")).collect();
        assert_eq!(stopped.len(), 1);
    }

    #[test]
    fn strict_mode_reports_bad_lines() {
        let mut events = LineEvents::new(Cursor::new("1 2\nfoo\n"));
        assert!(events.next().unwrap().is_ok());
        assert!(matches!(
            events.next(),
            Some(Err(Error::EventParse { line: 2, .. }))
        ));
    }

    #[test]
    fn lenient_mode_skips_bad_lines() {
        let events: Vec<_> = LineEvents::new(Cursor::new("1 2 3\nnope\n4 5\n"))
            .lenient()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(events, vec![CaptureEvent::PointClick { x: 4.0, y: 5.0 }]);
    }

    #[test]
    fn json_script_uses_tagged_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        std::fs::write(
            &path,
            r#"[{"kind":"point_click","x":1,"y":2},{"kind":"commit"}]"#,
        )
        .unwrap();
        assert_eq!(
            load_event_script(&path).unwrap(),
            vec![CaptureEvent::PointClick { x: 1.0, y: 2.0 }, CaptureEvent::Commit]
        );
    }

    #[test]
    fn script_directory_maps_stems_and_tolerates_missing_scripts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"[{"kind":"commit"}]"#).unwrap();
        let stack = RasterStack::new(ndarray::Array3::zeros((1, 2, 2)), None);

        let mut provider = ScriptDirectory::new(dir.path());
        assert_eq!(
            provider.script_path(Path::new("/data/a.tif")),
            dir.path().join("a.json")
        );
        let found = provider.events_for(Path::new("/data/a.tif"), &stack).unwrap();
        assert_eq!(found.len(), 1);
        let missing = provider.events_for(Path::new("/data/b.tif"), &stack).unwrap();
        assert!(missing.is_empty());
    }
}
