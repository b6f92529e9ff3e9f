//! # Path files
//!
//! Control points are stored as line based text:
//!
//! ```text
//! PATH 1
//! # x y rotation(rad) enter_delta exit_delta
//! POINT 0 0 0 0 12
//! EVENT intake on
//! REVERSE
//! POINT 24 24 1.5708 12 0
//! ENDPATH
//! ```
//!
//! `EVENT` attaches to the preceding `POINT`. `REVERSE` toggles driving backwards for every point
//! after it, until the next `REVERSE`. Blank lines and lines starting with `#` are ignored.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fmt::Write as _, fs, path::Path as FsPath};

use conquer_once::Lazy;
use drive_if::Pose;
use regex::Regex;

use super::{ControlPoint, PathError, PathEvent};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Version written to, and accepted from, the header line
pub const PATH_FORMAT_VERSION: u32 = 1;

// ------------------------------------------------------------------------------------------------
// GLOBALS
// ------------------------------------------------------------------------------------------------

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^PATH\s+(\d+)$").expect("path header regex is valid")
});

static EVENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^EVENT\s+(\S+)(?:\s+(.*))?$").expect("path event regex is valid")
});

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Load control points from a path file.
pub fn load_path_file<P: AsRef<FsPath>>(path: P) -> Result<Vec<ControlPoint>, PathError> {
    let text = fs::read_to_string(path).map_err(PathError::FileReadError)?;
    parse_path(&text)
}

/// Write control points to a path file.
pub fn save_path_file<P: AsRef<FsPath>>(path: P, points: &[ControlPoint]) -> Result<(), PathError> {
    fs::write(path, write_path(points)).map_err(PathError::FileWriteError)
}

/// Parse control points from the text of a path file.
pub fn parse_path(text: &str) -> Result<Vec<ControlPoint>, PathError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

    // Header
    let header = match lines.next() {
        Some((_, l)) => l,
        None => return Err(PathError::InvalidHeader(String::new())),
    };
    let version: u32 = HEADER_RE
        .captures(header)
        .and_then(|c| c.get(1))
        .and_then(|v| v.as_str().parse().ok())
        .ok_or_else(|| PathError::InvalidHeader(header.to_string()))?;
    if version != PATH_FORMAT_VERSION {
        return Err(PathError::UnsupportedVersion(version));
    }

    let mut points: Vec<ControlPoint> = Vec::new();
    let mut reversed = false;

    while let Some((line, text)) = lines.next() {
        let record = text.split_whitespace().next().unwrap_or("");

        match record {
            "POINT" => points.push(parse_point(line, text, reversed)?),
            "EVENT" => {
                let caps = EVENT_RE.captures(text).ok_or_else(|| PathError::ParseError {
                    line,
                    msg: "EVENT needs a name".into(),
                })?;
                let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let params = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

                match points.last_mut() {
                    Some(p) => p.events.push(PathEvent::new(name, params)),
                    None => {
                        return Err(PathError::ParseError {
                            line,
                            msg: "EVENT before any POINT".into(),
                        })
                    }
                }
            }
            "REVERSE" => reversed = !reversed,
            "ENDPATH" => {
                if let Some((line, text)) = lines.next() {
                    return Err(PathError::ParseError {
                        line,
                        msg: format!("unexpected data after ENDPATH: {:?}", text),
                    });
                }
                return Ok(points);
            }
            other => {
                return Err(PathError::ParseError {
                    line,
                    msg: format!("unknown record {:?}", other),
                })
            }
        }
    }

    Err(PathError::MissingEnd)
}

/// Render control points as the text of a path file.
pub fn write_path(points: &[ControlPoint]) -> String {
    let mut out = String::new();
    let mut reversed = false;

    // Writing into a String can't fail
    let _ = writeln!(out, "PATH {}", PATH_FORMAT_VERSION);

    for p in points {
        if p.is_reversed != reversed {
            out.push_str("REVERSE\n");
            reversed = p.is_reversed;
        }

        let _ = writeln!(
            out,
            "POINT {} {} {} {} {}",
            p.pose.x, p.pose.y, p.pose.rotation, p.enter_delta, p.exit_delta
        );

        for e in p.events.iter() {
            if e.params.is_empty() {
                let _ = writeln!(out, "EVENT {}", e.name);
            } else {
                let _ = writeln!(out, "EVENT {} {}", e.name, e.params);
            }
        }
    }

    out.push_str("ENDPATH\n");
    out
}

fn parse_point(line: usize, text: &str, reversed: bool) -> Result<ControlPoint, PathError> {
    let values = text
        .split_whitespace()
        .skip(1)
        .map(|v| v.parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| PathError::ParseError {
            line,
            msg: format!("invalid number in POINT: {}", e),
        })?;

    if values.len() != 5 {
        return Err(PathError::ParseError {
            line,
            msg: format!("POINT needs 5 values, found {}", values.len()),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(PathError::ParseError {
            line,
            msg: "POINT values must be finite".into(),
        });
    }

    Ok(ControlPoint::with_handles(
        Pose::new(values[0], values[1], values[2]),
        values[3],
        values[4],
    )
    .reversed(reversed))
}

#[cfg(test)]
mod test {
    use super::*;

    const DEMO: &str = "
        # Demo path
        PATH 1

        POINT 0 0 0 0 12
        EVENT intake on full
        EVENT flash
        REVERSE
        POINT 24 -6.5 1.5 12 12
        POINT 48 0 0 12 0
        REVERSE
        POINT 60 0 0 6 0
        ENDPATH
    ";

    #[test]
    fn test_parse() {
        let points = parse_path(DEMO).unwrap();

        assert_eq!(points.len(), 4);
        assert_eq!(points[1].pose, Pose::new(24.0, -6.5, 1.5));
        assert_eq!(points[1].enter_delta, 12.0);

        let reversed: Vec<bool> = points.iter().map(|p| p.is_reversed).collect();
        assert_eq!(reversed, vec![false, true, true, false]);

        assert_eq!(points[0].events.len(), 2);
        assert_eq!(points[0].events[0].name, "intake");
        assert_eq!(points[0].events[0].params, "on full");
        assert_eq!(points[0].events[1].params, "");
    }

    #[test]
    fn test_shipped_demo_path() {
        let path = FsPath::new(env!("CARGO_MANIFEST_DIR")).join("../data/demo.path");
        let points = load_path_file(path).unwrap();

        // The segment leaving a reversed point is driven backwards, so only the last one is
        let reversed: Vec<bool> = points.iter().map(|p| p.is_reversed).collect();
        assert_eq!(reversed, vec![false, false, true, true]);
        assert_eq!(points[2].events[0].name, "intake");
        assert_eq!(points[3].events[0].name, "score");
    }

    #[test]
    fn test_write_then_parse_keeps_points() {
        let points = parse_path(DEMO).unwrap();
        let text = write_path(&points);
        let reparsed = parse_path(&text).unwrap();

        assert_eq!(reparsed.len(), points.len());
        for (a, b) in points.iter().zip(reparsed.iter()) {
            assert_eq!(a.pose, b.pose);
            assert_eq!(a.is_reversed, b.is_reversed);
            assert_eq!(a.events.len(), b.events.len());
        }
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_path("PATH 1\nEVENT early\nENDPATH\n"),
            Err(PathError::ParseError { line: 2, .. })
        ));
        assert!(matches!(
            parse_path("PTH 1\nENDPATH"),
            Err(PathError::InvalidHeader(_))
        ));
        assert!(matches!(
            parse_path("PATH 2\nENDPATH"),
            Err(PathError::UnsupportedVersion(2))
        ));
        assert!(matches!(
            parse_path("PATH 1\nPOINT 0 0 0 0\nENDPATH"),
            Err(PathError::ParseError { .. })
        ));
        assert!(matches!(
            parse_path("PATH 1\nPOINT 0 0 0 0 0\n"),
            Err(PathError::MissingEnd)
        ));
        assert!(matches!(
            parse_path("PATH 1\nENDPATH\nPOINT 0 0 0 0 0"),
            Err(PathError::ParseError { line: 3, .. })
        ));
        assert!(matches!(
            parse_path("PATH 1\nTELEPORT\nENDPATH"),
            Err(PathError::ParseError { .. })
        ));
    }
}
