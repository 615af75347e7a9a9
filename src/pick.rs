//! Line-driven landmark picking.
//!
//! Commands, one per line: `x y` adds a point, `u` undoes the last point,
//! `r` resets, `s` saves and `q` quits without saving.

use anyhow::{Context, Result};
use faceprep_vision::{LandmarkSession, LandmarkSet};
use log::{info, warn};
use std::io::BufRead;

pub const HELP: &str = "\
Commands:
 - x y: add landmark at pixel (x, y)
 - u: undo last point
 - r: reset all points
 - s: save & continue
 - q: quit without saving";

/// Feeds `input` to `session` until save, quit or end of input (treated as save).
pub fn run_session<R: BufRead>(
    mut session: LandmarkSession,
    input: R,
) -> Result<Option<LandmarkSet>> {
    for line in input.lines() {
        let line = line.context("reading picker input")?;
        let cmd = line.trim();
        match cmd {
            "" => continue,
            "u" => {
                if session.undo().is_none() {
                    warn!("nothing to undo");
                }
            }
            "r" => session.reset(),
            "s" => break,
            "q" => return Ok(None),
            _ => match parse_point(cmd) {
                Some((x, y)) => {
                    session.add(x, y);
                    info!("point {}: ({}, {})", session.points().len() - 1, x, y);
                }
                None => warn!("unrecognised command: {cmd:?}"),
            },
        }
    }
    Ok(session.commit()?)
}

fn parse_point(cmd: &str) -> Option<(f64, f64)> {
    let mut it = cmd.split_whitespace();
    let x = it.next()?.parse::<f64>().ok()?;
    let y = it.next()?.parse::<f64>().ok()?;
    (it.next().is_none() && x.is_finite() && y.is_finite()).then_some((x, y))
}
