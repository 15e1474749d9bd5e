//! Horizontal road geometry: path sampling and per-line curve offsets

use crate::outils;
use crate::road::ROAD_LINES;
use crate::track::Level;
use bincode::{Decode, Encode};

/// Path deltas sampled ahead of the player on each coarse position change
pub const CURVE_SAMPLES: usize = 0x20;

/// Path deltas averaged into the heading vector
const HEADING_SAMPLES: u16 = 4;

/// Unit length of the heading vector
pub const HEADING_ONE: i32 = 0x4000;

/// Fill aborts once the accumulated offset leaves this range
pub const MAX_CURVE_X: i32 = 0x3200;

/// Converts a breakpoint's lateral ratio into a `road_x` offset (10.6 pixels)
const CURVE_X_SCALE: i32 = 0x30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
pub struct CurvePoint {
    /// Lateral offset per unit of forward distance, 8.8
    pub curve_inc: i16,
    /// Road line the breakpoint lands on
    pub curve_end: u16,
}

/// Rotate an accumulated path offset into the frame of `heading` and convert it into a curve
/// breakpoint.
#[must_use]
pub fn create_curve(x_total: i32, y_total: i32, heading: (i32, i32)) -> CurvePoint {
    let (hx, hy) = heading;

    let forward = ((x_total * hx + y_total * hy) >> 14).max(1);
    let lateral = (x_total * hy - y_total * hx) >> 14;

    let curve_end = (forward >> 2).min(ROAD_LINES as i32 - 1) as u16;
    let curve_inc = ((lateral << 8) / forward).clamp(i16::MIN.into(), i16::MAX.into()) as i16;

    CurvePoint { curve_inc, curve_end }
}

/// Average direction of the first few path deltas at `position`, normalized to [`HEADING_ONE`].
#[must_use]
pub fn path_heading(level: &Level, position: u16) -> (i32, i32) {
    let (mut sx, mut sy) = (0_i32, 0_i32);
    for i in 0..HEADING_SAMPLES {
        let (dx, dy) = level.path_delta(position.wrapping_add(i));
        sx += i32::from(dx);
        sy += i32::from(dy);
    }

    let len = i32::from(outils::isqrt((sx * sx + sy * sy) as u32));
    if len == 0 {
        return (0, HEADING_ONE);
    }

    (sx * HEADING_ONE / len, sy * HEADING_ONE / len)
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct CurveState {
    bucket: Option<u16>,
    points: [CurvePoint; CURVE_SAMPLES],
}

impl CurveState {
    pub fn reset(&mut self) {
        self.bucket = None;
        self.points = [CurvePoint::default(); CURVE_SAMPLES];
    }

    #[must_use]
    pub fn points(&self) -> &[CurvePoint; CURVE_SAMPLES] {
        &self.points
    }

    /// Re-sample the path when the player has moved into a new coarse bucket. Returns whether
    /// the breakpoints changed.
    pub fn update(&mut self, level: &Level, bucket: u16) -> bool {
        if self.bucket == Some(bucket) {
            return false;
        }

        self.bucket = Some(bucket);
        self.resample(level, bucket);
        true
    }

    fn resample(&mut self, level: &Level, bucket: u16) {
        let heading = path_heading(level, bucket);

        let (mut x_total, mut y_total) = (0, 0);
        for (i, point) in self.points.iter_mut().enumerate() {
            let (dx, dy) = level.path_delta(bucket.wrapping_add(i as u16));
            x_total += i32::from(dx);
            y_total += i32::from(dy);
            *point = create_curve(x_total, y_total, heading);
        }
    }

    /// Interpolate the breakpoints into one offset per road line.
    ///
    /// Stops at the first line whose offset leaves ±[`MAX_CURVE_X`]; lines past that point keep
    /// whatever the previous fill left in them.
    pub fn fill_road_x(&self, road_x: &mut [i32; ROAD_LINES]) {
        let mut x = 0_i32;
        let mut line = 0_usize;

        let breakpoints = self.points.iter().map(|point| {
            (usize::from(point.curve_end), i32::from(point.curve_inc) * CURVE_X_SCALE)
        });
        let tail = std::iter::once((ROAD_LINES - 1, None));

        for (end, target) in breakpoints.map(|(end, target)| (end, Some(target))).chain(tail) {
            if end < line {
                continue;
            }

            // Past the last breakpoint the road carries on at the final offset
            let target = target.unwrap_or(x);
            let span = (end + 1 - line) as i32;
            let step = ((target - x) << 8) / span;

            let mut acc = x << 8;
            while line <= end {
                acc += step;
                x = acc >> 8;
                if !(-MAX_CURVE_X..=MAX_CURVE_X).contains(&x) {
                    return;
                }
                road_x[line] = x;
                line += 1;
            }
            x = target;
        }
    }
}
