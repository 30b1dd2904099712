//! Coordinate helpers for PAGE and ALTO geometry.

use ocrtsv_common::{BoundingBox, OcrTsvError, Result};

/// Parse a PAGE `points` attribute (`"x1,y1 x2,y2 ..."`).
pub fn parse_points(points: &str) -> Result<Vec<(f64, f64)>> {
    points
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| OcrTsvError::Xml(format!("malformed point {pair:?}")))?;
            let coord = |v: &str| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|_| OcrTsvError::Xml(format!("malformed coordinate {v:?} in {pair:?}")))
            };
            Ok((coord(x)?, coord(y)?))
        })
        .collect()
}

/// Scale a pixel coordinate for the presentation image, truncating towards zero.
pub fn scale(value: f64, factor: f64) -> i64 {
    (factor * value) as i64
}

/// Enclosing box of a polygon, scaled by `factor`.
pub fn bbox_from_points(points: &str, factor: f64) -> Result<BoundingBox> {
    let parsed = parse_points(points)?;
    if parsed.is_empty() {
        return Err(OcrTsvError::Xml("empty points attribute".to_string()));
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in parsed {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    Ok(BoundingBox::new(
        scale(min_x, factor),
        scale(max_x, factor),
        scale(min_y, factor),
        scale(max_y, factor),
    ))
}

/// Box from ALTO `HPOS`/`VPOS`/`WIDTH`/`HEIGHT`; unknown edges stay -1 before scaling.
pub fn bbox_from_alto(
    hpos: Option<i64>,
    vpos: Option<i64>,
    width: Option<i64>,
    height: Option<i64>,
    factor: f64,
) -> BoundingBox {
    let left = hpos.unwrap_or(-1);
    let top = vpos.unwrap_or(-1);
    let right = match (hpos, width) {
        (Some(h), Some(w)) => h + w,
        _ => -1,
    };
    let bottom = match (vpos, height) {
        (Some(v), Some(h)) => v + h,
        _ => -1,
    };
    BoundingBox::new(
        scale(left as f64, factor),
        scale(right as f64, factor),
        scale(top as f64, factor),
        scale(bottom as f64, factor),
    )
}
