//! Colour coding of OCR line confidences for the review editor.

const PALETTE: [[f64; 3]; 3] = [[216.0, 108.0, 117.0], [216.0, 206.0, 108.0], [108.0, 216.0, 146.0]];

/// Map `conf` onto the red → yellow → green palette, `#rrggbb`.
///
/// The value is clamped to `[min_conf, max_conf]`. A degenerate range yields the top colour.
pub fn conf_color(conf: f64, min_conf: f64, max_conf: f64) -> String {
    if max_conf <= min_conf {
        return hex(PALETTE[2]);
    }
    let conf = conf.clamp(min_conf, max_conf);
    let interval = (max_conf - min_conf) / 2.0;

    let step = (conf - min_conf) / interval;
    let lower = PALETTE[step.floor() as usize];
    let upper = PALETTE[step.ceil() as usize];
    let pos = (conf - min_conf) / (2.0 * interval);

    let mut rgb = [0.0; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        *channel = lower[i] * (1.0 - pos) + upper[i] * pos;
    }
    hex(rgb)
}

fn hex(rgb: [f64; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0] as u8, rgb[1] as u8, rgb[2] as u8)
}
