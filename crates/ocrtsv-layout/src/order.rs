//! Reading order of extracted words.
//!
//! Regions keep their document (or reading-order) sequence. Inside a region words are sorted by the
//! vertical centre of their line, then by their own horizontal centre, so that slightly skewed lines
//! still come out left to right.

use std::collections::HashMap;

use crate::extract::LayoutWord;

/// Vertical centre of every line, from the mean top and bottom of its words.
pub fn line_centers(words: &[LayoutWord]) -> HashMap<usize, f64> {
    let mut sums: HashMap<usize, (f64, f64, usize)> = HashMap::new();
    for word in words {
        let entry = sums.entry(word.line).or_insert((0.0, 0.0, 0));
        entry.0 += word.bbox.top as f64;
        entry.1 += word.bbox.bottom as f64;
        entry.2 += 1;
    }
    sums.into_iter()
        .map(|(line, (top, bottom, n))| {
            let top = top / n as f64;
            let bottom = bottom / n as f64;
            (line, top + (bottom - top) / 2.0)
        })
        .collect()
}

/// Sort `words` into reading order. The sort is stable.
pub fn sort_reading_order(words: &mut [LayoutWord]) {
    let centers = line_centers(words);
    let vcenter = |w: &LayoutWord| centers.get(&w.line).copied().unwrap_or(0.0);

    words.sort_by(|a, b| {
        a.region
            .cmp(&b.region)
            .then_with(|| vcenter(a).total_cmp(&vcenter(b)))
            .then_with(|| a.bbox.hcenter().total_cmp(&b.bbox.hcenter()))
    });
}
