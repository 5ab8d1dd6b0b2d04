use tracing::debug;

use super::block::{TextBlock, colliding_ids};
use super::geom::Canvas;

/// Fractions of the way back to the anchor tried, largest first.
const RECENTER_FRACTIONS: [f32; 3] = [1.0, 0.5, 0.25];
const SETTLED_DISTANCE: f32 = 0.5;

/// Nudge each block back towards its anchor when that neither brings in a
/// new colliding partner nor pushes more of it off the canvas. Returns the number of
/// blocks moved.
pub(crate) fn recenter(blocks: &mut [TextBlock], canvas: &Canvas, margin: f32) -> usize {
    let mut moved = 0;
    for idx in 0..blocks.len() {
        if blocks[idx].is_empty() {
            continue;
        }
        let offset = &blocks[idx].anchor() - &blocks[idx].final_bbox().center();
        if offset.length() < SETTLED_DISTANCE {
            continue;
        }
        let partners = colliding_ids(&blocks[idx], blocks, margin);
        let outside = canvas.outside_area(&blocks[idx].final_bbox());

        for fraction in RECENTER_FRACTIONS {
            let mut candidate = blocks[idx].clone();
            candidate.translate(offset.scale(fraction));
            let joins_new = colliding_ids(&candidate, blocks, margin)
                .iter()
                .any(|id| !partners.contains(id));
            if !joins_new && canvas.outside_area(&candidate.final_bbox()) <= outside {
                debug!(block = idx, fraction, "recentered block");
                blocks[idx] = candidate;
                moved += 1;
                break;
            }
        }
    }
    moved
}
