use anyhow::{Result, bail};
use tracing::{debug, error};

use super::block::{TextBlock, colliding_pairs, collides};
use super::config::LayoutConfig;
use super::geom::{Canvas, Vector};
use super::measure::Measurer;

/// Extra push so a separating step clears the margin instead of creeping up on it.
const SEPARATION_SLACK: f32 = 1.0;
/// Below this centre gap on the push axis, the pair is treated as coincident.
const COINCIDENT_EPSILON: f32 = 1e-3;
/// Halvings tried before a free block's spring step is dropped.
const SPRING_HALVINGS: usize = 4;
/// Canvas multiples a block centre may stray before the model is considered broken.
const BLOWUP_FACTOR: f32 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForceReport {
    pub iterations: usize,
    pub converged: bool,
    pub last_ditch_rounds: usize,
    pub unresolved_pairs: usize,
}

/// Relax every block at once, then run the last-ditch shrink pass.
pub(crate) fn relax(
    blocks: &mut [TextBlock],
    measurer: &mut Measurer<'_>,
    canvas: &Canvas,
    config: &LayoutConfig,
    floor: u32,
) -> Result<ForceReport> {
    let force = &config.force;
    let margin = config.collision_margin;
    for block in blocks.iter_mut() {
        if !block.is_empty() {
            block.center_on_anchor();
        }
        block.displacement = Vector::ZERO;
    }

    let threshold = canvas.diagonal() * force.convergence_ratio;
    let mut report = ForceReport::default();
    for iteration in 0..force.max_iterations {
        report.iterations = iteration + 1;
        let contact = accumulate_repulsion(blocks, margin, force.repulsion);
        accumulate_anchor_and_boundary(blocks, &contact, canvas, config);
        let total = integrate(blocks, &contact, canvas, config)?;
        if total < threshold && colliding_pairs(blocks, margin).is_empty() {
            report.converged = true;
            break;
        }
    }
    debug!(
        iterations = report.iterations,
        converged = report.converged,
        "force relaxation finished"
    );

    report.last_ditch_rounds = last_ditch(blocks, measurer, canvas, config, floor);
    report.unresolved_pairs = colliding_pairs(blocks, margin).len();
    Ok(report)
}

/// Pairwise repulsion along the axis of smaller overlap, split inversely by
/// mass. Returns which blocks touched another block.
fn accumulate_repulsion(blocks: &mut [TextBlock], margin: f32, strength: f32) -> Vec<bool> {
    let mut contact = vec![false; blocks.len()];
    for i in 0..blocks.len() {
        for j in (i + 1)..blocks.len() {
            if !collides(&blocks[i], &blocks[j], margin) {
                continue;
            }
            let a = blocks[i].final_bbox().expand(margin * 0.5);
            let b = blocks[j].final_bbox().expand(margin * 0.5);
            let Some((ox, oy)) = a.overlap(&b) else {
                continue;
            };
            contact[i] = true;
            contact[j] = true;

            let ca = a.center();
            let cb = b.center();
            let (axis, overlap, delta) = if ox <= oy {
                (Vector::new(1.0, 0.0), ox, cb.x - ca.x)
            } else {
                (Vector::new(0.0, 1.0), oy, cb.y - ca.y)
            };
            // Coincident centres get a fixed bias: the lower id goes negative.
            let sign = if delta.abs() < COINCIDENT_EPSILON {
                1.0
            } else {
                delta.signum()
            };
            let magnitude = (overlap + SEPARATION_SLACK) * strength;

            let mass_i = blocks[i].mass.max(0.0);
            let mass_j = blocks[j].mass.max(0.0);
            let total = mass_i + mass_j;
            let (share_i, share_j) = if total > 0.0 {
                (mass_j / total, mass_i / total)
            } else {
                (0.5, 0.5)
            };
            blocks[i].displacement += axis.scale(-sign * magnitude * share_i);
            blocks[j].displacement += axis.scale(sign * magnitude * share_j);
        }
    }
    contact
}

fn accumulate_anchor_and_boundary(
    blocks: &mut [TextBlock],
    contact: &[bool],
    canvas: &Canvas,
    config: &LayoutConfig,
) {
    for (idx, block) in blocks.iter_mut().enumerate() {
        if block.is_empty() {
            continue;
        }
        let inward = canvas.clamp(&block.final_bbox());
        if inward.length() > 0.0 {
            let mut push = inward.scale(config.force.boundary);
            push += Vector::new(slack(inward.dx), slack(inward.dy));
            block.displacement += push;
        } else if !contact[idx] {
            // The spring only acts on blocks that are free and on the canvas.
            let pull = &block.anchor() - &block.final_bbox().center();
            block.displacement += pull.scale(config.force.spring);
        }
    }
}

fn slack(component: f32) -> f32 {
    if component > 0.0 {
        SEPARATION_SLACK
    } else if component < 0.0 {
        -SEPARATION_SLACK
    } else {
        0.0
    }
}

/// Damp and apply every accumulated displacement, then reset it. Blocks that
/// touch nothing only take the part of their step that opens no new collision.
fn integrate(
    blocks: &mut [TextBlock],
    contact: &[bool],
    canvas: &Canvas,
    config: &LayoutConfig,
) -> Result<f32> {
    let margin = config.collision_margin;
    let mut total = 0.0;
    for idx in 0..blocks.len() {
        let mut step = blocks[idx].displacement.scale(config.force.damping);
        blocks[idx].displacement = Vector::ZERO;
        if !step.is_finite() {
            error!(block = idx, "non-finite displacement in force layout");
            bail!("force layout produced a non-finite displacement for block {}", idx);
        }
        if step.length() == 0.0 {
            continue;
        }
        if !contact[idx] {
            step = gated_step(blocks, idx, step, canvas, margin);
        }
        blocks[idx].translate(step);
        total += step.length();
        check_bounds(&blocks[idx], idx, canvas)?;
    }
    Ok(total)
}

fn gated_step(
    blocks: &[TextBlock],
    idx: usize,
    step: Vector,
    canvas: &Canvas,
    margin: f32,
) -> Vector {
    let outside = canvas.outside_area(&blocks[idx].final_bbox());
    let mut step = step;
    for _ in 0..=SPRING_HALVINGS {
        let mut moved = blocks[idx].clone();
        moved.translate(step);
        if !blocks.iter().any(|other| collides(&moved, other, margin))
            && canvas.outside_area(&moved.final_bbox()) <= outside
        {
            return step;
        }
        step = step.scale(0.5);
    }
    Vector::ZERO
}

fn check_bounds(block: &TextBlock, idx: usize, canvas: &Canvas) -> Result<()> {
    let bbox = block.final_bbox();
    let center = bbox.center();
    let reach_x = canvas.width.max(1.0) * BLOWUP_FACTOR;
    let reach_y = canvas.height.max(1.0) * BLOWUP_FACTOR;
    let inside = center.x >= -reach_x
        && center.x <= canvas.width + reach_x
        && center.y >= -reach_y
        && center.y <= canvas.height + reach_y;
    if !bbox.is_finite() || !inside {
        error!(block = idx, x = center.x, y = center.y, "force layout diverged");
        bail!(
            "force layout diverged: block {} centre at ({}, {})",
            idx,
            center.x,
            center.y
        );
    }
    Ok(())
}

/// Shrink the lighter block of each still-colliding pair by one size,
/// re-centre it on its anchor and pull it back onto the canvas. Stops when
/// nothing collides or after the configured number of rounds.
fn last_ditch(
    blocks: &mut [TextBlock],
    measurer: &mut Measurer<'_>,
    canvas: &Canvas,
    config: &LayoutConfig,
    floor: u32,
) -> usize {
    let margin = config.collision_margin;
    let mut rounds = 0;
    for _ in 0..config.force.last_ditch_iterations {
        let pairs = colliding_pairs(blocks, margin);
        if pairs.is_empty() {
            break;
        }
        rounds += 1;
        let mut shrunk = vec![false; blocks.len()];
        let mut changed = false;
        for (i, j) in pairs {
            let Some(victim) = lighter_shrinkable(blocks, i, j, floor) else {
                continue;
            };
            if shrunk[victim] {
                continue;
            }
            let block = &mut blocks[victim];
            let size = block.font_size;
            block.shrink_to(size - 1, measurer, floor);
            block.center_on_anchor();
            let inward = canvas.clamp(&block.final_bbox());
            block.translate(inward);
            shrunk[victim] = true;
            changed = true;
        }
        if !changed {
            break;
        }
    }
    rounds
}

fn lighter_shrinkable(blocks: &[TextBlock], i: usize, j: usize, floor: u32) -> Option<usize> {
    let can_i = blocks[i].font_size > floor;
    let can_j = blocks[j].font_size > floor;
    match (can_i, can_j) {
        (false, false) => None,
        (true, false) => Some(i),
        (false, true) => Some(j),
        (true, true) => {
            if blocks[i].mass < blocks[j].mass {
                Some(i)
            } else if blocks[j].mass < blocks[i].mass {
                Some(j)
            } else {
                Some(j.max(i))
            }
        }
    }
}
