use tracing::debug;

use super::block::{TextBlock, colliding_pairs, collides, collision_count};
use super::config::LayoutConfig;
use super::geom::{Canvas, Point, Rect, Vector};
use super::measure::Measurer;

const OUTSIDE_EPSILON: f32 = 0.01;
const PUSH_SLACK: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Right,
    Left,
    Down,
    Up,
    DownRight,
    DownLeft,
    UpRight,
    UpLeft,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::Right,
        Direction::Left,
        Direction::Down,
        Direction::Up,
        Direction::DownRight,
        Direction::DownLeft,
        Direction::UpRight,
        Direction::UpLeft,
    ];

    fn unit(self) -> Vector {
        let (dx, dy) = match self {
            Direction::Right => (1.0, 0.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Down => (0.0, 1.0),
            Direction::Up => (0.0, -1.0),
            Direction::DownRight => (1.0, 1.0),
            Direction::DownLeft => (-1.0, 1.0),
            Direction::UpRight => (1.0, -1.0),
            Direction::UpLeft => (-1.0, -1.0),
        };
        Vector::new(dx, dy)
    }
}

/// One geometric transformation. Steps are in em of the block's font size,
/// except `ExpandAspect` which grows the container width by a fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionKind {
    ExpandAspect { step: f32 },
    Move { direction: Direction, step: f32 },
    MoveAndPush { direction: Direction, step: f32 },
    Shrink,
    MergeText,
}

impl ActionKind {
    /// Stackable actions keep their last intermediate state when they fail.
    pub fn stackable(&self) -> bool {
        matches!(self, ActionKind::ExpandAspect { .. } | ActionKind::Shrink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    /// Re-applications allowed after the first one.
    pub retries: u32,
}

impl Action {
    fn new(kind: ActionKind, retries: u32) -> Self {
        Self { kind, retries }
    }
}

/// Fixed order in which a troubled block tries to get out of trouble.
pub fn palette() -> Vec<Action> {
    let mut actions = vec![Action::new(ActionKind::ExpandAspect { step: 0.1 }, 10)];
    for step in [0.5, 0.25] {
        for direction in Direction::ALL {
            actions.push(Action::new(ActionKind::Move { direction, step }, 10));
        }
    }
    for direction in Direction::ALL {
        actions.push(Action::new(
            ActionKind::MoveAndPush {
                direction,
                step: 0.5,
            },
            6,
        ));
    }
    actions.push(Action::new(ActionKind::Shrink, 5));
    for direction in Direction::ALL {
        actions.push(Action::new(
            ActionKind::Move {
                direction,
                step: 0.25,
            },
            10,
        ));
    }
    actions.push(Action::new(ActionKind::ExpandAspect { step: 0.05 }, 10));
    actions.push(Action::new(ActionKind::MergeText, 0));
    actions
}

/// A block plus its own copy of every other block.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub(crate) block: TextBlock,
    pub(crate) neighbors: Vec<TextBlock>,
}

pub(crate) struct ActionContext<'a, 'f> {
    pub(crate) measurer: &'a mut Measurer<'f>,
    pub(crate) canvas: Canvas,
    pub(crate) config: &'a LayoutConfig,
    pub(crate) floor: u32,
}

#[derive(Debug)]
pub(crate) enum StepOutcome {
    Retry(Candidate),
    Success(Candidate),
    Fail,
}

#[derive(Debug)]
pub(crate) enum AttemptResult {
    Resolved(Candidate),
    /// A stackable action failed but its last mutation stays.
    Kept(Candidate),
    Reverted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub processed: usize,
    pub resolved: usize,
    pub merged: usize,
}

pub(crate) fn has_error(candidate: &Candidate, ctx: &ActionContext<'_, '_>) -> bool {
    collision_count(
        &candidate.block,
        &candidate.neighbors,
        ctx.config.collision_margin,
    ) > 0
        || ctx.canvas.overflows(&candidate.block.final_bbox)
}

fn is_fatal(
    kind: ActionKind,
    start: &Candidate,
    candidate: &Candidate,
    ctx: &ActionContext<'_, '_>,
) -> bool {
    let margin = ctx.config.collision_margin;
    let canvas = &ctx.canvas;
    let outside_grew = |before: &TextBlock, after: &TextBlock| {
        canvas.outside_area(&after.final_bbox)
            > canvas.outside_area(&before.final_bbox) + OUTSIDE_EPSILON
    };
    let drifted = |block: &TextBlock| block.anchor_distance() > block.drift_limit(ctx.config.max_drift);

    match kind {
        ActionKind::ExpandAspect { .. } => {
            let coverage = candidate.block.final_bbox.area() / canvas.area().max(1.0);
            coverage > ctx.config.max_coverage
                || outside_grew(&start.block, &candidate.block)
                || collision_count(&candidate.block, &candidate.neighbors, margin)
                    > collision_count(&start.block, &start.neighbors, margin)
        }
        ActionKind::Move { .. } => {
            drifted(&candidate.block) || outside_grew(&start.block, &candidate.block)
        }
        ActionKind::MoveAndPush { .. } => {
            drifted(&candidate.block)
                || outside_grew(&start.block, &candidate.block)
                || start
                    .neighbors
                    .iter()
                    .zip(candidate.neighbors.iter())
                    .any(|(before, after)| outside_grew(before, after))
                || colliding_pairs(&candidate.neighbors, margin).len()
                    > colliding_pairs(&start.neighbors, margin).len()
        }
        ActionKind::Shrink | ActionKind::MergeText => false,
    }
}

fn is_non_fatal(kind: ActionKind, candidate: &Candidate, ctx: &ActionContext<'_, '_>) -> bool {
    match kind {
        ActionKind::MergeText => false,
        _ => has_error(candidate, ctx),
    }
}

fn shrink_step(size: u32, ratio: f32) -> u32 {
    ((size as f32 * ratio).round() as u32).min(size.saturating_sub(1))
}

fn apply(kind: ActionKind, current: &Candidate, ctx: &mut ActionContext<'_, '_>) -> Option<Candidate> {
    match kind {
        ActionKind::ExpandAspect { step } => expand_aspect(current, step, ctx),
        ActionKind::Move { direction, step } => Some(shift(current, direction, step, false, ctx)),
        ActionKind::MoveAndPush { direction, step } => {
            Some(shift(current, direction, step, true, ctx))
        }
        ActionKind::Shrink => shrink(current, ctx),
        ActionKind::MergeText => merge_text(current, ctx),
    }
}

fn expand_aspect(
    current: &Candidate,
    step: f32,
    ctx: &mut ActionContext<'_, '_>,
) -> Option<Candidate> {
    let rect = current.block.rect;
    let target_width = rect.height().max(1.0) * ctx.config.target_aspect;
    if rect.width() >= target_width {
        return None;
    }
    let width = (rect.width() * (1.0 + step))
        .max(rect.width() + 1.0)
        .min(target_width);
    let mut next = current.clone();
    next.block.rect = Rect::from_center(rect.center(), width, rect.height());
    next.block.refit(ctx.measurer, ctx.floor);
    Some(next)
}

fn shift(
    current: &Candidate,
    direction: Direction,
    step: f32,
    push: bool,
    ctx: &ActionContext<'_, '_>,
) -> Candidate {
    let distance = (current.block.font_size as f32 * step).max(1.0);
    let by = direction.unit().scale(distance);
    let mut next = current.clone();
    next.block.translate(by);
    if push {
        let margin = ctx.config.collision_margin;
        let reach = next.block.final_bbox.expand(margin);
        let unit = direction.unit();
        for neighbor in next.neighbors.iter_mut() {
            if collides(&next.block, neighbor, margin) {
                neighbor.translate(push_clearance(&reach, &neighbor.final_bbox, unit));
            }
        }
    }
    next
}

/// Shortest move along `unit` that carries `other` out of `reach`.
fn push_clearance(reach: &Rect, other: &Rect, unit: Vector) -> Vector {
    let along = |u: f32, reach_lo: f32, reach_hi: f32, lo: f32, hi: f32| {
        if u > 0.0 {
            Some(reach_hi - lo + PUSH_SLACK)
        } else if u < 0.0 {
            Some(hi - reach_lo + PUSH_SLACK)
        } else {
            None
        }
    };
    let tx = along(unit.dx, reach.x1, reach.x2, other.x1, other.x2);
    let ty = along(unit.dy, reach.y1, reach.y2, other.y1, other.y2);
    let distance = match (tx, ty) {
        (Some(x), Some(y)) => x.min(y),
        (Some(d), None) | (None, Some(d)) => d,
        (None, None) => 0.0,
    };
    unit.scale(distance.max(0.0))
}

fn shrink(current: &Candidate, ctx: &mut ActionContext<'_, '_>) -> Option<Candidate> {
    let size = current.block.font_size;
    if size <= ctx.floor {
        return None;
    }
    let ratio = ctx.config.shrink_ratio;
    let margin = ctx.config.collision_margin;
    let mut next = current.clone();
    for neighbor in next.neighbors.iter_mut() {
        if collides(&current.block, neighbor, margin) {
            let target = shrink_step(neighbor.font_size, ratio);
            neighbor.shrink_to(target, ctx.measurer, ctx.floor);
        }
    }
    next.block
        .shrink_to(shrink_step(size, ratio), ctx.measurer, ctx.floor);
    Some(next)
}

fn merge_text(current: &Candidate, ctx: &mut ActionContext<'_, '_>) -> Option<Candidate> {
    let margin = ctx.config.collision_margin;
    let reach = current.block.final_bbox.expand(margin);
    let (target, _) = current
        .neighbors
        .iter()
        .enumerate()
        .filter(|(_, neighbor)| collides(&current.block, neighbor, margin))
        .map(|(idx, neighbor)| (idx, reach.intersection_area(&neighbor.final_bbox)))
        .fold(None, |best: Option<(usize, f32)>, (idx, area)| match best {
            Some((_, best_area)) if best_area >= area => best,
            _ => Some((idx, area)),
        })?;

    let mut next = current.clone();
    let content = next.block.content.clone();
    let neighbor = &mut next.neighbors[target];
    neighbor.absorb(&content);
    let reduced = shrink_step(neighbor.font_size, ctx.config.shrink_ratio);
    neighbor.shrink_to(reduced, ctx.measurer, ctx.floor);
    let into = neighbor.id();
    next.block.clear_content(into);
    next.block.refit(ctx.measurer, ctx.floor);
    Some(next)
}

fn step(
    kind: ActionKind,
    start: &Candidate,
    current: &Candidate,
    ctx: &mut ActionContext<'_, '_>,
) -> StepOutcome {
    let Some(candidate) = apply(kind, current, ctx) else {
        return StepOutcome::Fail;
    };
    if is_fatal(kind, start, &candidate, ctx) {
        return StepOutcome::Fail;
    }
    if is_non_fatal(kind, &candidate, ctx) {
        StepOutcome::Retry(candidate)
    } else {
        StepOutcome::Success(candidate)
    }
}

/// Apply `action` until it succeeds, fails, or its retry budget runs out.
pub(crate) fn attempt(
    action: Action,
    start: &Candidate,
    ctx: &mut ActionContext<'_, '_>,
) -> AttemptResult {
    let mut current = start.clone();
    let mut kept = None;
    let mut remaining = action.retries;
    loop {
        match step(action.kind, start, &current, ctx) {
            StepOutcome::Success(candidate) => return AttemptResult::Resolved(candidate),
            StepOutcome::Retry(candidate) => {
                if action.kind.stackable() {
                    kept = Some(candidate.clone());
                }
                if remaining == 0 {
                    break;
                }
                remaining -= 1;
                current = candidate;
            }
            StepOutcome::Fail => break,
        }
    }
    match kept {
        Some(candidate) => AttemptResult::Kept(candidate),
        None => AttemptResult::Reverted,
    }
}

/// Farthest from the top-left corner first; ties by id.
pub(crate) fn processing_order(blocks: &[TextBlock]) -> Vec<usize> {
    let origin = Point::new(0.0, 0.0);
    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by(|&a, &b| {
        let da = blocks[a].anchor().distance(&origin);
        let db = blocks[b].anchor().distance(&origin);
        db.total_cmp(&da)
            .then_with(|| blocks[a].id().cmp(&blocks[b].id()))
    });
    order
}

fn write_back(blocks: &mut [TextBlock], candidate: Candidate) {
    let Candidate { block, neighbors } = candidate;
    for updated in neighbors.into_iter().chain(std::iter::once(block)) {
        if let Some(slot) = blocks.iter_mut().find(|slot| slot.id() == updated.id()) {
            *slot = updated;
        }
    }
}

/// Resolve collisions and canvas overflow block by block.
pub(crate) fn place_with_actions(
    blocks: &mut [TextBlock],
    ctx: &mut ActionContext<'_, '_>,
) -> ActionReport {
    let actions = palette();
    let mut report = ActionReport::default();

    for idx in processing_order(blocks) {
        if blocks[idx].is_empty() {
            continue;
        }
        let mut state = Candidate {
            block: blocks[idx].clone(),
            neighbors: blocks
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != idx)
                .map(|(_, block)| block.clone())
                .collect(),
        };
        if !has_error(&state, ctx) {
            continue;
        }
        report.processed += 1;

        for action in &actions {
            match attempt(*action, &state, ctx) {
                AttemptResult::Resolved(candidate) => {
                    debug!(block = idx, action = ?action.kind, "action resolved block");
                    state = candidate;
                    break;
                }
                AttemptResult::Kept(candidate) => {
                    debug!(block = idx, action = ?action.kind, "kept partial action");
                    state = candidate;
                }
                AttemptResult::Reverted => {}
            }
            if !has_error(&state, ctx) {
                break;
            }
        }

        if state.block.merged_into.is_some() {
            report.merged += 1;
        } else if !has_error(&state, ctx) {
            report.resolved += 1;
        }
        write_back(blocks, state);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::engine::block::{BlockId, Region};
    use crate::overlay::engine::measure::Alignment;

    fn config() -> LayoutConfig {
        LayoutConfig {
            stroke_scale: 0.0,
            collision_margin: 2.0,
            canvas_margin: 4.0,
            ..LayoutConfig::default()
        }
    }

    fn block(
        measurer: &mut Measurer<'_>,
        id: usize,
        region: Region,
        text: &str,
        size: u32,
    ) -> TextBlock {
        let mut block = TextBlock::new(BlockId(id), region, text, None, size);
        block.refit(measurer, 10);
        block
    }

    fn candidate(blocks: &[TextBlock], idx: usize) -> Candidate {
        Candidate {
            block: blocks[idx].clone(),
            neighbors: blocks
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != idx)
                .map(|(_, block)| block.clone())
                .collect(),
        }
    }

    #[test]
    fn horizontal_overlap_resolved_by_moving_right() {
        let config = config();
        let mut measurer = Measurer::new(None, config.stroke_scale, Alignment::Center);
        let a = block(&mut measurer, 0, Region::new(100, 80, 160, 120), "abcd", 20);
        let b = block(&mut measurer, 1, Region::new(134, 80, 194, 120), "abcd", 20);
        let overlap = a.final_bbox().overlap(&b.final_bbox()).expect("overlap");
        assert!((overlap.0 - 10.0).abs() < 1e-3);

        let mut blocks = vec![a, b];
        let mut ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(400, 200, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let start = candidate(&blocks, 1);
        let action = Action::new(
            ActionKind::Move {
                direction: Direction::Right,
                step: 0.5,
            },
            10,
        );
        match attempt(action, &start, &mut ctx) {
            AttemptResult::Resolved(found) => {
                assert!(!collides(&found.block, &found.neighbors[0], 2.0));
                assert_eq!(found.block.final_bbox().y1, start.block.final_bbox().y1);
            }
            other => panic!("expected resolution, got {:?}", other),
        }

        let report = place_with_actions(&mut blocks, &mut ctx);
        assert_eq!(report.processed, 1);
        assert_eq!(report.resolved, 1);
        assert!(!collides(&blocks[0], &blocks[1], 2.0));
        assert_eq!(blocks[0].font_size(), 20);
        assert_eq!(blocks[1].font_size(), 20);
    }

    #[test]
    fn hopeless_block_falls_through_every_action() {
        let config = config();
        let mut measurer = Measurer::new(None, 0.07, Alignment::Center);
        let text = "this translation is far too long for such a small bubble on a tiny page";
        let mut blocks = vec![block(&mut measurer, 0, Region::new(35, 20, 85, 40), text, 10)];
        assert!(blocks[0].final_bbox().height() > 60.0);

        let mut ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(120, 60, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let report = place_with_actions(&mut blocks, &mut ctx);
        assert_eq!(report.processed, 1);
        assert_eq!(report.resolved, 0);
        assert_eq!(blocks[0].font_size(), 10);
        assert_eq!(blocks[0].content(), text);
        assert!(blocks[0].merged_into().is_none());
    }

    #[test]
    fn failed_move_reverts_to_start() {
        let config = config();
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let blocks = vec![
            block(&mut measurer, 0, Region::new(100, 10, 160, 50), "abcd", 20),
            block(&mut measurer, 1, Region::new(100, 10, 160, 50), "abcd", 20),
        ];
        let mut ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(400, 200, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let start = candidate(&blocks, 1);
        // Up runs off the canvas before clearing the twin block.
        let action = Action::new(
            ActionKind::Move {
                direction: Direction::Up,
                step: 0.5,
            },
            3,
        );
        assert!(matches!(
            attempt(action, &start, &mut ctx),
            AttemptResult::Reverted
        ));
    }

    #[test]
    fn failed_shrink_keeps_last_step() {
        let config = config();
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let blocks = vec![
            block(&mut measurer, 0, Region::new(100, 80, 160, 120), "abcd", 20),
            block(&mut measurer, 1, Region::new(100, 80, 160, 120), "abcd", 20),
        ];
        let mut ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(400, 200, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let start = candidate(&blocks, 1);
        match attempt(Action::new(ActionKind::Shrink, 1), &start, &mut ctx) {
            AttemptResult::Kept(kept) => {
                assert_eq!(kept.block.font_size(), 16);
                assert_eq!(kept.neighbors[0].font_size(), 16);
            }
            other => panic!("expected kept shrink, got {:?}", other),
        }
    }

    #[test]
    fn shrink_at_floor_fails() {
        let config = config();
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let blocks = vec![
            block(&mut measurer, 0, Region::new(100, 80, 160, 120), "abcd", 10),
            block(&mut measurer, 1, Region::new(100, 80, 160, 120), "abcd", 10),
        ];
        let mut ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(400, 200, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let start = candidate(&blocks, 0);
        assert!(matches!(
            attempt(Action::new(ActionKind::Shrink, 5), &start, &mut ctx),
            AttemptResult::Reverted
        ));
    }

    #[test]
    fn merge_moves_text_into_neighbor() {
        let config = config();
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let blocks = vec![
            block(&mut measurer, 0, Region::new(100, 80, 260, 120), "hello", 20),
            block(&mut measurer, 1, Region::new(100, 80, 260, 120), "world", 20),
        ];
        let mut ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(400, 200, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let start = candidate(&blocks, 1);
        match attempt(Action::new(ActionKind::MergeText, 0), &start, &mut ctx) {
            AttemptResult::Resolved(merged) => {
                assert!(merged.block.is_empty());
                assert_eq!(merged.block.merged_into(), Some(BlockId(0)));
                assert_eq!(merged.neighbors[0].content(), "hello world");
                assert_eq!(merged.neighbors[0].font_size(), 18);
            }
            other => panic!("expected merge, got {:?}", other),
        }
    }

    #[test]
    fn merge_without_neighbor_fails() {
        let config = config();
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let blocks = vec![block(&mut measurer, 0, Region::new(-50, 80, 60, 120), "hello", 20)];
        let mut ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(400, 200, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let start = candidate(&blocks, 0);
        assert!(matches!(
            attempt(Action::new(ActionKind::MergeText, 0), &start, &mut ctx),
            AttemptResult::Reverted
        ));
    }

    #[test]
    fn push_clears_neighbor_in_every_direction() {
        let config = config();
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let blocks = vec![
            block(&mut measurer, 0, Region::new(100, 80, 160, 120), "abcd", 20),
            block(&mut measurer, 1, Region::new(134, 80, 194, 120), "abcd", 20),
        ];
        let ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(400, 200, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let start = candidate(&blocks, 0);
        let margin = config.collision_margin;
        assert!(collides(&start.block, &start.neighbors[0], margin));
        for direction in Direction::ALL {
            let moved = shift(&start, direction, 0.5, true, &ctx);
            assert!(
                !collides(&moved.block, &moved.neighbors[0], margin),
                "{:?} left the pair colliding",
                direction
            );
            let before = start.neighbors[0].final_bbox().center();
            let after = moved.neighbors[0].final_bbox().center();
            let unit = direction.unit();
            assert!((after.x - before.x) * unit.dx >= 0.0);
            assert!((after.y - before.y) * unit.dy >= 0.0);
        }
    }

    #[test]
    fn push_right_resolves_side_by_side_overlap() {
        let config = config();
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let blocks = vec![
            block(&mut measurer, 0, Region::new(100, 80, 160, 120), "abcd", 20),
            block(&mut measurer, 1, Region::new(134, 80, 194, 120), "abcd", 20),
        ];
        let mut ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(400, 200, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let start = candidate(&blocks, 0);
        let action = Action::new(
            ActionKind::MoveAndPush {
                direction: Direction::Right,
                step: 0.5,
            },
            6,
        );
        match attempt(action, &start, &mut ctx) {
            AttemptResult::Resolved(pushed) => {
                // block 0 spans 108..152, block 1 spans 142..186
                assert_eq!(pushed.block.final_bbox().x1, 118.0);
                assert_eq!(pushed.neighbors[0].final_bbox().x1, 164.5);
            }
            other => panic!("expected push to resolve, got {:?}", other),
        }
    }

    #[test]
    fn push_off_the_canvas_is_fatal() {
        let config = config();
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let blocks = vec![
            block(&mut measurer, 0, Region::new(0, 0, 60, 30), "abc", 10),
            block(&mut measurer, 1, Region::new(0, 0, 60, 30), "abc", 10),
        ];
        let mut ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(60, 30, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let start = candidate(&blocks, 0);
        for direction in Direction::ALL {
            let action = Action::new(
                ActionKind::MoveAndPush {
                    direction,
                    step: 0.5,
                },
                6,
            );
            assert!(matches!(
                attempt(action, &start, &mut ctx),
                AttemptResult::Reverted
            ));
        }
    }

    #[test]
    fn cornered_twins_merge_when_nothing_else_works() {
        let config = config();
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let mut blocks = vec![
            block(&mut measurer, 0, Region::new(0, 0, 60, 30), "abc", 10),
            block(&mut measurer, 1, Region::new(0, 0, 60, 30), "abc", 10),
        ];
        let mut ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(60, 30, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let report = place_with_actions(&mut blocks, &mut ctx);
        assert_eq!(
            report,
            ActionReport {
                processed: 1,
                resolved: 0,
                merged: 1,
            }
        );
        assert!(blocks[0].is_empty());
        assert_eq!(blocks[0].merged_into(), Some(BlockId(1)));
        assert_eq!(blocks[1].content(), "abc abc");
        assert!(!collides(&blocks[0], &blocks[1], config.collision_margin));
    }

    #[test]
    fn expand_widens_narrow_container() {
        let config = config();
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let blocks = vec![block(
            &mut measurer,
            0,
            Region::new(100, 20, 140, 180),
            "one two three four five six",
            20,
        )];
        let mut ctx = ActionContext {
            measurer: &mut measurer,
            canvas: Canvas::new(400, 400, config.canvas_margin),
            config: &config,
            floor: 10,
        };
        let start = candidate(&blocks, 0);
        let expanded = expand_aspect(&start, 0.1, &mut ctx).expect("narrow box expands");
        assert!(expanded.block.rect().width() > start.block.rect().width());
        assert_eq!(expanded.block.rect().center(), start.block.rect().center());
        assert!(expanded.block.wrapped_lines().len() <= start.block.wrapped_lines().len());
    }

    #[test]
    fn order_is_farthest_first() {
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let blocks = vec![
            block(&mut measurer, 0, Region::new(0, 0, 20, 20), "a", 10),
            block(&mut measurer, 1, Region::new(300, 300, 320, 320), "b", 10),
            block(&mut measurer, 2, Region::new(100, 100, 120, 120), "c", 10),
        ];
        assert_eq!(processing_order(&blocks), vec![1, 2, 0]);
    }

    #[test]
    fn palette_ends_with_merge() {
        let actions = palette();
        assert!(matches!(actions.first().map(|a| a.kind), Some(ActionKind::ExpandAspect { .. })));
        assert_eq!(actions.last().map(|a| a.kind), Some(ActionKind::MergeText));
        assert!(actions.iter().any(|a| a.kind == ActionKind::Shrink));
    }
}
