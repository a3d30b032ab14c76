//! Iterative-deepening negamax with aspiration windows, PVS, null-move
//! pruning, late-move/futility reductions and quiescence search.

use crate::board::Board;
use crate::moves::execute::{make_move_basic, make_null_move, undo_move_basic, undo_null_move};
use crate::moves::magic::MagicTables;
use crate::moves::square_control::in_check;
use crate::moves::types::Move;
use crate::search::context::SearchContext;
use crate::search::eval::static_eval;
use crate::search::picker::MovePicker;
use crate::search::see::SeeExt;
use crate::search::tt::{MATE, MATE_THRESHOLD, NodeType, TranspositionTable};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const INF: i32 = MATE;
const MAX_Q_DEPTH: u32 = 100;

fn score_to_tt(score: i32, ply: i32) -> i32 {
    if score >= MATE_THRESHOLD {
        score + ply
    } else if score <= -MATE_THRESHOLD {
        score - ply
    } else {
        score
    }
}

fn score_from_tt(score: i32, ply: i32) -> i32 {
    if score >= MATE_THRESHOLD {
        score - ply
    } else if score <= -MATE_THRESHOLD {
        score + ply
    } else {
        score
    }
}

/// Tracks the search deadline and the advisory external stop flag.
///
/// `out_of_time` and the shared `stop` flag are the two cancellation sources
/// the spec distinguishes; callers inspect `out_of_time` after a search
/// returns to tell a deadline abort from an externally requested one.
pub struct TimeManager {
    pub start_time: Instant,
    pub allotted: Option<Duration>,
    pub stop: Arc<AtomicBool>,
    pub out_of_time: bool,
}

impl TimeManager {
    pub fn new(limit: Option<Duration>, stop: Arc<AtomicBool>) -> Self {
        Self {
            start_time: Instant::now(),
            allotted: limit,
            stop,
            out_of_time: false,
        }
    }

    #[inline(always)]
    pub fn check(&mut self) {
        if self.out_of_time {
            return;
        }
        if let Some(limit) = self.allotted
            && self.start_time.elapsed() >= limit
        {
            self.out_of_time = true;
        }
    }

    #[inline(always)]
    pub fn should_stop(&self) -> bool {
        self.out_of_time || self.stop.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn allocated_time(&self) -> Option<Duration> {
        self.allotted
    }

    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[allow(clippy::only_used_in_recursion)]
pub fn quiescence(
    board: &mut Board,
    tables: &MagicTables,
    mut alpha: i32,
    beta: i32,
    nodes: &mut u64,
    time: &mut TimeManager,
    qdepth: u32,
) -> i32 {
    if *nodes & 2047 == 0 {
        time.check();
    }
    *nodes += 1;
    if time.should_stop() {
        return alpha;
    }

    if qdepth > MAX_Q_DEPTH {
        return static_eval(board, tables, alpha, beta);
    }

    let stand_pat = static_eval(board, tables, alpha, beta);
    if stand_pat >= beta {
        return beta;
    }
    if stand_pat > alpha {
        alpha = stand_pat;
    }

    // Quiescence does not use killers, history, or the TT.
    let empty_history = [[0i32; 64]; 64];
    let mut picker = MovePicker::new(None, [None, None], true);

    while let Some(mv) = picker.next(board, tables, &empty_history) {
        if !mv.is_promotion() && board.see_value(mv, tables) < 0 {
            continue;
        }

        let undo = make_move_basic(board, mv);
        let score = -quiescence(board, tables, -beta, -alpha, nodes, time, qdepth + 1);
        undo_move_basic(board, undo);

        if time.should_stop() {
            return alpha;
        }

        if score >= beta {
            return beta;
        }
        if score > alpha {
            alpha = score;
        }
    }
    alpha
}

#[allow(clippy::too_many_arguments)]
pub fn alpha_beta(
    board: &mut Board,
    tables: &MagicTables,
    ctx: &mut SearchContext,
    tt: &mut TranspositionTable,
    depth: i32,
    ply: usize,
    mut alpha: i32,
    mut beta: i32,
    nodes: &mut u64,
    time: &mut TimeManager,
) -> (i32, Option<Move>) {
    // 1. Deadline / stop check.
    if *nodes & 2047 == 0 {
        time.check();
    }
    if time.should_stop() {
        return (alpha, None);
    }
    *nodes += 1;

    if ply > 0 && board.is_repetition() {
        return (0, None);
    }

    let hash = board.zobrist;
    let mut hash_move = None;

    // 2. Transposition probe.
    if let Some((tt_move, raw_score, tt_depth, tt_bound)) =
        tt.probe(hash, depth as u8, alpha, beta, ply as i32)
    {
        if let Some(tm) = tt_move {
            hash_move = Some(tm);
        }

        if tt_depth as i32 >= depth {
            let tt_score = score_from_tt(raw_score, ply as i32);

            if ply > 0 {
                match tt_bound {
                    0 => return (tt_score, tt_move),
                    1 if tt_score > alpha => alpha = tt_score,
                    2 if tt_score < beta => beta = tt_score,
                    _ => {}
                }
                if alpha >= beta {
                    return (tt_score, tt_move);
                }
            }
        }
    }

    // 3. Leaf.
    if depth <= 0 {
        let score = quiescence(board, tables, alpha, beta, nodes, time, 0);
        return (score, None);
    }

    let in_check_now = in_check(board, board.side_to_move, tables);

    // 4. Null-move pruning.
    if depth >= 2 && !in_check_now && board.has_major_pieces(board.side_to_move) {
        let r = if depth >= 5 { 3 } else { 2 };
        let undo = make_null_move(board);
        let (val, _) = alpha_beta(
            board,
            tables,
            ctx,
            tt,
            depth - r - 1,
            ply + 1,
            -beta,
            -beta + 1,
            nodes,
            time,
        );
        let score = -val;
        undo_null_move(board, undo);

        if !time.should_stop() && score >= beta {
            return (beta, None);
        }
    }

    let static_eval_val = if !in_check_now && depth <= 2 {
        static_eval(board, tables, alpha, beta)
    } else {
        0
    };

    let mut picker = MovePicker::new(hash_move, ctx.killer_moves[ply], false);

    let mut best_move = None;
    let mut best_score = -INF;
    let original_alpha = alpha;
    let mut move_count = 0usize;

    // 6./7. Ordering + move loop.
    while let Some(mv) = picker.next(board, tables, &ctx.history) {
        let quiet = !mv.is_capture() && !mv.is_promotion();

        let mut r = 0;
        if depth >= 3 && quiet && !in_check_now && move_count >= 4 {
            r = 1;
        }
        if depth <= 2 && quiet && !in_check_now {
            let margin = if depth == 1 { 150 } else { 250 };
            if static_eval_val + margin <= alpha {
                r = r.max(1);
            }
        }

        let undo = make_move_basic(board, mv);
        let mut score;

        if move_count == 0 {
            let (val, _) = alpha_beta(
                board, tables, ctx, tt, depth - 1, ply + 1, -beta, -alpha, nodes, time,
            );
            score = -val;
        } else {
            let (val, _) = alpha_beta(
                board,
                tables,
                ctx,
                tt,
                depth - 1 - r,
                ply + 1,
                -alpha - 1,
                -alpha,
                nodes,
                time,
            );
            score = -val;

            if score > alpha {
                let (val, _) = alpha_beta(
                    board,
                    tables,
                    ctx,
                    tt,
                    depth - 1 - r,
                    ply + 1,
                    -beta,
                    -alpha,
                    nodes,
                    time,
                );
                score = -val;

                if r > 0 && score > alpha {
                    let (val, _) = alpha_beta(
                        board, tables, ctx, tt, depth - 1, ply + 1, -beta, -alpha, nodes, time,
                    );
                    score = -val;
                }
            }
        }

        undo_move_basic(board, undo);
        move_count += 1;

        if time.should_stop() {
            return (alpha, None);
        }

        if score > best_score {
            best_score = score;
            best_move = Some(mv);
            if score > alpha {
                alpha = score;
            }
            if score >= beta {
                let tt_score = score_to_tt(beta, ply as i32);
                tt.save(
                    hash,
                    Some(mv),
                    tt_score,
                    depth as u8,
                    NodeType::LowerBound as u8,
                    ply as i32,
                );

                if quiet {
                    ctx.update_killer(ply, mv);
                    ctx.update_history(mv, depth);
                }

                return (beta, Some(mv));
            }
        }
    }

    // 5. Legal move enumeration: empty list is mate or stalemate.
    if move_count == 0 {
        if in_check_now {
            return (-MATE + ply as i32, None);
        }
        return (0, None);
    }

    if time.should_stop() {
        return (alpha, None);
    }

    let node_type = if best_score >= beta {
        NodeType::LowerBound
    } else if best_score > original_alpha {
        NodeType::Exact
    } else {
        NodeType::UpperBound
    };

    let tt_score = score_to_tt(best_score, ply as i32);
    tt.save(
        hash,
        best_move,
        tt_score,
        depth as u8,
        node_type as u8,
        ply as i32,
    );

    (best_score, best_move)
}

/// Bound kind reported alongside a score to `info_cb`, mirroring UCI's
/// upperbound/lowerbound/exact vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exact,
    LowerBound,
    UpperBound,
}

/// Walks the principal variation out of the transposition table from the
/// current position, leaving the board unchanged.
fn extract_pv(board: &mut Board, tables: &MagicTables, tt: &TranspositionTable, max_len: usize) -> Vec<Move> {
    let mut pv = Vec::new();
    let mut undos = Vec::new();
    let mut seen = std::collections::HashSet::new();

    while pv.len() < max_len {
        let Some((Some(mv), _, _, _)) = tt.probe(board.zobrist, 0, -INF, INF, 0) else {
            break;
        };
        let key = (mv.from, mv.to, mv.promotion);
        if !seen.insert(key) {
            break;
        }
        if !crate::moves::execute::is_legal_move(board, mv, tables) {
            break;
        }
        pv.push(mv);
        undos.push(make_move_basic(board, mv));
    }

    for undo in undos.into_iter().rev() {
        undo_move_basic(board, undo);
    }
    pv
}

fn mate_or_cp(score: i32) -> (Option<i32>, i32) {
    if score.abs() >= MATE_THRESHOLD {
        let moves_to_mate = (MATE - score.abs() + 1) / 2;
        (
            Some(if score > 0 {
                moves_to_mate
            } else {
                -moves_to_mate
            }),
            score,
        )
    } else {
        (None, score)
    }
}

/// Owns the resources that persist across iterative-deepening iterations and
/// across external search calls: the transposition table and the killer and
/// history move-ordering tables.
pub struct Search {
    tt: TranspositionTable,
    ctx: SearchContext,
    stop: Arc<AtomicBool>,
}

impl Search {
    pub fn new(tt_size_mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new(tt_size_mb),
            ctx: SearchContext::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the advisory stop flag; observed at the next 2048-node check and
    /// at the top of every α-β node.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Clears the transposition table and killer/history tables, for a new
    /// game.
    pub fn clear(&mut self) {
        self.tt.clear();
        self.ctx = SearchContext::new();
    }

    /// Iterative-deepening search to `max_depth`, honoring `time_limit` and
    /// the instance's stop flag. `info_cb` is invoked at the end of each
    /// completed iteration and on aspiration-window fails; `progress_cb` is
    /// invoked for each root move before it is searched.
    #[allow(clippy::too_many_arguments)]
    pub fn search(
        &mut self,
        board: &mut Board,
        tables: &MagicTables,
        max_depth: i32,
        time_limit: Option<Duration>,
        mut info_cb: Option<&mut dyn FnMut(i32, u64, u128, i32, &[Move], Option<Bound>)>,
        mut progress_cb: Option<&mut dyn FnMut(Move, usize, i32)>,
    ) -> (Option<Move>, i32, u64) {
        self.stop.store(false, Ordering::Relaxed);
        self.tt.new_search();

        let mut last_best_move = None;
        let mut last_best_score = 0;
        let mut nodes = 0u64;
        let mut time = TimeManager::new(time_limit, self.stop.clone());
        let mut last_iter_duration = Duration::from_millis(0);

        for depth in 1..=max_depth {
            let iter_start = Instant::now();

            if depth > 1
                && let Some(limit) = time.allocated_time()
            {
                let predicted_next = last_iter_duration * 3;
                if time.elapsed() + predicted_next > limit {
                    break;
                }
            }

            // History halves each iteration rather than decaying to zero.
            for row in self.ctx.history.iter_mut() {
                for h in row.iter_mut() {
                    *h /= 2;
                }
            }

            if let Some(cb) = progress_cb.as_deref_mut() {
                let mut picker = MovePicker::new(None, [None, None], false);
                let empty_history = [[0i32; 64]; 64];
                let mut idx = 0;
                while let Some(mv) = picker.next(board, tables, &empty_history) {
                    cb(mv, idx, depth);
                    idx += 1;
                }
            }

            let mut delta = 50;
            let (mut alpha, mut beta) = if depth > 1 {
                (last_best_score - delta, last_best_score + delta)
            } else {
                (-INF, INF)
            };

            let mut score;
            let mut mv;

            loop {
                let result = alpha_beta(
                    board, tables, &mut self.ctx, &mut self.tt, depth, 0, alpha, beta, &mut nodes,
                    &mut time,
                );
                score = result.0;
                mv = result.1;

                if time.should_stop() {
                    break;
                }

                if score <= alpha {
                    if let Some(cb) = info_cb.as_deref_mut() {
                        let pv = extract_pv(board, tables, &self.tt, max_depth as usize);
                        cb(
                            depth,
                            nodes,
                            time.elapsed().as_millis(),
                            score,
                            &pv,
                            Some(Bound::UpperBound),
                        );
                    }
                    delta *= 2;
                    alpha = (alpha - delta).max(-MATE);
                    continue;
                }

                if score >= beta {
                    if let Some(cb) = info_cb.as_deref_mut() {
                        let pv = extract_pv(board, tables, &self.tt, max_depth as usize);
                        cb(
                            depth,
                            nodes,
                            time.elapsed().as_millis(),
                            score,
                            &pv,
                            Some(Bound::LowerBound),
                        );
                    }
                    delta *= 2;
                    beta = (beta + delta).min(MATE);
                    continue;
                }

                break;
            }

            last_iter_duration = iter_start.elapsed();

            if time.should_stop() {
                break;
            }

            last_best_score = score;
            last_best_move = mv;

            if let Some(cb) = info_cb.as_deref_mut() {
                let pv = extract_pv(board, tables, &self.tt, max_depth as usize);
                cb(
                    depth,
                    nodes,
                    time.elapsed().as_millis(),
                    score,
                    &pv,
                    Some(Bound::Exact),
                );
            }

            if score.abs() >= MATE_THRESHOLD {
                break;
            }
        }

        (last_best_move, last_best_score, nodes)
    }
}

/// Formats `score` as a UCI-style `cp N` / `mate N` string.
pub fn format_score(score: i32) -> String {
    let (mate, cp) = mate_or_cp(score);
    match mate {
        Some(n) => format!("mate {n}"),
        None => format!("cp {cp}"),
    }
}
