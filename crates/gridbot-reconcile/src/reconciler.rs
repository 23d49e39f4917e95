//! The reconciler: plan + state -> ordered actions + next state.

use std::collections::HashMap;

use gridbot_core::action::reason;
use gridbot_core::{
    EventKind, ExecEvent, ExecutionAction, ExecutionState, GridMode, GridPlan, OrderId,
    OrderRecord, ResetDirective, Symbol, SymbolSpec,
};
use tracing::debug;

use crate::depth::{DepthGuard, L2Snapshot};
use crate::digest::plan_digest;
use crate::levels::{desired_levels, DesiredLevel, LevelOutcome};

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Ordered actions: cancels first, then replaces, then places.
    pub actions: Vec<ExecutionAction>,
    /// Skip and summary events.
    pub events: Vec<ExecEvent>,
    /// Next per-symbol state, assuming every action executes.
    ///
    /// New orders carry deterministic provisional ids; the live engine
    /// re-keys them to exchange ids on acknowledgment.
    pub next_state: ExecutionState,
}

/// Deterministic grid reconciler.
///
/// For a given `(plan, state, now_ms)` the action list and next state
/// are always identical. The reconciler never errors on normal inputs;
/// suppressed placements surface as `ExecEvent`s.
#[derive(Debug, Clone, Default)]
pub struct GridReconciler {
    depth_guard: Option<DepthGuard>,
}

impl GridReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self { depth_guard: None }
    }

    /// Enable the order-book depth guard for PLACE actions.
    #[must_use]
    pub fn with_depth_guard(mut self, guard: DepthGuard) -> Self {
        self.depth_guard = Some(guard);
        self
    }

    /// Reconcile one symbol's ladder against the plan.
    pub fn reconcile(
        &self,
        symbol: &Symbol,
        plan: &GridPlan,
        state: &ExecutionState,
        spec: &SymbolSpec,
        depth: Option<&L2Snapshot>,
        now_ms: u64,
    ) -> ReconcileOutcome {
        let digest = plan_digest(plan);
        let mut next_state = ExecutionState {
            open_orders: HashMap::new(),
            last_plan_digest: Some(digest.clone()),
            tick: state.tick + 1,
        };

        // PAUSE/EMERGENCY override everything: pull every order, place nothing.
        if plan.mode.is_halt() {
            let summary = match plan.mode {
                GridMode::Emergency => EventKind::CancelAllEmergency,
                _ => EventKind::CancelAllPause,
            };
            let code = match plan.mode {
                GridMode::Emergency => reason::CANCEL_ALL_EMERGENCY,
                _ => reason::CANCEL_ALL_PAUSE,
            };
            let actions = cancel_all(symbol, state, code);
            debug!(%symbol, mode = %plan.mode, cancels = actions.len(), "halt mode: cancel all");
            return ReconcileOutcome {
                actions,
                events: vec![ExecEvent::summary(summary, symbol.clone())],
                next_state,
            };
        }

        // Unchanged plan since the last applied tick: cheap no-op.
        if state.last_plan_digest.as_deref() == Some(digest.as_str()) {
            next_state.open_orders = state.open_orders.clone();
            return ReconcileOutcome {
                actions: Vec::new(),
                events: vec![ExecEvent::summary(EventKind::PlanUnchanged, symbol.clone())],
                next_state,
            };
        }

        let mut events = Vec::new();
        let mut desired: HashMap<i32, DesiredLevel> = HashMap::new();
        for outcome in desired_levels(plan, spec) {
            match outcome {
                LevelOutcome::Level(level) => {
                    desired.insert(level.level_id, level);
                }
                LevelOutcome::Skipped { level_id, reason } => {
                    events.push(ExecEvent::skipped(symbol.clone(), level_id, reason));
                }
            }
        }

        let mut cancels = Vec::new();
        let mut replaces = Vec::new();
        let mut places = Vec::new();
        let mut depth_skip = false;

        match plan.reset {
            ResetDirective::Hard => {
                cancels = cancel_all(symbol, state, reason::HARD_RESET);
                for level in sorted(&desired) {
                    self.push_place(
                        symbol,
                        level,
                        reason::HARD_RESET,
                        depth,
                        now_ms,
                        &mut places,
                        &mut next_state,
                        &mut events,
                        &mut depth_skip,
                    );
                }
            }
            ResetDirective::Soft | ResetDirective::None => {
                let soft = plan.reset == ResetDirective::Soft;
                let mut occupied: HashMap<i32, &OrderRecord> = HashMap::new();

                for order in state.open_orders.values() {
                    match desired.get(&order.level_id) {
                        Some(level) if matches_level(order, level) => {
                            // Exact match: leave untouched.
                            occupied.insert(order.level_id, order);
                            next_state.open_orders.insert(order.id.clone(), order.clone());
                        }
                        Some(level) if soft => {
                            // Drifted from its level: replace in place.
                            occupied.insert(order.level_id, order);
                            replaces.push(ExecutionAction::replace(
                                order.id.clone(),
                                symbol.clone(),
                                level.side,
                                level.price,
                                level.qty,
                                level.level_id,
                                reason::SOFT_RESET_REPLACE,
                            ));
                            next_state.open_orders.insert(
                                OrderId::provisional(symbol, level.level_id),
                                provisional_record(symbol, level, now_ms),
                            );
                        }
                        Some(_) => {
                            // Plain reconcile: drifted orders are torn down
                            // and the level re-added below.
                            cancels.push(cancel_order(symbol, order, reason::RECONCILE_REMOVE));
                        }
                        None => {
                            cancels.push(cancel_order(symbol, order, reason::RECONCILE_REMOVE));
                        }
                    }
                }

                let code = if soft {
                    reason::SOFT_RESET_REPLACE
                } else {
                    reason::RECONCILE_ADD
                };
                for level in sorted(&desired) {
                    if occupied.contains_key(&level.level_id) {
                        continue;
                    }
                    self.push_place(
                        symbol,
                        level,
                        code,
                        depth,
                        now_ms,
                        &mut places,
                        &mut next_state,
                        &mut events,
                        &mut depth_skip,
                    );
                }
            }
        }

        // Depth skips depend on market data, not on the plan: drop the
        // digest so the next tick re-diffs and retries the placement.
        if depth_skip {
            next_state.last_plan_digest = None;
        }

        let mut actions = cancels;
        actions.append(&mut replaces);
        actions.append(&mut places);

        debug!(
            %symbol,
            reset = %plan.reset,
            actions = actions.len(),
            events = events.len(),
            open_after = next_state.open_count(),
            "reconciled"
        );

        ReconcileOutcome {
            actions,
            events,
            next_state,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_place(
        &self,
        symbol: &Symbol,
        level: &DesiredLevel,
        code: &'static str,
        depth: Option<&L2Snapshot>,
        now_ms: u64,
        places: &mut Vec<ExecutionAction>,
        next_state: &mut ExecutionState,
        events: &mut Vec<ExecEvent>,
        depth_skip: &mut bool,
    ) {
        if let Some(guard) = &self.depth_guard {
            if let Some(skip_code) = guard.check_place(level.side, level.qty, depth, now_ms) {
                events.push(ExecEvent::skipped(symbol.clone(), level.level_id, skip_code));
                *depth_skip = true;
                return;
            }
        }

        places.push(ExecutionAction::place(
            symbol.clone(),
            level.side,
            level.price,
            level.qty,
            level.level_id,
            code,
        ));
        next_state.open_orders.insert(
            OrderId::provisional(symbol, level.level_id),
            provisional_record(symbol, level, now_ms),
        );
    }
}

/// Desired levels in deterministic order (buys descending to sells ascending).
fn sorted(desired: &HashMap<i32, DesiredLevel>) -> Vec<&DesiredLevel> {
    let mut levels: Vec<&DesiredLevel> = desired.values().collect();
    levels.sort_by_key(|l| l.level_id);
    levels
}

fn matches_level(order: &OrderRecord, level: &DesiredLevel) -> bool {
    order.side == level.side && order.price == level.price && order.qty == level.qty
}

fn cancel_all(symbol: &Symbol, state: &ExecutionState, code: &'static str) -> Vec<ExecutionAction> {
    let mut orders: Vec<&OrderRecord> = state.open_orders.values().collect();
    orders.sort_by(|a, b| a.id.cmp(&b.id));
    orders
        .into_iter()
        .map(|o| cancel_order(symbol, o, code))
        .collect()
}

fn cancel_order(symbol: &Symbol, order: &OrderRecord, code: &'static str) -> ExecutionAction {
    ExecutionAction::cancel(
        order.id.clone(),
        symbol.clone(),
        order.side,
        order.price,
        order.qty,
        order.level_id,
        code,
    )
}

fn provisional_record(symbol: &Symbol, level: &DesiredLevel, now_ms: u64) -> OrderRecord {
    OrderRecord::new(
        OrderId::provisional(symbol, level.level_id),
        symbol.clone(),
        level.side,
        level.price,
        level.qty,
        level.level_id,
        now_ms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depth::DepthGuardConfig;
    use gridbot_core::{ActionKind, OrderSide, Price, QtySchedule, Size};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn sym() -> Symbol {
        Symbol::from("BTCUSDT")
    }

    fn spec() -> SymbolSpec {
        SymbolSpec::new(
            Price::new(dec!(0.1)),
            Size::new(dec!(0.001)),
            Size::new(dec!(0.01)),
        )
    }

    fn plan() -> GridPlan {
        GridPlan {
            mode: GridMode::Bilateral,
            center: Price::new(dec!(50000)),
            spacing_bps: dec!(10),
            levels_up: 3,
            levels_down: 3,
            qty: QtySchedule::Uniform(Size::new(dec!(0.1))),
            reset: ResetDirective::None,
            reason: String::new(),
        }
    }

    fn apply(outcome: &ReconcileOutcome) -> ExecutionState {
        outcome.next_state.clone()
    }

    #[test]
    fn test_empty_state_places_full_ladder() {
        let rec = GridReconciler::new();
        let out = rec.reconcile(&sym(), &plan(), &ExecutionState::new(), &spec(), None, 1000);

        assert_eq!(out.actions.len(), 6);
        assert!(out.actions.iter().all(|a| a.kind == ActionKind::Place));
        assert_eq!(
            out.actions
                .iter()
                .filter(|a| a.side == OrderSide::Sell)
                .count(),
            3
        );
        assert!(out
            .actions
            .iter()
            .filter(|a| a.side == OrderSide::Sell)
            .all(|a| a.price.inner() > dec!(50000)));
        assert!(out
            .actions
            .iter()
            .filter(|a| a.side == OrderSide::Buy)
            .all(|a| a.price.inner() < dec!(50000)));
        assert_eq!(out.next_state.open_count(), 6);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let rec = GridReconciler::new();
        let p = plan();
        let first = rec.reconcile(&sym(), &p, &ExecutionState::new(), &spec(), None, 1000);
        let second = rec.reconcile(&sym(), &p, &apply(&first), &spec(), None, 2000);

        assert!(second.actions.is_empty());
        assert_eq!(second.events[0].kind, EventKind::PlanUnchanged);
        assert_eq!(second.next_state.open_count(), 6);
        assert_eq!(second.next_state.tick, 2);
    }

    #[test]
    fn test_idempotent_even_without_digest_shortcut() {
        let rec = GridReconciler::new();
        let p = plan();
        let first = rec.reconcile(&sym(), &p, &ExecutionState::new(), &spec(), None, 1000);

        // Forget the digest: the three-way diff itself must find nothing to do.
        let mut state = apply(&first);
        state.last_plan_digest = None;
        let second = rec.reconcile(&sym(), &p, &state, &spec(), None, 2000);
        assert!(second.actions.is_empty());
    }

    #[test]
    fn test_pause_cancels_everything_places_nothing() {
        let rec = GridReconciler::new();
        let populated = apply(&rec.reconcile(
            &sym(),
            &plan(),
            &ExecutionState::new(),
            &spec(),
            None,
            1000,
        ));

        let mut p = plan();
        p.mode = GridMode::Pause;
        let out = rec.reconcile(&sym(), &p, &populated, &spec(), None, 2000);

        assert_eq!(out.actions.len(), 6);
        assert!(out.actions.iter().all(|a| a.kind == ActionKind::Cancel));
        assert!(out
            .actions
            .iter()
            .all(|a| a.reason == reason::CANCEL_ALL_PAUSE));
        assert_eq!(out.events[0].kind, EventKind::CancelAllPause);
        assert_eq!(out.next_state.open_count(), 0);
    }

    #[test]
    fn test_emergency_uses_emergency_code() {
        let rec = GridReconciler::new();
        let populated = apply(&rec.reconcile(
            &sym(),
            &plan(),
            &ExecutionState::new(),
            &spec(),
            None,
            1000,
        ));

        let mut p = plan();
        p.mode = GridMode::Emergency;
        let out = rec.reconcile(&sym(), &p, &populated, &spec(), None, 2000);

        assert!(out
            .actions
            .iter()
            .all(|a| a.reason == reason::CANCEL_ALL_EMERGENCY));
        assert_eq!(out.events[0].kind, EventKind::CancelAllEmergency);
    }

    #[test]
    fn test_hard_reset_cancels_then_places() {
        let rec = GridReconciler::new();
        let populated = apply(&rec.reconcile(
            &sym(),
            &plan(),
            &ExecutionState::new(),
            &spec(),
            None,
            1000,
        ));

        let mut p = plan();
        p.center = Price::new(dec!(51000));
        p.reset = ResetDirective::Hard;
        let out = rec.reconcile(&sym(), &p, &populated, &spec(), None, 2000);

        // 6 cancels strictly before 6 places
        assert_eq!(out.actions.len(), 12);
        assert!(out.actions[..6]
            .iter()
            .all(|a| a.kind == ActionKind::Cancel && a.reason == reason::HARD_RESET));
        assert!(out.actions[6..]
            .iter()
            .all(|a| a.kind == ActionKind::Place && a.reason == reason::HARD_RESET));
        assert_eq!(out.next_state.open_count(), 6);
    }

    #[test]
    fn test_hard_reset_uni_long_places_buys_only() {
        let rec = GridReconciler::new();
        let mut p = plan();
        p.mode = GridMode::UniLong;
        p.reset = ResetDirective::Hard;
        let out = rec.reconcile(&sym(), &p, &ExecutionState::new(), &spec(), None, 1000);

        assert_eq!(out.actions.len(), 3);
        assert!(out
            .actions
            .iter()
            .all(|a| a.kind == ActionKind::Place && a.side == OrderSide::Buy));
    }

    #[test]
    fn test_soft_reset_replaces_only_drifted_orders() {
        let rec = GridReconciler::new();
        let populated = apply(&rec.reconcile(
            &sym(),
            &plan(),
            &ExecutionState::new(),
            &spec(),
            None,
            1000,
        ));

        // Bump quantity: every level drifts, none match exactly.
        let mut p = plan();
        p.qty = QtySchedule::Uniform(Size::new(dec!(0.2)));
        p.reset = ResetDirective::Soft;
        let out = rec.reconcile(&sym(), &p, &populated, &spec(), None, 2000);

        assert_eq!(out.actions.len(), 6);
        assert!(out
            .actions
            .iter()
            .all(|a| a.kind == ActionKind::Replace && a.reason == reason::SOFT_RESET_REPLACE));
        assert!(out.actions.iter().all(|a| a.qty == Size::new(dec!(0.2))));
    }

    #[test]
    fn test_soft_reset_leaves_matching_orders_untouched() {
        let rec = GridReconciler::new();
        let populated = apply(&rec.reconcile(
            &sym(),
            &plan(),
            &ExecutionState::new(),
            &spec(),
            None,
            1000,
        ));

        let mut p = plan();
        p.reset = ResetDirective::Soft;
        // Same ladder, soft reset: nothing drifted. (The reset directive
        // changes the digest, so the diff actually runs.)
        let out = rec.reconcile(&sym(), &p, &populated, &spec(), None, 2000);
        assert!(out.actions.is_empty());
        assert_eq!(out.next_state.open_count(), 6);
    }

    #[test]
    fn test_reconcile_center_shift_adds_and_removes() {
        let rec = GridReconciler::new();
        let populated = apply(&rec.reconcile(
            &sym(),
            &plan(),
            &ExecutionState::new(),
            &spec(),
            None,
            1000,
        ));

        // Narrow the ladder: levels ±3 disappear, nothing new appears.
        let mut p = plan();
        p.levels_up = 2;
        p.levels_down = 2;
        let out = rec.reconcile(&sym(), &p, &populated, &spec(), None, 2000);

        let cancels: Vec<_> = out
            .actions
            .iter()
            .filter(|a| a.kind == ActionKind::Cancel)
            .collect();
        let places: Vec<_> = out
            .actions
            .iter()
            .filter(|a| a.kind == ActionKind::Place)
            .collect();
        assert_eq!(cancels.len(), 2);
        assert!(cancels
            .iter()
            .all(|a| a.reason == reason::RECONCILE_REMOVE));
        assert!(places.is_empty());
        assert_eq!(out.next_state.open_count(), 4);
    }

    #[test]
    fn test_reconcile_widen_only_adds() {
        let rec = GridReconciler::new();
        let populated = apply(&rec.reconcile(
            &sym(),
            &plan(),
            &ExecutionState::new(),
            &spec(),
            None,
            1000,
        ));

        let mut p = plan();
        p.levels_up = 4;
        let out = rec.reconcile(&sym(), &p, &populated, &spec(), None, 2000);

        assert_eq!(out.actions.len(), 1);
        assert_eq!(out.actions[0].kind, ActionKind::Place);
        assert_eq!(out.actions[0].reason, reason::RECONCILE_ADD);
        assert_eq!(out.actions[0].level_id, 4);
        assert_eq!(out.next_state.open_count(), 7);
    }

    #[test]
    fn test_min_qty_skip_emits_event_not_action() {
        let rec = GridReconciler::new();
        let mut p = plan();
        p.qty = QtySchedule::Uniform(Size::new(dec!(0.05)));
        let mut s = spec();
        s.min_qty = Size::new(dec!(0.1));

        let out = rec.reconcile(&sym(), &p, &ExecutionState::new(), &s, None, 1000);
        assert!(out.actions.is_empty());
        assert_eq!(out.events.len(), 6);
        assert!(out.events.iter().all(|e| e.kind == EventKind::OrderSkipped
            && e.reason.as_deref() == Some("EXEC_QTY_BELOW_MIN_QTY")));
        assert_eq!(out.next_state.open_count(), 0);
    }

    #[test]
    fn test_depth_guard_blocks_places_not_cancels() {
        let guard = DepthGuard::new(DepthGuardConfig {
            max_age_ms: 1000,
            min_top_qty: Size::new(dec!(1)),
            max_impact_bps: Decimal::from(100),
        });
        let rec = GridReconciler::new().with_depth_guard(guard);

        // No snapshot at all: stale. Start from a populated state whose
        // ladder must shrink, so cancels and places are both in play.
        let plain = GridReconciler::new();
        let populated = apply(&plain.reconcile(
            &sym(),
            &plan(),
            &ExecutionState::new(),
            &spec(),
            None,
            1000,
        ));

        let mut p = plan();
        p.center = Price::new(dec!(50500));
        let out = rec.reconcile(&sym(), &p, &populated, &spec(), None, 2000);

        // All stale-blocked placements become events; cancels go through.
        assert!(out.actions.iter().all(|a| a.kind == ActionKind::Cancel));
        assert!(out
            .events
            .iter()
            .any(|e| e.reason.as_deref() == Some("EXEC_L2_STALE")));
        // Digest dropped so the next tick retries the placements.
        assert!(out.next_state.last_plan_digest.is_none());
    }

    #[test]
    fn test_determinism_same_inputs_same_outputs() {
        let rec = GridReconciler::new();
        let state = ExecutionState::new();
        let p = plan();
        let a = rec.reconcile(&sym(), &p, &state, &spec(), None, 1000);
        let b = rec.reconcile(&sym(), &p, &state, &spec(), None, 1000);
        assert_eq!(a.actions, b.actions);
        assert_eq!(a.next_state, b.next_state);
    }
}
