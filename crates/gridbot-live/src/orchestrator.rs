//! The safety gate orchestrator.
//!
//! Per tick, per symbol, strictly in this order:
//! 1. skip everything while the engine phase is still initializing
//! 2. planner -> `GridPlan`
//! 3. reconciler -> ordered `ExecutionAction`s
//! 4. classify each action's risk intent
//! 5. gate chain; a block makes zero exchange calls
//! 6. idempotent port for allowed actions
//! 7. one `LiveActionRecord` per action, no exception
//!
//! A blocked or failed action leaves its order out of the next state
//! and drops the plan digest, so the following tick re-diffs and
//! retries. Sibling actions in the same tick are unaffected.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use gridbot_core::{
    ActionKind, ExecEvent, ExecutionAction, ExecutionState, OrderId, OrderSide, Symbol, SymbolSpec,
};
use gridbot_port::{
    IdempotentPort, PlaceRequest, PortError, ReplaceRequest, WriteError, WriteOutcome,
};
use gridbot_reconcile::GridReconciler;
use gridbot_risk::{classify_intent, EnginePhase, GateChain, GateDecision, RiskIntent, SafetyControls};
use gridbot_telemetry::Metrics;
use tracing::{info, warn};

use crate::planner::{GridPlanner, MarketTick};
use crate::record::{ActionStatus, LiveActionRecord};

/// Everything one tick produced.
#[derive(Debug)]
pub struct TickOutcome {
    /// Next per-symbol state; the caller owns it until the next tick.
    pub next_state: ExecutionState,
    /// One record per reconciler action.
    pub records: Vec<LiveActionRecord>,
    /// Reconciler skip and summary events.
    pub events: Vec<ExecEvent>,
}

impl TickOutcome {
    fn unchanged(state: ExecutionState) -> Self {
        Self {
            next_state: state,
            records: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// Composes planner, reconciler, gate chain, and idempotent port into
/// the single write path.
pub struct SafetyGateOrchestrator {
    planner: Arc<dyn GridPlanner>,
    reconciler: GridReconciler,
    gates: GateChain,
    port: Arc<IdempotentPort>,
    specs: HashMap<Symbol, SymbolSpec>,
}

impl SafetyGateOrchestrator {
    #[must_use]
    pub fn new(
        planner: Arc<dyn GridPlanner>,
        reconciler: GridReconciler,
        gates: GateChain,
        port: Arc<IdempotentPort>,
    ) -> Self {
        Self {
            planner,
            reconciler,
            gates,
            port,
            specs: HashMap::new(),
        }
    }

    /// Register exchange constraints for a symbol. Symbols without a
    /// spec run unconstrained (no flooring, no min-qty guard).
    #[must_use]
    pub fn with_spec(mut self, symbol: Symbol, spec: SymbolSpec) -> Self {
        self.specs.insert(symbol, spec);
        self
    }

    #[must_use]
    pub fn port(&self) -> &Arc<IdempotentPort> {
        &self.port
    }

    /// Process one snapshot for one symbol.
    ///
    /// Takes ownership of the previous state and returns the next one;
    /// state is replaced wholesale, never mutated in place by callers.
    pub async fn process_tick(
        &self,
        tick: &MarketTick,
        state: ExecutionState,
        controls: &SafetyControls,
        phase: EnginePhase,
    ) -> TickOutcome {
        let symbol = tick.symbol.as_str();
        Metrics::tick(symbol);

        // During INIT/READY no planner or reconciler runs at all, so
        // no ghost orders can be queued before go-live.
        if phase.is_initializing() {
            return TickOutcome::unchanged(state);
        }

        let Some(plan) = self.planner.plan(tick, &state) else {
            return TickOutcome::unchanged(state);
        };

        let spec = self
            .specs
            .get(&tick.symbol)
            .cloned()
            .unwrap_or_else(SymbolSpec::unconstrained);

        let outcome = self.reconciler.reconcile(
            &tick.symbol,
            &plan,
            &state,
            &spec,
            tick.depth.as_ref(),
            tick.ts_ms,
        );

        for event in &outcome.events {
            Metrics::exec_event(
                symbol,
                event.kind.as_str(),
                event.reason.as_deref().unwrap_or(""),
            );
        }

        let mut next_state = outcome.next_state;
        let mut records = Vec::with_capacity(outcome.actions.len());
        let mut degraded = false;

        for action in outcome.actions {
            if action.kind == ActionKind::Noop {
                continue;
            }

            let intent = classify_intent(&action);
            Metrics::intent(symbol, intent.as_str());
            Metrics::action(symbol, action.kind.as_str(), &action.reason);

            match self.gates.evaluate(intent, &tick.symbol, controls, phase) {
                GateDecision::Block(reason) => {
                    Metrics::gate_blocked(symbol, reason.code());
                    info!(
                        %tick.symbol,
                        kind = action.kind.as_str(),
                        level = action.level_id,
                        reason = reason.code(),
                        "action blocked by gate chain"
                    );
                    undo_action(&action, &state, &mut next_state);
                    degraded = true;
                    records.push(LiveActionRecord::blocked(&action, intent, &reason));
                }
                GateDecision::Allow => {
                    let record = self
                        .execute(&action, intent, tick, &state, &mut next_state)
                        .await;
                    if record.status == ActionStatus::Failed {
                        degraded = true;
                    }
                    records.push(record);
                }
            }
        }

        // Any action that did not land leaves the book out of sync
        // with the plan; drop the digest so the next tick re-diffs.
        if degraded {
            next_state.last_plan_digest = None;
        }

        Metrics::open_orders(
            symbol,
            "buy",
            next_state.open_count_side(OrderSide::Buy) as i64,
        );
        Metrics::open_orders(
            symbol,
            "sell",
            next_state.open_count_side(OrderSide::Sell) as i64,
        );
        for (operation, breaker_state) in self.port.breakers().states() {
            Metrics::breaker_state(&operation, breaker_state.as_str());
        }

        TickOutcome {
            next_state,
            records,
            events: outcome.events,
        }
    }

    async fn execute(
        &self,
        action: &ExecutionAction,
        intent: RiskIntent,
        tick: &MarketTick,
        prev_state: &ExecutionState,
        next_state: &mut ExecutionState,
    ) -> LiveActionRecord {
        let symbol = action.symbol.as_str();
        let started = Instant::now();

        let result = match action.kind {
            ActionKind::Place => {
                let req = PlaceRequest {
                    symbol: action.symbol.clone(),
                    side: action.side,
                    price: action.price,
                    qty: action.qty,
                    level_id: action.level_id,
                    ts_ms: tick.ts_ms,
                    reduce_only: action.reduce_only,
                };
                self.port.place(req, tick.ts_ms).await
            }
            ActionKind::Replace => match action.order_id.clone() {
                Some(order_id) => {
                    let req = ReplaceRequest {
                        order_id,
                        symbol: action.symbol.clone(),
                        new_price: action.price,
                        new_qty: action.qty,
                        ts_ms: tick.ts_ms,
                    };
                    self.port.replace(req, tick.ts_ms).await
                }
                None => Err(WriteError::upfront(PortError::bad_request(
                    "replace action without order id",
                ))),
            },
            ActionKind::Cancel => match action.order_id.clone() {
                Some(order_id) => self
                    .port
                    .cancel(order_id.clone(), tick.ts_ms)
                    .await
                    .map(|outcome| WriteOutcome {
                        value: order_id,
                        attempts: outcome.attempts,
                        deduped: outcome.deduped,
                    }),
                None => Err(WriteError::upfront(PortError::bad_request(
                    "cancel action without order id",
                ))),
            },
            ActionKind::Noop => unreachable!("noop filtered by caller"),
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        let operation = action.kind.as_str();

        match result {
            Ok(outcome) => {
                Metrics::idempotency(if outcome.deduped { "hit" } else { "miss" });
                Metrics::executed(symbol, operation);
                Metrics::write_latency(operation, latency_ms as f64);

                if matches!(action.kind, ActionKind::Place | ActionKind::Replace) {
                    rekey_provisional(action, &outcome.value, next_state);
                }

                LiveActionRecord::executed(
                    action,
                    intent,
                    outcome.attempts,
                    Some(outcome.value),
                    latency_ms,
                )
            }
            Err(err) => {
                if matches!(err.error, PortError::IdempotencyConflict { .. }) {
                    Metrics::idempotency("conflict");
                }
                Metrics::failed(symbol, operation, crate::record::failure_reason(&err.error));
                warn!(
                    %action.symbol,
                    kind = operation,
                    level = action.level_id,
                    error = %err,
                    attempts = err.attempts,
                    "action failed at the port"
                );
                undo_action(action, prev_state, next_state);
                LiveActionRecord::failed(action, intent, &err.error, err.attempts, latency_ms)
            }
        }
    }
}

/// Roll `next_state` back to what it would be had `action` never been
/// emitted: provisional records out, previously open orders back in.
fn undo_action(
    action: &ExecutionAction,
    prev_state: &ExecutionState,
    next_state: &mut ExecutionState,
) {
    match action.kind {
        ActionKind::Place => {
            let provisional = OrderId::provisional(&action.symbol, action.level_id);
            next_state.open_orders.remove(&provisional);
        }
        ActionKind::Replace => {
            let provisional = OrderId::provisional(&action.symbol, action.level_id);
            next_state.open_orders.remove(&provisional);
            restore_previous(action, prev_state, next_state);
        }
        ActionKind::Cancel => {
            restore_previous(action, prev_state, next_state);
        }
        ActionKind::Noop => {}
    }
}

fn restore_previous(
    action: &ExecutionAction,
    prev_state: &ExecutionState,
    next_state: &mut ExecutionState,
) {
    if let Some(order_id) = &action.order_id {
        if let Some(record) = prev_state.open_orders.get(order_id) {
            next_state
                .open_orders
                .insert(order_id.clone(), record.clone());
        }
    }
}

/// Swap a provisional grid-level id for the exchange-assigned id.
fn rekey_provisional(
    action: &ExecutionAction,
    exchange_id: &OrderId,
    next_state: &mut ExecutionState,
) {
    let provisional = OrderId::provisional(&action.symbol, action.level_id);
    if let Some(mut record) = next_state.open_orders.remove(&provisional) {
        record.id = exchange_id.clone();
        next_state
            .open_orders
            .insert(exchange_id.clone(), record);
    }
}
