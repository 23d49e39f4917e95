//! Tick loop: snapshot stream in, per-symbol state across ticks.
//!
//! One runner owns the execution state for every symbol it trades;
//! processing for a symbol runs to completion before its next snapshot
//! is consumed. Readiness controls and engine phase are read fresh
//! each tick.

use std::collections::HashMap;
use std::sync::Arc;

use gridbot_core::{ExecutionState, Symbol};
use gridbot_risk::{EnginePhase, SafetyControls};
use gridbot_telemetry::Metrics;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::orchestrator::{SafetyGateOrchestrator, TickOutcome};
use crate::planner::MarketTick;
use crate::record::ActionStatus;

/// Drives the orchestrator from a snapshot stream.
pub struct EngineRunner {
    orchestrator: Arc<SafetyGateOrchestrator>,
    controls: Arc<RwLock<SafetyControls>>,
    phase: Arc<RwLock<EnginePhase>>,
    states: HashMap<Symbol, ExecutionState>,
}

impl EngineRunner {
    #[must_use]
    pub fn new(
        orchestrator: Arc<SafetyGateOrchestrator>,
        controls: Arc<RwLock<SafetyControls>>,
        phase: Arc<RwLock<EnginePhase>>,
    ) -> Self {
        Self {
            orchestrator,
            controls,
            phase,
            states: HashMap::new(),
        }
    }

    /// Current state for a symbol, if it has ticked at least once.
    #[must_use]
    pub fn state(&self, symbol: &Symbol) -> Option<&ExecutionState> {
        self.states.get(symbol)
    }

    /// Process one tick and persist its next state.
    pub async fn process(&mut self, tick: MarketTick) -> TickOutcome {
        let purged = self.orchestrator.port().store().purge_expired(tick.ts_ms);
        if purged > 0 {
            debug!(purged, "dropped expired idempotency entries");
        }

        let state = self.states.remove(&tick.symbol).unwrap_or_default();
        let controls = self.controls.read().clone();
        let phase = *self.phase.read();

        let outcome = self
            .orchestrator
            .process_tick(&tick, state, &controls, phase)
            .await;

        for record in &outcome.records {
            if record.status != ActionStatus::Executed {
                debug!(
                    symbol = %record.symbol,
                    kind = record.kind.as_str(),
                    status = record.status.as_str(),
                    reason = record.reason.as_deref().unwrap_or(""),
                    "action did not execute"
                );
            }
        }

        self.states
            .insert(tick.symbol.clone(), outcome.next_state.clone());
        outcome
    }

    /// Consume snapshots until the stream closes or shutdown fires.
    ///
    /// An in-progress tick always runs to completion; shutdown is only
    /// observed between ticks, so no write is abandoned mid-flight.
    pub async fn run(
        mut self,
        mut ticks: mpsc::Receiver<MarketTick>,
        shutdown: CancellationToken,
    ) {
        Metrics::engine_up();
        info!("engine runner started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping tick loop");
                    break;
                }
                maybe_tick = ticks.recv() => {
                    match maybe_tick {
                        Some(tick) => {
                            self.process(tick).await;
                        }
                        None => {
                            info!("tick stream closed");
                            break;
                        }
                    }
                }
            }
        }

        Metrics::engine_down();
        info!("engine runner stopped");
    }
}
