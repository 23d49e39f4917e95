//! Application wiring.
//!
//! Builds the live engine out of its parts: static planner seeded from
//! the config's grid section, reconciler with optional depth guard,
//! gate chain, idempotent port, and the tick runner. The exchange
//! adapter and drawdown guard are injectable; the defaults are the
//! paper adapter and an allow-all guard.

use std::sync::Arc;

use gridbot_core::Symbol;
use gridbot_live::{EngineRunner, GridPlanner, MarketTick, SafetyGateOrchestrator, StaticPlanner};
use gridbot_port::{ExchangePort, IdempotentPort, PaperPort};
use gridbot_reconcile::{DepthGuard, GridReconciler};
use gridbot_risk::{
    AlwaysAllowGuard, DrawdownGuard, EnginePhase, GateChain, KillSwitchLatch, SafetyControls,
};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppResult;

pub struct Application {
    config: AppConfig,
    exchange: Arc<dyn ExchangePort>,
    guard: Arc<dyn DrawdownGuard>,
    kill_switch: Arc<KillSwitchLatch>,
    controls: Arc<RwLock<SafetyControls>>,
    phase: Arc<RwLock<EnginePhase>>,
    planner: Arc<StaticPlanner>,
    tick_tx: mpsc::Sender<MarketTick>,
    tick_rx: mpsc::Receiver<MarketTick>,
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let (tick_tx, tick_rx) = mpsc::channel(config.tick_capacity);
        let planner = Arc::new(StaticPlanner::with_plan(config.grid.initial_plan()));
        let controls = Arc::new(RwLock::new(config.safety_controls()));

        Ok(Self {
            controls,
            planner,
            tick_tx,
            tick_rx,
            config,
            exchange: Arc::new(PaperPort::new()),
            guard: Arc::new(AlwaysAllowGuard),
            kill_switch: Arc::new(KillSwitchLatch::new()),
            phase: Arc::new(RwLock::new(EnginePhase::Init)),
            shutdown: CancellationToken::new(),
        })
    }

    /// Swap in a real exchange adapter.
    #[must_use]
    pub fn with_exchange(mut self, exchange: Arc<dyn ExchangePort>) -> Self {
        self.exchange = exchange;
        self
    }

    /// Swap in a real drawdown guard.
    #[must_use]
    pub fn with_guard(mut self, guard: Arc<dyn DrawdownGuard>) -> Self {
        self.guard = guard;
        self
    }

    /// Sender half of the snapshot channel. The engine stops when
    /// every sender is dropped.
    #[must_use]
    pub fn tick_sender(&self) -> mpsc::Sender<MarketTick> {
        self.tick_tx.clone()
    }

    /// Kill switch handle for monitors and operator tooling.
    #[must_use]
    pub fn kill_switch(&self) -> Arc<KillSwitchLatch> {
        self.kill_switch.clone()
    }

    /// Readiness controls handle; writable at runtime.
    #[must_use]
    pub fn controls(&self) -> Arc<RwLock<SafetyControls>> {
        self.controls.clone()
    }

    /// Planner handle; a strategy replaces the grid plan through it.
    #[must_use]
    pub fn planner(&self) -> Arc<StaticPlanner> {
        self.planner.clone()
    }

    /// Cancel to stop the engine from outside.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the engine until the snapshot stream closes or shutdown
    /// fires.
    pub async fn run(self) -> AppResult<()> {
        let Self {
            config,
            exchange,
            guard,
            kill_switch,
            controls,
            phase,
            planner,
            tick_tx,
            tick_rx,
            shutdown,
        } = self;

        info!(
            mode = config.mode.as_str(),
            armed = config.armed,
            symbols = config.symbols.len(),
            "starting engine"
        );

        let mut reconciler = GridReconciler::new();
        if let Some(depth_config) = config.depth_guard.clone() {
            info!(max_age_ms = depth_config.max_age_ms, "depth guard enabled");
            reconciler = reconciler.with_depth_guard(DepthGuard::new(depth_config));
        }

        let gates = GateChain::new(kill_switch, guard);
        let port = Arc::new(IdempotentPort::new(exchange, config.port.clone()));

        let mut orchestrator = SafetyGateOrchestrator::new(
            planner as Arc<dyn GridPlanner>,
            reconciler,
            gates,
            port,
        );
        for sym in &config.symbols {
            orchestrator = orchestrator.with_spec(Symbol::new(sym.symbol.clone()), sym.spec());
        }

        let runner = EngineRunner::new(Arc::new(orchestrator), controls, phase.clone());
        *phase.write() = EnginePhase::Ready;

        let ctrl_c_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                ctrl_c_shutdown.cancel();
            }
        });

        // The application's own sender is dropped here so the channel
        // closes once every external feed is gone.
        drop(tick_tx);

        *phase.write() = EnginePhase::Active;
        runner.run(tick_rx, shutdown).await;

        info!("engine stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbot_core::Price;
    use gridbot_port::PaperPort;
    use rust_decimal_macros::dec;

    fn live_config() -> AppConfig {
        toml::from_str(
            r#"
            mode = "live_trade"
            armed = true
            whitelist = ["BTCUSDT"]

            [grid]
            center = "50000"
            spacing_bps = "20"
            levels_up = 2
            levels_down = 2
            qty = { uniform = "0.01" }
        "#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_engine_places_ladder_then_stops_on_stream_close() {
        let paper = Arc::new(PaperPort::new());
        let app = Application::new(live_config())
            .unwrap()
            .with_exchange(paper.clone());
        let ticks = app.tick_sender();

        let handle = tokio::spawn(app.run());

        ticks
            .send(MarketTick {
                symbol: Symbol::new("BTCUSDT"),
                mid_price: Price::new(dec!(50000)),
                depth: None,
                ts_ms: 1_000,
            })
            .await
            .unwrap();
        drop(ticks);

        handle.await.unwrap().unwrap();
        assert_eq!(paper.place_calls(), 4);
        assert_eq!(paper.open_order_count(), 4);
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_engine() {
        let app = Application::new(live_config()).unwrap();
        let shutdown = app.shutdown_token();
        let _ticks = app.tick_sender();

        let handle = tokio::spawn(app.run());
        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_disarmed_engine_makes_no_calls() {
        let mut config = live_config();
        config.armed = false;

        let paper = Arc::new(PaperPort::new());
        let app = Application::new(config).unwrap().with_exchange(paper.clone());
        let ticks = app.tick_sender();

        let handle = tokio::spawn(app.run());
        ticks
            .send(MarketTick {
                symbol: Symbol::new("BTCUSDT"),
                mid_price: Price::new(dec!(50000)),
                depth: None,
                ts_ms: 1_000,
            })
            .await
            .unwrap();
        drop(ticks);

        handle.await.unwrap().unwrap();
        assert_eq!(paper.total_calls(), 0);
    }
}
