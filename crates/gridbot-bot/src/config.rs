//! Application configuration.
//!
//! One TOML file wires the whole engine: readiness controls, symbol
//! filters, the initial grid plan, and the write-path policies. Every
//! field has a conservative default except the grid itself, which must
//! be explicit.

use std::collections::HashSet;

use gridbot_core::{GridMode, GridPlan, Price, QtySchedule, ResetDirective, Size, Symbol, SymbolSpec};
use gridbot_port::IdempotentPortConfig;
use gridbot_reconcile::DepthGuardConfig;
use gridbot_risk::{SafetyControls, TradingMode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Exchange filters for one tradable symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    /// Symbol name (e.g. "BTCUSDT").
    pub symbol: String,
    /// Price increment.
    pub tick_size: Price,
    /// Quantity increment.
    pub step_size: Size,
    /// Minimum order quantity after flooring.
    pub min_qty: Size,
}

impl SymbolConfig {
    pub fn spec(&self) -> SymbolSpec {
        SymbolSpec::new(self.tick_size, self.step_size, self.min_qty)
    }
}

/// The ladder the engine maintains until a strategy replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Operating mode. Default: bilateral.
    #[serde(default = "default_grid_mode")]
    pub mode: GridMode,
    /// Center price of the ladder.
    pub center: Price,
    /// Spacing between adjacent levels in basis points.
    pub spacing_bps: Decimal,
    /// Sell levels above center. Default: 3.
    #[serde(default = "default_levels")]
    pub levels_up: u32,
    /// Buy levels below center. Default: 3.
    #[serde(default = "default_levels")]
    pub levels_down: u32,
    /// Per-level quantity schedule.
    pub qty: QtySchedule,
}

fn default_grid_mode() -> GridMode {
    GridMode::Bilateral
}

fn default_levels() -> u32 {
    3
}

impl GridConfig {
    /// The plan the planner serves until something overrides it.
    pub fn initial_plan(&self) -> GridPlan {
        GridPlan {
            mode: self.mode,
            center: self.center,
            spacing_bps: self.spacing_bps,
            levels_up: self.levels_up,
            levels_down: self.levels_down,
            qty: self.qty.clone(),
            reset: ResetDirective::None,
            reason: "startup".to_string(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if !self.center.is_positive() {
            return Err("grid center must be positive".to_string());
        }
        if self.spacing_bps <= Decimal::ZERO {
            return Err("grid spacing_bps must be positive".to_string());
        }
        if self.levels_up == 0 && self.levels_down == 0 {
            return Err("grid must have at least one level".to_string());
        }
        match &self.qty {
            QtySchedule::Uniform(size) => {
                if !size.is_positive() {
                    return Err("grid qty must be positive".to_string());
                }
            }
            QtySchedule::PerLevel(sizes) => {
                if sizes.is_empty() {
                    return Err("per-level qty schedule must not be empty".to_string());
                }
                if sizes.iter().any(|s| !s.is_positive()) {
                    return Err("per-level qty entries must be positive".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Trading mode. Default: dry_run, writes blocked at the gate.
    #[serde(default = "default_mode")]
    pub mode: TradingMode,
    /// Operator arm flag. Default: false.
    #[serde(default)]
    pub armed: bool,
    /// Tradable symbols. Empty means all symbols pass the whitelist gate.
    #[serde(default)]
    pub whitelist: Vec<Symbol>,
    /// Exchange filters per symbol. Symbols without an entry trade
    /// without flooring or minimum-quantity checks.
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
    /// Initial grid plan.
    pub grid: GridConfig,
    /// Idempotent write-path policies (store TTLs, breaker, retry).
    #[serde(default)]
    pub port: IdempotentPortConfig,
    /// Optional pre-trade depth checks for placements.
    #[serde(default)]
    pub depth_guard: Option<DepthGuardConfig>,
    /// Snapshot channel capacity. Default: 1000.
    #[serde(default = "default_tick_capacity")]
    pub tick_capacity: usize,
}

fn default_mode() -> TradingMode {
    TradingMode::DryRun
}

fn default_tick_capacity() -> usize {
    1_000
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine would misbehave under. Fatal
    /// at startup.
    pub fn validate(&self) -> AppResult<()> {
        self.grid.validate().map_err(AppError::Config)?;
        self.port.validate().map_err(AppError::Config)?;
        self.safety_controls().validate()?;
        for sym in &self.symbols {
            if sym.symbol.is_empty() {
                return Err(AppError::Config("symbol name must not be empty".to_string()));
            }
            if !sym.tick_size.is_positive()
                || !sym.step_size.is_positive()
                || !sym.min_qty.is_positive()
            {
                return Err(AppError::Config(format!(
                    "symbol {} filters must be positive",
                    sym.symbol
                )));
            }
        }
        if self.tick_capacity == 0 {
            return Err(AppError::Config("tick_capacity must be positive".to_string()));
        }
        Ok(())
    }

    /// Readiness controls the gate chain reads each tick.
    pub fn safety_controls(&self) -> SafetyControls {
        let whitelist: HashSet<Symbol> = self.whitelist.iter().cloned().collect();
        SafetyControls::new(self.armed, self.mode, whitelist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn full_toml() -> &'static str {
        r#"
            mode = "live_trade"
            armed = true
            whitelist = ["BTCUSDT"]
            tick_capacity = 64

            [[symbols]]
            symbol = "BTCUSDT"
            tick_size = "0.1"
            step_size = "0.001"
            min_qty = "0.001"

            [grid]
            mode = "bilateral"
            center = "50000"
            spacing_bps = "20"
            levels_up = 2
            levels_down = 2
            qty = { uniform = "0.01" }

            [depth_guard]
            max_age_ms = 2000
            min_top_qty = "0.5"
            max_impact_bps = "15"
        "#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(full_toml()).unwrap();
        assert_eq!(config.mode, TradingMode::LiveTrade);
        assert!(config.armed);
        assert_eq!(config.whitelist, vec![Symbol::new("BTCUSDT")]);
        assert_eq!(config.symbols.len(), 1);
        assert_eq!(config.grid.center, Price::new(dec!(50000)));
        assert_eq!(config.grid.levels_up, 2);
        assert!(config.depth_guard.is_some());
        assert_eq!(config.tick_capacity, 64);
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults_applied() {
        let toml_str = r#"
            [grid]
            center = "100"
            spacing_bps = "10"
            qty = { uniform = "1" }
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.mode, TradingMode::DryRun);
        assert!(!config.armed);
        assert!(config.whitelist.is_empty());
        assert_eq!(config.grid.mode, GridMode::Bilateral);
        assert_eq!(config.grid.levels_up, 3);
        assert_eq!(config.grid.levels_down, 3);
        assert!(config.depth_guard.is_none());
        assert_eq!(config.tick_capacity, 1_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_initial_plan_from_grid_section() {
        let config: AppConfig = toml::from_str(full_toml()).unwrap();
        let plan = config.grid.initial_plan();
        assert_eq!(plan.center, Price::new(dec!(50000)));
        assert_eq!(plan.reset, ResetDirective::None);
        assert_eq!(plan.qty, QtySchedule::Uniform(Size::new(dec!(0.01))));
    }

    #[test]
    fn test_rejects_zero_center() {
        let toml_str = r#"
            [grid]
            center = "0"
            spacing_bps = "10"
            qty = { uniform = "1" }
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_per_level_schedule() {
        let toml_str = r#"
            [grid]
            center = "100"
            spacing_bps = "10"
            qty = { per_level = [] }
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_nonpositive_symbol_filters() {
        let toml_str = r#"
            [[symbols]]
            symbol = "BTCUSDT"
            tick_size = "0"
            step_size = "0.001"
            min_qty = "0.001"

            [grid]
            center = "100"
            spacing_bps = "10"
            qty = { uniform = "1" }
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config: AppConfig = toml::from_str(full_toml()).unwrap();
        let serialized = toml::to_string(&config).unwrap();
        let reparsed: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.grid.center, config.grid.center);
        assert_eq!(reparsed.mode, config.mode);
    }

    #[test]
    fn test_safety_controls_from_config() {
        let config: AppConfig = toml::from_str(full_toml()).unwrap();
        let controls = config.safety_controls();
        assert!(controls.armed);
        assert_eq!(controls.mode, TradingMode::LiveTrade);
        assert!(controls.whitelist.contains(&Symbol::new("BTCUSDT")));
    }
}
