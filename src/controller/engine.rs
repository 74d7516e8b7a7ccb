//! Single-writer engine loop
//!
//! Wraps [`RiskController`](super::RiskController) behind an intent queue so
//! producers (fill handlers, price feeds) never touch portfolio state
//! directly. The loop is the only writer: it drains intents and runs the
//! monitoring cycle on a fixed interval, so every risk calculation sees one
//! consistent snapshot.

use super::{CycleReport, RiskController, RiskError, TradeIntent, TradeRejection};
use crate::config::Config;
use crate::money::{ArithmeticOverflow, Money};
use crate::portfolio::RiskMetrics;
use crate::position::PositionKey;
use crate::stops::StopLossSpec;
use crate::telemetry;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// A price update from an external feed
#[derive(Debug, Clone)]
pub struct PriceTick {
    pub symbol: String,
    pub venue: String,
    pub price: Money,
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    pub fn key(&self) -> PositionKey {
        PositionKey::new(&self.venue, &self.symbol)
    }
}

/// Requests accepted by the engine loop
#[derive(Debug)]
pub enum Intent {
    Validate {
        intent: TradeIntent,
        reply: oneshot::Sender<Result<(), TradeRejection>>,
    },
    Open {
        intent: TradeIntent,
        reply: oneshot::Sender<Result<PositionKey, TradeRejection>>,
    },
    PriceUpdate {
        tick: PriceTick,
    },
    Close {
        key: PositionKey,
        exit_price: Money,
        reply: oneshot::Sender<Result<Money, RiskError>>,
    },
    SetStop {
        key: PositionKey,
        spec: StopLossSpec,
        reply: oneshot::Sender<Result<(), RiskError>>,
    },
    Metrics {
        reply: oneshot::Sender<Result<RiskMetrics, ArithmeticOverflow>>,
    },
    ResetBreaker {
        reply: oneshot::Sender<bool>,
    },
    EmergencyShutdown,
    Shutdown,
}

/// Cloneable producer handle to a running [`RiskEngine`]
#[derive(Clone)]
pub struct RiskEngineHandle {
    tx: mpsc::Sender<Intent>,
}

impl RiskEngineHandle {
    /// Validate a trade intent without opening a position.
    pub async fn validate(&self, intent: TradeIntent) -> Result<Result<(), TradeRejection>> {
        let (reply, rx) = oneshot::channel();
        self.send(Intent::Validate { intent, reply }).await?;
        rx.await.map_err(|_| anyhow!("risk engine stopped"))
    }

    /// Validate and open a position.
    pub async fn open(&self, intent: TradeIntent) -> Result<Result<PositionKey, TradeRejection>> {
        let (reply, rx) = oneshot::channel();
        self.send(Intent::Open { intent, reply }).await?;
        rx.await.map_err(|_| anyhow!("risk engine stopped"))
    }

    /// Enqueue a price update. Fire-and-forget; unknown keys are logged and
    /// ignored by the loop.
    pub async fn price_update(&self, tick: PriceTick) -> Result<()> {
        self.send(Intent::PriceUpdate { tick }).await
    }

    /// Close a position at the given exit price.
    pub async fn close(&self, key: PositionKey, exit_price: Money) -> Result<Result<Money, RiskError>> {
        let (reply, rx) = oneshot::channel();
        self.send(Intent::Close {
            key,
            exit_price,
            reply,
        })
        .await?;
        rx.await.map_err(|_| anyhow!("risk engine stopped"))
    }

    /// Reassign a position's stop-loss.
    pub async fn set_stop(&self, key: PositionKey, spec: StopLossSpec) -> Result<Result<(), RiskError>> {
        let (reply, rx) = oneshot::channel();
        self.send(Intent::SetStop { key, spec, reply }).await?;
        rx.await.map_err(|_| anyhow!("risk engine stopped"))
    }

    /// Fetch the current risk metrics snapshot.
    pub async fn metrics(&self) -> Result<RiskMetrics> {
        let (reply, rx) = oneshot::channel();
        self.send(Intent::Metrics { reply }).await?;
        rx.await
            .map_err(|_| anyhow!("risk engine stopped"))?
            .map_err(Into::into)
    }

    /// Request a breaker reset; returns whether it took effect.
    pub async fn reset_breaker(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Intent::ResetBreaker { reply }).await?;
        rx.await.map_err(|_| anyhow!("risk engine stopped"))
    }

    /// Invoke emergency shutdown for the session.
    pub async fn emergency_shutdown(&self) -> Result<()> {
        self.send(Intent::EmergencyShutdown).await
    }

    /// Stop the engine loop.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Intent::Shutdown).await
    }

    async fn send(&self, intent: Intent) -> Result<()> {
        self.tx
            .send(intent)
            .await
            .map_err(|_| anyhow!("risk engine stopped"))
    }
}

/// The engine loop: owns the controller and all of its state.
pub struct RiskEngine {
    controller: RiskController,
    intent_rx: mpsc::Receiver<Intent>,
    monitor_interval: Duration,
    cycle_tx: Option<mpsc::Sender<CycleReport>>,
}

impl RiskEngine {
    /// Build an engine and its producer handle from configuration.
    pub fn new(config: &Config) -> (Self, RiskEngineHandle) {
        let (tx, intent_rx) = mpsc::channel(config.engine.intent_queue_depth);
        let engine = Self {
            controller: RiskController::from_config(config),
            intent_rx,
            monitor_interval: Duration::from_millis(config.engine.monitor_interval_ms),
            cycle_tx: None,
        };
        (engine, RiskEngineHandle { tx })
    }

    /// Subscribe to per-cycle reports (stop triggers, breaker transitions,
    /// metrics). Consumers that fall behind drop reports rather than stall
    /// the loop.
    pub fn cycle_reports(&mut self, buffer: usize) -> mpsc::Receiver<CycleReport> {
        let (tx, rx) = mpsc::channel(buffer);
        self.cycle_tx = Some(tx);
        rx
    }

    /// Run until [`Intent::Shutdown`] or all handles are dropped.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.monitor_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = self.monitor_interval.as_millis() as u64,
            "risk engine started"
        );

        loop {
            tokio::select! {
                maybe_intent = self.intent_rx.recv() => {
                    match maybe_intent {
                        Some(Intent::Shutdown) | None => {
                            tracing::info!("risk engine stopped");
                            return;
                        }
                        Some(intent) => self.handle_intent(intent),
                    }
                }
                _ = interval.tick() => {
                    self.run_cycle();
                }
            }
        }
    }

    fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Validate { intent, reply } => {
                let _ = reply.send(self.controller.validate_new_trade(&intent));
            }
            Intent::Open { intent, reply } => {
                let _ = reply.send(self.controller.add_position(&intent, Utc::now()));
            }
            Intent::PriceUpdate { tick } => {
                let key = tick.key();
                if let Err(e) = self.controller.update_position_price(&key, tick.price) {
                    // recoverable: ticks for symbols we hold no position in
                    tracing::debug!(key = %key, error = %e, "price update ignored");
                }
            }
            Intent::Close {
                key,
                exit_price,
                reply,
            } => {
                let _ = reply.send(self.controller.close_position(&key, exit_price));
            }
            Intent::SetStop { key, spec, reply } => {
                let _ = reply.send(self.controller.set_stop_loss(&key, &spec));
            }
            Intent::Metrics { reply } => {
                let _ = reply.send(self.controller.get_risk_metrics());
            }
            Intent::ResetBreaker { reply } => {
                let _ = reply.send(self.controller.reset_circuit_breaker());
            }
            Intent::EmergencyShutdown => {
                if let Err(e) = self.controller.trigger_emergency_shutdown() {
                    tracing::error!(error = %e, "emergency shutdown failed");
                }
            }
            // terminal intents are handled by the run loop itself
            Intent::Shutdown => {}
        }
    }

    fn run_cycle(&mut self) {
        match self.controller.monitor_cycle(Utc::now()) {
            Ok(report) => {
                telemetry::publish_metrics(&report.metrics);
                if report.tripped.is_some() {
                    telemetry::record_risk_event();
                }
                if let Some(tx) = &self.cycle_tx {
                    if tx.try_send(report).is_err() {
                        tracing::debug!("cycle report dropped: consumer behind or gone");
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "monitor cycle failed");
            }
        }
    }
}
