use std::collections::HashMap;

use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::atr::Atr;
use crate::indicator::bollinger::BollingerBands;
use crate::indicator::cci::Cci;
use crate::indicator::definition::{IndicatorConfig, IndicatorDefinition, ParamValue};
use crate::indicator::ma::{Ema, Sma, Wma};
use crate::indicator::macd::Macd;
use crate::indicator::mfi::Mfi;
use crate::indicator::momentum::Momentum;
use crate::indicator::obv::Obv;
use crate::indicator::roc::Roc;
use crate::indicator::rsi::Rsi;
use crate::indicator::stoch_rsi::StochRsi;
use crate::indicator::stochastic::Stochastic;
use crate::indicator::vwap::Vwap;
use crate::indicator::williams_r::WilliamsR;
use crate::indicator::{Indicator, IndicatorOutput};
use crate::model::Candle;

/// Indicators addressable by id. Adding one means one more `register` call.
pub struct IndicatorRegistry {
    entries: HashMap<&'static str, Box<dyn Indicator>>,
    order: Vec<&'static str>,
}

impl IndicatorRegistry {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registry holding every built-in indicator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Sma::new());
        registry.register(Ema::new());
        registry.register(Wma::new());
        registry.register(Rsi::new());
        registry.register(Macd::new());
        registry.register(Stochastic::new());
        registry.register(StochRsi::new());
        registry.register(WilliamsR::new());
        registry.register(Cci::new());
        registry.register(Roc::new());
        registry.register(Momentum::new());
        registry.register(Mfi::new());
        registry.register(BollingerBands::new());
        registry.register(Atr::new());
        registry.register(Obv::new());
        registry.register(Vwap::new());
        registry
    }

    /// Add `indicator`, replacing any previous entry with the same id.
    pub fn register(&mut self, indicator: impl Indicator + 'static) {
        let id = indicator.definition().id;
        if self.entries.insert(id, Box::new(indicator)).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&dyn Indicator> {
        self.entries.get(id).map(Box::as_ref)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &IndicatorDefinition> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|indicator| indicator.definition())
    }

    pub fn resolve_config(
        &self,
        id: &str,
        raw: &HashMap<String, ParamValue>,
    ) -> Result<IndicatorConfig, Report<IndicatorError>> {
        let indicator = self.lookup(id)?;
        Ok(IndicatorConfig::resolve(indicator.definition(), raw))
    }

    /// Run indicator `id` over chronological `candles`.
    ///
    /// Fewer candles than the definition's `min_data_points` yields an empty
    /// output of the indicator's shape rather than an error.
    pub fn calculate(
        &self,
        id: &str,
        candles: &[Candle],
        config: &IndicatorConfig,
    ) -> Result<IndicatorOutput, Report<IndicatorError>> {
        let indicator = self.lookup(id)?;
        if candles.len() < indicator.definition().min_data_points {
            return Ok(indicator.calculate(&[], config));
        }
        Ok(indicator.calculate(candles, config))
    }

    fn lookup(&self, id: &str) -> Result<&dyn Indicator, Report<IndicatorError>> {
        self.get(id).ok_or_else(|| {
            Report::new(IndicatorError::UnknownIndicator { id: id.to_owned() })
        })
    }
}

impl Default for IndicatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
