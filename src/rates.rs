//! Exchange-rate lookup with a fallback.
//!
//! This module does not talk to the network. A [`RateSource`] does the fetching;
//! [`RateLookup`] adds caching through an injected [`TtlCache`] and falls back to a
//! fixed rate when the source fails.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{Clock, SystemClock, TtlCache};

/// EUR to USD rate used when no live rate is available.
pub const DEFAULT_FALLBACK_RATE: f64 = 1.10;

#[derive(Debug, Error)]
pub enum RateError {
    #[error("rate source unavailable: {0}")]
    Unavailable(String),
    #[error("no rate for {0}")]
    MissingPair(CurrencyPair),
    #[error("invalid rate {0}")]
    Invalid(f64),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: &str, quote: &str) -> Self {
        CurrencyPair {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
        }
    }

    pub fn eur_usd() -> Self {
        Self::new("EUR", "USD")
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// One unit of `base` costs `rate` units of `quote`, as published on `as_of`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub rate: f64,
    pub as_of: Option<NaiveDate>,
}

pub trait RateSource {
    fn fetch(&self, pair: &CurrencyPair) -> Result<ExchangeRate, RateError>;
}

/// Result of a lookup: either a live rate or the configured fallback.
#[derive(Clone, Debug, PartialEq)]
pub enum Quote {
    Live(ExchangeRate),
    Fallback(f64),
}

impl Quote {
    pub fn rate(&self) -> f64 {
        match self {
            Quote::Live(r) => r.rate,
            Quote::Fallback(rate) => *rate,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Quote::Fallback(_))
    }

    /// Convert an amount in the pair's base currency.
    pub fn convert(&self, amount: f64) -> f64 {
        amount * self.rate()
    }

    /// One-line description, e.g. `1 EUR = 1.0850 USD (updated 2024-01-29)`.
    pub fn describe(&self, pair: &CurrencyPair) -> String {
        let line = format!("1 {} = {:.4} {}", pair.base, self.rate(), pair.quote);
        match self {
            Quote::Live(ExchangeRate { as_of: Some(date), .. }) => {
                format!("{} (updated {})", line, date.format("%Y-%m-%d"))
            }
            Quote::Live(_) => line,
            Quote::Fallback(_) => format!("{} (fallback rate)", line),
        }
    }
}

/// Rates known up front, e.g. from the configuration file or the command line.
///
/// Pairs that were never set are reported as [`RateError::MissingPair`], which
/// makes [`RateLookup`] use its fallback.
#[derive(Clone, Debug, Default)]
pub struct FixedRates {
    rates: HashMap<CurrencyPair, ExchangeRate>,
}

impl FixedRates {
    pub fn new() -> Self {
        FixedRates::default()
    }

    pub fn with_rate(mut self, pair: CurrencyPair, rate: f64, as_of: Option<NaiveDate>) -> Self {
        self.rates.insert(pair, ExchangeRate { rate, as_of });
        self
    }
}

impl RateSource for FixedRates {
    fn fetch(&self, pair: &CurrencyPair) -> Result<ExchangeRate, RateError> {
        self.rates
            .get(pair)
            .cloned()
            .ok_or_else(|| RateError::MissingPair(pair.clone()))
    }
}

/// Fetch-or-fallback rate lookup.
///
/// Live rates are cached for the cache's TTL. Fallbacks are never cached: the
/// next call goes back to the source.
pub struct RateLookup<S, C = SystemClock> {
    source: S,
    cache: TtlCache<CurrencyPair, ExchangeRate, C>,
    fallback: f64,
}

impl<S: RateSource> RateLookup<S, SystemClock> {
    pub fn new(source: S, ttl: Duration, fallback: f64) -> Self {
        Self::with_cache(source, TtlCache::new(ttl), fallback)
    }
}

impl<S: RateSource, C: Clock> RateLookup<S, C> {
    pub fn with_cache(
        source: S,
        cache: TtlCache<CurrencyPair, ExchangeRate, C>,
        fallback: f64,
    ) -> Self {
        RateLookup {
            source,
            cache,
            fallback,
        }
    }

    pub fn quote(&mut self, pair: &CurrencyPair) -> Quote {
        let source = &self.source;
        let fetched = self.cache.get_or_try_insert_with(pair.clone(), || {
            let rate = source.fetch(pair)?;
            if rate.rate.is_finite() && rate.rate > 0.0 {
                Ok(rate)
            } else {
                Err(RateError::Invalid(rate.rate))
            }
        });

        match fetched {
            Ok(rate) => Quote::Live(rate.clone()),
            Err(e) => {
                log::warn!(
                    "could not fetch {} rate ({}), using fallback {:.4}",
                    pair,
                    e,
                    self.fallback
                );
                Quote::Fallback(self.fallback)
            }
        }
    }

    /// Forget any cached rate for `pair`.
    pub fn refresh(&mut self, pair: &CurrencyPair) {
        self.cache.invalidate(pair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::ManualClock;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct ScriptedSource {
        responses: RefCell<Vec<Result<f64, String>>>,
        calls: Rc<Cell<usize>>,
    }

    impl ScriptedSource {
        fn new(mut responses: Vec<Result<f64, String>>) -> (Self, Rc<Cell<usize>>) {
            responses.reverse();
            let calls = Rc::new(Cell::new(0));
            let source = ScriptedSource {
                responses: RefCell::new(responses),
                calls: Rc::clone(&calls),
            };
            (source, calls)
        }
    }

    impl RateSource for ScriptedSource {
        fn fetch(&self, _pair: &CurrencyPair) -> Result<ExchangeRate, RateError> {
            self.calls.set(self.calls.get() + 1);
            match self.responses.borrow_mut().pop() {
                Some(Ok(rate)) => Ok(ExchangeRate { rate, as_of: None }),
                Some(Err(msg)) => Err(RateError::Unavailable(msg)),
                None => Err(RateError::Unavailable("exhausted".into())),
            }
        }
    }

    struct NoPairs;

    impl RateSource for NoPairs {
        fn fetch(&self, pair: &CurrencyPair) -> Result<ExchangeRate, RateError> {
            Err(RateError::MissingPair(pair.clone()))
        }
    }

    fn lookup(source: ScriptedSource) -> (RateLookup<ScriptedSource, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock(Duration::from_secs(3600), clock.clone());
        (RateLookup::with_cache(source, cache, DEFAULT_FALLBACK_RATE), clock)
    }

    #[test]
    fn live_rate_is_cached_until_ttl() {
        let (source, calls) = ScriptedSource::new(vec![Ok(1.08), Ok(1.09)]);
        let (mut rates, clock) = lookup(source);
        let pair = CurrencyPair::eur_usd();

        assert_eq!(rates.quote(&pair).rate(), 1.08);
        assert_eq!(rates.quote(&pair).rate(), 1.08);
        assert_eq!(calls.get(), 1);

        clock.advance(Duration::from_secs(3600));
        assert_eq!(rates.quote(&pair).rate(), 1.09);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn failure_falls_back_and_retries() {
        let (source, calls) = ScriptedSource::new(vec![Err("timeout".into()), Ok(1.07)]);
        let (mut rates, _clock) = lookup(source);
        let pair = CurrencyPair::eur_usd();

        let first = rates.quote(&pair);
        assert!(first.is_fallback());
        assert_eq!(first.rate(), DEFAULT_FALLBACK_RATE);

        let second = rates.quote(&pair);
        assert!(!second.is_fallback());
        assert_eq!(second.rate(), 1.07);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn nonsense_rates_are_rejected() {
        let (source, _calls) = ScriptedSource::new(vec![Ok(0.0), Ok(f64::NAN)]);
        let (mut rates, _clock) = lookup(source);
        let pair = CurrencyPair::eur_usd();
        assert!(rates.quote(&pair).is_fallback());
        assert!(rates.quote(&pair).is_fallback());
    }

    #[test]
    fn refresh_forces_refetch() {
        let (source, _calls) = ScriptedSource::new(vec![Ok(1.1), Ok(1.2)]);
        let (mut rates, _clock) = lookup(source);
        let pair = CurrencyPair::new("eur", "usd");
        assert_eq!(pair.to_string(), "EUR/USD");
        assert_eq!(rates.quote(&pair).rate(), 1.1);
        rates.refresh(&pair);
        assert_eq!(rates.quote(&pair).rate(), 1.2);
    }

    #[test]
    fn fixed_rates_quote_and_describe() {
        let pair = CurrencyPair::eur_usd();
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 29);
        let source = FixedRates::new().with_rate(pair.clone(), 1.085, as_of);
        let mut rates = RateLookup::new(source, Duration::from_secs(3600), DEFAULT_FALLBACK_RATE);

        let quote = rates.quote(&pair);
        assert!(!quote.is_fallback());
        assert_eq!(quote.describe(&pair), "1 EUR = 1.0850 USD (updated 2024-01-29)");

        let gbp = CurrencyPair::new("gbp", "usd");
        let missing = rates.quote(&gbp);
        assert_eq!(missing, Quote::Fallback(DEFAULT_FALLBACK_RATE));
        assert_eq!(missing.describe(&gbp), "1 GBP = 1.1000 USD (fallback rate)");
    }

    #[test]
    fn undated_live_rate_has_no_suffix() {
        let quote = Quote::Live(ExchangeRate { rate: 1.2, as_of: None });
        assert_eq!(quote.describe(&CurrencyPair::eur_usd()), "1 EUR = 1.2000 USD");
    }

    #[test]
    fn custom_fallback_converts() {
        let mut rates = RateLookup::new(NoPairs, Duration::from_secs(60), 1.25);
        let quote = rates.quote(&CurrencyPair::eur_usd());
        assert_eq!(quote, Quote::Fallback(1.25));
        assert_eq!(quote.convert(100.0), 125.0);
    }
}
