//! Rate limiting and bounded retry around a remote [`BarSource`].

use crate::domain::error::TradetermError;
use crate::domain::ohlcv::Bar;
use crate::domain::period::Period;
use crate::ports::bar_source_port::BarSource;
use chrono::NaiveDateTime;
use std::cell::Cell;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleConfig {
    /// Minimum spacing between the starts of two remote calls.
    pub min_interval: Duration,
    /// Attempts after the first one.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        ThrottleConfig {
            min_interval: Duration::from_secs(5),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl ThrottleConfig {
    /// No spacing and no backoff; for replaying local files.
    pub fn unthrottled() -> Self {
        ThrottleConfig {
            min_interval: Duration::ZERO,
            max_retries: 0,
            retry_delay: Duration::ZERO,
        }
    }
}

pub struct ThrottledSource {
    inner: Box<dyn BarSource>,
    config: ThrottleConfig,
    last_call: Cell<Option<Instant>>,
    calls: Cell<u64>,
}

impl ThrottledSource {
    pub fn new(inner: Box<dyn BarSource>, config: ThrottleConfig) -> Self {
        ThrottledSource {
            inner,
            config,
            last_call: Cell::new(None),
            calls: Cell::new(0),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Remote calls issued so far, retries included.
    pub fn calls(&self) -> u64 {
        self.calls.get()
    }

    fn wait_for_slot(&self) {
        if let Some(last) = self.last_call.get() {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_interval {
                std::thread::sleep(self.config.min_interval - elapsed);
            }
        }
        self.last_call.set(Some(Instant::now()));
        self.calls.set(self.calls.get() + 1);
    }

    /// Fetch with spacing and retries. Only [`TradetermError::Remote`] is
    /// retried; any other error from the source propagates immediately.
    pub fn fetch(
        &self,
        instrument: &str,
        period: Period,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Bar>, TradetermError> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    source = self.inner.name(),
                    instrument,
                    %period,
                    attempt,
                    error = last_error.as_deref().unwrap_or(""),
                    "retrying remote fetch"
                );
                std::thread::sleep(self.config.retry_delay);
            }

            self.wait_for_slot();
            tracing::debug!(source = self.inner.name(), instrument, %period, %from, %to, "remote fetch");

            match self.inner.fetch(instrument, period, from, to) {
                Ok(bars) => return Ok(bars),
                Err(TradetermError::Remote { reason }) => last_error = Some(reason),
                Err(other) => return Err(other),
            }
        }

        let attempts = self.config.max_retries + 1;
        let reason = last_error.unwrap_or_else(|| "no attempt made".into());
        tracing::error!(source = self.inner.name(), instrument, attempts, %reason, "remote fetch exhausted");
        Err(TradetermError::RemoteExhausted { attempts, reason })
    }
}
