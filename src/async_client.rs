//! Async wrapper around [`PriceTimeline`] for use in async runtimes (Tokio, etc.).
//!
//! Runs all engine operations on a blocking thread pool via
//! [`tokio::task::spawn_blocking`], keeping the async event loop free.
//! Store fetches are the only I/O; the event engine itself is CPU-bound and
//! fast.
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use price_timeline::{AsyncPriceTimeline, PriceTimeline};
//!
//! # async fn example() -> price_timeline::Result<()> {
//! let engine = AsyncPriceTimeline::build(
//!     PriceTimeline::builder().export_base("https://example.com/exports"),
//! )
//! .await?;
//!
//! let today = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
//! let answer = engine.ask("품절된 제품 알려줘", today).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::ask;
use crate::error::{Result, TimelineError};
use crate::models::{Answer, DiscountPeriod, Timeline};
use crate::{PriceTimeline, PriceTimelineBuilder};

/// Async wrapper around [`PriceTimeline`].
///
/// All operations are dispatched to a blocking thread pool. The underlying
/// engine is protected by a [`Mutex`] since it uses `RefCell` internally.
pub struct AsyncPriceTimeline {
    inner: Arc<Mutex<PriceTimeline>>,
}

impl AsyncPriceTimeline {
    /// Build the engine from a configured builder on the blocking pool.
    pub async fn build(builder: PriceTimelineBuilder) -> Result<Self> {
        tokio::task::spawn_blocking(move || {
            let engine = builder.build()?;
            Ok(AsyncPriceTimeline {
                inner: Arc::new(Mutex::new(engine)),
            })
        })
        .await
        .map_err(|e| TimelineError::InvalidArgument(format!("Task join error: {e}")))?
    }

    /// Run a sync engine operation on the blocking thread pool.
    ///
    /// ```no_run
    /// # use price_timeline::{AsyncPriceTimeline, PriceTimeline};
    /// # async fn example() -> price_timeline::Result<()> {
    /// # let engine = AsyncPriceTimeline::build(PriceTimeline::builder()).await?;
    /// let products = engine.run(|e| e.catalog()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&PriceTimeline) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = engine
                .lock()
                .map_err(|_| TimelineError::InvalidArgument("engine lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| TimelineError::InvalidArgument(format!("Task join error: {e}")))?
    }

    /// Answer a question, resolving delegations through the fallback answerer.
    ///
    /// The engine lock is released before the fallback is consulted, so a
    /// slow answerer never holds up other queries.
    pub async fn ask(&self, question: &str, today: NaiveDate) -> Result<Answer> {
        let question = question.to_string();
        let (answer, fallback) = self
            .run(move |e| Ok((e.ask(&question, today)?, e.fallback())))
            .await?;
        if !answer.is_delegated() || fallback.is_none() {
            return Ok(answer);
        }
        tokio::task::spawn_blocking(move || ask::resolve(answer, fallback.as_deref()))
            .await
            .map_err(|e| TimelineError::InvalidArgument(format!("Task join error: {e}")))?
    }

    /// Timeline for one product.
    pub async fn timeline(&self, product_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Timeline> {
        let product_id = product_id.to_string();
        self.run(move |e| e.timeline(&product_id, from, to)).await
    }

    /// Discount periods for one product.
    pub async fn discount_periods(
        &self,
        product_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DiscountPeriod>> {
        let product_id = product_id.to_string();
        self.run(move |e| e.discount_periods(&product_id, from, to)).await
    }

    /// Drop cached snapshots and re-resolve tables.
    pub async fn refresh(&self) -> Result<()> {
        self.run(|e| {
            e.refresh();
            Ok(())
        })
        .await
    }
}
