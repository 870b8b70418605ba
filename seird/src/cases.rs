//! Cumulative case history to daily new cases, and back.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Dates paired with counts. The date type is whatever the caller uses; it is
/// passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseHistory<D> {
    pub dates: Vec<D>,
    pub counts: Vec<i64>,
}

impl<D> CaseHistory<D> {
    pub fn new(dates: Vec<D>, counts: Vec<i64>) -> Result<Self> {
        let h = Self { dates, counts };
        h.check()?;
        Ok(h)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn check(&self) -> Result<()> {
        if self.dates.len() != self.counts.len() {
            return Err(Error::MalformedSeries(format!(
                "{} dates but {} counts",
                self.dates.len(),
                self.counts.len()
            )));
        }
        if self.counts.is_empty() {
            return Err(Error::MalformedSeries("series is empty".to_string()));
        }
        Ok(())
    }
}

/// First differences of a cumulative series; the first value is kept as is.
///
/// Decreasing cumulative totals produce negative daily counts. They are passed
/// through uncorrected.
pub fn daily_new_cases<D: Clone>(cumulative: &CaseHistory<D>) -> Result<CaseHistory<D>> {
    cumulative.check()?;
    let c = &cumulative.counts;

    let mut daily = Vec::with_capacity(c.len());
    daily.push(c[0]);
    for (k, w) in c.windows(2).enumerate() {
        let d = w[1]
            .checked_sub(w[0])
            .ok_or_else(|| Error::MalformedSeries(format!("difference overflows at index {}", k + 1)))?;
        daily.push(d);
    }

    let negative = daily.iter().skip(1).filter(|d| **d < 0).count();
    if negative > 0 {
        warn!(negative, "cumulative series decreases; emitting negative daily counts");
    }

    Ok(CaseHistory {
        dates: cumulative.dates.clone(),
        counts: daily,
    })
}

/// Running sum of a daily series. [`daily_new_cases`] undoes it exactly.
pub fn cumulative<D: Clone>(daily: &CaseHistory<D>) -> Result<CaseHistory<D>> {
    daily.check()?;
    let mut total: i64 = 0;
    let mut counts = Vec::with_capacity(daily.len());
    for (k, d) in daily.counts.iter().enumerate() {
        total = total
            .checked_add(*d)
            .ok_or_else(|| Error::MalformedSeries(format!("running sum overflows at index {}", k)))?;
        counts.push(total);
    }
    Ok(CaseHistory {
        dates: daily.dates.clone(),
        counts,
    })
}
