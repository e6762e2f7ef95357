//! Fits a candidate range into the duration window by dropping whole verses
//! from the tail.

use crate::error::Rejection;
use crate::verse::VerseRange;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationBounds {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DurationBounds {
    pub fn new(min_secs: f64, max_secs: f64) -> Option<Self> {
        let valid = min_secs.is_finite() && max_secs.is_finite() && min_secs > 0.0 && min_secs < max_secs;
        valid.then_some(Self { min_secs, max_secs })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Adapted<T> {
    pub range: VerseRange,
    pub items: Vec<T>,
    pub durations: Vec<f64>,
    pub total_secs: f64,
}

impl<T> Adapted<T> {
    pub fn trimmed_from(&self, original: &VerseRange) -> u32 {
        original.end() - self.range.end()
    }
}

/// Drops trailing verses while the total exceeds `bounds.max_secs` and more
/// than one verse remains, then rejects the result if it is shorter than
/// `bounds.min_secs`.
///
/// `items[i]` and `durations[i]` describe verse `range.start() + i`. A single
/// verse longer than the maximum is kept as is: the result is never empty,
/// so it may exceed the cap by one verse's worth of audio.
pub fn adapt<T: Clone>(
    range: VerseRange,
    items: &[T],
    durations: &[f64],
    bounds: DurationBounds,
) -> Result<Adapted<T>, Rejection> {
    debug_assert_eq!(items.len(), durations.len());
    let available = items.len().min(durations.len()).min(range.verse_count());

    let mut keep = available;
    let mut total: f64 = durations[..keep].iter().sum();
    while total > bounds.max_secs && keep > 1 {
        keep -= 1;
        total -= durations[keep];
        crate::logi(format!(
            "Duration {:.1}s over {:.1}s; dropping verse {}:{}",
            total + durations[keep],
            bounds.max_secs,
            range.chapter(),
            range.start() as usize + keep
        ));
    }
    // Re-sum so float drift from repeated subtraction cannot flip a bound.
    let total: f64 = durations[..keep].iter().sum();

    let trimmed = if keep == 0 {
        range
    } else {
        range
            .with_end(range.start() + keep as u32 - 1)
            .unwrap_or(range)
    };

    if keep == 0 || total < bounds.min_secs {
        return Err(Rejection::TooShort {
            range: trimmed,
            total,
            min: bounds.min_secs,
        });
    }

    Ok(Adapted {
        range: trimmed,
        items: items[..keep].to_vec(),
        durations: durations[..keep].to_vec(),
        total_secs: total,
    })
}
