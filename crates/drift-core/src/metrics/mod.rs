//! Metric events for storage and merge progress.
//!
//! Events are recorded through the `metrics` facade. Nothing is exported
//! unless the embedding application installs a recorder.

pub mod events;

/// Macro for emitting metric events.
///
/// Calls `InternalEvent::emit()` on the given event, which records the
/// corresponding counter, gauge or histogram.
///
/// # Example
///
/// ```ignore
/// use drift_core::metrics::events::RowsMerged;
///
/// emit!(RowsMerged { count: 100, target: "merged.csv".to_string() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

// Re-export the macro at crate root
pub use emit;
