use crate::application::CycleReport;
use crate::domain::TradeEvent;

/// Outbound report port.
///
/// Cycle reports and trade events fan out through this trait so the
/// engine has no dependency on any particular notification transport.
/// Implementations must return quickly; slow delivery belongs on the
/// adapter's own task, never inside the evaluation cycle.
pub trait ReportSink: Send + Sync {
    /// One structured report per completed evaluation cycle.
    fn cycle_report(&self, report: &CycleReport);

    /// One record per position open or close.
    fn trade_event(&self, event: &TradeEvent);
}
