//! Domain Layer - pairs, spreads, positions, and the paper account
//!
//! Pure state and value types with no I/O. All external interaction happens
//! through the ports layer; the ledger here is the single owner of mutable
//! account state.

pub mod ledger;
pub mod pair;
pub mod persistence;
pub mod position;
pub mod series;
pub mod signal;
pub mod spread;

pub use ledger::{AccountSummary, ClosedTrade, Ledger, LedgerError, LedgerStats, OpenRecord, TradeEvent};
pub use pair::{Pair, PairError};
pub use persistence::{LedgerSnapshot, PersistError};
pub use position::{PnlModel, Position, PositionError};
pub use series::{PricePoint, PriceSeries, SeriesError};
pub use signal::{CloseReason, Direction, OpenOrigin, Signal};
pub use spread::SpreadTransform;
