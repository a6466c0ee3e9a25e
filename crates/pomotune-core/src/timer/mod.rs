mod accounting;
mod clock;
mod driver;
mod engine;
mod phase;
mod reconciler;
mod snapshot;
mod time_source;

pub use accounting::SessionAccounting;
pub use clock::{PhaseClock, TickOutcome};
pub use driver::{Command, DriverHandle, DriverSettings, NotificationAction, TimerDriver};
pub use engine::{TimerEngine, DEFAULT_RESTORE_DEBOUNCE_MS};
pub use phase::{Phase, RunState, SessionKind, TimerSettings};
pub use reconciler::{pick_freshest, reconcile, CrossedBoundary, Restoration};
pub use snapshot::TimerSnapshot;
pub use time_source::{Clock, ManualClock, SystemClock};
