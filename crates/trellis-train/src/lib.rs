pub mod doublecheck;
pub mod resolve;
pub mod session;
pub mod synth;

pub use doublecheck::{CheckOutcome, DoubleCheckPass};
pub use resolve::{resolve, resolve_locator};
pub use session::{SessionError, SessionPhase, TrainingSession, UiEffect, UtilityMode};
pub use synth::{synthesize, LabelObservation};
