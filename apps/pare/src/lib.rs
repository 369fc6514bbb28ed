//! # pare
//!
//! The async half of the reducer: everything that runs or waits on the
//! interestingness test.
//!
//! - [`oracle`]: the Oracle Invoker (external process, timeout, verdict cache)
//! - [`bisect`]: the Chunk Bisector (ddmin with concurrent trials)
//! - [`session`]: the Session Driver (rounds to a fixpoint, budget)
//! - [`config`], [`error`], [`report`]: ambient types shared with the CLI
//!
//! The artifact model, repair and passes live in `pare-core`.

pub mod bisect;
pub mod budget;
pub mod config;
pub mod error;
pub mod oracle;
pub mod report;
pub mod session;

pub use bisect::{BisectOutcome, Bisector, TrialStats};
pub use budget::Budget;
pub use config::{OracleConfig, ReduceConfig};
pub use error::{InfraFailure, SetupError};
pub use oracle::{ExternalOracle, Oracle, PredicateOracle, Verdict};
pub use report::{PassReport, RoundReport, SessionReport, SessionState};
pub use session::{Progress, Session, SessionOptions};
