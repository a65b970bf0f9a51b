//! Domain model for the run control plane: the [`Run`] aggregate and the
//! error taxonomy it's built on (spec §3.1, §7).

pub mod error;
pub mod run;

pub use error::{Result, RunplaneError};
pub use run::{
    CapabilitiesMode, NewRun, RepoDescriptor, Run, RunState, StateHistoryEntry, RUN_SCHEMA_VERSION,
};
