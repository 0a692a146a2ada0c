pub mod recover;

// module-level API
pub use recover::{RecoverOptions, RecoverRules, RecoveryReport};
