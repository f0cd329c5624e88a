mod ttl_store;

pub use ttl_store::*;

mod email_verification_ledger_memory;
mod login_attempt_guard_memory;
mod revocation_ledger_memory;

pub use email_verification_ledger_memory::*;
pub use login_attempt_guard_memory::*;
pub use revocation_ledger_memory::*;

mod principal_repo_memory;

pub use principal_repo_memory::*;

mod email_dispatcher_recording;

pub use email_dispatcher_recording::*;
