mod store;

pub use store::*;

// ledgers

mod email_verification_ledger;
mod login_attempt_guard;
mod revocation_ledger;

pub use email_verification_ledger::*;
pub use login_attempt_guard::*;
pub use revocation_ledger::*;

// repo

mod principal_repo;

pub use principal_repo::*;

// outbound

mod email_dispatcher;

pub use email_dispatcher::*;
