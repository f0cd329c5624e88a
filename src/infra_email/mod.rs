mod console_email_dispatcher;

pub use console_email_dispatcher::*;
