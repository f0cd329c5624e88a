mod principal_repo_mysql;

pub use principal_repo_mysql::*;

mod util;
