use sqlx::mysql::MySqlDatabaseError;

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == 1062; // ER_DUP_ENTRY
        }
    }

    false
}

/// Which unique column a duplicate-key error tripped, from the index name
/// in the server message.
pub fn dup_key_field(err: &sqlx::Error) -> Option<&'static str> {
    if !is_dup_key(err) {
        return None;
    }
    let message = err.to_string();
    if message.contains("email") {
        Some("email")
    } else {
        Some("username")
    }
}
