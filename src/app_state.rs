//! Implements a struct that holds the state of the server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, db::initialize, timezone::get_local_offset};

/// The state of the server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The local timezone as a canonical timezone name, e.g. "Asia/Karachi".
    pub local_timezone: String,

    /// The name shown on the dashboard and at the top of loan statements.
    pub organisation_name: String,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for
    /// donors, loans and expenses, and loan returns. `local_timezone` should be
    /// a valid, canonical timezone name, e.g. "Asia/Karachi".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the timezone
    /// is not known.
    pub fn new(
        db_connection: Connection,
        local_timezone: &str,
        organisation_name: &str,
    ) -> Result<Self, Error> {
        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(local_timezone.to_owned()));
        }

        initialize(&db_connection)?;

        Ok(Self {
            local_timezone: local_timezone.to_owned(),
            organisation_name: organisation_name.to_owned(),
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}

#[cfg(test)]
mod app_state_tests {
    use rusqlite::Connection;

    use crate::Error;

    use super::AppState;

    #[test]
    fn rejects_unknown_timezone() {
        let connection = Connection::open_in_memory().unwrap();

        let result = AppState::new(connection, "Mars/Olympus_Mons", "Test Foundation");

        assert_eq!(
            result.map(|state| state.local_timezone),
            Err(Error::InvalidTimezoneError("Mars/Olympus_Mons".to_owned()))
        );
    }

    #[test]
    fn initializes_database() {
        let connection = Connection::open_in_memory().unwrap();

        let state = AppState::new(connection, "Asia/Karachi", "Test Foundation").unwrap();

        let connection = state.db_connection.lock().unwrap();
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM loan_return", (), |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
