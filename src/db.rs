//! Sets up the application's database.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    donor::create_donor_table, finance::create_finance_record_table,
    ledger::create_loan_return_table,
};

/// Create the tables for donors, loans and expenses, and loan returns.
///
/// Foreign keys are switched on for `connection` so that a loan with returns
/// cannot be removed out from under its ledger. Calling this on a database
/// that is already set up is a no-op.
///
/// # Errors
/// Returns an error if a table cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_donor_table(&transaction)?;
    create_finance_record_table(&transaction)?;
    create_loan_return_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::finance::test_helpers::insert_loan;

    use super::initialize;

    fn table_names(connection: &Connection) -> Vec<String> {
        connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map((), |row| row.get(0))
            .unwrap()
            .map(|name| name.unwrap())
            .collect()
    }

    #[test]
    fn creates_tables() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        assert_eq!(
            table_names(&connection),
            ["donor", "finance_record", "loan_return"]
        );
    }

    #[test]
    fn can_initialize_twice() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        assert_eq!(initialize(&connection), Ok(()));
    }

    #[test]
    fn loan_with_returns_cannot_be_deleted() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let loan = insert_loan("Imran", None, "100", date!(2025 - 01 - 01), &connection);
        connection
            .execute(
                "INSERT INTO loan_return (loan_id, return_date, return_amount,
                    remaining_after_return, created_at)
                VALUES (?1, '2025-01-02', '10', '90', '2025-01-02 00:00:00.0 +00:00:00')",
                [loan.id],
            )
            .unwrap();

        let result = connection.execute("DELETE FROM finance_record WHERE id = ?1", [loan.id]);

        assert!(result.is_err());
    }
}
