//! Dependency-ordered deletion.
//!
//! Transactions reference both categories and subcategories, and
//! subcategories reference categories, so removal must always run from the
//! referencing rows towards the referenced ones: transaction, then
//! subcategory, then category, then user. The schema carries no `ON DELETE`
//! actions; a wrong order fails with a foreign-key violation instead of
//! silently cascading.

use rusqlite::{Connection, OptionalExtension};

use crate::{
    Error,
    category::get_owned_category,
    database_id::{CategoryId, SubcategoryId, UserId},
    subcategory::get_owned_subcategory,
};

/// Delete an owned subcategory, detaching it from any transactions first.
///
/// Transactions that referenced the subcategory remain, with their
/// subcategory cleared; the subcategory reference is optional so this is
/// non-destructive.
///
/// # Errors
/// This function will return an [Error::SubcategoryNotFound] if `id` does not
/// refer to a subcategory owned by the user, or an [Error::SqlError] if there
/// is some other SQL error.
pub fn delete_subcategory(
    username: &str,
    id: SubcategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    let subcategory = get_owned_subcategory(username, id, connection)?;

    let sql_transaction = connection.unchecked_transaction()?;

    sql_transaction.execute(
        "UPDATE tx SET subcategory_id = NULL WHERE subcategory_id = ?1",
        [subcategory.id],
    )?;
    sql_transaction.execute("DELETE FROM subcategory WHERE id = ?1", [subcategory.id])?;

    sql_transaction.commit()?;

    tracing::debug!("deleted subcategory {id} for {username}");

    Ok(())
}

/// Delete an owned category together with its subcategories and the user's
/// transactions under it.
///
/// This is destructive to the category's transactions: the category reference
/// is mandatory on a transaction and cannot be cleared.
///
/// # Errors
/// This function will return an [Error::CategoryNotFound] if `id` does not
/// refer to a category owned by the user, or an [Error::SqlError] if there is
/// some other SQL error.
pub fn delete_category(
    username: &str,
    id: CategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    let category = get_owned_category(username, id, connection)?;

    let sql_transaction = connection.unchecked_transaction()?;

    let transactions_deleted = sql_transaction.execute(
        "DELETE FROM tx WHERE category_id = ?1 AND user_id = ?2",
        (category.id, category.user_id),
    )?;
    sql_transaction.execute(
        "DELETE FROM subcategory WHERE category_id = ?1",
        [category.id],
    )?;
    sql_transaction.execute("DELETE FROM category WHERE id = ?1", [category.id])?;

    sql_transaction.commit()?;

    tracing::debug!(
        "deleted category {id} for {username} along with {transactions_deleted} transactions"
    );

    Ok(())
}

/// Delete a user and everything they own.
///
/// Rows are removed strictly in dependency order: transactions, then
/// subcategories, then categories, then the user row. Deleting a user that
/// does not exist is a no-op, so the operation is idempotent.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn delete_user(user_id: UserId, connection: &Connection) -> Result<(), Error> {
    let exists = connection
        .prepare("SELECT id FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id)], |row| row.get::<_, UserId>(0))
        .optional()?;

    if exists.is_none() {
        tracing::debug!("delete of user {user_id} skipped, no such user");
        return Ok(());
    }

    let sql_transaction = connection.unchecked_transaction()?;

    sql_transaction.execute("DELETE FROM tx WHERE user_id = ?1", [user_id])?;
    sql_transaction.execute(
        "DELETE FROM subcategory WHERE category_id IN \
         (SELECT id FROM category WHERE user_id = ?1)",
        [user_id],
    )?;
    sql_transaction.execute("DELETE FROM category WHERE user_id = ?1", [user_id])?;
    sql_transaction.execute("DELETE FROM user WHERE id = ?1", [user_id])?;

    sql_transaction.commit()?;

    tracing::debug!("deleted user {user_id} and all owned rows");

    Ok(())
}

#[cfg(test)]
mod cascade_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        cascade::{delete_category, delete_subcategory, delete_user},
        category::{Category, CategoryName, create_category, get_owned_category, list_categories},
        db::initialize,
        money::Amount,
        subcategory::{
            Subcategory, SubcategoryName, create_subcategory, get_owned_subcategory,
            list_subcategories,
        },
        transaction::{
            Transaction, TransactionDraft, TransactionKind, create_transaction,
            get_owned_transaction, list_transactions,
        },
        user::{get_user, register_user},
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    fn setup_user_with_data(
        username: &str,
        connection: &Connection,
    ) -> (Category, Subcategory, Transaction) {
        register_user(username, "hash", connection).expect("Could not register user");
        let category = create_category(
            username,
            CategoryName::new_unchecked("Food"),
            TransactionKind::Expense,
            connection,
        )
        .expect("Could not create category");
        let subcategory = create_subcategory(
            username,
            category.id,
            SubcategoryName::new_unchecked("Lunch"),
            connection,
        )
        .expect("Could not create subcategory");
        let transaction = create_transaction(
            username,
            TransactionDraft {
                kind: TransactionKind::Expense,
                amount: "20.00".parse::<Amount>().unwrap(),
                date: date!(2024 - 02 - 01),
                note: None,
            },
            category.id,
            Some(subcategory.id),
            connection,
        )
        .expect("Could not create transaction");

        (category, subcategory, transaction)
    }

    #[test]
    fn delete_subcategory_detaches_transactions() {
        let connection = get_test_connection();
        let (_, subcategory, transaction) = setup_user_with_data("alice", &connection);

        delete_subcategory("alice", subcategory.id, &connection)
            .expect("Could not delete subcategory");

        let lookup = get_owned_subcategory("alice", subcategory.id, &connection);
        assert_eq!(lookup, Err(Error::SubcategoryNotFound));

        let remaining = get_owned_transaction("alice", transaction.id, &connection)
            .expect("Transaction should survive subcategory deletion");
        assert_eq!(remaining.subcategory_id, None);
    }

    #[test]
    fn delete_category_removes_transactions_and_subcategories() {
        let connection = get_test_connection();
        let (category, subcategory, transaction) = setup_user_with_data("alice", &connection);

        delete_category("alice", category.id, &connection).expect("Could not delete category");

        assert_eq!(
            get_owned_category("alice", category.id, &connection),
            Err(Error::CategoryNotFound)
        );
        assert_eq!(
            get_owned_subcategory("alice", subcategory.id, &connection),
            Err(Error::SubcategoryNotFound)
        );
        assert_eq!(
            get_owned_transaction("alice", transaction.id, &connection),
            Err(Error::TransactionNotFound)
        );
    }

    #[test]
    fn delete_category_fails_for_other_user() {
        let connection = get_test_connection();
        let (category, _, _) = setup_user_with_data("alice", &connection);
        register_user("bob", "hash", &connection).unwrap();

        let result = delete_category("bob", category.id, &connection);

        assert_eq!(result, Err(Error::CategoryNotFound));
    }

    #[test]
    fn delete_user_removes_all_owned_rows() {
        let connection = get_test_connection();
        register_user("bob", "hash", &connection).expect("Could not register user");
        let user = crate::user::get_user_by_username("bob", &connection).unwrap();

        // 3 categories, 5 subcategories, 40 transactions.
        let mut category_ids = Vec::new();
        for (index, name) in ["Food", "Transport", "Rent"].iter().enumerate() {
            let category = create_category(
                "bob",
                CategoryName::new_unchecked(name),
                TransactionKind::Expense,
                &connection,
            )
            .unwrap();
            if index < 2 {
                for suffix in ["A", "B"] {
                    create_subcategory(
                        "bob",
                        category.id,
                        SubcategoryName::new_unchecked(&format!("{name} {suffix}")),
                        &connection,
                    )
                    .unwrap();
                }
            } else {
                create_subcategory(
                    "bob",
                    category.id,
                    SubcategoryName::new_unchecked("Misc"),
                    &connection,
                )
                .unwrap();
            }
            category_ids.push(category.id);
        }
        for index in 0..40 {
            create_transaction(
                "bob",
                TransactionDraft {
                    kind: TransactionKind::Expense,
                    amount: "5.00".parse::<Amount>().unwrap(),
                    date: date!(2024 - 02 - 01),
                    note: None,
                },
                category_ids[index % 3],
                None,
                &connection,
            )
            .unwrap();
        }

        delete_user(user.id, &connection).expect("Could not delete user");

        assert_eq!(get_user(user.id, &connection), Err(Error::NotFound));
        assert!(list_transactions("bob", &connection).unwrap().is_empty());
        assert!(list_categories("bob", &connection).unwrap().is_empty());
        for category_id in category_ids {
            assert!(
                list_subcategories("bob", category_id, &connection)
                    .unwrap()
                    .is_empty()
            );
        }

        // Second call is an idempotent no-op.
        delete_user(user.id, &connection).expect("Repeated delete should succeed");
    }

    #[test]
    fn delete_user_is_a_noop_for_unknown_id() {
        let connection = get_test_connection();

        let result = delete_user(12345, &connection);

        assert_eq!(result, Ok(()));
    }

    #[test]
    fn deleting_referenced_rows_out_of_order_violates_foreign_keys() {
        let connection = get_test_connection();
        let (category, _, _) = setup_user_with_data("alice", &connection);

        // Removing the category while its transactions and subcategories
        // still exist must be rejected by the schema.
        let result = connection.execute("DELETE FROM category WHERE id = ?1", [category.id]);

        assert!(result.is_err());
    }
}
