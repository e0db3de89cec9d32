mod common;

use clientorg_core::model::{lock, shared};
use clientorg_core::repo::client_repo::{ClientRepository, SqliteClientRepository};
use clientorg_core::{Client, ClientPhoneNumber, RepoError, Repository, Session};
use common::{
    external_delete, external_phone_delete, external_rename, insert_client, insert_company,
    insert_meeting, phone_number_count, stored_first_name,
};
use std::sync::Arc;

fn repository(session: &Session) -> SqliteClientRepository {
    SqliteClientRepository::new(Arc::clone(session.connection()))
}

#[tokio::test]
async fn get_by_id_loads_phone_numbers_in_storage_order_and_keeps_identity() {
    let session = Session::in_memory().unwrap();
    let id = insert_client(session.connection(), "Ada", "Lovelace", &["111", "222"]);
    let repo = repository(&session);

    let client = repo.get_by_id(id).await.unwrap();
    {
        let client = lock(&client);
        assert_eq!(client.id, id);
        assert_eq!(client.row_version, 1);
        let numbers: Vec<String> = client
            .phone_numbers
            .iter()
            .map(|phone| lock(phone).number.clone())
            .collect();
        assert_eq!(numbers, ["111", "222"]);
    }
    assert!(!repo.has_changes());

    let again = repo.get_by_id(id).await.unwrap();
    assert!(Arc::ptr_eq(&client, &again));
}

#[tokio::test]
async fn get_by_id_of_missing_row_is_not_found() {
    let session = Session::in_memory().unwrap();
    let repo = repository(&session);

    let err = repo.get_by_id(42).await.unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity_type: "Client",
            id: 42
        }
    ));
}

#[tokio::test]
async fn added_client_is_inserted_with_its_phone_numbers() {
    let session = Session::in_memory().unwrap();
    let repo = repository(&session);

    let client = shared(Client::new());
    let phone = {
        let mut client = lock(&client);
        client.first_name = "Grace".to_string();
        client.push_phone_number(ClientPhoneNumber::new("+1 555 0100"))
    };
    repo.add(Arc::clone(&client));
    assert!(repo.has_changes());

    repo.save().await.unwrap();
    assert!(!repo.has_changes());

    let id = lock(&client).id;
    assert!(id > 0);
    assert_eq!(lock(&client).row_version, 1);
    assert_eq!(lock(&phone).client_id, id);
    assert_eq!(phone_number_count(session.connection(), id), 1);
}

#[tokio::test]
async fn editing_a_field_marks_changes_and_save_bumps_the_version() {
    let session = Session::in_memory().unwrap();
    let id = insert_client(session.connection(), "Ada", "Lovelace", &[]);
    let repo = repository(&session);
    let client = repo.get_by_id(id).await.unwrap();

    lock(&client).first_name = "Augusta".to_string();
    assert!(repo.has_changes());

    repo.save().await.unwrap();
    assert!(!repo.has_changes());
    assert_eq!(lock(&client).row_version, 2);
    assert_eq!(
        stored_first_name(session.connection(), id).as_deref(),
        Some("Augusta")
    );
}

#[tokio::test]
async fn stale_write_reports_conflict_with_database_values() {
    let session = Session::in_memory().unwrap();
    let id = insert_client(session.connection(), "Ada", "Lovelace", &[]);
    let mine = repository(&session);
    let theirs = repository(&session);

    let my_client = mine.get_by_id(id).await.unwrap();
    let their_client = theirs.get_by_id(id).await.unwrap();
    lock(&their_client).first_name = "Theirs".to_string();
    theirs.save().await.unwrap();

    lock(&my_client).first_name = "Mine".to_string();
    let err = mine.save().await.unwrap_err();
    let RepoError::ConcurrencyConflict(conflict) = err else {
        panic!("expected a concurrency conflict, got {err}");
    };
    assert!(!conflict.is_deleted_in_store());
    let entry = &conflict.entries[0];
    assert_eq!(entry.id, id);
    assert_eq!(entry.original_values["first_name"], "Ada");
    let database = entry.database_values.as_ref().unwrap();
    assert_eq!(database["first_name"], "Theirs");
    assert_eq!(database["row_version"], 2);

    assert_eq!(lock(&my_client).row_version, 1, "failed save keeps the old version");
    assert!(mine.has_changes());
}

#[tokio::test]
async fn refreshing_original_values_lets_the_next_save_overwrite() {
    let session = Session::in_memory().unwrap();
    let id = insert_client(session.connection(), "Ada", "Lovelace", &[]);
    let repo = repository(&session);
    let client = repo.get_by_id(id).await.unwrap();

    external_rename(session.connection(), id, "Theirs");
    lock(&client).first_name = "Mine".to_string();
    assert!(repo.save().await.is_err());

    repo.refresh_original_values(id).await.unwrap();
    repo.save().await.unwrap();

    assert_eq!(
        stored_first_name(session.connection(), id).as_deref(),
        Some("Mine")
    );
    assert_eq!(lock(&client).row_version, 3);
}

#[tokio::test]
async fn conflict_on_remotely_deleted_row_has_no_database_values() {
    let session = Session::in_memory().unwrap();
    let id = insert_client(session.connection(), "Ada", "Lovelace", &[]);
    let repo = repository(&session);
    let client = repo.get_by_id(id).await.unwrap();

    external_delete(session.connection(), id);
    lock(&client).first_name = "Mine".to_string();

    match repo.save().await {
        Err(RepoError::ConcurrencyConflict(conflict)) => {
            assert!(conflict.is_deleted_in_store());
            assert_eq!(conflict.entries[0].database_values, None);
        }
        other => panic!("expected a concurrency conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn editing_a_phone_number_deleted_elsewhere_is_a_conflict() {
    let session = Session::in_memory().unwrap();
    let id = insert_client(session.connection(), "Ada", "Lovelace", &["111", "222"]);
    let repo = repository(&session);
    let client = repo.get_by_id(id).await.unwrap();

    external_phone_delete(session.connection(), id, "111");
    {
        let mut client = lock(&client);
        client.first_name = "Augusta".to_string();
        lock(&client.phone_numbers[0]).number = "333".to_string();
    }

    let err = repo.save().await.unwrap_err();
    let RepoError::ConcurrencyConflict(conflict) = err else {
        panic!("expected a concurrency conflict, got {err}");
    };
    assert!(!conflict.is_deleted_in_store());
    let database = conflict.entries[0].database_values.as_ref().unwrap();
    assert_eq!(database["row_version"], 1);
    assert_eq!(database["phone_numbers"].as_array().unwrap().len(), 1);

    assert_eq!(
        stored_first_name(session.connection(), id).as_deref(),
        Some("Ada"),
        "nothing of the stale write is committed"
    );
    assert_eq!(phone_number_count(session.connection(), id), 1);
    assert_eq!(lock(&client).row_version, 1);
    assert!(repo.has_changes());
}

#[tokio::test]
async fn reload_discards_in_memory_edits() {
    let session = Session::in_memory().unwrap();
    let id = insert_client(session.connection(), "Ada", "Lovelace", &["111"]);
    let repo = repository(&session);
    let client = repo.get_by_id(id).await.unwrap();

    external_rename(session.connection(), id, "Theirs");
    lock(&client).first_name = "Mine".to_string();
    let phone = lock(&client).phone_numbers[0].clone();
    repo.remove_phone_number(&phone);
    assert!(repo.has_changes());

    repo.reload(id).await.unwrap();
    assert!(!repo.has_changes());
    let client = lock(&client);
    assert_eq!(client.first_name, "Theirs");
    assert_eq!(client.row_version, 2);
    assert_eq!(client.phone_numbers.len(), 1);
}

#[tokio::test]
async fn removed_phone_number_is_deleted_on_save() {
    let session = Session::in_memory().unwrap();
    let id = insert_client(session.connection(), "Ada", "Lovelace", &["111", "222"]);
    let repo = repository(&session);
    let client = repo.get_by_id(id).await.unwrap();

    let phone = lock(&client).phone_numbers[0].clone();
    repo.remove_phone_number(&phone);
    assert!(lock(&client).detach_phone_number(&phone));
    assert!(repo.has_changes());

    repo.save().await.unwrap();
    assert_eq!(phone_number_count(session.connection(), id), 1);
    assert!(!repo.has_changes());
}

#[tokio::test]
async fn constraint_violation_is_a_validation_error_and_rolls_back_keys() {
    let session = Session::in_memory().unwrap();
    let repo = repository(&session);

    let client = shared(Client::new());
    {
        let mut client = lock(&client);
        client.first_name = "Ada".to_string();
        client.company_id = Some(999);
    }
    repo.add(Arc::clone(&client));

    let err = repo.save().await.unwrap_err();
    assert!(matches!(err, RepoError::Validation { entity_type: "Client", .. }));
    assert_eq!(lock(&client).id, 0);
    assert!(repo.has_changes());

    let company_id = insert_company(session.connection(), "Initech");
    lock(&client).company_id = Some(company_id);
    repo.save().await.unwrap();
    assert!(lock(&client).id > 0);
}

#[tokio::test]
async fn removed_client_is_deleted_with_its_phone_numbers() {
    let session = Session::in_memory().unwrap();
    let id = insert_client(session.connection(), "Ada", "Lovelace", &["111"]);
    let repo = repository(&session);
    let client = repo.get_by_id(id).await.unwrap();

    repo.remove(&client);
    repo.save().await.unwrap();

    assert_eq!(stored_first_name(session.connection(), id), None);
    assert_eq!(phone_number_count(session.connection(), id), 0);
    assert!(matches!(
        repo.get_by_id(id).await,
        Err(RepoError::NotFound { .. })
    ));
}

#[tokio::test]
async fn has_meetings_reflects_participation() {
    let session = Session::in_memory().unwrap();
    let busy = insert_client(session.connection(), "Ada", "Lovelace", &[]);
    let idle = insert_client(session.connection(), "Grace", "Hopper", &[]);
    insert_meeting(session.connection(), "Kickoff", &[busy]);
    let repo = repository(&session);

    assert!(repo.has_meetings(busy).await.unwrap());
    assert!(!repo.has_meetings(idle).await.unwrap());
}
