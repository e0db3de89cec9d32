mod common;

use clientorg_core::model::{lock, shared};
use clientorg_core::repo::lookup_repo::LookupDataService;
use clientorg_core::repo::meeting_repo::MeetingRepository;
use clientorg_core::{Company, LookupItem, Meeting, RepoError, Repository, Session};
use common::{insert_client, insert_company};
use std::sync::Arc;

#[tokio::test]
async fn meeting_with_participants_round_trips() {
    let session = Session::in_memory().unwrap();
    let ada = insert_client(session.connection(), "Ada", "Lovelace", &[]);
    let grace = insert_client(session.connection(), "Grace", "Hopper", &[]);
    let repo = session.meeting_repository();

    let meeting = shared(Meeting::new("Kickoff", 1_000, 2_000));
    lock(&meeting).add_client(grace);
    lock(&meeting).add_client(ada);
    lock(&meeting).add_client(ada);
    repo.add(Arc::clone(&meeting));
    repo.save().await.unwrap();
    let id = lock(&meeting).id;

    let reader = session.meeting_repository();
    let loaded = reader.get_by_id(id).await.unwrap();
    let loaded = lock(&loaded);
    assert_eq!(loaded.title, "Kickoff");
    assert_eq!(loaded.client_ids, [ada, grace]);
}

#[tokio::test]
async fn removing_a_participant_keeps_the_client() {
    let session = Session::in_memory().unwrap();
    let ada = insert_client(session.connection(), "Ada", "Lovelace", &[]);
    let repo = session.meeting_repository();

    let meeting = shared(Meeting::new("Review", 0, 10));
    lock(&meeting).add_client(ada);
    repo.add(Arc::clone(&meeting));
    repo.save().await.unwrap();

    lock(&meeting).remove_client(ada);
    assert!(repo.has_changes());
    repo.save().await.unwrap();

    assert_eq!(lock(&meeting).row_version, 2);
    let clients = repo.get_all_clients().await.unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].id, ada);
}

#[tokio::test]
async fn end_before_start_is_rejected_by_the_store() {
    let session = Session::in_memory().unwrap();
    let repo = session.meeting_repository();

    repo.add(shared(Meeting::new("Backwards", 10, 5)));
    let err = repo.save().await.unwrap_err();
    assert!(matches!(err, RepoError::Validation { entity_type: "Meeting", .. }));
}

#[tokio::test]
async fn companies_are_listed_by_name() {
    let session = Session::in_memory().unwrap();
    insert_company(session.connection(), "Initech");
    insert_company(session.connection(), "Globex");
    let repo = session.company_repository();

    let added = shared(Company::new("Acme"));
    repo.add(Arc::clone(&added));
    repo.save().await.unwrap();

    let names: Vec<String> = repo
        .get_all()
        .await
        .unwrap()
        .iter()
        .map(|company| lock(company).name.clone())
        .collect();
    assert_eq!(names, ["Acme", "Globex", "Initech"]);

    let acme = repo.get_by_id(lock(&added).id).await.unwrap();
    assert!(Arc::ptr_eq(&acme, &added));
}

#[tokio::test]
async fn lookups_return_labels_without_null_item() {
    let session = Session::in_memory().unwrap();
    let initech = insert_company(session.connection(), "Initech");
    let ada = insert_client(session.connection(), "Ada", "Lovelace", &[]);
    let grace = insert_client(session.connection(), "Grace", "Hopper", &[]);
    let lookups = session.lookups();

    assert_eq!(
        lookups.company_lookup().await.unwrap(),
        [LookupItem::new(initech, "Initech")]
    );
    assert_eq!(
        lookups.client_lookup().await.unwrap(),
        [
            LookupItem::new(grace, "Grace Hopper"),
            LookupItem::new(ada, "Ada Lovelace"),
        ]
    );
}
