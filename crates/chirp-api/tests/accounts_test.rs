//! Integration tests for registration, login and profile edits against an
//! in-memory store.

use chirp_api::{Store, StoreConfig, StoreError};
use chirp_types::api::{ProfileUpdate, RegistrationForm};
use chirp_types::events::StoreEvent;

fn store() -> Store {
    Store::open_in_memory(&StoreConfig::default().with_fast_hashing()).unwrap()
}

#[test]
fn register_returns_the_assigned_id() {
    let store = store();
    let ann = store.accounts().register("Ann", "ann@x.com", "pw1").unwrap();
    let bo = store.accounts().register("Bo", "bo@x.com", "pw2").unwrap();

    assert!(bo.id > ann.id);
    assert_eq!(ann.name, "Ann");
    assert!(ann.picture_ref.is_none() && ann.bio.is_none() && ann.address.is_none());
    assert_eq!(store.accounts().get_by_id(ann.id).unwrap(), Some(ann));
}

#[test]
fn duplicate_email_creates_no_row() {
    let store = store();
    store.accounts().register("Ann", "ann@x.com", "pw1").unwrap();
    let before = store.accounts().count().unwrap();

    let err = store.accounts().register("Eve", "ann@x.com", "pw3").unwrap_err();

    assert!(matches!(err, StoreError::DuplicateEmail));
    assert_eq!(store.accounts().count().unwrap(), before);
}

#[test]
fn empty_fields_are_invalid() {
    let store = store();
    assert!(matches!(
        store.accounts().register("", "a@x.com", "pw"),
        Err(StoreError::Invalid("name"))
    ));
    assert!(matches!(
        store.accounts().register("Ann", "  ", "pw"),
        Err(StoreError::Invalid("email"))
    ));
    assert!(matches!(
        store.accounts().register("Ann", "a@x.com", ""),
        Err(StoreError::Invalid("password"))
    ));
    assert_eq!(store.accounts().count().unwrap(), 0);
}

#[test]
fn form_requires_matching_passwords() {
    let store = store();
    let mut form = RegistrationForm {
        name: "Ann".into(),
        email: "ann@x.com".into(),
        password: "pw1".into(),
        confirm_password: "pw2".into(),
    };
    assert!(matches!(store.accounts().register_form(&form), Err(StoreError::PasswordMismatch)));

    form.confirm_password.clear();
    assert!(matches!(
        store.accounts().register_form(&form),
        Err(StoreError::Invalid("confirm_password"))
    ));

    form.confirm_password = "pw1".into();
    let ann = store.accounts().register_form(&form).unwrap();
    assert_eq!(ann.email, "ann@x.com");
}

#[test]
fn authenticate_checks_the_hash() {
    let store = store();
    let ann = store.accounts().register("Ann", "ann@x.com", "pw1").unwrap();

    assert_eq!(store.accounts().authenticate("ann@x.com", "pw1").unwrap().id, ann.id);
    assert!(matches!(
        store.accounts().authenticate("ann@x.com", "pw2"),
        Err(StoreError::InvalidCredentials)
    ));
    assert!(matches!(
        store.accounts().authenticate("nobody@x.com", "pw1"),
        Err(StoreError::InvalidCredentials)
    ));
    // Emails match exactly, case included
    assert!(matches!(
        store.accounts().authenticate("ANN@x.com", "pw1"),
        Err(StoreError::InvalidCredentials)
    ));
}

#[test]
fn password_is_not_stored_in_cleartext() {
    let store = store();
    let ann = store.accounts().register("Ann", "ann@x.com", "hunter2").unwrap();

    let row = store.database().get_user_by_id(ann.id).unwrap().unwrap();
    assert_ne!(row.password, "hunter2");
    assert!(row.password.starts_with("$argon2id$"));
}

#[test]
fn list_except_skips_the_viewer_and_sorts_by_name() {
    let store = store();
    let cy = store.accounts().register("Cy", "cy@x.com", "pw").unwrap();
    store.accounts().register("Bo", "bo@x.com", "pw").unwrap();
    store.accounts().register("Ann", "ann@x.com", "pw").unwrap();

    let names: Vec<String> = store
        .accounts()
        .list_except(cy.id)
        .unwrap()
        .into_iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(names, vec!["Ann", "Bo"]);

    let all: Vec<String> = store.accounts().list_all().unwrap().into_iter().map(|u| u.name).collect();
    assert_eq!(all, vec!["Cy", "Bo", "Ann"]);
}

#[test]
fn bio_update_leaves_other_fields_alone() {
    let store = store();
    let ann = store.accounts().register("Ann", "ann@x.com", "pw1").unwrap();
    let ann = store.accounts().update_picture(ann.id, "file:///ann.png").unwrap();

    let updated = store
        .accounts()
        .update_profile(ann.id, &ProfileUpdate { bio: Some("x".into()), ..Default::default() })
        .unwrap();

    let fetched = store.accounts().get_by_id(ann.id).unwrap().unwrap();
    assert_eq!(fetched, updated);
    assert_eq!(fetched.bio.as_deref(), Some("x"));
    assert_eq!(fetched.name, ann.name);
    assert_eq!(fetched.email, ann.email);
    assert_eq!(fetched.picture_ref, ann.picture_ref);
    assert_eq!(fetched.address, ann.address);
    assert_eq!(fetched.created_at, ann.created_at);

    // Credentials are untouched
    store.accounts().authenticate("ann@x.com", "pw1").unwrap();
}

#[test]
fn full_profile_edit() {
    let store = store();
    let ann = store.accounts().register("Ann", "ann@x.com", "pw1").unwrap();
    let update = ProfileUpdate {
        name: Some("Annie".into()),
        email: Some("annie@x.com".into()),
        bio: Some("hi there".into()),
        address: Some("1 Main St".into()),
        picture_ref: Some("content://media/42".into()),
    };

    let annie = store.accounts().update_profile(ann.id, &update).unwrap();
    assert_eq!(annie.name, "Annie");
    assert_eq!(annie.email, "annie@x.com");
    assert_eq!(annie.address.as_deref(), Some("1 Main St"));
    assert_eq!(annie.picture_ref.as_deref(), Some("content://media/42"));

    store.accounts().authenticate("annie@x.com", "pw1").unwrap();
}

#[test]
fn update_failures_are_distinguishable() {
    let store = store();
    let ann = store.accounts().register("Ann", "ann@x.com", "pw").unwrap();
    store.accounts().register("Bo", "bo@x.com", "pw").unwrap();

    assert!(matches!(
        store.accounts().update_picture(999, "file:///x.png"),
        Err(StoreError::UpdateFailed(_))
    ));
    assert!(matches!(
        store.accounts().update_profile(ann.id, &ProfileUpdate { name: Some(" ".into()), ..Default::default() }),
        Err(StoreError::Invalid("name"))
    ));

    let taken = ProfileUpdate { email: Some("bo@x.com".into()), ..Default::default() };
    let err = store.accounts().update_profile(ann.id, &taken).unwrap_err();
    assert!(matches!(err, StoreError::UpdateFailed(_)));
    // The store's own message is kept as the source
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(store.accounts().get_by_id(ann.id).unwrap().unwrap().email, "ann@x.com");
}

#[test]
fn writes_are_announced() {
    let store = store();
    let mut events = store.subscribe();

    let ann = store.accounts().register("Ann", "ann@x.com", "pw").unwrap();
    store.accounts().update_picture(ann.id, "file:///a.png").unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        StoreEvent::UserRegistered { user_id: ann.id, name: "Ann".into() }
    );
    assert_eq!(events.try_recv().unwrap(), StoreEvent::ProfileUpdated { user_id: ann.id });
}

#[test]
fn empty_update_writes_nothing_and_stays_quiet() {
    let store = store();
    let ann = store.accounts().register("Ann", "ann@x.com", "pw").unwrap();
    let mut events = store.subscribe();

    let same = store.accounts().update_profile(ann.id, &ProfileUpdate::default()).unwrap();
    assert_eq!(same, ann);
    assert!(events.try_recv().is_err());

    assert!(matches!(
        store.accounts().update_profile(999, &ProfileUpdate::default()),
        Err(StoreError::UpdateFailed(_))
    ));
}
