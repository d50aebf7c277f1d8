use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use taskhive::error::Error;
use taskhive::store::{SqliteStore, Store};
use taskhive::types::*;

fn open_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().expect("create temp dir");
    let store = SqliteStore::new(dir.path().join("taskhive.db")).expect("open store");
    store.initialize().expect("initialize schema");
    (dir, store)
}

fn new_user(store: &dyn Store, name: &str) -> User {
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        avatar_url: None,
        created_at: Utc::now(),
    };
    store.create_user(&user).expect("create user");
    user
}

fn new_group(store: &dyn Store, owner: &User, title: &str, code: &str) -> (Group, Participant) {
    let group = Group {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        code: code.to_string(),
        owner_id: owner.id.clone(),
        created_at: Utc::now(),
    };
    let participant = Participant {
        id: Uuid::new_v4().to_string(),
        user_id: owner.id.clone(),
        group_id: group.id.clone(),
        created_at: Utc::now(),
    };
    store
        .create_group(&group, &participant)
        .expect("create group");
    (group, participant)
}

fn join(store: &dyn Store, user: &User, group: &Group) -> Participant {
    let participant = Participant {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        group_id: group.id.clone(),
        created_at: Utc::now(),
    };
    store
        .create_participant(&participant)
        .expect("create participant");
    participant
}

fn new_task(store: &dyn Store, author: &Participant, title: &str) -> Task {
    let task = Task {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        description: String::new(),
        priority: "medium".to_string(),
        due_date: Utc::now(),
        finished: false,
        participant_id: author.id.clone(),
        group_id: author.group_id.clone(),
        created_at: Utc::now(),
    };
    store.create_task(&task).expect("create task");
    task
}

fn new_note(store: &dyn Store, author: &Participant, task: &Task) -> Note {
    let note = Note {
        id: Uuid::new_v4().to_string(),
        content: "a note".to_string(),
        participant_id: author.id.clone(),
        task_id: task.id.clone(),
        created_at: Utc::now(),
    };
    store.create_note(&note).expect("create note");
    note
}

fn grant_admin(store: &dyn Store, participant: &Participant) -> Admin {
    let admin = Admin {
        id: Uuid::new_v4().to_string(),
        participant_id: participant.id.clone(),
        group_id: participant.group_id.clone(),
        created_at: Utc::now(),
    };
    store.create_admin(&admin).expect("create admin");
    admin
}

#[test]
fn group_creation_is_atomic_with_owner_membership() {
    let (_dir, store) = open_store();
    let owner = new_user(&store, "alice");
    let (group, participant) = new_group(&store, &owner, "Sprint", "AAAAA1");

    let found = store
        .find_participant(&owner.id, &group.id)
        .expect("find participant")
        .expect("owner has a participant row");
    assert_eq!(found.id, participant.id);
    assert_eq!(store.count_group_participants(&group.id).unwrap(), 1);
}

#[test]
fn list_user_groups_is_union_without_duplicates() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    let carol = new_user(&store, "carol");

    // Alice owns (and therefore participates in) one group; Bob joins it.
    let (group, _) = new_group(&store, &alice, "Sprint", "AAAAA1");
    join(&store, &bob, &group);

    let alice_groups = store.list_user_groups(&alice.id).unwrap();
    assert_eq!(alice_groups.len(), 1, "owner+participant must not duplicate");
    assert_eq!(alice_groups[0].id, group.id);

    let bob_groups = store.list_user_groups(&bob.id).unwrap();
    assert_eq!(bob_groups.len(), 1);

    assert!(store.list_user_groups(&carol.id).unwrap().is_empty());
}

#[test]
fn duplicate_membership_is_a_conflict() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    let (group, _) = new_group(&store, &alice, "Sprint", "AAAAA1");

    join(&store, &bob, &group);

    let duplicate = Participant {
        id: Uuid::new_v4().to_string(),
        user_id: bob.id.clone(),
        group_id: group.id.clone(),
        created_at: Utc::now(),
    };
    match store.create_participant(&duplicate) {
        Err(Error::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn duplicate_admin_grant_is_a_conflict() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    let (group, _) = new_group(&store, &alice, "Sprint", "AAAAA1");
    let bob_p = join(&store, &bob, &group);

    grant_admin(&store, &bob_p);

    let again = Admin {
        id: Uuid::new_v4().to_string(),
        participant_id: bob_p.id.clone(),
        group_id: group.id.clone(),
        created_at: Utc::now(),
    };
    match store.create_admin(&again) {
        Err(Error::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn join_code_collision_is_reported() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    new_group(&store, &alice, "Sprint", "AAAAA1");

    let group = Group {
        id: Uuid::new_v4().to_string(),
        title: "Other".to_string(),
        code: "AAAAA1".to_string(),
        owner_id: bob.id.clone(),
        created_at: Utc::now(),
    };
    let participant = Participant {
        id: Uuid::new_v4().to_string(),
        user_id: bob.id.clone(),
        group_id: group.id.clone(),
        created_at: Utc::now(),
    };
    match store.create_group(&group, &participant) {
        Err(Error::JoinCodeCollision) => {}
        other => panic!("expected join code collision, got {other:?}"),
    }

    // The failed insert must not leave a partial participant row behind.
    assert!(
        store
            .find_participant(&bob.id, &group.id)
            .unwrap()
            .is_none()
    );
}

#[test]
fn group_creation_with_unknown_owner_is_not_a_code_collision() {
    let (_dir, store) = open_store();

    // Fresh code, but the owner id references no user row. The FK failure
    // must surface as a database error, not as a retryable collision.
    let group = Group {
        id: Uuid::new_v4().to_string(),
        title: "Orphaned".to_string(),
        code: "ZZZZZ1".to_string(),
        owner_id: "ghost".to_string(),
        created_at: Utc::now(),
    };
    let participant = Participant {
        id: Uuid::new_v4().to_string(),
        user_id: "ghost".to_string(),
        group_id: group.id.clone(),
        created_at: Utc::now(),
    };
    match store.create_group(&group, &participant) {
        Err(Error::Database(_)) => {}
        other => panic!("expected database error, got {other:?}"),
    }
}

#[test]
fn group_deletion_cascades_to_every_dependent_row() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    let (group, alice_p) = new_group(&store, &alice, "Sprint", "AAAAA1");
    let bob_p = join(&store, &bob, &group);
    grant_admin(&store, &bob_p);

    let mut task_ids = Vec::new();
    for i in 0..3 {
        let task = new_task(&store, if i % 2 == 0 { &alice_p } else { &bob_p }, "t");
        for _ in 0..2 {
            new_note(&store, &bob_p, &task);
        }
        task_ids.push(task.id);
    }

    store.delete_group(&group.id).expect("delete group");

    assert!(store.get_group(&group.id).unwrap().is_none());
    assert_eq!(store.count_group_participants(&group.id).unwrap(), 0);
    assert_eq!(store.count_group_tasks(&group.id).unwrap(), 0);
    assert!(store.list_group_admins(&group.id).unwrap().is_empty());
    for task_id in task_ids {
        assert_eq!(store.count_task_notes(&task_id).unwrap(), 0);
        assert!(store.get_task(&task_id).unwrap().is_none());
    }
}

#[test]
fn deleting_a_missing_group_is_not_found() {
    let (_dir, store) = open_store();
    match store.delete_group("nope") {
        Err(Error::NotFound) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn participant_removal_cascades_only_their_rows() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    let (group, alice_p) = new_group(&store, &alice, "Sprint", "AAAAA1");
    let bob_p = join(&store, &bob, &group);
    grant_admin(&store, &bob_p);

    let bob_task = new_task(&store, &bob_p, "bob's task");
    new_note(&store, &alice_p, &bob_task);
    let alice_task = new_task(&store, &alice_p, "alice's task");
    let alice_note = new_note(&store, &bob_p, &alice_task);

    store.remove_participant(&bob_p).expect("remove participant");

    // Bob's membership, admin row, task, and the notes on his task are gone.
    assert!(store.find_participant(&bob.id, &group.id).unwrap().is_none());
    assert!(store.find_admin(&bob_p.id, &group.id).unwrap().is_none());
    assert!(store.get_task(&bob_task.id).unwrap().is_none());
    assert_eq!(store.count_task_notes(&bob_task.id).unwrap(), 0);

    // Alice's task survives, including the note Bob wrote on it.
    assert!(store.get_task(&alice_task.id).unwrap().is_some());
    assert!(store.get_note(&alice_note.id).unwrap().is_some());
    assert_eq!(store.count_group_participants(&group.id).unwrap(), 1);
}

#[test]
fn task_deletion_cascades_notes() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let (_group, alice_p) = new_group(&store, &alice, "Sprint", "AAAAA1");

    let task = new_task(&store, &alice_p, "t");
    new_note(&store, &alice_p, &task);
    new_note(&store, &alice_p, &task);

    store.delete_task(&task.id).expect("delete task");

    assert!(store.get_task(&task.id).unwrap().is_none());
    assert_eq!(store.count_task_notes(&task.id).unwrap(), 0);
}

#[test]
fn participant_listing_joins_user_profiles() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    let (group, _) = new_group(&store, &alice, "Sprint", "AAAAA1");
    join(&store, &bob, &group);

    let profiles = store.list_group_participants(&group.id).unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].name, "alice");
    assert_eq!(profiles[1].name, "bob");
}
