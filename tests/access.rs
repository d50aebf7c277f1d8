use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use taskhive::server::user::access::{
    is_group_admin, is_group_owner, is_group_participant, is_note_owner, is_task_owner,
};
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

fn new_group(store: &dyn Store, owner: &User, code: &str) -> (Group, Participant) {
    let group = Group {
        id: Uuid::new_v4().to_string(),
        title: "Sprint".to_string(),
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

fn new_task(store: &dyn Store, author: &Participant) -> Task {
    let task = Task {
        id: Uuid::new_v4().to_string(),
        title: "task".to_string(),
        description: String::new(),
        priority: "low".to_string(),
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

#[test]
fn owner_is_admin_with_zero_admin_rows() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let (group, _) = new_group(&store, &alice, "AAAAA1");

    assert!(store.list_group_admins(&group.id).unwrap().is_empty());
    assert_eq!(
        is_group_admin(&store, &alice.id, &group.id).unwrap(),
        Some(true)
    );
    assert!(is_group_owner(&group, &alice.id));
}

#[test]
fn admin_check_on_missing_group_is_undefined() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");

    assert_eq!(is_group_admin(&store, &alice.id, "missing").unwrap(), None);
}

#[test]
fn plain_participant_is_not_admin() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    let (group, _) = new_group(&store, &alice, "AAAAA1");
    join(&store, &bob, &group);

    assert_eq!(
        is_group_admin(&store, &bob.id, &group.id).unwrap(),
        Some(false)
    );
}

#[test]
fn demotion_is_visible_immediately() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    let (group, _) = new_group(&store, &alice, "AAAAA1");
    let bob_p = join(&store, &bob, &group);

    let admin = grant_admin(&store, &bob_p);
    assert_eq!(
        is_group_admin(&store, &bob.id, &group.id).unwrap(),
        Some(true)
    );

    store.delete_admin(&admin.id).expect("delete admin");
    assert_eq!(
        is_group_admin(&store, &bob.id, &group.id).unwrap(),
        Some(false)
    );
}

#[test]
fn non_member_is_never_admin() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let mallory = new_user(&store, "mallory");
    let (group, _) = new_group(&store, &alice, "AAAAA1");

    assert_eq!(
        is_group_admin(&store, &mallory.id, &group.id).unwrap(),
        Some(false)
    );
    assert!(!is_group_participant(&store, &mallory.id, &group.id).unwrap());
}

#[test]
fn participant_check_reflects_membership() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    let (group, _) = new_group(&store, &alice, "AAAAA1");

    assert!(is_group_participant(&store, &alice.id, &group.id).unwrap());
    assert!(!is_group_participant(&store, &bob.id, &group.id).unwrap());

    let bob_p = join(&store, &bob, &group);
    assert!(is_group_participant(&store, &bob.id, &group.id).unwrap());

    store.remove_participant(&bob_p).expect("remove");
    assert!(!is_group_participant(&store, &bob.id, &group.id).unwrap());
}

#[test]
fn note_ownership_follows_the_participant_identity() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    let carol = new_user(&store, "carol");
    let (group, alice_p) = new_group(&store, &alice, "AAAAA1");
    let bob_p = join(&store, &bob, &group);

    let task = new_task(&store, &alice_p);
    let note = new_note(&store, &bob_p, &task);

    assert!(is_note_owner(&store, &bob.id, &note.id).unwrap());
    assert!(!is_note_owner(&store, &alice.id, &note.id).unwrap());
    // Absence is a normal false, not an error.
    assert!(!is_note_owner(&store, &carol.id, &note.id).unwrap());
    assert!(!is_note_owner(&store, &bob.id, "missing").unwrap());
}

#[test]
fn task_ownership_follows_the_participant_identity() {
    let (_dir, store) = open_store();
    let alice = new_user(&store, "alice");
    let bob = new_user(&store, "bob");
    let (group, alice_p) = new_group(&store, &alice, "AAAAA1");
    join(&store, &bob, &group);

    let task = new_task(&store, &alice_p);

    assert!(is_task_owner(&store, &alice.id, &task.id).unwrap());
    assert!(!is_task_owner(&store, &bob.id, &task.id).unwrap());
    assert!(!is_task_owner(&store, &alice.id, "missing").unwrap());
}
