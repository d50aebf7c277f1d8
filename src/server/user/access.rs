//! Authorization predicates. All of them re-query the store on every call so
//! a membership or admin change is visible immediately; none of them cache.
//! Authorship is always resolved through the caller's per-group Participant,
//! never the global User id.

use crate::error::Result;
use crate::server::response::{ApiError, StoreResultExt};
use crate::store::Store;
use crate::types::Group;

/// Returns true if the user owns the group. The owner has admin rights
/// without an admin row.
pub fn is_group_owner(group: &Group, user_id: &str) -> bool {
    group.owner_id == user_id
}

/// Returns None if the group does not exist. Otherwise true iff the user is
/// the owner or their participant appears in the group's admin set. A user
/// with no participant row is never an admin, stale admin rows included.
pub fn is_group_admin(store: &dyn Store, user_id: &str, group_id: &str) -> Result<Option<bool>> {
    let Some(group) = store.get_group(group_id)? else {
        return Ok(None);
    };

    if is_group_owner(&group, user_id) {
        return Ok(Some(true));
    }

    let Some(participant) = store.find_participant(user_id, group_id)? else {
        return Ok(Some(false));
    };

    let admin = store.find_admin(&participant.id, group_id)?;
    Ok(Some(admin.is_some()))
}

/// Returns true iff a participant row exists for (user, group).
pub fn is_group_participant(store: &dyn Store, user_id: &str, group_id: &str) -> Result<bool> {
    Ok(store.find_participant(user_id, group_id)?.is_some())
}

/// Returns true iff the caller's participant in the note's group authored
/// the note. Absence of the note or of a membership is a normal false.
pub fn is_note_owner(store: &dyn Store, user_id: &str, note_id: &str) -> Result<bool> {
    let Some(note) = store.get_note(note_id)? else {
        return Ok(false);
    };
    let Some(task) = store.get_task(&note.task_id)? else {
        return Ok(false);
    };
    let Some(participant) = store.find_participant(user_id, &task.group_id)? else {
        return Ok(false);
    };

    Ok(note.participant_id == participant.id)
}

/// Returns true iff the caller's participant in the task's group authored
/// the task.
pub fn is_task_owner(store: &dyn Store, user_id: &str, task_id: &str) -> Result<bool> {
    let Some(task) = store.get_task(task_id)? else {
        return Ok(false);
    };
    let Some(participant) = store.find_participant(user_id, &task.group_id)? else {
        return Ok(false);
    };

    Ok(task.participant_id == participant.id)
}

/// Check that the user is an admin of the group, mapping a missing group to
/// 404 and a failed check to 403.
pub fn require_group_admin(
    store: &dyn Store,
    user_id: &str,
    group_id: &str,
) -> std::result::Result<(), ApiError> {
    match is_group_admin(store, user_id, group_id).api_err("Failed to check admin status")? {
        None => Err(ApiError::not_found("Group not found")),
        Some(false) => Err(ApiError::forbidden("Insufficient permissions")),
        Some(true) => Ok(()),
    }
}
