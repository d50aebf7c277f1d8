mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn list_user_tokens(&self, user_id: &str) -> Result<Vec<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;
    fn has_admin_token(&self) -> Result<bool>;

    // Group operations
    /// Creates the group and its owner's participant row atomically.
    fn create_group(&self, group: &Group, owner: &Participant) -> Result<()>;
    fn get_group(&self, id: &str) -> Result<Option<Group>>;
    fn get_group_by_code(&self, code: &str) -> Result<Option<Group>>;
    /// Groups where the user is the owner or holds a participant row.
    fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>>;
    fn update_group_title(&self, id: &str, title: &str) -> Result<()>;
    /// Cascade: notes of the group's tasks, tasks, admins, participants,
    /// then the group row, all in one transaction.
    fn delete_group(&self, id: &str) -> Result<()>;

    // Participant operations
    fn create_participant(&self, participant: &Participant) -> Result<()>;
    fn get_participant(&self, id: &str) -> Result<Option<Participant>>;
    fn find_participant(&self, user_id: &str, group_id: &str) -> Result<Option<Participant>>;
    fn list_group_participants(&self, group_id: &str) -> Result<Vec<ParticipantProfile>>;
    fn count_group_participants(&self, group_id: &str) -> Result<i32>;
    /// Cascade: the participant's admin row, the notes of their tasks in
    /// this group, those tasks, then the participant row, in one transaction.
    fn remove_participant(&self, participant: &Participant) -> Result<()>;

    // Admin operations
    fn create_admin(&self, admin: &Admin) -> Result<()>;
    fn find_admin(&self, participant_id: &str, group_id: &str) -> Result<Option<Admin>>;
    fn list_group_admins(&self, group_id: &str) -> Result<Vec<Admin>>;
    fn delete_admin(&self, id: &str) -> Result<bool>;

    // Task operations
    fn create_task(&self, task: &Task) -> Result<()>;
    fn get_task(&self, id: &str) -> Result<Option<Task>>;
    fn list_group_tasks(&self, group_id: &str) -> Result<Vec<Task>>;
    fn update_task(&self, task: &Task) -> Result<()>;
    /// Cascade: the task's notes, then the task, in one transaction.
    fn delete_task(&self, id: &str) -> Result<()>;
    fn count_group_tasks(&self, group_id: &str) -> Result<i32>;

    // Note operations
    fn create_note(&self, note: &Note) -> Result<()>;
    fn get_note(&self, id: &str) -> Result<Option<Note>>;
    fn list_task_notes(&self, task_id: &str) -> Result<Vec<Note>>;
    fn count_task_notes(&self, task_id: &str) -> Result<i32>;
    fn delete_note(&self, id: &str) -> Result<bool>;
}
