use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// A UNIQUE failure on one specific column; FK and other constraint failures
// on the same insert must not match.
fn is_unique_violation(err: &rusqlite::Error, column: &str) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && msg.contains(column)
    )
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        code: row.get(2)?,
        owner_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        user_id: row.get(1)?,
        group_id: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn admin_from_row(row: &Row<'_>) -> rusqlite::Result<Admin> {
    Ok(Admin {
        id: row.get(0)?,
        participant_id: row.get(1)?,
        group_id: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        priority: row.get(3)?,
        due_date: parse_datetime(&row.get::<_, String>(4)?),
        finished: row.get(5)?,
        participant_id: row.get(6)?,
        group_id: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        content: row.get(1)?,
        participant_id: row.get(2)?,
        task_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        is_admin: row.get(3)?,
        user_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        expires_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
        last_used_at: row.get::<_, Option<String>>(7)?.map(|s| parse_datetime(&s)),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, name, avatar_url, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id,
                user.name,
                user.avatar_url,
                format_datetime(&user.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, avatar_url, created_at FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    avatar_url: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, avatar_url, created_at FROM users WHERE id > ?1 ORDER BY id LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![cursor, limit], |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
                avatar_url: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.is_admin,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
                token.last_used_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::TokenLookupCollision),
            Err(e) => Err(e.into()),
        }
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at, last_used_at
             FROM tokens WHERE token_lookup = ?1",
            params![lookup],
            token_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_user_tokens(&self, user_id: &str) -> Result<Vec<Token>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at, last_used_at
             FROM tokens WHERE user_id = ?1 ORDER BY created_at",
        )?;

        let rows = stmt.query_map(params![user_id], token_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn has_admin_token(&self) -> Result<bool> {
        let count: i32 = self.conn().query_row(
            "SELECT COUNT(*) FROM tokens WHERE is_admin = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Group operations

    fn create_group(&self, group: &Group, owner: &Participant) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let result = tx.execute(
            "INSERT INTO groups (id, title, code, owner_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                group.id,
                group.title,
                group.code,
                group.owner_id,
                format_datetime(&group.created_at),
            ],
        );

        if let Err(e) = result {
            if is_unique_violation(&e, "groups.code") {
                return Err(Error::JoinCodeCollision);
            }
            return Err(e.into());
        }

        tx.execute(
            "INSERT INTO participants (id, user_id, group_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                owner.id,
                owner.user_id,
                owner.group_id,
                format_datetime(&owner.created_at),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_group(&self, id: &str) -> Result<Option<Group>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, title, code, owner_id, created_at FROM groups WHERE id = ?1",
            params![id],
            group_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_group_by_code(&self, code: &str) -> Result<Option<Group>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, title, code, owner_id, created_at FROM groups WHERE code = ?1",
            params![code],
            group_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT g.id, g.title, g.code, g.owner_id, g.created_at
             FROM groups g
             LEFT JOIN participants p ON p.group_id = g.id
             WHERE g.owner_id = ?1 OR p.user_id = ?1
             ORDER BY g.created_at",
        )?;

        let rows = stmt.query_map(params![user_id], group_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_group_title(&self, id: &str, title: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE groups SET title = ?1 WHERE id = ?2",
            params![title, id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_group(&self, id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        // Children before parents: notes, tasks, admins, participants, group.
        tx.execute(
            "DELETE FROM notes WHERE task_id IN (SELECT id FROM tasks WHERE group_id = ?1)",
            params![id],
        )?;
        tx.execute("DELETE FROM tasks WHERE group_id = ?1", params![id])?;
        tx.execute("DELETE FROM admins WHERE group_id = ?1", params![id])?;
        tx.execute("DELETE FROM participants WHERE group_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM groups WHERE id = ?1", params![id])?;

        if rows == 0 {
            return Err(Error::NotFound);
        }

        tx.commit()?;
        Ok(())
    }

    // Participant operations

    fn create_participant(&self, participant: &Participant) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO participants (id, user_id, group_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                participant.id,
                participant.user_id,
                participant.group_id,
                format_datetime(&participant.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => {
                Err(Error::Conflict("already a participant".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_participant(&self, id: &str) -> Result<Option<Participant>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, user_id, group_id, created_at FROM participants WHERE id = ?1",
            params![id],
            participant_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_participant(&self, user_id: &str, group_id: &str) -> Result<Option<Participant>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, user_id, group_id, created_at FROM participants
             WHERE user_id = ?1 AND group_id = ?2",
            params![user_id, group_id],
            participant_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_group_participants(&self, group_id: &str) -> Result<Vec<ParticipantProfile>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.user_id, u.name, u.avatar_url
             FROM participants p
             JOIN users u ON u.id = p.user_id
             WHERE p.group_id = ?1
             ORDER BY p.created_at",
        )?;

        let rows = stmt.query_map(params![group_id], |row| {
            Ok(ParticipantProfile {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                avatar_url: row.get(3)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_group_participants(&self, group_id: &str) -> Result<i32> {
        let count: i32 = self.conn().query_row(
            "SELECT COUNT(*) FROM participants WHERE group_id = ?1",
            params![group_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn remove_participant(&self, participant: &Participant) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM admins WHERE participant_id = ?1 AND group_id = ?2",
            params![participant.id, participant.group_id],
        )?;
        tx.execute(
            "DELETE FROM notes WHERE task_id IN
                 (SELECT id FROM tasks WHERE participant_id = ?1 AND group_id = ?2)",
            params![participant.id, participant.group_id],
        )?;
        tx.execute(
            "DELETE FROM tasks WHERE participant_id = ?1 AND group_id = ?2",
            params![participant.id, participant.group_id],
        )?;
        let rows = tx.execute(
            "DELETE FROM participants WHERE id = ?1",
            params![participant.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }

        tx.commit()?;
        Ok(())
    }

    // Admin operations

    fn create_admin(&self, admin: &Admin) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO admins (id, participant_id, group_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                admin.id,
                admin.participant_id,
                admin.group_id,
                format_datetime(&admin.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => {
                Err(Error::Conflict("already an admin".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_admin(&self, participant_id: &str, group_id: &str) -> Result<Option<Admin>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, participant_id, group_id, created_at FROM admins
             WHERE participant_id = ?1 AND group_id = ?2",
            params![participant_id, group_id],
            admin_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_group_admins(&self, group_id: &str) -> Result<Vec<Admin>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, participant_id, group_id, created_at FROM admins
             WHERE group_id = ?1 ORDER BY created_at",
        )?;

        let rows = stmt.query_map(params![group_id], admin_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_admin(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM admins WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Task operations

    fn create_task(&self, task: &Task) -> Result<()> {
        self.conn().execute(
            "INSERT INTO tasks (id, title, description, priority, due_date, finished, participant_id, group_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.id,
                task.title,
                task.description,
                task.priority,
                format_datetime(&task.due_date),
                task.finished,
                task.participant_id,
                task.group_id,
                format_datetime(&task.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, title, description, priority, due_date, finished, participant_id, group_id, created_at
             FROM tasks WHERE id = ?1",
            params![id],
            task_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_group_tasks(&self, group_id: &str) -> Result<Vec<Task>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, title, description, priority, due_date, finished, participant_id, group_id, created_at
             FROM tasks WHERE group_id = ?1 ORDER BY created_at",
        )?;

        let rows = stmt.query_map(params![group_id], task_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_task(&self, task: &Task) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE tasks SET title = ?1, description = ?2, priority = ?3, due_date = ?4, finished = ?5
             WHERE id = ?6",
            params![
                task.title,
                task.description,
                task.priority,
                format_datetime(&task.due_date),
                task.finished,
                task.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_task(&self, id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM notes WHERE task_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;

        if rows == 0 {
            return Err(Error::NotFound);
        }

        tx.commit()?;
        Ok(())
    }

    fn count_group_tasks(&self, group_id: &str) -> Result<i32> {
        let count: i32 = self.conn().query_row(
            "SELECT COUNT(*) FROM tasks WHERE group_id = ?1",
            params![group_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // Note operations

    fn create_note(&self, note: &Note) -> Result<()> {
        self.conn().execute(
            "INSERT INTO notes (id, content, participant_id, task_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                note.id,
                note.content,
                note.participant_id,
                note.task_id,
                format_datetime(&note.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_note(&self, id: &str) -> Result<Option<Note>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, content, participant_id, task_id, created_at FROM notes WHERE id = ?1",
            params![id],
            note_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_task_notes(&self, task_id: &str) -> Result<Vec<Note>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, content, participant_id, task_id, created_at FROM notes
             WHERE task_id = ?1 ORDER BY created_at",
        )?;

        let rows = stmt.query_map(params![task_id], note_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_task_notes(&self, task_id: &str) -> Result<i32> {
        let count: i32 = self.conn().query_row(
            "SELECT COUNT(*) FROM notes WHERE task_id = ?1",
            params![task_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn delete_note(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM notes WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
