use crate::server::response::ApiError;

const MIN_TEXT_LEN: usize = 2;
const MAX_TITLE_LEN: usize = 120;
const MAX_CONTENT_LEN: usize = 2000;
pub const JOIN_CODE_LEN: usize = 6;

fn validate_text(value: &str, entity: &str, max_len: usize) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < MIN_TEXT_LEN {
        return Err(ApiError::bad_request(format!(
            "{entity} must be at least {MIN_TEXT_LEN} characters"
        )));
    }
    if len > max_len {
        return Err(ApiError::bad_request(format!(
            "{entity} cannot exceed {max_len} characters"
        )));
    }
    Ok(())
}

pub fn validate_group_title(title: &str) -> Result<(), ApiError> {
    validate_text(title, "Group title", MAX_TITLE_LEN)
}

pub fn validate_task_title(title: &str) -> Result<(), ApiError> {
    validate_text(title, "Task title", MAX_TITLE_LEN)
}

pub fn validate_note_content(content: &str) -> Result<(), ApiError> {
    validate_text(content, "Note content", MAX_CONTENT_LEN)
}

pub fn validate_join_code(code: &str) -> Result<(), ApiError> {
    if code.len() != JOIN_CODE_LEN
        || !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(ApiError::bad_request(format!(
            "Join code must be {JOIN_CODE_LEN} uppercase alphanumeric characters"
        )));
    }
    Ok(())
}
