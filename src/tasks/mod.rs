//! Task model: identifier validation, derived claim lifecycle, and the
//! open-task feed

pub mod feed;
pub mod status;

pub use feed::{OpenTask, TaskFeed};
pub use status::{claim_allowed, derive_status, holds_active_claim, TaskStatus};

/// Check a task identifier against the fixed `PREFIX-NNN` pattern.
pub fn is_valid_task_id(id: &str, prefix: &str) -> bool {
    let Some(rest) = id.strip_prefix(prefix) else {
        return false;
    };
    let Some(digits) = rest.strip_prefix('-') else {
        return false;
    };
    digits.len() >= 3 && digits.len() <= 6 && digits.chars().all(|c| c.is_ascii_digit())
}
