//! Cohort diffing.

use std::collections::HashSet;

use crate::panel::UserInfo;

/// Split a refreshed cohort into `(deleted, added)` relative to `current`.
///
/// Users are compared by full record, so a changed limit shows up as a
/// delete of the old record plus an add of the new one.
pub fn diff_users(current: &[UserInfo], latest: &[UserInfo]) -> (Vec<UserInfo>, Vec<UserInfo>) {
    let current_set: HashSet<&UserInfo> = current.iter().collect();
    let latest_set: HashSet<&UserInfo> = latest.iter().collect();

    let deleted = current
        .iter()
        .filter(|u| !latest_set.contains(u))
        .cloned()
        .collect();
    let added = latest
        .iter()
        .filter(|u| !current_set.contains(u))
        .cloned()
        .collect();
    (deleted, added)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, speed_limit: u64) -> UserInfo {
        UserInfo {
            id,
            uuid: format!("uuid-{id}"),
            speed_limit,
            device_limit: 0,
        }
    }

    #[test]
    fn test_no_change() {
        let users = vec![user(1, 0), user(2, 0)];
        let (deleted, added) = diff_users(&users, &users.clone());
        assert!(deleted.is_empty());
        assert!(added.is_empty());
    }

    #[test]
    fn test_added_and_deleted() {
        let current = vec![user(1, 0), user(2, 0)];
        let latest = vec![user(2, 0), user(3, 0), user(4, 0)];
        let (deleted, added) = diff_users(&current, &latest);
        assert_eq!(deleted, vec![user(1, 0)]);
        assert_eq!(added, vec![user(3, 0), user(4, 0)]);
    }

    #[test]
    fn test_changed_limit_is_replace() {
        let current = vec![user(1, 0)];
        let latest = vec![user(1, 20)];
        let (deleted, added) = diff_users(&current, &latest);
        assert_eq!(deleted, vec![user(1, 0)]);
        assert_eq!(added, vec![user(1, 20)]);
    }
}
