//! Column family and key layout for the RocksDB store

/// Column family for ticket snapshots
pub const CF_TICKETS: &str = "tickets";

/// Column family for activity log entries
pub const CF_ACTIVITY: &str = "activity";

/// Column family for idempotency records
pub const CF_IDEMPOTENCY: &str = "idempotency";

/// Column family for directory users
pub const CF_USERS: &str = "users";

/// Column family for teams
pub const CF_TEAMS: &str = "teams";

/// Column family for counters
pub const CF_META: &str = "meta";

/// All column family names
pub const ALL_CFS: &[&str] = &[
    CF_TICKETS,
    CF_ACTIVITY,
    CF_IDEMPOTENCY,
    CF_USERS,
    CF_TEAMS,
    CF_META,
];

/// Key prefixes for compound keys
pub mod keys {
    pub const TICKET_PREFIX: &str = "tkt:";
    pub const USER_PREFIX: &str = "user:";
    pub const TEAM_PREFIX: &str = "team:";

    /// Key of the ticket number counter in `meta`
    pub const TICKET_COUNTER: &str = "counter:ticket";

    pub fn ticket(ticket_id: &str) -> String {
        format!("{}{}", TICKET_PREFIX, ticket_id)
    }

    /// Prefix shared by every entry of one ticket
    pub fn activity_prefix(ticket_id: &str) -> String {
        format!("log:{}:", ticket_id)
    }

    /// Activity key; zero-padded so lexical order is sequence order
    pub fn activity(ticket_id: &str, sequence: u64) -> String {
        format!("log:{}:{:020}", ticket_id, sequence)
    }

    /// Parse the sequence number back out of an activity key
    pub fn parse_activity_sequence(key: &str) -> Option<u64> {
        let mut parts = key.rsplitn(2, ':');
        let seq = parts.next()?;
        let rest = parts.next()?;
        if !rest.starts_with("log:") {
            return None;
        }
        seq.parse().ok()
    }

    pub fn idempotency(key: &str) -> String {
        format!("idem:{}", key)
    }

    pub fn user(user_id: &str) -> String {
        format!("{}{}", USER_PREFIX, user_id)
    }

    pub fn team(lead_id: &str) -> String {
        format!("{}{}", TEAM_PREFIX, lead_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_cfs_defined() {
        assert_eq!(ALL_CFS.len(), 6);
        assert!(ALL_CFS.contains(&CF_ACTIVITY));
        assert!(ALL_CFS.contains(&CF_META));
    }

    #[test]
    fn test_activity_keys_sort_by_sequence() {
        let a = keys::activity("TKT00001", 9);
        let b = keys::activity("TKT00001", 10);
        assert!(a < b);
        assert!(a.starts_with(&keys::activity_prefix("TKT00001")));
        assert_eq!(keys::parse_activity_sequence(&b), Some(10));
        assert_eq!(keys::parse_activity_sequence("tkt:TKT00001"), None);
    }
}
