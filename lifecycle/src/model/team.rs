//! Engineering teams led by a team lead

use serde::{Deserialize, Serialize};

use super::actor::UserId;

/// A team lead and the engineers working under them
///
/// The lead is always a member; member removal never removes the lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub lead_id: UserId,
    pub name: String,
    pub members: Vec<UserId>,
}

impl Team {
    /// Create a team containing only its lead
    pub fn new(lead_id: impl Into<UserId>, name: impl Into<String>) -> Self {
        let lead_id = lead_id.into();
        Self {
            members: vec![lead_id.clone()],
            lead_id,
            name: name.into(),
        }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    /// Add a member; returns false if already present
    pub fn add_member(&mut self, user_id: impl Into<UserId>) -> bool {
        let user_id = user_id.into();
        if self.is_member(&user_id) {
            return false;
        }
        self.members.push(user_id);
        true
    }

    /// Remove a member; the lead is never removed
    pub fn remove_member(&mut self, user_id: &str) -> bool {
        if user_id == self.lead_id {
            return false;
        }
        let before = self.members.len();
        self.members.retain(|m| m != user_id);
        before != self.members.len()
    }

    /// Members other than the lead
    pub fn engineers(&self) -> impl Iterator<Item = &UserId> {
        self.members.iter().filter(move |m| **m != self.lead_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_is_member_and_cannot_be_removed() {
        let mut team = Team::new("TL1", "Core Network");
        assert!(team.is_member("TL1"));
        assert!(!team.remove_member("TL1"));
        assert!(team.is_member("TL1"));
    }

    #[test]
    fn test_add_and_remove_members() {
        let mut team = Team::new("TL1", "Core Network");
        assert!(team.add_member("ENG001"));
        assert!(!team.add_member("ENG001"));
        assert_eq!(team.engineers().count(), 1);
        assert!(team.remove_member("ENG001"));
        assert!(!team.remove_member("ENG001"));
        assert_eq!(team.members, vec!["TL1".to_string()]);
    }
}
