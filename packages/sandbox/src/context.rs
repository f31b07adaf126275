// ABOUTME: Pre-authenticated caller identity passed into every public operation
// ABOUTME: The core only authorizes against it; authentication happens upstream

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamContext {
    pub team_id: String,
    pub user_id: String,
}

impl TeamContext {
    pub fn new(team_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            user_id: user_id.into(),
        }
    }

    /// True when this caller is the exact (team, user) owner of a record
    pub fn owns(&self, team_id: &str, user_id: &str) -> bool {
        self.team_id == team_id && self.user_id == user_id
    }
}
