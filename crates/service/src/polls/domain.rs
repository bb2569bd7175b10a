use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const MAX_CHOICES: usize = 20;
pub const MIN_CHOICES: usize = 2;
pub const HIDDEN_VOTER: &str = "*******";

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: i32,
    pub author_id: i32,
    pub question_text: String,
    pub date_published: DateTime<Utc>,
    pub date_created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub id: i32,
    pub question_id: i32,
    pub choice_text: String,
    /// Counted from live vote rows on every read.
    pub vote_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub id: i32,
    pub voter_id: i32,
    pub voter_username: String,
    pub choice_id: i32,
    pub hide_voter: bool,
}

impl Vote {
    /// Username as shown to other users; masked when `hide_voter` is set.
    pub fn displayed_voter(&self) -> &str {
        if self.hide_voter { HIDDEN_VOTER } else { &self.voter_username }
    }
}

/// Body of a question create request. Choices are write-only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionInput {
    #[serde(default)]
    pub question_text: Option<String>,
    /// RFC 3339 timestamp; kept raw so format errors become field errors.
    #[serde(default)]
    pub date_published: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<ChoiceInput>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceInput {
    #[serde(default)]
    pub choice_text: Option<String>,
}

/// Body of vote create/update requests. The voter always comes from the session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoteInput {
    #[serde(default)]
    pub choice: Option<i32>,
    #[serde(default)]
    pub hide_voter: Option<bool>,
}

/// Validated question ready for insertion together with its choices.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub author_id: i32,
    pub question_text: String,
    pub date_published: DateTime<Utc>,
    pub choices: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewVote {
    pub question_id: i32,
    pub voter_id: i32,
    pub choice_id: i32,
    pub hide_voter: bool,
}

/// Validated vote change; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct VoteChange {
    pub choice_id: Option<i32>,
    pub hide_voter: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_voter_is_masked() {
        let mut v = Vote { id: 1, voter_id: 2, voter_username: "bob".into(), choice_id: 3, hide_voter: true };
        assert_eq!(v.displayed_voter(), "*******");
        v.hide_voter = false;
        assert_eq!(v.displayed_voter(), "bob");
    }
}
