use serde::{Deserialize, Serialize};

/// A finished dating profile, as stored in the profile directory.
///
/// Created once intake completes; the core never mutates it afterwards
/// (updates are a full replace through the directory).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub interests: Vec<String>,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Object names in the photo bucket, in the order the user sent them.
    pub photos: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Profile {
    /// Contact string shown to the other side of a mutual match.
    pub fn contact(&self) -> String {
        match &self.username {
            Some(u) => format!("@{}", u),
            None => format!("id:{}", self.user_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Parse a constrained gender choice token. Case-insensitive.
    pub fn parse_choice(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// Steps of the profile intake conversation, in strict forward order.
/// Confirming the preview ends the conversation by clearing the session,
/// so there is no terminal step to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeStep {
    Name,
    Age,
    Gender,
    Interests,
    LocationChoice,
    CityText,
    Photos,
    Preview,
}

/// Per-user conversation state: current step plus the fields collected so far.
///
/// Owned exclusively by the user's conversation; serialized as JSON into the
/// session store and rewritten by each step handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub user_id: String,
    pub step: IntakeStep,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub draft: ProfileDraft,
}

impl ConversationSession {
    pub fn new(user_id: &str, username: Option<String>) -> Self {
        Self {
            user_id: user_id.to_string(),
            step: IntakeStep::Name,
            username,
            draft: ProfileDraft::default(),
        }
    }
}

/// Fields collected during intake. All optional until the preview step,
/// where the intake machine checks completeness before persisting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub name: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub photos: Vec<String>,
}

/// A like/dislike vote on a shown candidate. Last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Like,
    Dislike,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::Like => "like",
            VoteChoice::Dislike => "dislike",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "like" => Some(VoteChoice::Like),
            "dislike" => Some(VoteChoice::Dislike),
            _ => None,
        }
    }
}

/// Result of recording a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Vote stored; the counterpart has not liked back (yet).
    Recorded,
    /// Both sides have now liked each other. Declared by the second vote only.
    Matched { counterpart: String },
}

/// Opaque transport reference to a raw photo attachment, resolvable to
/// bytes through the delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub file_id: String,
}
