use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);

/// Server-assigned task identifier.
///
/// Integer-keyed backends (the public mock API, the local backend) and
/// string-keyed backends both decode into this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Int(i64),
    Text(String),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl FromStr for TaskId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<i64>() {
            Ok(id) => Self::Int(id),
            Err(_) => Self::Text(s.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl Task {
    /// Copy of this task with `completed` flipped.
    pub fn toggled(&self) -> Self {
        Self {
            completed: !self.completed,
            ..self.clone()
        }
    }
}

/// Body of a create request; the server assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, user_id: Option<UserId>) -> Self {
        Self {
            title: title.into(),
            completed: false,
            user_id,
        }
    }
}

/// Trims a user-entered title, rejecting titles that are blank.
pub fn normalize_title(raw: &str) -> Option<String> {
    let title = raw.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_accepts_numeric_and_string_ids() {
        let numeric: TaskId = serde_json::from_str("7").expect("numeric id");
        assert_eq!(numeric, TaskId::Int(7));

        let text: TaskId = serde_json::from_str("\"a1b2\"").expect("string id");
        assert_eq!(text, TaskId::Text("a1b2".into()));
    }

    #[test]
    fn task_id_parses_from_cli_input() {
        assert_eq!("42".parse::<TaskId>(), Ok(TaskId::Int(42)));
        assert_eq!(" x9 ".parse::<TaskId>(), Ok(TaskId::Text("x9".into())));
    }

    #[test]
    fn task_uses_camel_case_user_id_and_omits_when_absent() {
        let task = Task {
            id: TaskId::Int(1),
            title: "A".into(),
            completed: false,
            user_id: Some(UserId(3)),
        };
        let json = serde_json::to_value(&task).expect("json");
        assert_eq!(json["userId"], 3);

        let bare = Task {
            user_id: None,
            ..task
        };
        let json = serde_json::to_value(&bare).expect("json");
        assert!(json.get("userId").is_none());
    }

    #[test]
    fn decodes_mock_api_payload() {
        let raw = r#"{"userId":1,"id":1,"title":"delectus aut autem","completed":false}"#;
        let task: Task = serde_json::from_str(raw).expect("task");
        assert_eq!(task.id, TaskId::Int(1));
        assert_eq!(task.user_id, Some(UserId(1)));
        assert!(!task.completed);
    }

    #[test]
    fn toggled_leaves_original_untouched() {
        let task = Task {
            id: TaskId::Int(1),
            title: "A".into(),
            completed: false,
            user_id: None,
        };
        let flipped = task.toggled();
        assert!(flipped.completed);
        assert!(!task.completed);
        assert_eq!(flipped.toggled(), task);
    }

    #[test]
    fn normalize_title_rejects_blank() {
        assert_eq!(normalize_title("  Buy milk "), Some("Buy milk".to_string()));
        assert_eq!(normalize_title("   "), None);
        assert_eq!(normalize_title(""), None);
    }
}
