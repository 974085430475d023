use std::path::{Component, Path};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// One anatomical session of one subject.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Session {
    pub subject_id: String,
    pub unique_id: String,
    pub anat: String,
    #[serde(default, deserialize_with = "absent_if_none")]
    pub brain_mask: Option<String>,
    #[serde(default, deserialize_with = "absent_if_none")]
    pub creds_path: Option<String>,
}

impl Session {
    pub fn new(subject_id: &str, unique_id: &str, anat: &str) -> Self {
        Self {
            subject_id: subject_id.to_owned(),
            unique_id: unique_id.to_owned(),
            anat: anat.to_owned(),
            brain_mask: None,
            creds_path: None,
        }
    }
}

/// Data configs write a missing path as empty or "none".
fn absent_if_none<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let value: Option<String> = Option::deserialize(de)?;
    Ok(value.filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("none")))
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Credentials path \"{0}\" for subject \"{1}\" session \"{2}\" was not found")]
    CredsNotFound(String, String, String),
    #[error("Session \"{1}\" of subject \"{0}\" appears more than once")]
    DuplicateSession(String, String),
    #[error("{0} \"{1}\" must be a single plain path component")]
    InvalidId(&'static str, String),
}

/// Ids become directory names under the output dir.
fn check_id(field: &'static str, id: &str) -> Result<(), Error> {
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == id => Ok(()),
        _ => Err(Error::InvalidId(field, id.to_owned())),
    }
}

/// Read a YAML list of sessions.
pub fn load_sessions(path: &Path) -> Result<Vec<Session>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("while reading data config {path:?}"))?;
    let sessions: Vec<Session> = serde_yaml::from_str(&text)
        .with_context(|| format!("while parsing data config {path:?}"))?;
    for s in &sessions {
        check_id("subject_id", &s.subject_id)?;
        check_id("unique_id", &s.unique_id)?;
        if let Some(creds) = &s.creds_path {
            if !Path::new(creds).exists() {
                return Err(Error::CredsNotFound(creds.clone(), s.subject_id.clone(), s.unique_id.clone()).into());
            }
        }
    }
    Ok(sessions)
}

/// Group sessions by subject, keeping first-appearance order for both.
pub fn group_by_subject(sessions: Vec<Session>) -> Result<IndexMap<String, Vec<Session>>, Error> {
    let mut subjects: IndexMap<String, Vec<Session>> = IndexMap::new();
    for session in sessions {
        let list = subjects.entry(session.subject_id.clone()).or_default();
        if list.iter().any(|s| s.unique_id == session.unique_id) {
            return Err(Error::DuplicateSession(session.subject_id, session.unique_id));
        }
        list.push(session);
    }
    Ok(subjects)
}
