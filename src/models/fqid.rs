use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Every collection the backend knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Organisation,
    Committee,
    Meeting,
    User,
    Group,
    Poll,
    Projector,
    Projection,
    ProjectorCountdown,
    Assignment,
    AssignmentCandidate,
}

impl Collection {
    pub const ALL: [Collection; 11] = [
        Collection::Organisation,
        Collection::Committee,
        Collection::Meeting,
        Collection::User,
        Collection::Group,
        Collection::Poll,
        Collection::Projector,
        Collection::Projection,
        Collection::ProjectorCountdown,
        Collection::Assignment,
        Collection::AssignmentCandidate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Organisation => "organisation",
            Collection::Committee => "committee",
            Collection::Meeting => "meeting",
            Collection::User => "user",
            Collection::Group => "group",
            Collection::Poll => "poll",
            Collection::Projector => "projector",
            Collection::Projection => "projection",
            Collection::ProjectorCountdown => "projector_countdown",
            Collection::Assignment => "assignment",
            Collection::AssignmentCandidate => "assignment_candidate",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = FqidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|collection| collection.as_str() == s)
            .ok_or_else(|| FqidError::UnknownCollection(s.to_string()))
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Collection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FqidError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Invalid fqid: {0}")]
    InvalidFqid(String),
}

/// Fully qualified id, textual form `collection/id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fqid {
    pub collection: Collection,
    pub id: u64,
}

impl Fqid {
    pub fn new(collection: Collection, id: u64) -> Self {
        Self { collection, id }
    }
}

impl fmt::Display for Fqid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for Fqid {
    type Err = FqidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (collection, id) = s
            .split_once('/')
            .ok_or_else(|| FqidError::InvalidFqid(s.to_string()))?;
        let id: u64 = id.parse().map_err(|_| FqidError::InvalidFqid(s.to_string()))?;
        if id == 0 {
            return Err(FqidError::InvalidFqid(s.to_string()));
        }
        Ok(Self::new(collection.parse()?, id))
    }
}

impl Serialize for Fqid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fqid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let fqid: Fqid = "projector_countdown/12".parse().unwrap();
        assert_eq!(fqid.collection, Collection::ProjectorCountdown);
        assert_eq!(fqid.id, 12);
        assert_eq!(fqid.to_string(), "projector_countdown/12");
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(
            "motion/1".parse::<Fqid>(),
            Err(FqidError::UnknownCollection("motion".to_string()))
        );
        assert!("user".parse::<Fqid>().is_err());
        assert!("user/0".parse::<Fqid>().is_err());
        assert!("user/abc".parse::<Fqid>().is_err());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let fqid = Fqid::new(Collection::User, 7);
        assert_eq!(serde_json::to_value(fqid).unwrap(), serde_json::json!("user/7"));
        let back: Fqid = serde_json::from_value(serde_json::json!("user/7")).unwrap();
        assert_eq!(back, fqid);
    }
}
