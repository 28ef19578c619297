//! Core data types for the basketrec recommendation service
//!
//! This module defines the catalog documents the recommender works on:
//! users with their demographic and health profile, products with their
//! descriptive tags, and the interaction events that link the two. Field
//! names serialize in the camelCase form the storefront backend writes.

use crate::error::{RecommendError, Result};
use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 24-character hexadecimal document identifier
///
/// Products are keyed by these, and the legacy `/recommend` route requires
/// user ids in the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    pub const LEN: usize = 24;

    /// Parse and normalize (lowercase) an object id
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != Self::LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RecommendError::InvalidId(format!(
                "'{}' must be a {}-character hex string",
                s,
                Self::LEN
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Create a new random object id
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let bytes: [u8; 12] = rng.gen();
        Self(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectId {
    type Error = RecommendError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl FromStr for ObjectId {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storefront user identifier
///
/// Opaque to the recommender; the auth provider picks the format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub const MAX_LEN: usize = 128;

    pub fn parse(s: &str) -> Result<Self> {
        let valid = !s.is_empty()
            && s.len() <= Self::MAX_LEN
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(RecommendError::InvalidId(format!(
                "'{}' is not a valid user id",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = RecommendError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl From<&ObjectId> for UserId {
    fn from(id: &ObjectId) -> Self {
        Self(id.as_str().to_string())
    }
}

impl FromStr for UserId {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of storefront interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    View,
    Search,
    #[serde(alias = "favorite", alias = "Favorite")]
    Favourite,
    AddToCart,
    Purchase,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::View,
        EventType::Search,
        EventType::Favourite,
        EventType::AddToCart,
        EventType::Purchase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::View => "view",
            EventType::Search => "search",
            EventType::Favourite => "favourite",
            EventType::AddToCart => "add_to_cart",
            EventType::Purchase => "purchase",
        }
    }
}

impl FromStr for EventType {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "view" => Ok(EventType::View),
            "search" => Ok(EventType::Search),
            "favourite" | "favorite" | "Favorite" => Ok(EventType::Favourite),
            "add_to_cart" => Ok(EventType::AddToCart),
            "purchase" => Ok(EventType::Purchase),
            other => Err(RecommendError::InvalidEventType(other.to_string())),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Growing season used for seasonal picks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Summer,
    Monsoon,
    Winter,
}

impl Season {
    /// Tag that matches every season
    pub const ALL_SEASONS_TAG: &'static str = "all";

    /// Summer runs March to June, monsoon July to November, winter December to February
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=6 => Season::Summer,
            7..=11 => Season::Monsoon,
            _ => Season::Winter,
        }
    }

    pub fn current(now: DateTime<Utc>) -> Self {
        Self::from_month(now.month())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Summer => "summer",
            Season::Monsoon => "monsoon",
            Season::Winter => "winter",
        }
    }
}

/// Device and time context attached to an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
}

/// Storefront user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "userid", alias = "_id", alias = "userId")]
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub bmi: Option<f64>,
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many::deserialize")]
    pub skin_type: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many::deserialize")]
    pub occupation: Vec<String>,
    #[serde(default)]
    pub diet_type: Option<String>,
    #[serde(default)]
    pub last_visit: Option<DateTime<Utc>>,
}

impl User {
    /// Create a profile with only an id
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            email: None,
            age: None,
            gender: None,
            weight: None,
            height: None,
            bmi: None,
            medical_conditions: Vec::new(),
            skin_type: Vec::new(),
            occupation: Vec::new(),
            diet_type: None,
            last_visit: None,
        }
    }

    /// Age, weight and height, in that order
    pub fn demographics(&self) -> [Option<f64>; 3] {
        [self.age, self.weight, self.height]
    }

    pub fn has_demographics(&self) -> bool {
        self.demographics().iter().any(Option::is_some)
    }
}

/// Catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", alias = "productId", default = "ObjectId::generate")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub health_conditions: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many::deserialize")]
    pub seasonal: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many::deserialize")]
    pub occupation_tags: Vec<String>,
    #[serde(default)]
    pub complementary_products: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(id: ObjectId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            price: 0.0,
            category: None,
            health_conditions: Vec::new(),
            seasonal: Vec::new(),
            occupation_tags: Vec::new(),
            complementary_products: Vec::new(),
            created_at: None,
        }
    }

    /// Title and description joined by a space, the text the content model indexes
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title, self.description.as_deref().unwrap_or(""))
    }
}

/// Recorded interaction between a user and a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Store-assigned row id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: UserId,
    pub product_id: ObjectId,
    pub event_type: EventType,
    /// Weight captured when the event was tracked (0 means "not yet assigned")
    #[serde(default)]
    pub weight: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<EventContext>,
}

impl Event {
    pub fn new(user_id: UserId, product_id: ObjectId, event_type: EventType, weight: f64) -> Self {
        Self {
            id: None,
            user_id,
            product_id,
            event_type,
            weight,
            timestamp: Utc::now(),
            session_id: None,
            rating: None,
            context: None,
        }
    }
}

/// Everything the models train on, in store order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl CatalogSnapshot {
    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }

    pub fn events_for<'a>(&'a self, user: &'a UserId) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| &e.user_id == user)
    }
}

/// Row counts reported by a catalog store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub users: usize,
    pub products: usize,
    pub events: usize,
}

/// Accepts either `"tag"` or `["tag", ...]`
mod one_or_many {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Null(()),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
            OneOrMany::Null(()) => Vec::new(),
        })
    }
}
