//! Query request envelopes.
//!
//! Every request is a JSON object with a `type` tag (`within` or `across`)
//! and a `query` payload. Cross-entity requests encode their relation path
//! as the insertion order of the `projection` keys, starting from
//! `start_entity`; hop directions are left to the engine to infer from the
//! metadata graph unless a caller sets them programmatically.

use std::fmt;

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;
use crate::filter::Filter;

/// Which way a relation hop follows a reference edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The current entity owns the foreign key.
    Outward,
    /// The target entity points back at the current one.
    Inward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outward => write!(f, "outward"),
            Direction::Inward => write!(f, "inward"),
        }
    }
}

/// One step of a relation path.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub target_entity: String,
    /// `None` asks the engine to infer the direction from the graph.
    pub direction: Option<Direction>,
}

impl Hop {
    pub fn new(target_entity: impl Into<String>) -> Self {
        Self { target_entity: target_entity.into(), direction: None }
    }

    pub fn outward(target_entity: impl Into<String>) -> Self {
        Self { target_entity: target_entity.into(), direction: Some(Direction::Outward) }
    }

    pub fn inward(target_entity: impl Into<String>) -> Self {
        Self { target_entity: target_entity.into(), direction: Some(Direction::Inward) }
    }
}

/// A query against a single collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SingleEntityQuery {
    pub collection: String,
    pub filter: Filter,
    /// Output fields in order. Empty means every declared field.
    pub select: Vec<String>,
}

impl SingleEntityQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self { collection: collection.into(), ..Default::default() }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn select(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    fn from_json(raw: &serde_json::Value) -> Result<Self, Error> {
        let obj = expect_object(raw, "query")?;
        let collection = expect_string(obj, "collection")?;
        let filter = match obj.get("filter") {
            Some(raw) => Filter::from_json(raw)?,
            None => Filter::new(),
        };
        let select = match obj.get("select") {
            Some(raw) => string_list(raw, "select")?,
            None => Vec::new(),
        };
        Ok(Self { collection, filter, select })
    }

    fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("collection".into(), self.collection.clone().into());
        obj.insert("filter".into(), self.filter.to_json());
        obj.insert(
            "select".into(),
            serde_json::Value::Array(self.select.iter().cloned().map(Into::into).collect()),
        );
        serde_json::Value::Object(obj)
    }
}

/// A query that joins documents along a relation path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelatedEntityQuery {
    pub start_entity: String,
    /// Applied to the start entity only.
    pub filter: Filter,
    /// The relation path, in traversal order.
    pub path: Vec<Hop>,
    /// Output fields per entity, in the order entities and fields were
    /// requested. Entities absent here contribute no output columns.
    pub select: Vec<(String, Vec<String>)>,
}

impl RelatedEntityQuery {
    pub fn new(start_entity: impl Into<String>) -> Self {
        Self { start_entity: start_entity.into(), ..Default::default() }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn hop(mut self, hop: Hop) -> Self {
        self.path.push(hop);
        self
    }

    pub fn select_fields(
        mut self,
        entity: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.select
            .push((entity.into(), fields.into_iter().map(Into::into).collect()));
        self
    }

    /// The fields requested for `entity`, if any were.
    pub fn selected(&self, entity: &str) -> Option<&[String]> {
        self.select
            .iter()
            .find(|(e, _)| e == entity)
            .map(|(_, fields)| fields.as_slice())
    }

    fn from_json(raw: &serde_json::Value) -> Result<Self, Error> {
        let obj = expect_object(raw, "query")?;
        let start_entity = expect_string(obj, "start_entity")?;
        let filter = match obj.get("filter") {
            Some(raw) => Filter::from_json(raw)?,
            None => Filter::new(),
        };

        let projection = obj
            .get("projection")
            .ok_or_else(|| Error::InvalidRequest("across query requires a projection".into()))?;
        let projection = expect_object(projection, "projection")?;
        let mut path = Vec::new();
        for (entity, include) in projection {
            let included = include.as_i64() == Some(1) || include.as_bool() == Some(true);
            if !included {
                return Err(Error::InvalidRequest(format!(
                    "projection value for '{entity}' must be 1"
                )));
            }
            // The start entity never hops to itself, wherever it is listed.
            if *entity == start_entity {
                continue;
            }
            path.push(Hop::new(entity.clone()));
        }
        if path.is_empty() {
            return Err(Error::InvalidRequest(
                "projection must name at least one entity beyond the start".into(),
            ));
        }

        let mut select = Vec::new();
        if let Some(raw) = obj.get("select") {
            let map = expect_object(raw, "select")?;
            for (entity, fields) in map {
                select.push((entity.clone(), string_list(fields, entity)?));
            }
        }

        Ok(Self { start_entity, filter, path, select })
    }

    fn to_json(&self) -> serde_json::Value {
        let mut projection = serde_json::Map::new();
        projection.insert(self.start_entity.clone(), 1.into());
        for hop in &self.path {
            projection.insert(hop.target_entity.clone(), 1.into());
        }

        let mut select = serde_json::Map::new();
        for (entity, fields) in &self.select {
            select.insert(
                entity.clone(),
                serde_json::Value::Array(fields.iter().cloned().map(Into::into).collect()),
            );
        }

        let mut obj = serde_json::Map::new();
        obj.insert("start_entity".into(), self.start_entity.clone().into());
        obj.insert("filter".into(), self.filter.to_json());
        obj.insert("projection".into(), serde_json::Value::Object(projection));
        obj.insert("select".into(), serde_json::Value::Object(select));
        serde_json::Value::Object(obj)
    }
}

/// The request envelope, dispatched on its `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRequest {
    Within(SingleEntityQuery),
    Across(RelatedEntityQuery),
}

impl QueryRequest {
    pub fn from_json(raw: &serde_json::Value) -> Result<Self, Error> {
        let obj = expect_object(raw, "request")?;
        let kind = expect_string(obj, "type")?;
        let query = obj
            .get("query")
            .ok_or_else(|| Error::InvalidRequest("request is missing 'query'".into()))?;
        match kind.as_str() {
            "within" => Ok(QueryRequest::Within(SingleEntityQuery::from_json(query)?)),
            "across" => Ok(QueryRequest::Across(RelatedEntityQuery::from_json(query)?)),
            other => Err(Error::InvalidRequest(format!("unknown query type '{other}'"))),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, Error> {
        let parsed: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| Error::Deserialization(e.to_string()))?;
        Self::from_json(&parsed)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let (kind, query) = match self {
            QueryRequest::Within(q) => ("within", q.to_json()),
            QueryRequest::Across(q) => ("across", q.to_json()),
        };
        let mut obj = serde_json::Map::new();
        obj.insert("type".into(), kind.into());
        obj.insert("query".into(), query);
        serde_json::Value::Object(obj)
    }
}

impl Serialize for QueryRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QueryRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        QueryRequest::from_json(&raw).map_err(DeError::custom)
    }
}

fn expect_object<'a>(
    raw: &'a serde_json::Value,
    what: &str,
) -> Result<&'a serde_json::Map<String, serde_json::Value>, Error> {
    raw.as_object()
        .ok_or_else(|| Error::InvalidRequest(format!("'{what}' must be an object")))
}

fn expect_string(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<String, Error> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidRequest(format!("missing string field '{key}'")))
}

fn string_list(raw: &serde_json::Value, what: &str) -> Result<Vec<String>, Error> {
    let items = raw
        .as_array()
        .ok_or_else(|| Error::InvalidRequest(format!("'{what}' must be an array of strings")))?;
    items
        .iter()
        .map(|v| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                Error::InvalidRequest(format!("'{what}' must contain only strings"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn within_request_parses() {
        let raw = r#"{
            "type": "within",
            "query": {
                "collection": "Products",
                "filter": {"price": {"$gt": 15}},
                "select": ["product_name", "price"]
            }
        }"#;
        let request = QueryRequest::from_json_str(raw).unwrap();
        match request {
            QueryRequest::Within(q) => {
                assert_eq!(q.collection, "Products");
                assert_eq!(q.select, vec!["product_name", "price"]);
                assert!(!q.filter.is_empty());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn projection_order_defines_the_path() {
        let raw = r#"{
            "type": "across",
            "query": {
                "start_entity": "Students",
                "filter": {"student_id": 1001},
                "projection": {"Students": 1, "Enrollments": 1, "Courses": 1},
                "select": {"Students": ["name"], "Courses": ["title"]}
            }
        }"#;
        let request = QueryRequest::from_json_str(raw).unwrap();
        match request {
            QueryRequest::Across(q) => {
                assert_eq!(q.start_entity, "Students");
                let targets: Vec<_> =
                    q.path.iter().map(|h| h.target_entity.as_str()).collect();
                assert_eq!(targets, vec!["Enrollments", "Courses"]);
                assert!(q.path.iter().all(|h| h.direction.is_none()));
                assert_eq!(q.selected("Courses"), Some(&["title".to_string()][..]));
                assert_eq!(q.selected("Enrollments"), None);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn non_alphabetical_projection_order_is_preserved() {
        let raw = r#"{
            "type": "across",
            "query": {
                "start_entity": "Zeta",
                "projection": {"Zeta": 1, "Mid": 1, "Alpha": 1}
            }
        }"#;
        let request = QueryRequest::from_json_str(raw).unwrap();
        match request {
            QueryRequest::Across(q) => {
                let targets: Vec<_> =
                    q.path.iter().map(|h| h.target_entity.as_str()).collect();
                assert_eq!(targets, vec!["Mid", "Alpha"]);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn start_entity_is_skipped_wherever_it_appears() {
        let raw = r#"{
            "type": "across",
            "query": {
                "start_entity": "Students",
                "projection": {"Enrollments": 1, "Students": 1, "Courses": 1}
            }
        }"#;
        let request = QueryRequest::from_json_str(raw).unwrap();
        match request {
            QueryRequest::Across(q) => {
                let targets: Vec<_> =
                    q.path.iter().map(|h| h.target_entity.as_str()).collect();
                assert_eq!(targets, vec!["Enrollments", "Courses"]);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn missing_projection_is_rejected() {
        let raw = r#"{"type": "across", "query": {"start_entity": "Students"}}"#;
        assert!(matches!(
            QueryRequest::from_json_str(raw),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let raw = r#"{"type": "union", "query": {}}"#;
        let err = QueryRequest::from_json_str(raw).unwrap_err();
        assert!(err.to_string().contains("union"));
    }

    #[test]
    fn round_trip_preserves_path_order() {
        let request = QueryRequest::Across(
            RelatedEntityQuery::new("Students")
                .with_filter(Filter::new().eq("student_id", Value::Int(1001)))
                .hop(Hop::new("Enrollments"))
                .hop(Hop::new("Courses"))
                .select_fields("Students", ["name"])
                .select_fields("Courses", ["title"]),
        );
        let json = serde_json::to_string(&request).unwrap();
        let back = QueryRequest::from_json_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
