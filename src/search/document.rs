//! Search documents and their backend-safe encoding
//!
//! Backends store flat JSON, so timestamps are written as epoch seconds plus a
//! `<field>__utcoffset` companion holding the original UTC offset (or `null`
//! for naive values). [`decode`] reverses the transformation exactly.

use crate::search::error::EncodeError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::io;

/// Field holding the derived primary key in backends that store it in the body
pub const PRIMARY_KEY_FIELD_NAME: &str = "_pk";

/// Logical id field every indexed document must carry
pub const ID_FIELD_NAME: &str = "id";

/// Suffix of the companion field storing a timestamp's UTC offset
pub const UTC_OFFSET_SUFFIX: &str = "__utcoffset";

/// A single value inside a document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DocumentValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Timestamp carrying a UTC offset, stored with microsecond precision
    DateTime(DateTime<FixedOffset>),
    /// Timestamp without timezone information, interpreted as UTC
    NaiveDateTime(NaiveDateTime),
    /// Items must not be timestamps themselves, since a list entry has no
    /// companion offset field; wrap them in a [`DocumentValue::Map`] instead
    List(Vec<DocumentValue>),
    Map(BTreeMap<String, DocumentValue>),
}

impl DocumentValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DocumentValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, DocumentValue>> {
        match self {
            DocumentValue::Map(map) => Some(map),
            _ => None,
        }
    }

    fn is_timestamp(&self) -> bool {
        matches!(
            self,
            DocumentValue::DateTime(_) | DocumentValue::NaiveDateTime(_)
        )
    }
}

impl From<&str> for DocumentValue {
    fn from(value: &str) -> Self {
        DocumentValue::String(value.to_string())
    }
}

impl From<String> for DocumentValue {
    fn from(value: String) -> Self {
        DocumentValue::String(value)
    }
}

impl From<i64> for DocumentValue {
    fn from(value: i64) -> Self {
        DocumentValue::Integer(value)
    }
}

impl From<i32> for DocumentValue {
    fn from(value: i32) -> Self {
        DocumentValue::Integer(value.into())
    }
}

impl From<f64> for DocumentValue {
    fn from(value: f64) -> Self {
        DocumentValue::Float(value)
    }
}

impl From<bool> for DocumentValue {
    fn from(value: bool) -> Self {
        DocumentValue::Bool(value)
    }
}

impl From<DateTime<FixedOffset>> for DocumentValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        DocumentValue::DateTime(value)
    }
}

impl From<DateTime<Utc>> for DocumentValue {
    fn from(value: DateTime<Utc>) -> Self {
        DocumentValue::DateTime(value.fixed_offset())
    }
}

impl From<NaiveDateTime> for DocumentValue {
    fn from(value: NaiveDateTime) -> Self {
        DocumentValue::NaiveDateTime(value)
    }
}

impl<T: Into<DocumentValue>> From<Vec<T>> for DocumentValue {
    fn from(values: Vec<T>) -> Self {
        DocumentValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<Document> for DocumentValue {
    fn from(document: Document) -> Self {
        DocumentValue::Map(document.fields)
    }
}

/// A searchable document: field name to value, with a logical `id`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document {
    fields: BTreeMap<String, DocumentValue>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document with its logical id already set
    pub fn with_id(id: impl Into<String>) -> Self {
        Self::new().with(ID_FIELD_NAME, id.into())
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<DocumentValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: impl Into<DocumentValue>,
    ) -> Option<DocumentValue> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&DocumentValue> {
        self.fields.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<DocumentValue> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// The logical id; integer ids are accepted and rendered as text
    pub fn id(&self) -> Option<String> {
        match self.fields.get(ID_FIELD_NAME) {
            Some(DocumentValue::String(id)) => Some(id.clone()),
            Some(DocumentValue::Integer(id)) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, DocumentValue> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, DocumentValue> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<BTreeMap<String, DocumentValue>> for Document {
    fn from(fields: BTreeMap<String, DocumentValue>) -> Self {
        Self { fields }
    }
}

impl FromIterator<(String, DocumentValue)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, DocumentValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl TryFrom<Value> for Document {
    type Error = EncodeError;

    /// Plain JSON objects become documents; timestamp companions are honoured
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(decode(&map)),
            other => Err(EncodeError::UnencodableValue {
                field: String::new(),
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }
}

/// A document ready to be written to a backend
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDocument {
    /// Logical id the key was derived from
    pub id: String,

    /// Backend-safe primary key
    pub primary_key: String,

    /// Flattened body
    pub fields: Map<String, Value>,
}

impl EncodedDocument {
    /// Body with the primary key stored under [`PRIMARY_KEY_FIELD_NAME`]
    pub fn body_with_primary_key(&self) -> Value {
        let mut body = self.fields.clone();
        body.insert(
            PRIMARY_KEY_FIELD_NAME.to_string(),
            Value::String(self.primary_key.clone()),
        );
        Value::Object(body)
    }
}

/// Derive the primary key for a logical id (SHA-1, hex encoded)
pub fn primary_key(logical_id: &str) -> String {
    hex::encode(Sha1::digest(logical_id.as_bytes()))
}

/// Encode a document for indexing; the source document is left untouched
pub fn encode(document: &Document) -> Result<EncodedDocument, EncodeError> {
    let id = document.id().ok_or(EncodeError::MissingId)?;
    let fields = encode_fields(&document.fields)?;
    Ok(EncodedDocument {
        primary_key: primary_key(&id),
        id,
        fields,
    })
}

/// Encode a field map without requiring an id
pub fn encode_fields(
    fields: &BTreeMap<String, DocumentValue>,
) -> Result<Map<String, Value>, EncodeError> {
    let mut encoded = Map::new();
    for (name, value) in fields {
        match value {
            DocumentValue::DateTime(dt) => {
                check_precision(name, dt.timestamp_subsec_nanos())?;
                encoded.insert(name.clone(), epoch_value(name, epoch_seconds(dt))?);
                encoded.insert(
                    offset_field(name),
                    Value::from(dt.offset().local_minus_utc()),
                );
            }
            DocumentValue::NaiveDateTime(naive) => {
                check_precision(name, naive.and_utc().timestamp_subsec_nanos())?;
                encoded.insert(
                    name.clone(),
                    epoch_value(name, naive_epoch_seconds(naive))?,
                );
                encoded.insert(offset_field(name), Value::Null);
            }
            other => {
                encoded.insert(name.clone(), encode_value(name, other)?);
            }
        }
    }
    Ok(encoded)
}

fn encode_value(field: &str, value: &DocumentValue) -> Result<Value, EncodeError> {
    match value {
        DocumentValue::Null => Ok(Value::Null),
        DocumentValue::Bool(b) => Ok(Value::Bool(*b)),
        DocumentValue::Integer(i) => Ok(Value::from(*i)),
        DocumentValue::Float(f) => finite_number(field, *f),
        DocumentValue::String(s) => Ok(Value::String(s.clone())),
        DocumentValue::Map(map) => Ok(Value::Object(encode_fields(map)?)),
        DocumentValue::List(items) => items
            .iter()
            .map(|item| {
                if item.is_timestamp() {
                    Err(EncodeError::UnencodableValue {
                        field: field.to_string(),
                        reason: "timestamps inside lists have no offset companion".to_string(),
                    })
                } else {
                    encode_value(field, item)
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        // Handled by the caller, which owns the companion field
        DocumentValue::DateTime(_) | DocumentValue::NaiveDateTime(_) => {
            Err(EncodeError::UnencodableValue {
                field: field.to_string(),
                reason: "timestamp outside of a mapping".to_string(),
            })
        }
    }
}

fn finite_number(field: &str, value: f64) -> Result<Value, EncodeError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| EncodeError::UnencodableValue {
            field: field.to_string(),
            reason: format!("{} is not a finite number", value),
        })
}

/// Epoch seconds carry whole microseconds only
fn check_precision(field: &str, subsec_nanos: u32) -> Result<(), EncodeError> {
    if subsec_nanos % 1_000 != 0 {
        return Err(EncodeError::UnencodableValue {
            field: field.to_string(),
            reason: format!("sub-microsecond timestamp ({} ns)", subsec_nanos),
        });
    }
    Ok(())
}

fn epoch_value(field: &str, epoch: f64) -> Result<Value, EncodeError> {
    finite_number(field, epoch)
}

fn offset_field(field: &str) -> String {
    format!("{}{}", field, UTC_OFFSET_SUFFIX)
}

/// Seconds since the Unix epoch, microsecond precision
pub fn epoch_seconds<Tz: TimeZone>(dt: &DateTime<Tz>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_micros()) / 1_000_000.0
}

/// Seconds since the Unix epoch for a naive timestamp read as UTC
pub fn naive_epoch_seconds(naive: &NaiveDateTime) -> f64 {
    epoch_seconds(&Utc.from_utc_datetime(naive))
}

fn naive_from_epoch(epoch: f64) -> Option<NaiveDateTime> {
    if !epoch.is_finite() {
        return None;
    }
    let mut secs = epoch.floor() as i64;
    let mut micros = ((epoch - epoch.floor()) * 1_000_000.0).round() as i64;
    if micros >= 1_000_000 {
        secs += 1;
        micros -= 1_000_000;
    }
    DateTime::from_timestamp(secs, (micros * 1_000) as u32).map(|dt| dt.naive_utc())
}

/// Decode a backend document back into its original shape
pub fn decode(fields: &Map<String, Value>) -> Document {
    let mut document = BTreeMap::new();
    for (name, value) in fields {
        if let Some(base) = name.strip_suffix(UTC_OFFSET_SUFFIX) {
            // Companion of a timestamp field: consumed together with `base`
            if fields.get(base).and_then(Value::as_f64).is_some() {
                continue;
            }
        }

        let companion = fields.get(&offset_field(name));
        let decoded = match (value.as_f64(), companion) {
            (Some(epoch), Some(offset)) => {
                decode_timestamp(epoch, offset).unwrap_or_else(|| decode_value(value))
            }
            _ => decode_value(value),
        };
        document.insert(name.clone(), decoded);
    }
    Document { fields: document }
}

fn decode_timestamp(epoch: f64, offset: &Value) -> Option<DocumentValue> {
    let naive = naive_from_epoch(epoch)?;
    if offset.is_null() {
        return Some(DocumentValue::NaiveDateTime(naive));
    }
    let seconds = offset
        .as_i64()
        .or_else(|| offset.as_f64().map(|f| f.round() as i64))?;
    let offset = FixedOffset::east_opt(i32::try_from(seconds).ok()?)?;
    Some(DocumentValue::DateTime(offset.from_utc_datetime(&naive)))
}

fn decode_value(value: &Value) -> DocumentValue {
    match value {
        Value::Null => DocumentValue::Null,
        Value::Bool(b) => DocumentValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => DocumentValue::Integer(i),
            None => DocumentValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => DocumentValue::String(s.clone()),
        Value::Array(items) => DocumentValue::List(items.iter().map(decode_value).collect()),
        Value::Object(map) => DocumentValue::Map(decode(map).fields),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// JSON formatter writing every non-ASCII code point as `\uXXXX`
struct AsciiFormatter;

impl serde_json::ser::Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Serialize to JSON using escaped code points for everything outside ASCII
pub fn to_ascii_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, AsciiFormatter);
    value.serialize(&mut serializer)?;
    // Only ASCII bytes are ever written
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
