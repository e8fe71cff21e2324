use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

pub type Record = JsonMap<String, JsonValue>;

/// Status taxonomy surfaced to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Created,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl Status {
    pub const fn code(&self) -> u16 {
        match self {
            Self::Success => 200,
            Self::Created => 201,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Created)
    }
}

/// Outcome of a seed run: unique-key tuples that were inserted and skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedSummary {
    pub imported: Vec<Record>,
    pub skipped: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Data {
    One(Record),
    Many(Vec<Record>),
    Seeded(SeedSummary),
}

/// Uniform body `{msg, data?}`. A missing `data` is meaningful, never an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
}

/// What every engine operation resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: Status,
    pub envelope: Envelope,
    /// Set when the record was created but the post-create hook failed.
    pub degraded: bool,
}

impl Response {
    pub fn new(status: Status, msg: impl Into<String>) -> Self {
        Self {
            status,
            envelope: Envelope {
                msg: msg.into(),
                data: None,
            },
            degraded: false,
        }
    }

    pub fn with_data(mut self, data: Data) -> Self {
        self.envelope.data = Some(data);
        self
    }

    pub fn success(msg: impl Into<String>) -> Self {
        Self::new(Status::Success, msg)
    }

    pub fn created(msg: impl Into<String>) -> Self {
        Self::new(Status::Created, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(Status::BadRequest, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(Status::Unauthorized, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(Status::Forbidden, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(Status::NotFound, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(Status::Conflict, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(Status::Internal, msg)
    }

    pub fn msg(&self) -> &str {
        &self.envelope.msg
    }

    pub fn data(&self) -> Option<&Data> {
        self.envelope.data.as_ref()
    }

    /// The single record carried in `data`, if any.
    pub fn record(&self) -> Option<&Record> {
        match self.data() {
            Some(Data::One(record)) => Some(record),
            _ => None,
        }
    }

    pub fn records(&self) -> Option<&[Record]> {
        match self.data() {
            Some(Data::Many(records)) => Some(records),
            _ => None,
        }
    }

    pub fn seeded(&self) -> Option<&SeedSummary> {
        match self.data() {
            Some(Data::Seeded(summary)) => Some(summary),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(&self.envelope).unwrap_or(JsonValue::Null)
    }
}
