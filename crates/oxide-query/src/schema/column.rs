//! Column model and fluent column modifiers.

use std::fmt;
use std::str::FromStr;

use crate::value::{SqlValue, ToSqlValue};

/// Semantic column type, independent of any dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Variable-length string.
    String,
    /// Fixed-length string.
    Char,
    /// Text.
    Text,
    /// Medium text.
    MediumText,
    /// Long text.
    LongText,
    /// Binary data.
    Binary,
    /// 8-bit integer.
    TinyInteger,
    /// 16-bit integer.
    SmallInteger,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Fixed-point decimal.
    Decimal,
    /// Boolean.
    Boolean,
    /// Date.
    Date,
    /// Date and time.
    DateTime,
    /// Date and time with time zone.
    DateTimeTz,
    /// Time of day.
    Time,
    /// Timestamp.
    Timestamp,
    /// Timestamp with time zone.
    TimestampTz,
    /// Year.
    Year,
    /// JSON.
    Json,
    /// Binary JSON.
    Jsonb,
    /// UUID.
    Uuid,
    /// IPv4 or IPv6 address.
    IpAddress,
    /// MAC address.
    MacAddress,
    /// One of a fixed set of strings.
    Enum,
}

impl ColumnType {
    /// Every column type.
    pub const ALL: [Self; 27] = [
        Self::String,
        Self::Char,
        Self::Text,
        Self::MediumText,
        Self::LongText,
        Self::Binary,
        Self::TinyInteger,
        Self::SmallInteger,
        Self::Integer,
        Self::BigInteger,
        Self::Float,
        Self::Double,
        Self::Decimal,
        Self::Boolean,
        Self::Date,
        Self::DateTime,
        Self::DateTimeTz,
        Self::Time,
        Self::Timestamp,
        Self::TimestampTz,
        Self::Year,
        Self::Json,
        Self::Jsonb,
        Self::Uuid,
        Self::IpAddress,
        Self::MacAddress,
        Self::Enum,
    ];

    /// camelCase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Char => "char",
            Self::Text => "text",
            Self::MediumText => "mediumText",
            Self::LongText => "longText",
            Self::Binary => "binary",
            Self::TinyInteger => "tinyInteger",
            Self::SmallInteger => "smallInteger",
            Self::Integer => "integer",
            Self::BigInteger => "bigInteger",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::DateTimeTz => "dateTimeTz",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::TimestampTz => "timestampTz",
            Self::Year => "year",
            Self::Json => "json",
            Self::Jsonb => "jsonb",
            Self::Uuid => "uuid",
            Self::IpAddress => "ipAddress",
            Self::MacAddress => "macAddress",
            Self::Enum => "enum",
        }
    }

    /// True for the integer family.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::TinyInteger | Self::SmallInteger | Self::Integer | Self::BigInteger
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown column type: {s}"))
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Boolean(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// Raw SQL expression (e.g. `CURRENT_TIMESTAMP`), also used for
    /// defaults read back from the database.
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL representation of the default value.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Boolean(b) => SqlValue::Bool(*b).to_sql_inline(),
            Self::Integer(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => SqlValue::Text(s.clone()).to_sql_inline(),
            Self::Expression(e) => e.clone(),
        }
    }
}

impl<T: ToSqlValue> From<T> for DefaultValue {
    fn from(value: T) -> Self {
        match value.to_sql_value() {
            SqlValue::Null => Self::Null,
            SqlValue::Bool(b) => Self::Boolean(b),
            SqlValue::Int(n) => Self::Integer(n),
            SqlValue::Float(f) => Self::Float(f),
            SqlValue::Text(s) => Self::String(s),
            SqlValue::Blob(b) => Self::Expression(SqlValue::Blob(b).to_sql_inline()),
        }
    }
}

/// Index requests recorded by fluent modifiers, turned into commands when
/// the blueprint is finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Pending {
    pub(crate) unique: bool,
    pub(crate) index: bool,
    pub(crate) primary: bool,
    pub(crate) change: bool,
}

/// A table column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Semantic type.
    pub column_type: ColumnType,
    /// Native type as reported by the database, when introspected.
    pub native_type: Option<String>,
    /// Accepts NULL.
    pub nullable: bool,
    /// Default value.
    pub default: Option<DefaultValue>,
    /// Character length.
    pub length: Option<u32>,
    /// Numeric precision.
    pub precision: Option<u32>,
    /// Numeric scale.
    pub scale: Option<u32>,
    /// Unsigned integer (MySQL).
    pub unsigned: bool,
    /// Auto increment; implies the primary key.
    pub auto_increment: bool,
    /// Column comment, without the type hint.
    pub comment: Option<String>,
    /// Allowed values of an enum column.
    pub options: Vec<String>,
    /// Names of indexes covering this column.
    pub indexes: Vec<String>,
    /// Part of the primary key.
    pub primary: bool,
    /// Zero-based position in the table.
    pub position: usize,
    pub(crate) pending: Pending,
}

impl Column {
    /// Creates a NOT NULL column.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            native_type: None,
            nullable: false,
            default: None,
            length: None,
            precision: None,
            scale: None,
            unsigned: false,
            auto_increment: false,
            comment: None,
            options: Vec::new(),
            indexes: Vec::new(),
            primary: false,
            position: 0,
            pending: Pending::default(),
        }
    }

    /// Allows NULL.
    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    /// Rejects NULL.
    pub fn not_null(&mut self) -> &mut Self {
        self.nullable = false;
        self
    }

    /// Sets a literal default.
    pub fn default(&mut self, value: impl Into<DefaultValue>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    /// Sets a raw SQL default, e.g. `CURRENT_TIMESTAMP`.
    pub fn default_raw(&mut self, expression: impl Into<String>) -> &mut Self {
        self.default = Some(DefaultValue::Expression(expression.into()));
        self
    }

    /// Sets the comment.
    pub fn comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = Some(comment.into());
        self
    }

    /// Marks an integer column unsigned.
    pub fn unsigned(&mut self) -> &mut Self {
        self.unsigned = true;
        self
    }

    /// Marks the column auto increment (and primary key).
    pub fn auto_increment(&mut self) -> &mut Self {
        self.auto_increment = true;
        self
    }

    /// Sets the character length.
    pub fn length(&mut self, length: u32) -> &mut Self {
        self.length = Some(length);
        self
    }

    /// Sets precision and scale.
    pub fn precision(&mut self, precision: u32, scale: u32) -> &mut Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Adds a unique index on this column.
    pub fn unique(&mut self) -> &mut Self {
        self.pending.unique = true;
        self
    }

    /// Adds a plain index on this column.
    pub fn index(&mut self) -> &mut Self {
        self.pending.index = true;
        self
    }

    /// Makes this column the primary key.
    pub fn primary(&mut self) -> &mut Self {
        self.pending.primary = true;
        self
    }

    /// Turns the declaration into a change of the existing column.
    pub fn change(&mut self) -> &mut Self {
        self.pending.change = true;
        self
    }

    /// True when an enum column.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.column_type == ColumnType::Enum
    }
}

/// Encodes a type hint into a column comment: `T:<type>|<comment>`.
///
/// Used by dialects whose native type does not identify the semantic type.
#[must_use]
pub fn encode_comment(column: &Column, hint: bool) -> Option<String> {
    if hint {
        return Some(format!(
            "T:{}|{}",
            column.column_type,
            column.comment.as_deref().unwrap_or("")
        ));
    }
    column.comment.clone()
}

/// Splits a stored comment into its type hint and the user comment.
#[must_use]
pub fn decode_comment(raw: Option<&str>) -> (Option<ColumnType>, Option<String>) {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return (None, None);
    };
    if let Some(rest) = raw.strip_prefix("T:") {
        if let Some((hint, comment)) = rest.split_once('|') {
            let comment = (!comment.is_empty()).then(|| comment.to_string());
            return (hint.parse().ok(), comment);
        }
    }
    (None, Some(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_round_trips_names() {
        for column_type in ColumnType::ALL {
            assert_eq!(column_type.as_str().parse::<ColumnType>(), Ok(column_type));
        }
        assert!("varchar".parse::<ColumnType>().is_err());
    }

    #[test]
    fn test_comment_hint() {
        let mut column = Column::new("ip", ColumnType::IpAddress);
        assert_eq!(encode_comment(&column, true).as_deref(), Some("T:ipAddress|"));
        column.comment("last login");
        let encoded = encode_comment(&column, true);
        assert_eq!(encoded.as_deref(), Some("T:ipAddress|last login"));
        assert_eq!(
            decode_comment(encoded.as_deref()),
            (Some(ColumnType::IpAddress), Some(String::from("last login")))
        );
        assert_eq!(decode_comment(Some("plain")), (None, Some(String::from("plain"))));
        assert_eq!(decode_comment(Some("")), (None, None));
    }

    #[test]
    fn test_default_value_sql() {
        assert_eq!(DefaultValue::from("it's").to_sql(), "'it''s'");
        assert_eq!(DefaultValue::from(3).to_sql(), "3");
        assert_eq!(DefaultValue::from(true).to_sql(), "TRUE");
        assert_eq!(
            DefaultValue::Expression(String::from("CURRENT_TIMESTAMP")).to_sql(),
            "CURRENT_TIMESTAMP"
        );
    }
}
