//! Schema (DDL) compilation and introspection queries.

use std::sync::OnceLock;

use regex::Regex;

use crate::connection::Row;
use crate::error::{QueryError, Result};
use crate::schema::{decode_comment, Column, ColumnType, Command, DefaultValue, Index, Primary, Table};
use crate::value::SqlValue;

use super::Dialect;

/// One `(index, column)` pair read from the index listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    /// Index name.
    pub name: String,
    /// Indexed column.
    pub column: String,
    /// Unique index.
    pub unique: bool,
    /// Backs the primary key.
    pub primary: bool,
}

/// Compiles table definitions and commands. Default methods implement the
/// generic dialect.
pub trait SchemaGrammar: Dialect {
    /// Native type for a column.
    fn type_name(&self, _table: &Table, column: &Column) -> String {
        generic_type_name(column)
    }

    /// Semantic type for a native type name, as introspected.
    fn flip_type(&self, native: &str) -> Option<ColumnType> {
        generic_flip_type(&base_type(native))
    }

    /// True when the native type does not identify the semantic type, so
    /// the column comment must carry a `T:<type>|` hint.
    fn needs_type_hint(&self, table: &Table, column: &Column) -> bool {
        if column.is_enum() {
            return false;
        }
        self.flip_type(&self.type_name(table, column)) != Some(column.column_type)
    }

    /// Supports `UNSIGNED` integers.
    fn supports_unsigned(&self) -> bool {
        false
    }

    /// Appended to auto-increment column definitions.
    fn auto_increment_clause(&self) -> &'static str {
        " AUTO_INCREMENT PRIMARY KEY"
    }

    /// `DEFAULT` value text.
    fn compile_default(&self, default: &DefaultValue) -> String {
        default.to_sql()
    }

    /// Inline comment clause of a column definition.
    fn compile_inline_comment(&self, _table: &Table, _column: &Column) -> Option<String> {
        None
    }

    /// Inline `CHECK` clause of a column definition.
    fn compile_column_check(&self, _column: &Column) -> Option<String> {
        None
    }

    /// `name TYPE [UNSIGNED] NULL|NOT NULL [DEFAULT x] ...`.
    fn compile_column(&self, table: &Table, column: &Column) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.type_name(table, column)
        );
        if column.unsigned && self.supports_unsigned() {
            sql.push_str(" UNSIGNED");
        }
        sql.push_str(if column.nullable && !column.auto_increment {
            " NULL"
        } else {
            " NOT NULL"
        });
        if let Some(default) = column.default.as_ref().filter(|_| !column.auto_increment) {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.compile_default(default));
        }
        if column.auto_increment {
            sql.push_str(self.auto_increment_clause());
        }
        if let Some(check) = self.compile_column_check(column) {
            sql.push(' ');
            sql.push_str(&check);
        }
        if let Some(comment) = self.compile_inline_comment(table, column) {
            sql.push(' ');
            sql.push_str(&comment);
        }
        sql
    }

    /// Quoted, prefixed table name.
    fn wrap_schema_table(&self, table: &Table) -> String {
        self.wrap_prefixed(&table.prefix, &table.name)
    }

    /// Comma-separated quoted column names.
    fn columnize_names(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `PRIMARY KEY (...)` table constraint.
    fn compile_primary_constraint(&self, _table: &Table, primary: &Primary) -> String {
        format!("PRIMARY KEY ({})", self.columnize_names(&primary.columns))
    }

    /// Index declared inside `CREATE TABLE`; `None` to create it separately.
    fn compile_inline_index(&self, _table: &Table, index: &Index) -> Option<String> {
        let kind = if index.unique { "UNIQUE INDEX" } else { "INDEX" };
        Some(format!(
            "{kind} {} ({})",
            self.quote_identifier(&index.name),
            self.columnize_names(&index.columns)
        ))
    }

    /// Trailing table options (engine, charset).
    fn compile_table_options(&self, _table: &Table) -> String {
        String::new()
    }

    /// Statements that must run before the table or column exists.
    fn compile_column_prelude(&self, _table: &Table, _column: &Column) -> Vec<String> {
        Vec::new()
    }

    /// Statements that run after a column was created or changed.
    fn compile_column_followups(&self, _table: &Table, _column: &Column) -> Vec<String> {
        Vec::new()
    }

    /// Creates the whole model of `table` (its columns, indexes and primary
    /// key) as one `CREATE TABLE` plus any follow-up statements.
    fn compile_create_table(&self, table: &Table, if_not_exists: bool) -> Vec<String> {
        let mut statements = Vec::new();
        for column in &table.columns {
            statements.extend(self.compile_column_prelude(table, column));
        }

        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.compile_column(table, c))
            .collect();
        if let Some(primary) = &table.primary {
            if !has_inline_primary(table) {
                definitions.push(self.compile_primary_constraint(table, primary));
            }
        }
        let mut separate = Vec::new();
        for index in &table.indexes {
            match self.compile_inline_index(table, index) {
                Some(sql) => definitions.push(sql),
                None => separate.push(index),
            }
        }

        let mut sql = String::from("CREATE TABLE ");
        if if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.wrap_schema_table(table));
        sql.push_str(" (");
        sql.push_str(&definitions.join(", "));
        sql.push(')');
        sql.push_str(&self.compile_table_options(table));
        statements.push(sql);

        for index in separate {
            statements.extend(self.compile_create_index(table, index));
        }
        for column in &table.columns {
            statements.extend(self.compile_column_followups(table, column));
        }
        statements
    }

    /// The statements carrying one alter command.
    fn compile_command(&self, table: &Table, command: &Command) -> Vec<String> {
        match command {
            Command::AddColumn(column) => self.compile_add_column(table, column),
            Command::ChangeColumn(column) => self.compile_change_column(table, column),
            Command::RenameColumn { from, to } => self.compile_rename_column(table, from, to),
            Command::DropColumn(name) => self.compile_drop_column(table, name),
            Command::CreateIndex(index) => self.compile_create_index(table, index),
            Command::DropIndex(name) => self.compile_drop_index(table, name),
            Command::RenameIndex { from, to } => self.compile_rename_index(table, from, to),
            Command::CreatePrimary(primary) => self.compile_create_primary(table, primary),
            Command::DropPrimary => self.compile_drop_primary(table),
        }
    }

    /// `ALTER TABLE t ADD COLUMN ...`.
    fn compile_add_column(&self, table: &Table, column: &Column) -> Vec<String> {
        let mut statements = self.compile_column_prelude(table, column);
        statements.push(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.wrap_schema_table(table),
            self.compile_column(table, column)
        ));
        statements.extend(self.compile_column_followups(table, column));
        statements
    }

    /// `ALTER TABLE t MODIFY COLUMN ...`.
    fn compile_change_column(&self, table: &Table, column: &Column) -> Vec<String> {
        let mut statements = self.compile_column_prelude(table, column);
        let mut column = column.clone();
        column.auto_increment = false;
        statements.push(format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.wrap_schema_table(table),
            self.compile_column(table, &column)
        ));
        statements.extend(self.compile_column_followups(table, &column));
        statements
    }

    /// `ALTER TABLE t RENAME COLUMN a TO b`.
    fn compile_rename_column(&self, table: &Table, from: &str, to: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.wrap_schema_table(table),
            self.quote_identifier(from),
            self.quote_identifier(to)
        )]
    }

    /// Drops every index covering the column, then `ALTER TABLE t DROP
    /// COLUMN c`. Composite indexes go whole rather than shrinking.
    fn compile_drop_column(&self, table: &Table, name: &str) -> Vec<String> {
        let mut statements: Vec<String> = table
            .indexes
            .iter()
            .filter(|index| index.columns.iter().any(|c| c == name))
            .flat_map(|index| self.compile_drop_index(table, &index.name))
            .collect();
        statements.push(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.wrap_schema_table(table),
            self.quote_identifier(name)
        ));
        statements
    }

    /// `CREATE [UNIQUE] INDEX n ON t (...)`.
    fn compile_create_index(&self, table: &Table, index: &Index) -> Vec<String> {
        let unique = if index.unique { "UNIQUE " } else { "" };
        vec![format!(
            "CREATE {unique}INDEX {} ON {} ({})",
            self.quote_identifier(&index.name),
            self.wrap_schema_table(table),
            self.columnize_names(&index.columns)
        )]
    }

    /// `DROP INDEX n ON t`.
    fn compile_drop_index(&self, table: &Table, name: &str) -> Vec<String> {
        vec![format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(name),
            self.wrap_schema_table(table)
        )]
    }

    /// `ALTER TABLE t RENAME INDEX a TO b`.
    fn compile_rename_index(&self, table: &Table, from: &str, to: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} RENAME INDEX {} TO {}",
            self.wrap_schema_table(table),
            self.quote_identifier(from),
            self.quote_identifier(to)
        )]
    }

    /// `ALTER TABLE t ADD PRIMARY KEY (...)`.
    fn compile_create_primary(&self, table: &Table, primary: &Primary) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({})",
            self.wrap_schema_table(table),
            self.columnize_names(&primary.columns)
        )]
    }

    /// `ALTER TABLE t DROP PRIMARY KEY`.
    fn compile_drop_primary(&self, table: &Table) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP PRIMARY KEY",
            self.wrap_schema_table(table)
        )]
    }

    /// `DROP TABLE [IF EXISTS] t`.
    fn compile_drop_table(&self, table: &str, if_exists: bool) -> String {
        let if_exists = if if_exists { "IF EXISTS " } else { "" };
        format!("DROP TABLE {if_exists}{}", self.wrap_prefixed("", table))
    }

    /// `ALTER TABLE a RENAME TO b`.
    fn compile_rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.wrap_prefixed("", from),
            self.wrap_prefixed("", to)
        )
    }

    /// Server version query, with a `version` column.
    fn compile_version(&self) -> String {
        String::from("select version() as version")
    }

    /// Lists base tables, with a `name` column.
    fn compile_table_listing(&self) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select table_name as name from information_schema.tables \
                 where table_type = 'BASE TABLE' order by table_name",
            ),
            Vec::new(),
        )
    }

    /// Counts tables named `table`, with an `aggregate` column.
    fn compile_table_exists(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select count(*) as aggregate from information_schema.tables \
                 where table_type = 'BASE TABLE' and table_name = ?",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    /// Lists the columns of `table`, one row per column, in table order.
    fn compile_column_listing(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select column_name as name, data_type as native_type, is_nullable as nullable, \
                 column_default as default_value, character_maximum_length as length, \
                 numeric_precision as `precision`, numeric_scale as scale, \
                 '' as extra, '' as comment \
                 from information_schema.columns where table_name = ? order by ordinal_position",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    /// Lists `(index, column)` pairs of `table`, ordered by index then
    /// column position.
    fn compile_index_listing(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select tc.constraint_name as index_name, kcu.column_name as column_name, \
                 tc.constraint_type as constraint_type \
                 from information_schema.table_constraints tc \
                 join information_schema.key_column_usage kcu \
                 on kcu.constraint_name = tc.constraint_name and kcu.table_name = tc.table_name \
                 where tc.table_name = ? and tc.constraint_type in ('PRIMARY KEY', 'UNIQUE') \
                 order by tc.constraint_name, kcu.ordinal_position",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    /// Builds a column from a row of [`SchemaGrammar::compile_column_listing`].
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Introspection`] when a required field is missing.
    fn parse_column(&self, row: &Row) -> Result<Column> {
        parse_listed_column(self, row)
    }

    /// Parses a row of [`SchemaGrammar::compile_index_listing`].
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Introspection`] when a required field is missing.
    fn parse_index_row(&self, row: &Row) -> Result<IndexRow> {
        let constraint = required_text(row, "constraint_type")?;
        Ok(IndexRow {
            name: required_text(row, "index_name")?,
            column: required_text(row, "column_name")?,
            unique: true,
            primary: constraint.eq_ignore_ascii_case("PRIMARY KEY"),
        })
    }

    /// Parses every row of [`SchemaGrammar::compile_index_listing`].
    ///
    /// # Errors
    ///
    /// Fails on the first malformed row.
    fn parse_index_rows(&self, rows: &[Row]) -> Result<Vec<IndexRow>> {
        rows.iter().map(|row| self.parse_index_row(row)).collect()
    }

    /// Query listing the options of an enum column, if stored apart.
    fn compile_enum_options(&self, _column: &Column) -> Option<(String, Vec<SqlValue>)> {
        None
    }

    /// Reads enum options from the rows of [`SchemaGrammar::compile_enum_options`].
    fn parse_enum_options(&self, rows: &[Row]) -> Vec<String> {
        rows.iter()
            .filter_map(|row| row.get_index(0).and_then(|v| v.get::<String>()))
            .collect()
    }

    /// Query returning the stored `CREATE TABLE` text, if the dialect
    /// keeps constraints only there.
    fn compile_table_definition(&self, _table: &str) -> Option<(String, Vec<SqlValue>)> {
        None
    }

    /// Completes the model from the stored `CREATE TABLE` text.
    fn apply_table_definition(&self, _table: &mut Table, _definition: &str) {}
}

/// True when the primary key is declared inline by its auto-increment column.
#[must_use]
pub fn has_inline_primary(table: &Table) -> bool {
    table.primary.as_ref().is_some_and(|primary| {
        primary.columns.len() == 1
            && table
                .get_column(&primary.columns[0])
                .is_some_and(|c| c.auto_increment)
    })
}

/// Lower-case type name without length or modifiers: `varchar(255)` → `varchar`.
#[must_use]
pub fn base_type(native: &str) -> String {
    let mut out = String::with_capacity(native.len());
    let mut depth = 0usize;
    for ch in native.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch.to_ascii_lowercase()),
            _ => {}
        }
    }
    let words: Vec<&str> = out
        .split_whitespace()
        .filter(|w| *w != "unsigned" && *w != "zerofill")
        .collect();
    words.join(" ")
}

/// Shared parsing of an `information_schema`-shaped column row.
pub(crate) fn parse_listed_column<G: SchemaGrammar + ?Sized>(grammar: &G, row: &Row) -> Result<Column> {
    let name = required_text(row, "name")?;
    let native = required_text(row, "native_type")?;
    let (hint, comment) = decode_comment(row.get_str("comment"));
    let column_type = hint
        .or_else(|| grammar.flip_type(&native))
        .unwrap_or(ColumnType::String);

    let mut column = Column::new(name, column_type);
    column.nullable = row
        .get("nullable")
        .and_then(|v| match v {
            SqlValue::Text(s) => Some(s.eq_ignore_ascii_case("yes")),
            other => other.get::<bool>(),
        })
        .unwrap_or(false);
    column.auto_increment = row
        .get_str("extra")
        .is_some_and(|e| e.to_ascii_lowercase().contains("auto_increment"));
    if !column.auto_increment {
        column.default = row
            .get("default_value")
            .and_then(|v| v.get::<String>())
            .map(DefaultValue::Expression);
    }
    match column.column_type {
        ColumnType::String | ColumnType::Char => column.length = optional_u32(row, "length"),
        ColumnType::Decimal => {
            column.precision = optional_u32(row, "precision");
            column.scale = optional_u32(row, "scale");
        }
        _ => {}
    }
    column.unsigned = native.to_ascii_lowercase().contains("unsigned");
    column.comment = comment;
    column.native_type = Some(native);
    Ok(column)
}

/// Values of a quoted list: `'a', 'it''s'` → `["a", "it's"]`.
#[must_use]
pub fn parse_quoted_list(list: &str) -> Vec<String> {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    let re = QUOTED.get_or_init(|| Regex::new(r"'((?:[^']|'')*)'").expect("valid quoted list regex"));
    re.captures_iter(list)
        .map(|c| c[1].replace("''", "'"))
        .collect()
}

/// `'a', 'b'` for enum declarations.
pub(crate) fn quoted_options<G: Dialect + ?Sized>(grammar: &G, options: &[String]) -> String {
    options
        .iter()
        .map(|o| grammar.quote_string(o))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn required_text(row: &Row, column: &str) -> Result<String> {
    row.get(column)
        .and_then(|v| v.get::<String>())
        .ok_or_else(|| QueryError::Introspection {
            table: String::new(),
            message: format!("missing `{column}` in metadata row"),
        })
}

pub(crate) fn optional_u32(row: &Row, column: &str) -> Option<u32> {
    row.get(column)
        .and_then(|v| v.get::<i64>())
        .and_then(|n| u32::try_from(n).ok())
}

fn generic_type_name(column: &Column) -> String {
    match column.column_type {
        ColumnType::String => format!("VARCHAR({})", column.length.unwrap_or(255)),
        ColumnType::Char => format!("CHAR({})", column.length.unwrap_or(255)),
        ColumnType::Text | ColumnType::MediumText | ColumnType::LongText => String::from("TEXT"),
        ColumnType::Binary => String::from("BLOB"),
        ColumnType::TinyInteger | ColumnType::SmallInteger => String::from("SMALLINT"),
        ColumnType::Integer | ColumnType::Year => String::from("INTEGER"),
        ColumnType::BigInteger => String::from("BIGINT"),
        ColumnType::Float => String::from("REAL"),
        ColumnType::Double => String::from("DOUBLE PRECISION"),
        ColumnType::Decimal => format!(
            "DECIMAL({}, {})",
            column.precision.unwrap_or(8),
            column.scale.unwrap_or(2)
        ),
        ColumnType::Boolean => String::from("BOOLEAN"),
        ColumnType::Date => String::from("DATE"),
        ColumnType::DateTime | ColumnType::Timestamp => String::from("TIMESTAMP"),
        ColumnType::DateTimeTz | ColumnType::TimestampTz => {
            String::from("TIMESTAMP WITH TIME ZONE")
        }
        ColumnType::Time => String::from("TIME"),
        ColumnType::Json | ColumnType::Jsonb => String::from("TEXT"),
        ColumnType::Uuid => String::from("CHAR(36)"),
        ColumnType::IpAddress => String::from("VARCHAR(45)"),
        ColumnType::MacAddress => String::from("VARCHAR(17)"),
        ColumnType::Enum => String::from("VARCHAR(255)"),
    }
}

fn generic_flip_type(base: &str) -> Option<ColumnType> {
    Some(match base {
        "varchar" | "character varying" => ColumnType::String,
        "char" | "character" => ColumnType::Char,
        "text" => ColumnType::Text,
        "blob" => ColumnType::Binary,
        "smallint" => ColumnType::SmallInteger,
        "integer" | "int" => ColumnType::Integer,
        "bigint" => ColumnType::BigInteger,
        "real" => ColumnType::Float,
        "double precision" | "double" => ColumnType::Double,
        "decimal" | "numeric" => ColumnType::Decimal,
        "boolean" => ColumnType::Boolean,
        "date" => ColumnType::Date,
        "timestamp" => ColumnType::DateTime,
        "timestamp with time zone" => ColumnType::DateTimeTz,
        "time" => ColumnType::Time,
        _ => return None,
    })
}
