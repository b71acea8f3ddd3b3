//! MySQL grammar.

use std::sync::OnceLock;

use regex::Regex;

use crate::ast::Query;
use crate::connection::Row;
use crate::error::Result;
use crate::schema::{encode_comment, Column, ColumnType, Table};
use crate::value::{Record, SqlValue};

use super::schema::{base_type, parse_listed_column, parse_quoted_list, quoted_options, required_text};
use super::{Context, Dialect, IndexRow, QueryGrammar, SchemaGrammar};

/// MySQL / MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlGrammar;

impl MySqlGrammar {
    /// Creates the grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for MySqlGrammar {
    fn name(&self) -> &'static str {
        "mysql"
    }
}

impl QueryGrammar for MySqlGrammar {
    fn compile_insert_or_ignore(&self, ctx: &mut Context, query: &Query, records: &[Record]) -> String {
        let sql = self.compile_insert(ctx, query, records);
        sql.replacen("insert", "insert ignore", 1)
    }

    fn compile_upsert(
        &self,
        ctx: &mut Context,
        query: &Query,
        records: &[Record],
        _unique_by: &[String],
        update: &[String],
    ) -> String {
        if update.is_empty() {
            return self.compile_insert_or_ignore(ctx, query, records);
        }
        let insert = self.compile_insert(ctx, query, records);
        let assignments: Vec<String> = update
            .iter()
            .map(|column| {
                let column = self.quote_identifier(column);
                format!("{column} = values({column})")
            })
            .collect();
        format!("{insert} on duplicate key update {}", assignments.join(", "))
    }

    fn compile_random(&self) -> String {
        String::from("RAND()")
    }
}

impl SchemaGrammar for MySqlGrammar {
    fn type_name(&self, _table: &Table, column: &Column) -> String {
        match column.column_type {
            ColumnType::String => format!("VARCHAR({})", column.length.unwrap_or(255)),
            ColumnType::Char => format!("CHAR({})", column.length.unwrap_or(255)),
            ColumnType::Text => String::from("TEXT"),
            ColumnType::MediumText => String::from("MEDIUMTEXT"),
            ColumnType::LongText => String::from("LONGTEXT"),
            ColumnType::Binary => String::from("BLOB"),
            ColumnType::TinyInteger => String::from("TINYINT"),
            ColumnType::SmallInteger => String::from("SMALLINT"),
            ColumnType::Integer => String::from("INT"),
            ColumnType::BigInteger => String::from("BIGINT"),
            ColumnType::Float => String::from("FLOAT"),
            ColumnType::Double => String::from("DOUBLE"),
            ColumnType::Decimal => format!(
                "DECIMAL({}, {})",
                column.precision.unwrap_or(8),
                column.scale.unwrap_or(2)
            ),
            ColumnType::Boolean => String::from("TINYINT(1)"),
            ColumnType::Date => String::from("DATE"),
            ColumnType::DateTime | ColumnType::DateTimeTz => String::from("DATETIME"),
            ColumnType::Time => String::from("TIME"),
            ColumnType::Timestamp | ColumnType::TimestampTz => String::from("TIMESTAMP"),
            ColumnType::Year => String::from("YEAR"),
            ColumnType::Json | ColumnType::Jsonb => String::from("JSON"),
            ColumnType::Uuid => String::from("CHAR(36)"),
            ColumnType::IpAddress => String::from("VARCHAR(45)"),
            ColumnType::MacAddress => String::from("VARCHAR(17)"),
            ColumnType::Enum => format!("ENUM({})", quoted_options(self, &column.options)),
        }
    }

    fn flip_type(&self, native: &str) -> Option<ColumnType> {
        if native.trim().to_ascii_lowercase().starts_with("tinyint(1)") {
            return Some(ColumnType::Boolean);
        }
        Some(match base_type(native).as_str() {
            "varchar" => ColumnType::String,
            "char" => ColumnType::Char,
            "text" => ColumnType::Text,
            "mediumtext" => ColumnType::MediumText,
            "longtext" => ColumnType::LongText,
            "blob" => ColumnType::Binary,
            "tinyint" => ColumnType::TinyInteger,
            "smallint" => ColumnType::SmallInteger,
            "int" | "integer" => ColumnType::Integer,
            "bigint" => ColumnType::BigInteger,
            "float" => ColumnType::Float,
            "double" => ColumnType::Double,
            "decimal" => ColumnType::Decimal,
            "date" => ColumnType::Date,
            "datetime" => ColumnType::DateTime,
            "time" => ColumnType::Time,
            "timestamp" => ColumnType::Timestamp,
            "year" => ColumnType::Year,
            "json" => ColumnType::Json,
            "enum" => ColumnType::Enum,
            _ => return None,
        })
    }

    fn supports_unsigned(&self) -> bool {
        true
    }

    fn compile_inline_comment(&self, table: &Table, column: &Column) -> Option<String> {
        encode_comment(column, self.needs_type_hint(table, column))
            .map(|comment| format!("COMMENT {}", self.quote_string(&comment)))
    }

    fn compile_table_options(&self, table: &Table) -> String {
        let mut options = String::new();
        if let Some(engine) = &table.engine {
            options.push_str(&format!(" ENGINE = {engine}"));
        }
        if let Some(charset) = &table.charset {
            options.push_str(&format!(" DEFAULT CHARSET = {charset}"));
        }
        if let Some(collation) = &table.collation {
            options.push_str(&format!(" COLLATE = {collation}"));
        }
        if let Some(comment) = &table.comment {
            options.push_str(&format!(" COMMENT = {}", self.quote_string(comment)));
        }
        options
    }

    fn compile_table_listing(&self) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select table_name as name from information_schema.tables \
                 where table_schema = database() and table_type = 'BASE TABLE' \
                 order by table_name",
            ),
            Vec::new(),
        )
    }

    fn compile_table_exists(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select count(*) as aggregate from information_schema.tables \
                 where table_schema = database() and table_type = 'BASE TABLE' and table_name = ?",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    fn compile_column_listing(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select column_name as name, column_type as native_type, is_nullable as nullable, \
                 column_default as default_value, \
                 cast(character_maximum_length as signed) as length, \
                 cast(numeric_precision as signed) as `precision`, \
                 cast(numeric_scale as signed) as scale, \
                 extra, column_comment as comment \
                 from information_schema.columns \
                 where table_schema = database() and table_name = ? \
                 order by ordinal_position",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    fn compile_index_listing(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select index_name, column_name, cast(non_unique as signed) as non_unique \
                 from information_schema.statistics \
                 where table_schema = database() and table_name = ? \
                 order by index_name, seq_in_index",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    fn parse_column(&self, row: &Row) -> Result<Column> {
        let mut column = parse_listed_column(self, row)?;
        if column.is_enum() {
            column.options = column
                .native_type
                .as_deref()
                .and_then(enum_declaration)
                .map(|list| parse_quoted_list(&list))
                .unwrap_or_default();
        }
        Ok(column)
    }

    fn parse_index_row(&self, row: &Row) -> Result<IndexRow> {
        let name = required_text(row, "index_name")?;
        let non_unique = row.get("non_unique").and_then(|v| v.get::<i64>()).unwrap_or(1);
        Ok(IndexRow {
            primary: name == "PRIMARY",
            unique: non_unique == 0,
            column: required_text(row, "column_name")?,
            name,
        })
    }
}

/// The option list of `enum('a','b')`.
fn enum_declaration(native: &str) -> Option<String> {
    static ENUM: OnceLock<Regex> = OnceLock::new();
    let re = ENUM.get_or_init(|| Regex::new(r"(?is)^enum\((.*)\)$").expect("valid enum declaration regex"));
    re.captures(native.trim()).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FromClause, Name};
    use crate::grammar::Placeholder;

    fn users() -> Query {
        let mut query = Query::new();
        query.from = Some(FromClause::Table(Name::parse("users")));
        query
    }

    fn record() -> Record {
        Record::new().set("email", "a@x.com").set("vote", 3)
    }

    #[test]
    fn test_drop_column_drops_covering_indexes() {
        let mut table = Table::new("users");
        table.id();
        table.string("first");
        table.string("last");
        table.string("email").unique();
        table.index(&["first", "last"]);
        table.finish();
        let table = table.preview();

        assert_eq!(
            MySqlGrammar::new()
                .compile_command(&table, &crate::schema::Command::DropColumn(String::from("last"))),
            vec![
                String::from("DROP INDEX `users_first_last_index` ON `users`"),
                String::from("ALTER TABLE `users` DROP COLUMN `last`"),
            ]
        );
        assert_eq!(
            MySqlGrammar::new()
                .compile_command(&table, &crate::schema::Command::DropColumn(String::from("first"))),
            vec![
                String::from("DROP INDEX `users_first_last_index` ON `users`"),
                String::from("ALTER TABLE `users` DROP COLUMN `first`"),
            ]
        );
    }

    #[test]
    fn test_upsert() {
        let grammar = MySqlGrammar::new();
        let mut ctx = Context::new(Placeholder::Question, "");
        let sql = grammar.compile_upsert(
            &mut ctx,
            &users(),
            &[record()],
            &[String::from("email")],
            &[String::from("vote")],
        );
        assert_eq!(
            sql,
            "insert into `users` (`email`, `vote`) values (?, ?) on duplicate key update `vote` = values(`vote`)"
        );
        assert_eq!(ctx.bindings().len(), 2);
    }

    #[test]
    fn test_insert_ignore() {
        let grammar = MySqlGrammar::new();
        let mut ctx = Context::new(Placeholder::Question, "");
        assert_eq!(
            grammar.compile_insert_or_ignore(&mut ctx, &users(), &[record()]),
            "insert ignore into `users` (`email`, `vote`) values (?, ?)"
        );
    }

    #[test]
    fn test_create_table() {
        let grammar = MySqlGrammar::new();
        let mut table = Table::new("users");
        table.id();
        table.string("email").unique();
        table.ip_address("last_ip").nullable().comment("login");
        table.enum_("status", &["draft", "live"]).default("draft");
        table.charset = Some(String::from("utf8mb4"));
        table.finish();
        let sql = grammar.compile_create_table(&table.preview(), false);
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE `users` (\
                 `id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY, \
                 `email` VARCHAR(255) NOT NULL, \
                 `last_ip` VARCHAR(45) NULL COMMENT 'T:ipAddress|login', \
                 `status` ENUM('draft', 'live') NOT NULL DEFAULT 'draft', \
                 UNIQUE INDEX `users_email_unique` (`email`)) DEFAULT CHARSET = utf8mb4"
            ]
        );
    }

    #[test]
    fn test_flip_types() {
        let grammar = MySqlGrammar::new();
        assert_eq!(grammar.flip_type("tinyint(1)"), Some(ColumnType::Boolean));
        assert_eq!(grammar.flip_type("bigint unsigned"), Some(ColumnType::BigInteger));
        assert_eq!(grammar.flip_type("enum('a','b')"), Some(ColumnType::Enum));
        assert_eq!(
            enum_declaration("enum('a','b')").map(|l| parse_quoted_list(&l)),
            Some(vec![String::from("a"), String::from("b")])
        );
    }

    #[test]
    fn test_parse_index_row() {
        let grammar = MySqlGrammar::new();
        let row: Row = [
            ("index_name", SqlValue::Text(String::from("PRIMARY"))),
            ("column_name", SqlValue::Text(String::from("id"))),
            ("non_unique", SqlValue::Int(0)),
        ]
        .into_iter()
        .collect();
        let index = grammar.parse_index_row(&row).unwrap();
        assert!(index.primary && index.unique);
    }
}
