//! SQLite grammar.

use std::sync::OnceLock;

use regex::Regex;

use crate::ast::{DatePart, Lock, Query, Union};
use crate::connection::Row;
use crate::error::Result;
use crate::schema::{Column, ColumnType, Command, Index, Primary, Table};
use crate::value::{Operand, Record, SqlValue};

use super::query::{compile_key_subselect, unqualified};
use super::schema::{
    base_type, optional_u32, parse_quoted_list, quoted_options, required_text,
};
use super::{join_segments, Context, Dialect, IndexRow, QueryGrammar, SchemaGrammar};

/// SQLite 3.
///
/// Union members are wrapped in `select * from (...)` so they may carry
/// their own order and limit. Changing a column or the primary key rebuilds
/// the table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGrammar;

impl SqliteGrammar {
    /// Creates the grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn update_columns(&self, ctx: &mut Context, values: &Record) -> String {
        let mut out = Vec::with_capacity(values.len());
        for (column, value) in values.iter() {
            let column = self.quote_identifier(unqualified(column));
            out.push(format!("{column} = {}", ctx.parameter(value)));
        }
        out.join(", ")
    }

    /// Recreates the table in the shape it has after `command`.
    fn compile_rebuild(&self, table: &Table, command: &Command) -> Vec<String> {
        let mut target = table.clone();
        target.commands.clear();
        target.apply(command);
        for column in &mut target.columns {
            if column.auto_increment && !column.primary {
                column.auto_increment = false;
            }
        }

        let mut temp = target.clone();
        temp.name = format!("__temp__{}", target.name);
        temp.indexes.clear();

        let common: Vec<String> = target
            .columns
            .iter()
            .filter(|c| table.has_column(&c.name))
            .map(|c| c.name.clone())
            .collect();
        let common = self.columnize_names(&common);

        // A rebuild that failed half way leaves its temporary table behind.
        let mut statements = vec![format!(
            "DROP TABLE IF EXISTS {}",
            self.wrap_schema_table(&temp)
        )];
        statements.extend(self.compile_create_table(&temp, false));
        statements.push(format!(
            "INSERT INTO {} ({common}) SELECT {common} FROM {}",
            self.wrap_schema_table(&temp),
            self.wrap_schema_table(table)
        ));
        statements.push(format!("DROP TABLE {}", self.wrap_schema_table(table)));
        statements.push(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.wrap_schema_table(&temp),
            self.wrap_schema_table(&target)
        ));
        for index in &target.indexes {
            statements.extend(self.compile_create_index(&target, index));
        }
        statements
    }
}

impl Dialect for SqliteGrammar {
    fn name(&self) -> &'static str {
        "sqlite3"
    }
}

impl QueryGrammar for SqliteGrammar {
    fn compile_where_date(
        &self,
        ctx: &mut Context,
        part: DatePart,
        column: &str,
        operator: &str,
        value: &Operand,
    ) -> String {
        let format = match part {
            DatePart::Date => "%Y-%m-%d",
            DatePart::Time => "%H:%M:%S",
            DatePart::Day => "%d",
            DatePart::Month => "%m",
            DatePart::Year => "%Y",
        };
        let column = self.wrap(ctx, column);
        let value = match value {
            Operand::Value(_) => format!("cast({} as text)", ctx.parameter(value)),
            Operand::Expression(_) => ctx.parameter(value),
        };
        format!("strftime('{format}', {column}) {operator} {value}")
    }

    fn compile_offset_without_limit(&self, offset: u64) -> String {
        format!("limit -1 offset {offset}")
    }

    fn compile_lock(&self, _lock: Lock) -> String {
        String::new()
    }

    fn wrap_union(&self, sql: &str) -> String {
        format!("select * from ({sql})")
    }

    fn compile_union(&self, ctx: &mut Context, union: &Union) -> String {
        let keyword = if union.all { "union all" } else { "union" };
        let sql = self.compile_select(ctx, &union.query);
        format!("{keyword} {}", self.wrap_union(&sql))
    }

    fn compile_insert_or_ignore(&self, ctx: &mut Context, query: &Query, records: &[Record]) -> String {
        let sql = self.compile_insert(ctx, query, records);
        sql.replacen("insert", "insert or ignore", 1)
    }

    fn compile_upsert(
        &self,
        ctx: &mut Context,
        query: &Query,
        records: &[Record],
        unique_by: &[String],
        update: &[String],
    ) -> String {
        let insert = self.compile_insert(ctx, query, records);
        let keys = self.columnize_names(unique_by);
        if update.is_empty() {
            return format!("{insert} on conflict ({keys}) do nothing");
        }
        let excluded = self.quote_identifier("excluded");
        let assignments: Vec<String> = update
            .iter()
            .map(|column| {
                let column = self.quote_identifier(column);
                format!("{column} = {excluded}.{column}")
            })
            .collect();
        format!(
            "{insert} on conflict ({keys}) do update set {}",
            assignments.join(", ")
        )
    }

    fn compile_update(&self, ctx: &mut Context, query: &Query, values: &Record) -> String {
        let table = self.compile_dml_table(ctx, query);
        let columns = self.update_columns(ctx, values);
        if query.joins.is_empty() && query.limit.is_none() {
            let mut segments = vec![format!("update {table} set {columns}")];
            if !query.wheres.is_empty() {
                segments.push(self.compile_wheres(ctx, &query.wheres));
            }
            return join_segments(segments);
        }
        let select = compile_key_subselect(self, ctx, query, "rowid");
        format!(
            "update {table} set {columns} where {} in ({select})",
            self.quote_identifier("rowid")
        )
    }

    fn compile_delete(&self, ctx: &mut Context, query: &Query) -> String {
        let table = self.compile_dml_table(ctx, query);
        if query.joins.is_empty() && query.limit.is_none() {
            let mut segments = vec![format!("delete from {table}")];
            if !query.wheres.is_empty() {
                segments.push(self.compile_wheres(ctx, &query.wheres));
            }
            return join_segments(segments);
        }
        let select = compile_key_subselect(self, ctx, query, "rowid");
        format!(
            "delete from {table} where {} in ({select})",
            self.quote_identifier("rowid")
        )
    }

    fn compile_truncate(&self, ctx: &mut Context, query: &Query) -> String {
        format!("delete from {}", self.compile_dml_table(ctx, query))
    }
}

impl SchemaGrammar for SqliteGrammar {
    fn type_name(&self, _table: &Table, column: &Column) -> String {
        if column.auto_increment {
            return String::from("INTEGER");
        }
        match column.column_type {
            ColumnType::String => format!("VARCHAR({})", column.length.unwrap_or(255)),
            ColumnType::Char => format!("CHAR({})", column.length.unwrap_or(255)),
            ColumnType::Text | ColumnType::Enum => String::from("TEXT"),
            ColumnType::MediumText => String::from("MEDIUMTEXT"),
            ColumnType::LongText => String::from("LONGTEXT"),
            ColumnType::Binary => String::from("BLOB"),
            ColumnType::TinyInteger => String::from("TINYINT"),
            ColumnType::SmallInteger => String::from("SMALLINT"),
            ColumnType::Integer => String::from("INTEGER"),
            ColumnType::BigInteger => String::from("BIGINT"),
            ColumnType::Float => String::from("FLOAT"),
            ColumnType::Double => String::from("DOUBLE"),
            ColumnType::Decimal => format!(
                "DECIMAL({}, {})",
                column.precision.unwrap_or(8),
                column.scale.unwrap_or(2)
            ),
            ColumnType::Boolean => String::from("BOOLEAN"),
            ColumnType::Date => String::from("DATE"),
            ColumnType::DateTime => String::from("DATETIME"),
            ColumnType::DateTimeTz => String::from("DATETIMETZ"),
            ColumnType::Time => String::from("TIME"),
            ColumnType::Timestamp => String::from("TIMESTAMP"),
            ColumnType::TimestampTz => String::from("TIMESTAMPTZ"),
            ColumnType::Year => String::from("YEAR"),
            ColumnType::Json => String::from("JSON"),
            ColumnType::Jsonb => String::from("JSONB"),
            ColumnType::Uuid => String::from("UUID"),
            ColumnType::IpAddress => String::from("INET"),
            ColumnType::MacAddress => String::from("MACADDR"),
        }
    }

    fn flip_type(&self, native: &str) -> Option<ColumnType> {
        Some(match base_type(native).as_str() {
            "varchar" => ColumnType::String,
            "char" => ColumnType::Char,
            "text" => ColumnType::Text,
            "mediumtext" => ColumnType::MediumText,
            "longtext" => ColumnType::LongText,
            "blob" => ColumnType::Binary,
            "tinyint" => ColumnType::TinyInteger,
            "smallint" => ColumnType::SmallInteger,
            "integer" | "int" => ColumnType::Integer,
            "bigint" => ColumnType::BigInteger,
            "float" | "real" => ColumnType::Float,
            "double" => ColumnType::Double,
            "decimal" | "numeric" => ColumnType::Decimal,
            "boolean" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "datetime" => ColumnType::DateTime,
            "datetimetz" => ColumnType::DateTimeTz,
            "time" => ColumnType::Time,
            "timestamp" => ColumnType::Timestamp,
            "timestamptz" => ColumnType::TimestampTz,
            "year" => ColumnType::Year,
            "json" => ColumnType::Json,
            "jsonb" => ColumnType::Jsonb,
            "uuid" => ColumnType::Uuid,
            "inet" => ColumnType::IpAddress,
            "macaddr" => ColumnType::MacAddress,
            _ => return None,
        })
    }

    fn auto_increment_clause(&self) -> &'static str {
        " PRIMARY KEY AUTOINCREMENT"
    }

    fn compile_column_check(&self, column: &Column) -> Option<String> {
        column.is_enum().then(|| {
            format!(
                "CHECK ({} IN ({}))",
                self.quote_identifier(&column.name),
                quoted_options(self, &column.options)
            )
        })
    }

    fn compile_inline_index(&self, _table: &Table, _index: &Index) -> Option<String> {
        None
    }

    fn compile_change_column(&self, table: &Table, column: &Column) -> Vec<String> {
        self.compile_rebuild(table, &Command::ChangeColumn(column.clone()))
    }

    fn compile_drop_index(&self, _table: &Table, name: &str) -> Vec<String> {
        vec![format!("DROP INDEX {}", self.quote_identifier(name))]
    }

    fn compile_rename_index(&self, table: &Table, from: &str, to: &str) -> Vec<String> {
        let mut statements = self.compile_drop_index(table, from);
        if let Some(index) = table.get_index(from) {
            let renamed = Index {
                name: to.to_string(),
                ..index.clone()
            };
            statements.extend(self.compile_create_index(table, &renamed));
        }
        statements
    }

    fn compile_create_primary(&self, table: &Table, primary: &Primary) -> Vec<String> {
        self.compile_rebuild(table, &Command::CreatePrimary(primary.clone()))
    }

    fn compile_drop_primary(&self, table: &Table) -> Vec<String> {
        self.compile_rebuild(table, &Command::DropPrimary)
    }

    fn compile_version(&self) -> String {
        String::from("select sqlite_version() as version")
    }

    fn compile_table_listing(&self) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select name from sqlite_master \
                 where type = 'table' and name not like 'sqlite_%' order by name",
            ),
            Vec::new(),
        )
    }

    fn compile_table_exists(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select count(*) as aggregate from sqlite_master where type = 'table' and name = ?",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    fn compile_column_listing(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select name, type as native_type, \
                 case when \"notnull\" = 0 then 'YES' else 'NO' end as nullable, \
                 dflt_value as default_value, pk from pragma_table_info(?) order by cid",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    fn compile_index_listing(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select il.name as index_name, ii.name as column_name, \
                 il.\"unique\" as is_unique, il.origin as origin \
                 from pragma_index_list(?) as il, pragma_index_info(il.name) as ii \
                 order by il.name, ii.seqno",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    fn parse_column(&self, row: &Row) -> Result<Column> {
        let name = required_text(row, "name")?;
        let native = required_text(row, "native_type")?;
        let column_type = self.flip_type(&native).unwrap_or(ColumnType::String);

        let mut column = Column::new(name, column_type);
        column.nullable = row.get_str("nullable") == Some("YES");
        column.default = row
            .get("default_value")
            .and_then(|v| v.get::<String>())
            .map(crate::schema::DefaultValue::Expression);
        column.primary = optional_u32(row, "pk").is_some_and(|pk| pk > 0);
        let sizes = type_arguments(&native);
        match column_type {
            ColumnType::String | ColumnType::Char => column.length = sizes.first().copied(),
            ColumnType::Decimal => {
                column.precision = sizes.first().copied();
                column.scale = sizes.get(1).copied();
            }
            _ => {}
        }
        column.native_type = Some(native);
        Ok(column)
    }

    fn parse_index_row(&self, row: &Row) -> Result<IndexRow> {
        Ok(IndexRow {
            name: required_text(row, "index_name")?,
            column: required_text(row, "column_name")?,
            unique: row.get("is_unique").and_then(|v| v.get::<bool>()).unwrap_or(false),
            primary: row.get_str("origin") == Some("pk"),
        })
    }

    fn compile_table_definition(&self, table: &str) -> Option<(String, Vec<SqlValue>)> {
        Some((
            String::from("select sql from sqlite_master where type = 'table' and name = ?"),
            vec![SqlValue::Text(table.to_string())],
        ))
    }

    fn apply_table_definition(&self, table: &mut Table, definition: &str) {
        static CHECK: OnceLock<Regex> = OnceLock::new();
        static AUTOINCREMENT: OnceLock<Regex> = OnceLock::new();
        let check = CHECK.get_or_init(|| {
            Regex::new(
                r#"(?i)CHECK\s*\(\s*[`"\[]?(\w+)[`"\]]?\s+IN\s*\(((?:\s*'(?:[^']|'')*'\s*,?)*)\s*\)\s*\)"#,
            )
                .expect("valid check constraint regex")
        });
        let autoincrement = AUTOINCREMENT.get_or_init(|| {
            Regex::new(
                r#"(?i)[`"\[]?(\w+)[`"\]]?\s+INTEGER\s+(?:NOT\s+NULL\s+)?PRIMARY\s+KEY\s+AUTOINCREMENT"#,
            )
            .expect("valid autoincrement regex")
        });

        for captures in check.captures_iter(definition) {
            if let Some(column) = table.get_column_mut(&captures[1]) {
                column.column_type = ColumnType::Enum;
                column.options = parse_quoted_list(&captures[2]);
            }
        }
        if let Some(captures) = autoincrement.captures(definition) {
            if let Some(column) = table.get_column_mut(&captures[1]) {
                column.column_type = ColumnType::BigInteger;
                column.auto_increment = true;
                column.primary = true;
                column.default = None;
            }
        }
    }
}

/// Numeric arguments of a declared type: `DECIMAL(8, 2)` → `[8, 2]`.
fn type_arguments(native: &str) -> Vec<u32> {
    let Some((_, rest)) = native.split_once('(') else {
        return Vec::new();
    };
    rest.trim_end_matches(')')
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FromClause, Name, Selection};
    use crate::grammar::Placeholder;

    fn ctx() -> Context {
        Context::new(Placeholder::Question, "")
    }

    fn users() -> Query {
        let mut query = Query::new();
        query.from = Some(FromClause::Table(Name::parse("users")));
        query
    }

    #[test]
    fn test_union_branches_are_wrapped() {
        let grammar = SqliteGrammar::new();
        let mut branch = users();
        branch.columns = vec![Selection::Column(String::from("id"))];
        branch.limit = Some(1);
        let mut query = users();
        query.columns = vec![Selection::Column(String::from("id"))];
        query.unions.push(Union {
            query: Box::new(branch),
            all: false,
        });
        query.union_limit = Some(1);
        assert_eq!(
            grammar.compile_select(&mut ctx(), &query),
            "select * from (select `id` from `users`) union \
             select * from (select `id` from `users` limit 1) limit 1"
        );
    }

    #[test]
    fn test_insert_or_ignore() {
        let grammar = SqliteGrammar::new();
        let record = Record::new().set("email", "a@x.com");
        assert_eq!(
            grammar.compile_insert_or_ignore(&mut ctx(), &users(), &[record]),
            "insert or ignore into `users` (`email`) values (?)"
        );
    }

    #[test]
    fn test_limited_update_uses_rowid() {
        let grammar = SqliteGrammar::new();
        let mut query = users();
        query.limit = Some(2);
        let sql = grammar.compile_update(&mut ctx(), &query, &Record::new().set("vote", 1));
        assert_eq!(
            sql,
            "update `users` set `vote` = ? where `rowid` in \
             (select `users`.`rowid` from `users` limit 2)"
        );
    }

    #[test]
    fn test_create_table_with_enum_check() {
        let grammar = SqliteGrammar::new();
        let mut table = Table::new("posts");
        table.id();
        table.enum_("status", &["draft", "live"]).default("draft");
        table.string("slug").unique();
        table.finish();
        assert_eq!(
            grammar.compile_create_table(&table.preview(), false),
            vec![
                "CREATE TABLE `posts` (`id` INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, \
                 `status` TEXT NOT NULL DEFAULT 'draft' CHECK (`status` IN ('draft', 'live')), \
                 `slug` VARCHAR(255) NOT NULL)",
                "CREATE UNIQUE INDEX `posts_slug_unique` ON `posts` (`slug`)",
            ]
        );
    }

    #[test]
    fn test_change_column_rebuilds_table() {
        let grammar = SqliteGrammar::new();
        let mut table = Table::new("posts");
        table.id();
        table.string("slug").index();
        table.string("title");
        table.finish();
        let table = table.preview();

        let mut title = Column::new("title", ColumnType::String);
        title.length(100).nullable();
        let statements = grammar.compile_command(&table, &Command::ChangeColumn(title));
        assert_eq!(
            statements,
            vec![
                "DROP TABLE IF EXISTS `__temp__posts`",
                "CREATE TABLE `__temp__posts` (`id` INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, \
                 `slug` VARCHAR(255) NOT NULL, `title` VARCHAR(100) NULL)",
                "INSERT INTO `__temp__posts` (`id`, `slug`, `title`) SELECT `id`, `slug`, `title` FROM `posts`",
                "DROP TABLE `posts`",
                "ALTER TABLE `__temp__posts` RENAME TO `posts`",
                "CREATE INDEX `posts_slug_index` ON `posts` (`slug`)",
            ]
        );
    }

    #[test]
    fn test_drop_column_drops_covering_indexes() {
        let grammar = SqliteGrammar::new();
        let mut table = Table::new("posts");
        table.string("slug").unique();
        table.finish();
        let table = table.preview();
        assert_eq!(
            grammar.compile_command(&table, &Command::DropColumn(String::from("slug"))),
            vec![
                "DROP INDEX `posts_slug_unique`",
                "ALTER TABLE `posts` DROP COLUMN `slug`",
            ]
        );
    }

    #[test]
    fn test_apply_table_definition() {
        let grammar = SqliteGrammar::new();
        let mut table = Table::new("posts");
        table.columns.push(Column::new("id", ColumnType::Integer));
        table.columns.push(Column::new("status", ColumnType::Text));
        grammar.apply_table_definition(
            &mut table,
            "CREATE TABLE `posts` (`id` INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, \
             `status` TEXT NOT NULL CHECK (`status` IN ('draft', 'it''s')))",
        );
        let id = table.get_column("id").unwrap();
        assert!(id.auto_increment && id.column_type == ColumnType::BigInteger);
        let status = table.get_column("status").unwrap();
        assert_eq!(status.column_type, ColumnType::Enum);
        assert_eq!(status.options, vec!["draft", "it's"]);
    }

    #[test]
    fn test_apply_table_definition_with_parenthesis_in_option() {
        let grammar = SqliteGrammar::new();
        let mut table = Table::new("posts");
        table.columns.push(Column::new("status", ColumnType::Text));
        table.columns.push(Column::new("kind", ColumnType::Text));
        grammar.apply_table_definition(
            &mut table,
            "CREATE TABLE `posts` (`status` TEXT NOT NULL CHECK (`status` IN ('a)b', 'c')), \
             `kind` TEXT NOT NULL CHECK (`kind` IN ('x')))",
        );
        assert_eq!(table.get_column("status").unwrap().options, vec!["a)b", "c"]);
        assert_eq!(table.get_column("kind").unwrap().options, vec!["x"]);
    }

    #[test]
    fn test_date_where_casts_value() {
        let grammar = SqliteGrammar::new();
        let value = Operand::Value(SqlValue::Text(String::from("03")));
        assert_eq!(
            grammar.compile_where_date(&mut ctx(), DatePart::Month, "created_at", "=", &value),
            "strftime('%m', `created_at`) = cast(? as text)"
        );
    }
}
