//! PostgreSQL grammar.

use crate::ast::{Aggregate, DatePart, Distinct, Lock, Query};
use crate::connection::Row;
use crate::error::Result;
use crate::schema::{encode_comment, Column, ColumnType, Primary, Table};
use crate::value::{Operand, Record, SqlValue};

use super::query::{compile_key_subselect, unqualified};
use super::schema::{base_type, parse_listed_column, quoted_options, required_text};
use super::{join_segments, Context, Dialect, IndexRow, Placeholder, QueryGrammar, SchemaGrammar};

/// PostgreSQL.
///
/// Joined or limited updates and deletes are rewritten to
/// `ctid in (select ...)`. Enum columns use a named type derived from the
/// option set, created on demand.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGrammar;

impl PostgresGrammar {
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
}

/// `enum_<hash>`: the type shared by every enum column with these options.
/// Each option is hashed behind its length, keeping option boundaries distinct.
#[must_use]
pub fn enum_type_name(options: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for option in options {
        hasher.update(&u64::try_from(option.len()).unwrap_or(u64::MAX).to_le_bytes());
        hasher.update(option.as_bytes());
    }
    format!("enum_{}", &hasher.finalize().to_hex()[..16])
}

impl Dialect for PostgresGrammar {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn identifier_quote(&self) -> char {
        '"'
    }

    fn placeholder(&self) -> Placeholder {
        Placeholder::Numbered
    }
}

impl QueryGrammar for PostgresGrammar {
    fn compile_distinct(&self, ctx: &mut Context, distinct: &Distinct) -> String {
        match distinct {
            Distinct::Off => String::from("select"),
            Distinct::Rows => String::from("select distinct"),
            Distinct::On(columns) => {
                format!("select distinct on ({})", self.columnize(ctx, columns))
            }
        }
    }

    fn compile_aggregate(&self, ctx: &mut Context, aggregate: &Aggregate, distinct: &Distinct) -> String {
        let mut column = self.columnize(ctx, &aggregate.columns);
        if *distinct != Distinct::Off && column != "*" {
            column = format!("distinct {column}");
        }
        // numeric results have no portable decoding
        let cast = match aggregate.function.as_str() {
            "sum" | "avg" => "::float8",
            _ => "",
        };
        format!("select {}({column}){cast} as aggregate", aggregate.function)
    }

    fn compile_where_date(
        &self,
        ctx: &mut Context,
        part: DatePart,
        column: &str,
        operator: &str,
        value: &Operand,
    ) -> String {
        let column = self.wrap(ctx, column);
        let value = ctx.parameter(value);
        match part {
            DatePart::Date => format!("{column}::date {operator} {value}::date"),
            DatePart::Time => format!("{column}::time {operator} {value}::time"),
            DatePart::Day | DatePart::Month | DatePart::Year => format!(
                "extract({} from {column}) {operator} {value}::int",
                part.as_str()
            ),
        }
    }

    fn compile_offset_without_limit(&self, offset: u64) -> String {
        format!("offset {offset}")
    }

    fn compile_lock(&self, lock: Lock) -> String {
        match lock {
            Lock::Update => String::from("for update"),
            Lock::Share => String::from("for share"),
        }
    }

    fn compile_insert_or_ignore(&self, ctx: &mut Context, query: &Query, records: &[Record]) -> String {
        format!("{} on conflict do nothing", self.compile_insert(ctx, query, records))
    }

    fn compile_insert_get_id(
        &self,
        ctx: &mut Context,
        query: &Query,
        record: &Record,
        sequence: &str,
    ) -> String {
        let insert = self.compile_insert(ctx, query, std::slice::from_ref(record));
        format!("{insert} returning {}", self.quote_identifier(sequence))
    }

    fn returns_inserted_id(&self) -> bool {
        true
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
        let keys = unique_by
            .iter()
            .map(|k| self.quote_identifier(k))
            .collect::<Vec<_>>()
            .join(", ");
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
        let select = compile_key_subselect(self, ctx, query, "ctid");
        format!(
            "update {table} set {columns} where {} in ({select})",
            self.quote_identifier("ctid")
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
        let select = compile_key_subselect(self, ctx, query, "ctid");
        format!(
            "delete from {table} where {} in ({select})",
            self.quote_identifier("ctid")
        )
    }

    fn compile_truncate(&self, ctx: &mut Context, query: &Query) -> String {
        format!(
            "truncate {} restart identity cascade",
            self.compile_dml_table(ctx, query)
        )
    }
}

impl SchemaGrammar for PostgresGrammar {
    fn type_name(&self, _table: &Table, column: &Column) -> String {
        if column.auto_increment {
            match column.column_type {
                ColumnType::TinyInteger | ColumnType::SmallInteger => {
                    return String::from("SMALLSERIAL")
                }
                ColumnType::Integer => return String::from("SERIAL"),
                ColumnType::BigInteger => return String::from("BIGSERIAL"),
                _ => {}
            }
        }
        match column.column_type {
            ColumnType::String => format!("VARCHAR({})", column.length.unwrap_or(255)),
            ColumnType::Char => format!("CHAR({})", column.length.unwrap_or(255)),
            ColumnType::Text | ColumnType::MediumText | ColumnType::LongText => String::from("TEXT"),
            ColumnType::Binary => String::from("BYTEA"),
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
            ColumnType::DateTime | ColumnType::Timestamp => {
                String::from("TIMESTAMP(0) WITHOUT TIME ZONE")
            }
            ColumnType::DateTimeTz | ColumnType::TimestampTz => {
                String::from("TIMESTAMP(0) WITH TIME ZONE")
            }
            ColumnType::Time => String::from("TIME(0) WITHOUT TIME ZONE"),
            ColumnType::Json => String::from("JSON"),
            ColumnType::Jsonb => String::from("JSONB"),
            ColumnType::Uuid => String::from("UUID"),
            ColumnType::IpAddress => String::from("INET"),
            ColumnType::MacAddress => String::from("MACADDR"),
            ColumnType::Enum => self.quote_identifier(&enum_type_name(&column.options)),
        }
    }

    fn flip_type(&self, native: &str) -> Option<ColumnType> {
        Some(match base_type(native).as_str() {
            "character varying" | "varchar" => ColumnType::String,
            "character" | "char" | "bpchar" => ColumnType::Char,
            "text" => ColumnType::Text,
            "bytea" => ColumnType::Binary,
            "smallint" | "int2" | "smallserial" => ColumnType::SmallInteger,
            "integer" | "int" | "int4" | "serial" => ColumnType::Integer,
            "bigint" | "int8" | "bigserial" => ColumnType::BigInteger,
            "real" | "float4" => ColumnType::Float,
            "double precision" | "float8" => ColumnType::Double,
            "numeric" | "decimal" => ColumnType::Decimal,
            "boolean" | "bool" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "timestamp without time zone" | "timestamp" => ColumnType::DateTime,
            "timestamp with time zone" | "timestamptz" => ColumnType::DateTimeTz,
            "time without time zone" | "time" => ColumnType::Time,
            "json" => ColumnType::Json,
            "jsonb" => ColumnType::Jsonb,
            "uuid" => ColumnType::Uuid,
            "inet" => ColumnType::IpAddress,
            "macaddr" => ColumnType::MacAddress,
            _ => return None,
        })
    }

    fn auto_increment_clause(&self) -> &'static str {
        " PRIMARY KEY"
    }

    fn compile_primary_constraint(&self, _table: &Table, primary: &Primary) -> String {
        format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            self.quote_identifier(&primary.name),
            self.columnize_names(&primary.columns)
        )
    }

    fn compile_inline_index(&self, _table: &Table, _index: &crate::schema::Index) -> Option<String> {
        None
    }

    fn compile_column_prelude(&self, _table: &Table, column: &Column) -> Vec<String> {
        if !column.is_enum() {
            return Vec::new();
        }
        vec![format!(
            "DO $$ BEGIN CREATE TYPE {} AS ENUM ({}); \
             EXCEPTION WHEN duplicate_object THEN NULL; END $$",
            self.quote_identifier(&enum_type_name(&column.options)),
            quoted_options(self, &column.options)
        )]
    }

    fn compile_column_followups(&self, table: &Table, column: &Column) -> Vec<String> {
        encode_comment(column, self.needs_type_hint(table, column))
            .map(|comment| {
                vec![format!(
                    "COMMENT ON COLUMN {}.{} IS {}",
                    self.wrap_schema_table(table),
                    self.quote_identifier(&column.name),
                    self.quote_string(&comment)
                )]
            })
            .unwrap_or_default()
    }

    fn compile_change_column(&self, table: &Table, column: &Column) -> Vec<String> {
        let mut column = column.clone();
        column.auto_increment = false;
        let mut statements = self.compile_column_prelude(table, &column);

        let name = self.quote_identifier(&column.name);
        let native = self.type_name(table, &column);
        let using = if column.is_enum() {
            format!("{name}::text::{native}")
        } else {
            format!("{name}::{native}")
        };
        let mut actions = vec![format!("ALTER COLUMN {name} TYPE {native} USING {using}")];
        actions.push(if column.nullable {
            format!("ALTER COLUMN {name} DROP NOT NULL")
        } else {
            format!("ALTER COLUMN {name} SET NOT NULL")
        });
        actions.push(match &column.default {
            Some(default) => format!(
                "ALTER COLUMN {name} SET DEFAULT {}",
                self.compile_default(default)
            ),
            None => format!("ALTER COLUMN {name} DROP DEFAULT"),
        });
        statements.push(format!(
            "ALTER TABLE {} {}",
            self.wrap_schema_table(table),
            actions.join(", ")
        ));
        statements.extend(self.compile_column_followups(table, &column));
        statements
    }

    fn compile_drop_index(&self, _table: &Table, name: &str) -> Vec<String> {
        vec![format!("DROP INDEX {}", self.quote_identifier(name))]
    }

    fn compile_rename_index(&self, _table: &Table, from: &str, to: &str) -> Vec<String> {
        vec![format!(
            "ALTER INDEX {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )]
    }

    fn compile_create_primary(&self, table: &Table, primary: &Primary) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} ADD {}",
            self.wrap_schema_table(table),
            self.compile_primary_constraint(table, primary)
        )]
    }

    fn compile_drop_primary(&self, table: &Table) -> Vec<String> {
        let name = table
            .primary
            .as_ref()
            .map_or_else(|| table.primary_name(), |p| p.name.clone());
        vec![format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.wrap_schema_table(table),
            self.quote_identifier(&name)
        )]
    }

    fn compile_table_listing(&self) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select table_name::text as name from information_schema.tables \
                 where table_schema = current_schema() and table_type = 'BASE TABLE' \
                 order by table_name",
            ),
            Vec::new(),
        )
    }

    fn compile_table_exists(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select count(*) as aggregate from information_schema.tables \
                 where table_schema = current_schema() and table_type = 'BASE TABLE' \
                 and table_name = $1",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    fn compile_column_listing(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select column_name::text as name, data_type::text as native_type, \
                 udt_name::text as udt_name, is_nullable::text as nullable, \
                 column_default::text as default_value, \
                 character_maximum_length::int8 as length, \
                 numeric_precision::int8 as \"precision\", numeric_scale::int8 as scale, \
                 case when column_default like 'nextval(%' then 'auto_increment' else '' end as extra, \
                 col_description(format('%I.%I', table_schema, table_name)::regclass, ordinal_position::int) as comment \
                 from information_schema.columns \
                 where table_schema = current_schema() and table_name = $1 \
                 order by ordinal_position",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    fn compile_index_listing(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "select i.relname::text as index_name, a.attname::text as column_name, \
                 ix.indisunique as is_unique, ix.indisprimary as is_primary \
                 from pg_index ix \
                 join pg_class t on t.oid = ix.indrelid \
                 join pg_class i on i.oid = ix.indexrelid \
                 join pg_namespace n on n.oid = t.relnamespace \
                 join pg_attribute a on a.attrelid = t.oid and a.attnum = any(ix.indkey) \
                 where t.relname = $1 and n.nspname = current_schema() \
                 order by i.relname, array_position(ix.indkey::int2[], a.attnum)",
            ),
            vec![SqlValue::Text(table.to_string())],
        )
    }

    fn parse_column(&self, row: &Row) -> Result<Column> {
        let mut column = parse_listed_column(self, row)?;
        let udt = row.get_str("udt_name").unwrap_or_default();
        if udt.starts_with("enum_") {
            column.column_type = ColumnType::Enum;
            column.native_type = Some(udt.to_string());
        }
        Ok(column)
    }

    fn parse_index_row(&self, row: &Row) -> Result<IndexRow> {
        let flag = |name: &str| row.get(name).and_then(|v| v.get::<bool>()).unwrap_or(false);
        Ok(IndexRow {
            name: required_text(row, "index_name")?,
            column: required_text(row, "column_name")?,
            unique: flag("is_unique"),
            primary: flag("is_primary"),
        })
    }

    fn compile_enum_options(&self, column: &Column) -> Option<(String, Vec<SqlValue>)> {
        let native = column.native_type.as_deref()?;
        Some((
            format!(
                "select unnest(enum_range(null::{}))::text as option",
                self.quote_identifier(native)
            ),
            Vec::new(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FromClause, JoinKind, JoinTarget, Join, Name, Where, WhereKind};

    fn users() -> Query {
        let mut query = Query::new();
        query.from = Some(FromClause::Table(Name::parse("users")));
        query
    }

    fn ctx() -> Context {
        Context::new(Placeholder::Numbered, "")
    }

    #[test]
    fn test_upsert_uses_excluded() {
        let grammar = PostgresGrammar::new();
        let record = Record::new().set("email", "a@x.com").set("vote", 3);
        let mut ctx = ctx();
        let sql = grammar.compile_upsert(
            &mut ctx,
            &users(),
            &[record],
            &[String::from("email")],
            &[String::from("vote")],
        );
        assert_eq!(
            sql,
            "insert into \"users\" (\"email\", \"vote\") values ($1, $2) \
             on conflict (\"email\") do update set \"vote\" = \"excluded\".\"vote\""
        );
    }

    #[test]
    fn test_limited_delete_uses_ctid() {
        let grammar = PostgresGrammar::new();
        let mut query = users();
        query.wheres.push(Where {
            boolean: crate::ast::Boolean::And,
            kind: WhereKind::Basic {
                column: String::from("vote"),
                operator: String::from("<"),
                value: Operand::Value(SqlValue::Int(5)),
            },
        });
        query.limit = Some(1);
        let mut ctx = ctx();
        assert_eq!(
            grammar.compile_delete(&mut ctx, &query),
            "delete from \"users\" where \"ctid\" in \
             (select \"users\".\"ctid\" from \"users\" where \"vote\" < $1 limit 1)"
        );
    }

    #[test]
    fn test_joined_update_uses_ctid() {
        let grammar = PostgresGrammar::new();
        let mut query = users();
        query.joins.push(Join {
            kind: JoinKind::Inner,
            target: JoinTarget::Table(Name::parse("contacts")),
            clauses: vec![Where {
                boolean: crate::ast::Boolean::And,
                kind: WhereKind::Column {
                    first: String::from("users.id"),
                    operator: String::from("="),
                    second: String::from("contacts.user_id"),
                },
            }],
        });
        let mut ctx = ctx();
        let sql = grammar.compile_update(&mut ctx, &query, &Record::new().set("users.vote", 1));
        assert_eq!(
            sql,
            "update \"users\" set \"vote\" = $1 where \"ctid\" in (select \"users\".\"ctid\" \
             from \"users\" inner join \"contacts\" on \"users\".\"id\" = \"contacts\".\"user_id\")"
        );
    }

    #[test]
    fn test_enum_type_is_stable_and_idempotent() {
        let options = vec![String::from("draft"), String::from("live")];
        let name = enum_type_name(&options);
        assert_eq!(name, enum_type_name(&options));
        assert_eq!(name.len(), "enum_".len() + 16);
        assert_ne!(name, enum_type_name(&[String::from("live")]));
        assert_ne!(
            enum_type_name(&[String::from("a,b")]),
            enum_type_name(&[String::from("a"), String::from("b")])
        );

        let grammar = PostgresGrammar::new();
        let mut table = Table::new("posts");
        table.id();
        table.enum_("status", &["draft", "live"]);
        table.uuid("token").unique();
        table.finish();
        let statements = grammar.compile_create_table(&table.preview(), false);
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with(&format!("DO $$ BEGIN CREATE TYPE \"{name}\" AS ENUM ('draft', 'live');")));
        assert!(statements[0].contains("EXCEPTION WHEN duplicate_object THEN NULL"));
        assert_eq!(
            statements[1],
            format!(
                "CREATE TABLE \"posts\" (\"id\" BIGSERIAL NOT NULL PRIMARY KEY, \
                 \"status\" \"{name}\" NOT NULL, \"token\" UUID NOT NULL)"
            )
        );
        assert_eq!(
            statements[2],
            "CREATE UNIQUE INDEX \"posts_token_unique\" ON \"posts\" (\"token\")"
        );
    }

    #[test]
    fn test_type_hint_comment() {
        let grammar = PostgresGrammar::new();
        let mut table = Table::new("logins");
        table.year("season");
        table.finish();
        let statements = grammar.compile_create_table(&table.preview(), false);
        assert_eq!(
            statements.last().map(String::as_str),
            Some("COMMENT ON COLUMN \"logins\".\"season\" IS 'T:year|'")
        );
    }

    #[test]
    fn test_where_date_casts() {
        let grammar = PostgresGrammar::new();
        let mut ctx = ctx();
        let value = Operand::Value(SqlValue::Text(String::from("05")));
        assert_eq!(
            grammar.compile_where_date(&mut ctx, DatePart::Day, "created_at", "=", &value),
            "extract(day from \"created_at\") = $1::int"
        );
        assert_eq!(
            grammar.compile_where_date(&mut ctx, DatePart::Date, "created_at", ">", &value),
            "\"created_at\"::date > $2::date"
        );
    }

    #[test]
    fn test_sum_is_cast_to_float() {
        let grammar = PostgresGrammar::new();
        let mut ctx = ctx();
        let sum = Aggregate {
            function: String::from("sum"),
            columns: vec![String::from("price")],
        };
        assert_eq!(
            grammar.compile_aggregate(&mut ctx, &sum, &Distinct::Off),
            "select sum(\"price\")::float8 as aggregate"
        );
        let count = Aggregate {
            function: String::from("count"),
            columns: vec![String::from("*")],
        };
        assert_eq!(
            grammar.compile_aggregate(&mut ctx, &count, &Distinct::Rows),
            "select count(*) as aggregate"
        );
    }
}
