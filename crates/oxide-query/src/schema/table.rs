//! Table model, schema commands and the blueprint API.

use std::fmt;

use super::column::{Column, ColumnType};

/// A secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Unique index.
    pub unique: bool,
}

/// The primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primary {
    /// Constraint name.
    pub name: String,
    /// Key columns, in order.
    pub columns: Vec<String>,
}

/// One recorded schema change.
///
/// Commands are intentions: they change the [`Table`] model only through
/// [`Table::apply`], once the DDL that carries them has succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Add a column.
    AddColumn(Column),
    /// Redefine an existing column.
    ChangeColumn(Column),
    /// Rename a column.
    RenameColumn {
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// Drop a column and every index covering it.
    DropColumn(String),
    /// Create an index.
    CreateIndex(Index),
    /// Drop an index by name.
    DropIndex(String),
    /// Rename an index.
    RenameIndex {
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// Create the primary key.
    CreatePrimary(Primary),
    /// Drop the primary key.
    DropPrimary,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddColumn(c) => write!(f, "add column {}", c.name),
            Self::ChangeColumn(c) => write!(f, "change column {}", c.name),
            Self::RenameColumn { from, to } => write!(f, "rename column {from} to {to}"),
            Self::DropColumn(name) => write!(f, "drop column {name}"),
            Self::CreateIndex(i) => write!(f, "create index {}", i.name),
            Self::DropIndex(name) => write!(f, "drop index {name}"),
            Self::RenameIndex { from, to } => write!(f, "rename index {from} to {to}"),
            Self::CreatePrimary(p) => write!(f, "create primary key {}", p.name),
            Self::DropPrimary => f.write_str("drop primary key"),
        }
    }
}

/// A table: the reconciled model plus the commands recorded against it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Table name, without prefix.
    pub name: String,
    /// Connection prefix.
    pub prefix: String,
    /// Columns in table order.
    pub columns: Vec<Column>,
    /// Secondary indexes.
    pub indexes: Vec<Index>,
    /// Primary key.
    pub primary: Option<Primary>,
    /// Commands recorded by the blueprint, not yet applied.
    pub commands: Vec<Command>,
    /// Storage engine (MySQL).
    pub engine: Option<String>,
    /// Default character set (MySQL).
    pub charset: Option<String>,
    /// Default collation (MySQL).
    pub collation: Option<String>,
    /// Table comment (MySQL).
    pub comment: Option<String>,
}

impl Table {
    /// Creates an empty table model.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the connection prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Prefixed name, as stored in the database.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}{}", self.prefix, self.name)
    }

    /// Looks up a column.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a column mutably.
    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// True if the column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    /// Column names in table order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Looks up an index.
    #[must_use]
    pub fn get_index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// True if the index exists.
    #[must_use]
    pub fn has_index(&self, name: &str) -> bool {
        self.get_index(name).is_some()
    }

    /// Default index name: `{table}_{columns}_{suffix}`.
    #[must_use]
    pub fn index_name(&self, columns: &[String], suffix: &str) -> String {
        format!("{}_{}_{suffix}", self.full_name(), columns.join("_"))
            .to_lowercase()
            .replace(['-', '.', ' '], "_")
    }

    /// Default primary key name.
    #[must_use]
    pub fn primary_name(&self) -> String {
        format!("{}_pkey", self.full_name())
    }

    // Blueprint: columns.

    fn push_column(&mut self, column: Column) -> &mut Column {
        self.commands.push(Command::AddColumn(column));
        match self.commands.last_mut() {
            Some(Command::AddColumn(column)) => column,
            _ => unreachable!("an add column command was just pushed"),
        }
    }

    /// Adds a column of any type.
    pub fn column(&mut self, name: impl Into<String>, column_type: ColumnType) -> &mut Column {
        self.push_column(Column::new(name, column_type))
    }

    /// Auto-increment big integer primary key named `id`.
    pub fn id(&mut self) -> &mut Column {
        self.big_increments("id")
    }

    /// Auto-increment unsigned big integer primary key.
    pub fn big_increments(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::BigInteger)
            .unsigned()
            .auto_increment()
    }

    /// Auto-increment unsigned integer primary key.
    pub fn increments(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Integer)
            .unsigned()
            .auto_increment()
    }

    /// `VARCHAR(255)`; change the length with [`Column::length`].
    pub fn string(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::String).length(255)
    }

    /// `CHAR(255)`; change the length with [`Column::length`].
    pub fn char(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Char).length(255)
    }

    /// Text column.
    pub fn text(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Text)
    }

    /// Medium text column.
    pub fn medium_text(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::MediumText)
    }

    /// Long text column.
    pub fn long_text(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::LongText)
    }

    /// Binary column.
    pub fn binary(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Binary)
    }

    /// 8-bit integer.
    pub fn tiny_integer(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::TinyInteger)
    }

    /// 16-bit integer.
    pub fn small_integer(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::SmallInteger)
    }

    /// 32-bit integer.
    pub fn integer(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Integer)
    }

    /// 64-bit integer.
    pub fn big_integer(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::BigInteger)
    }

    /// Unsigned 32-bit integer.
    pub fn unsigned_integer(&mut self, name: impl Into<String>) -> &mut Column {
        self.integer(name).unsigned()
    }

    /// Unsigned 64-bit integer.
    pub fn unsigned_big_integer(&mut self, name: impl Into<String>) -> &mut Column {
        self.big_integer(name).unsigned()
    }

    /// Single-precision float.
    pub fn float(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Float)
    }

    /// Double-precision float.
    pub fn double(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Double)
    }

    /// Fixed-point decimal.
    pub fn decimal(&mut self, name: impl Into<String>, precision: u32, scale: u32) -> &mut Column {
        self.column(name, ColumnType::Decimal).precision(precision, scale)
    }

    /// Boolean.
    pub fn boolean(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Boolean)
    }

    /// Date.
    pub fn date(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Date)
    }

    /// Date and time.
    pub fn date_time(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::DateTime)
    }

    /// Date and time with time zone.
    pub fn date_time_tz(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::DateTimeTz)
    }

    /// Time of day.
    pub fn time(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Time)
    }

    /// Timestamp.
    pub fn timestamp(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Timestamp)
    }

    /// Timestamp with time zone.
    pub fn timestamp_tz(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::TimestampTz)
    }

    /// Nullable `created_at` and `updated_at` timestamps.
    pub fn timestamps(&mut self) {
        self.timestamp("created_at").nullable();
        self.timestamp("updated_at").nullable();
    }

    /// Year.
    pub fn year(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Year)
    }

    /// JSON.
    pub fn json(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Json)
    }

    /// Binary JSON.
    pub fn jsonb(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Jsonb)
    }

    /// UUID.
    pub fn uuid(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::Uuid)
    }

    /// IP address.
    pub fn ip_address(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::IpAddress)
    }

    /// MAC address.
    pub fn mac_address(&mut self, name: impl Into<String>) -> &mut Column {
        self.column(name, ColumnType::MacAddress)
    }

    /// Enum restricted to `options`.
    pub fn enum_(&mut self, name: impl Into<String>, options: &[&str]) -> &mut Column {
        let column = self.column(name, ColumnType::Enum);
        column.options = options.iter().map(|o| (*o).to_string()).collect();
        column
    }

    // Blueprint: table operations.

    /// Drops a column.
    pub fn drop_column(&mut self, name: impl Into<String>) {
        self.commands.push(Command::DropColumn(name.into()));
    }

    /// Renames a column.
    pub fn rename_column(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.commands.push(Command::RenameColumn {
            from: from.into(),
            to: to.into(),
        });
    }

    /// Creates a plain index with the default name.
    pub fn index(&mut self, columns: &[&str]) {
        self.push_index(columns, false, None);
    }

    /// Creates a plain index with an explicit name.
    pub fn index_named(&mut self, name: impl Into<String>, columns: &[&str]) {
        self.push_index(columns, false, Some(name.into()));
    }

    /// Creates a unique index with the default name.
    pub fn unique(&mut self, columns: &[&str]) {
        self.push_index(columns, true, None);
    }

    /// Creates a unique index with an explicit name.
    pub fn unique_named(&mut self, name: impl Into<String>, columns: &[&str]) {
        self.push_index(columns, true, Some(name.into()));
    }

    fn push_index(&mut self, columns: &[&str], unique: bool, name: Option<String>) {
        let columns: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
        let name = name.unwrap_or_else(|| {
            self.index_name(&columns, if unique { "unique" } else { "index" })
        });
        self.commands.push(Command::CreateIndex(Index {
            name,
            columns,
            unique,
        }));
    }

    /// Creates the primary key.
    pub fn primary(&mut self, columns: &[&str]) {
        let primary = Primary {
            name: self.primary_name(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        };
        self.commands.push(Command::CreatePrimary(primary));
    }

    /// Drops an index.
    pub fn drop_index(&mut self, name: impl Into<String>) {
        self.commands.push(Command::DropIndex(name.into()));
    }

    /// Renames an index.
    pub fn rename_index(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.commands.push(Command::RenameIndex {
            from: from.into(),
            to: to.into(),
        });
    }

    /// Drops the primary key.
    pub fn drop_primary(&mut self) {
        self.commands.push(Command::DropPrimary);
    }

    /// Turns fluent column modifiers into commands.
    ///
    /// `change()` turns an add into a change; `unique()`, `index()` and
    /// `primary()` append index commands after the recorded ones.
    pub fn finish(&mut self) {
        for command in &mut self.commands {
            if let Command::AddColumn(column) = command {
                if column.pending.change {
                    let column = column.clone();
                    *command = Command::ChangeColumn(column);
                }
            }
        }

        let mut extra = Vec::new();
        for command in &mut self.commands {
            let (Command::AddColumn(column) | Command::ChangeColumn(column)) = command else {
                continue;
            };
            let pending = std::mem::take(&mut column.pending);
            let columns = vec![column.name.clone()];
            if pending.unique {
                extra.push((columns.clone(), Some(true)));
            }
            if pending.index {
                extra.push((columns.clone(), Some(false)));
            }
            if pending.primary && !column.auto_increment {
                extra.push((columns, None));
            }
        }

        for (columns, unique) in extra {
            let command = match unique {
                Some(unique) => Command::CreateIndex(Index {
                    name: self.index_name(&columns, if unique { "unique" } else { "index" }),
                    columns,
                    unique,
                }),
                None => Command::CreatePrimary(Primary {
                    name: self.primary_name(),
                    columns,
                }),
            };
            self.commands.push(command);
        }
    }

    /// Model after applying every recorded command, without touching `self`.
    #[must_use]
    pub fn preview(&self) -> Self {
        let mut table = self.clone();
        table.commands.clear();
        for command in &self.commands {
            table.apply(command);
        }
        table
    }

    /// Reconciles the model with a command that has been executed.
    pub fn apply(&mut self, command: &Command) {
        match command {
            Command::AddColumn(column) => {
                let mut column = column.clone();
                column.pending = super::column::Pending::default();
                column.position = self.columns.len();
                if column.auto_increment {
                    column.primary = true;
                    self.primary = Some(Primary {
                        name: self.primary_name(),
                        columns: vec![column.name.clone()],
                    });
                }
                self.columns.push(column);
            }
            Command::ChangeColumn(column) => {
                if let Some(existing) = self.get_column_mut(&column.name) {
                    let position = existing.position;
                    let indexes = std::mem::take(&mut existing.indexes);
                    let primary = existing.primary || column.auto_increment;
                    *existing = column.clone();
                    existing.pending = super::column::Pending::default();
                    existing.position = position;
                    existing.indexes = indexes;
                    existing.primary = primary;
                }
            }
            Command::RenameColumn { from, to } => {
                if let Some(column) = self.get_column_mut(from) {
                    column.name.clone_from(to);
                }
                for index in &mut self.indexes {
                    rename_in(&mut index.columns, from, to);
                }
                if let Some(primary) = &mut self.primary {
                    rename_in(&mut primary.columns, from, to);
                }
            }
            Command::DropColumn(name) => {
                self.columns.retain(|c| c.name != *name);
                for (i, column) in self.columns.iter_mut().enumerate() {
                    column.position = i;
                }
                let dropped: Vec<String> = self
                    .indexes
                    .iter()
                    .filter(|i| i.columns.contains(name))
                    .map(|i| i.name.clone())
                    .collect();
                for index in dropped {
                    self.remove_index(&index);
                }
                if self
                    .primary
                    .as_ref()
                    .is_some_and(|p| p.columns.contains(name))
                {
                    self.clear_primary();
                }
            }
            Command::CreateIndex(index) => {
                for name in &index.columns {
                    if let Some(column) = self.get_column_mut(name) {
                        column.indexes.push(index.name.clone());
                    }
                }
                self.indexes.push(index.clone());
            }
            Command::DropIndex(name) => self.remove_index(name),
            Command::RenameIndex { from, to } => {
                for index in &mut self.indexes {
                    if index.name == *from {
                        index.name.clone_from(to);
                    }
                }
                for column in &mut self.columns {
                    rename_in(&mut column.indexes, from, to);
                }
            }
            Command::CreatePrimary(primary) => {
                self.clear_primary();
                for name in &primary.columns {
                    if let Some(column) = self.get_column_mut(name) {
                        column.primary = true;
                    }
                }
                self.primary = Some(primary.clone());
            }
            Command::DropPrimary => self.clear_primary(),
        }
    }

    fn remove_index(&mut self, name: &str) {
        self.indexes.retain(|i| i.name != name);
        for column in &mut self.columns {
            column.indexes.retain(|i| i != name);
        }
    }

    fn clear_primary(&mut self) {
        for column in &mut self.columns {
            column.primary = false;
        }
        self.primary = None;
    }
}

fn rename_in(names: &mut [String], from: &str, to: &str) {
    for name in names.iter_mut() {
        if name == from {
            *name = to.to_string();
        }
    }
}
