//! Ownership-partitioned upserts.
//!
//! Several independent jobs write into the same logical row of a target
//! table, each owning a disjoint group of value columns. A job's statement
//! inserts every value column (its own from the row, everybody else's as
//! `0`) but on conflict updates only the columns its group owns, so no job
//! can erase another job's data and the order in which jobs run does not
//! matter.
//!
//! Targets are declared as static data ([`MergeTarget`]) and checked for
//! overlapping groups before a [`Writer`] can be obtained. Table and column
//! names are only ever taken from those declarations; row data is always
//! bound.

use std::collections::{BTreeMap, HashMap};
use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use olapsync_core::{ConflictKey, NormalizedRow};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::DbError;

/// Postgres rejects statements carrying more bind parameters than this.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Which part of a [`ConflictKey`] a key column stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPart {
    Location,
    Day,
    Hour,
    Category,
}

impl KeyPart {
    fn name(self) -> &'static str {
        match self {
            KeyPart::Location => "location",
            KeyPart::Day => "day",
            KeyPart::Hour => "hour",
            KeyPart::Category => "category",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeyColumn {
    pub column: &'static str,
    pub part: KeyPart,
}

/// A set of value columns written by one job: `(row field, table column)`.
#[derive(Debug)]
pub struct ColumnGroup {
    pub name: &'static str,
    pub columns: &'static [(&'static str, &'static str)],
}

impl ColumnGroup {
    fn field_for(&self, column: &str) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|(_, c)| *c == column)
            .map(|(field, _)| *field)
    }
}

/// A table written by several jobs, keyed on a subset of the conflict key.
///
/// `raw_column` stores each row's source record as JSONB. Only a target
/// with a single group may declare one.
#[derive(Debug)]
pub struct MergeTarget {
    pub table: &'static str,
    pub key: &'static [KeyColumn],
    pub groups: &'static [ColumnGroup],
    pub raw_column: Option<&'static str>,
}

impl MergeTarget {
    /// Every value column of the table, in group declaration order.
    pub fn value_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.groups
            .iter()
            .flat_map(|g| g.columns.iter().map(|(_, column)| *column))
    }

    /// Checks that no column is owned twice and that no group owns a key column.
    ///
    /// The raw column counts as owned by every group, so it is rejected on
    /// targets with more than one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::OverlappingGroups`] naming the first offending column.
    pub fn validate(&self) -> Result<(), DbError> {
        let mut seen: Vec<&'static str> = self.key.iter().map(|k| k.column).collect();
        if let Some(raw) = self.raw_column {
            if self.groups.len() > 1 || seen.contains(&raw) {
                return Err(DbError::OverlappingGroups {
                    target: self.table,
                    column: raw,
                });
            }
            seen.push(raw);
        }
        for column in self.value_columns() {
            if seen.contains(&column) {
                return Err(DbError::OverlappingGroups {
                    target: self.table,
                    column,
                });
            }
            seen.push(column);
        }
        Ok(())
    }

    /// The only way to obtain a [`Writer`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownGroup`] if no group is called `group`, or
    /// [`DbError::OverlappingGroups`] if the target declaration is invalid.
    pub fn writer(&'static self, group: &str) -> Result<Writer, DbError> {
        self.validate()?;
        let group = self
            .groups
            .iter()
            .find(|g| g.name == group)
            .ok_or_else(|| DbError::UnknownGroup {
                target: self.table,
                group: group.to_string(),
            })?;
        Ok(Writer {
            target: self,
            group,
        })
    }

    /// Restricts `key` to the parts this table is keyed on.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingKeyComponent`] when the table is keyed on an
    /// hour or category that `key` does not carry.
    pub fn project(&self, key: &ConflictKey) -> Result<ConflictKey, DbError> {
        let mut projected = ConflictKey::daily(key.location.clone(), key.day);
        for column in self.key {
            let missing = |part: KeyPart| DbError::MissingKeyComponent {
                target: self.table,
                component: part.name(),
            };
            match column.part {
                KeyPart::Location | KeyPart::Day => {}
                KeyPart::Hour => {
                    projected.hour = Some(key.hour.ok_or_else(|| missing(KeyPart::Hour))?);
                }
                KeyPart::Category => {
                    projected.category =
                        Some(key.category.clone().ok_or_else(|| missing(KeyPart::Category))?);
                }
            }
        }
        Ok(projected)
    }
}

/// Permission to write one column group of one target.
#[derive(Debug, Clone, Copy)]
pub struct Writer {
    target: &'static MergeTarget,
    group: &'static ColumnGroup,
}

impl Writer {
    #[must_use]
    pub fn target(&self) -> &'static MergeTarget {
        self.target
    }

    #[must_use]
    pub fn group(&self) -> &'static ColumnGroup {
        self.group
    }

    /// The row field written into `column`, or `None` when another group owns it.
    fn owned_field(&self, column: &str) -> Option<&'static str> {
        self.group.field_for(column)
    }

    /// Rows per upsert statement: `batch_size`, capped so one statement never
    /// exceeds [`MAX_BIND_PARAMS`]. Non-owned columns are literals, not binds.
    #[must_use]
    pub fn rows_per_statement(&self, batch_size: usize) -> usize {
        let binds_per_row = self.target.key.len()
            + self.group.columns.len()
            + usize::from(self.target.raw_column.is_some());
        batch_size.min(MAX_BIND_PARAMS / binds_per_row.max(1)).max(1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub updated: usize,
}

impl MergeReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

impl AddAssign for MergeReport {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
    }
}

/// Upserts `rows` through `writer` in a single transaction.
///
/// Rows are sent in multi-row statements of at most `batch_size` rows (fewer
/// if that many would overflow the bind-parameter limit). When
/// several rows share a key, the last one wins, exactly as if each row had
/// been upserted on its own in order. Either every row is applied or, on
/// error, none is.
///
/// # Errors
///
/// Returns [`DbError::MissingKeyComponent`] before touching the database if
/// a row cannot be keyed for this target, or [`DbError::Merge`] if any
/// statement fails (the transaction is rolled back).
pub async fn merge(
    pool: &PgPool,
    writer: &Writer,
    rows: &[NormalizedRow],
    batch_size: usize,
) -> Result<MergeReport, DbError> {
    let target = writer.target();
    let group = writer.group();
    let rows = dedupe_last_wins(target, rows)?;
    if rows.is_empty() {
        return Ok(MergeReport::default());
    }

    let wrap = |source: sqlx::Error| DbError::Merge {
        target: target.table,
        group: group.name,
        source,
    };

    let mut tx = pool.begin().await.map_err(wrap)?;
    let mut report = MergeReport::default();

    for chunk in rows.chunks(writer.rows_per_statement(batch_size)) {
        let mut qb = upsert_statement(writer, chunk);
        let inserted_flags: Vec<bool> = qb
            .build_query_scalar::<bool>()
            .fetch_all(&mut *tx)
            .await
            .map_err(wrap)?;
        let inserted = inserted_flags.iter().filter(|f| **f).count();
        report += MergeReport {
            inserted,
            updated: inserted_flags.len() - inserted,
        };
    }

    tx.commit().await.map_err(wrap)?;

    tracing::info!(
        table = target.table,
        group = group.name,
        inserted = report.inserted,
        updated = report.updated,
        "merge committed"
    );
    Ok(report)
}

fn dedupe_last_wins<'r>(
    target: &MergeTarget,
    rows: &'r [NormalizedRow],
) -> Result<Vec<(ConflictKey, &'r NormalizedRow)>, DbError> {
    let keyed = rows
        .iter()
        .map(|row| Ok((target.project(&row.key)?, row)))
        .collect::<Result<Vec<_>, DbError>>()?;

    let mut last: HashMap<&ConflictKey, usize> = HashMap::with_capacity(keyed.len());
    for (idx, (key, _)) in keyed.iter().enumerate() {
        last.insert(key, idx);
    }
    if last.len() < keyed.len() {
        tracing::debug!(
            table = target.table,
            duplicates = keyed.len() - last.len(),
            "duplicate keys in one merge call; last row wins"
        );
    }

    let keep: Vec<bool> = keyed
        .iter()
        .enumerate()
        .map(|(idx, (key, _))| last.get(key) == Some(&idx))
        .collect();
    Ok(keyed
        .into_iter()
        .zip(keep)
        .filter_map(|(entry, keep)| keep.then_some(entry))
        .collect())
}

fn upsert_statement<'args>(
    writer: &Writer,
    chunk: &[(ConflictKey, &NormalizedRow)],
) -> QueryBuilder<'args, Postgres> {
    let target = writer.target();

    let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
    qb.push(target.table).push(" (");
    {
        let mut columns = qb.separated(", ");
        for key in target.key {
            columns.push(key.column);
        }
        for column in target.value_columns() {
            columns.push(column);
        }
        if let Some(raw) = target.raw_column {
            columns.push(raw);
        }
    }
    qb.push(") ");

    qb.push_values(chunk, |mut values, (key, row)| {
        for column in target.key {
            match column.part {
                KeyPart::Location => values.push_bind(key.location.as_str().to_owned()),
                KeyPart::Day => values.push_bind(key.day),
                KeyPart::Hour => values.push_bind(key.hour.map(i16::from)),
                KeyPart::Category => values.push_bind(key.category.clone()),
            };
        }
        for column in target.value_columns() {
            match writer.owned_field(column) {
                Some(field) => values.push_bind(row.value(field)),
                None => values.push("0"),
            };
        }
        if target.raw_column.is_some() {
            values.push_bind(row.raw.clone().map(Json));
        }
    });

    qb.push(" ON CONFLICT (");
    {
        let mut conflict = qb.separated(", ");
        for key in target.key {
            conflict.push(key.column);
        }
    }
    qb.push(") DO UPDATE SET ");
    {
        let mut updates = qb.separated(", ");
        for (_, column) in writer.group().columns {
            updates.push(format!("{column} = EXCLUDED.{column}"));
        }
        if let Some(raw) = target.raw_column {
            updates.push(format!("{raw} = EXCLUDED.{raw}"));
        }
        updates.push("updated_at = NOW()");
    }
    qb.push(" RETURNING (xmax = 0) AS inserted");
    qb
}

/// A stored row read back by [`fetch_row`], keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub values: BTreeMap<&'static str, Decimal>,
    /// Stored source record; always `None` for targets without a raw column.
    pub raw: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRow {
    #[must_use]
    pub fn value(&self, column: &str) -> Option<Decimal> {
        self.values.get(column).copied()
    }
}

/// Reads the row stored under `key`, or `None` if there is none.
///
/// # Errors
///
/// Returns [`DbError::MissingKeyComponent`] if `key` cannot address this
/// target, or [`DbError::Sqlx`] if the query fails.
pub async fn fetch_row(
    pool: &PgPool,
    target: &MergeTarget,
    key: &ConflictKey,
) -> Result<Option<StoredRow>, DbError> {
    let key = target.project(key)?;

    let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
    {
        let mut columns = qb.separated(", ");
        for column in target.value_columns() {
            columns.push(column);
        }
        if let Some(raw) = target.raw_column {
            columns.push(raw);
        }
        columns.push("updated_at");
    }
    qb.push(" FROM ").push(target.table).push(" WHERE ");
    for (idx, column) in target.key.iter().enumerate() {
        if idx > 0 {
            qb.push(" AND ");
        }
        qb.push(column.column).push(" = ");
        match column.part {
            KeyPart::Location => qb.push_bind(key.location.as_str().to_owned()),
            KeyPart::Day => qb.push_bind(key.day),
            KeyPart::Hour => qb.push_bind(key.hour.map(i16::from)),
            KeyPart::Category => qb.push_bind(key.category.clone()),
        };
    }

    let Some(row) = qb.build().fetch_optional(pool).await? else {
        return Ok(None);
    };

    let mut values = BTreeMap::new();
    for column in target.value_columns() {
        values.insert(column, row.try_get::<Decimal, _>(column)?);
    }
    let raw = match target.raw_column {
        Some(column) => row.try_get::<Option<Value>, _>(column)?,
        None => None,
    };
    Ok(Some(StoredRow {
        values,
        raw,
        updated_at: row.try_get("updated_at")?,
    }))
}
