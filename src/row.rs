use std::{fmt::Display, sync::Arc};

use crate::{
    FromRow, FromValue,
    error::Error,
    protocol::wire::{DataType, SchemaField, Value},
};

/// A column of a query result: its name and declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
}

impl Column {
    /// Construct a new Column.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub(crate) fn from_field(field: SchemaField) -> crate::Result<Self> {
        Ok(Self::new(field.name, field.data_type.parse()?))
    }

    /// The name of the column.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type of the column.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

/// A single row of data returned from a query.
///
/// Access column values by name or zero-based index using
/// [`get`](Self::get). Nullable columns should be read as `Option<T>`, or
/// with [`try_get`](Self::try_get). A whole row converts into a tuple with
/// [`into_typed`](Self::into_typed).
///
/// The row also implements [`IntoIterator`], yielding owned [`Value`]s.
///
/// # Example
///
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> sluice::Result<()> {
/// # let client = sluice::Client::new("databend://root:@localhost:8000/?sslmode=disable")?;
/// # let mut conn = client.get_conn().await?;
/// let row = conn.query_row("SELECT 1 AS id, 'Alice' AS name").await?;
///
/// // By name
/// let name: String = row.get("name")?;
///
/// // By index
/// let id: i64 = row.get(0)?;
///
/// // All at once
/// let (id, name): (i64, String) = row.into_typed()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Vec<Column>>,
    values: Vec<Value>,
}

/// A way to address a column of a [`Row`]: by position or by name.
pub trait QueryIdx
where
    Self: Display,
{
    fn idx(&self, row: &Row) -> Option<usize>;
}

impl QueryIdx for usize {
    fn idx(&self, row: &Row) -> Option<usize> {
        (*self < row.len()).then_some(*self)
    }
}

impl QueryIdx for &str {
    fn idx(&self, row: &Row) -> Option<usize> {
        row.columns.iter().position(|c| c.name() == *self)
    }
}

impl Row {
    pub(crate) fn new(columns: Arc<Vec<Column>>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Columns defining the row data. Columns listed here are in the same order
    /// as the resulting data.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The decoded values, in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Return an iterator over row column-value pairs.
    pub fn cells(&self) -> impl Iterator<Item = (&Column, &Value)> {
        self.columns.iter().zip(self.values.iter())
    }

    /// Returns the number of columns in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Retrieve a column value by index (zero-based `usize`) or by column name
    /// (`&str`).
    ///
    /// Fails if the column does not exist, or the value cannot be represented
    /// as `R`. A `NULL` only converts into an `Option`.
    pub fn get<R, I>(&self, idx: I) -> crate::Result<R>
    where
        R: FromValue,
        I: QueryIdx,
    {
        R::from_value(self.value(idx)?)
    }

    /// Like [`get`](Self::get), returning `None` for `NULL`.
    pub fn try_get<R, I>(&self, idx: I) -> crate::Result<Option<R>>
    where
        R: FromValue,
        I: QueryIdx,
    {
        self.get::<Option<R>, I>(idx)
    }

    /// Converts the whole row into a tuple.
    pub fn into_typed<T: FromRow>(self) -> crate::Result<T> {
        T::from_row(&self)
    }

    fn value<I: QueryIdx>(&self, idx: I) -> crate::Result<&Value> {
        idx.idx(self)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| Error::Conversion(format!("Could not find column with index {}", idx).into()))
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
