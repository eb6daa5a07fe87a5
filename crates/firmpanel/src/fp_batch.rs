//! All-text record batches for extracted rows.
//!
//! Extraction keeps every value as text, so a batch is a set of nullable `Utf8`
//! columns. [`TextBatchBuilder`] accumulates rows and emits a [`RecordBatch`].

use std::sync::Arc;

use arrow_array::builder::StringBuilder;
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema, SchemaRef};

use crate::err::FirmPanelError;

/// Builds a schema of nullable `Utf8` fields, one per column name.
pub fn text_schema<S: AsRef<str>>(columns: &[S]) -> SchemaRef {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|c| Field::new(c.as_ref(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ))
}

/// Row-wise builder for an all-text [`RecordBatch`].
pub struct TextBatchBuilder {
    schema: SchemaRef,
    builders: Vec<StringBuilder>,
    rows: usize,
}

impl TextBatchBuilder {
    /// Creates a builder for `schema`, which must contain only `Utf8` fields.
    pub fn new(schema: SchemaRef) -> Self {
        let builders = schema.fields().iter().map(|_| StringBuilder::new()).collect();
        Self {
            schema,
            builders,
            rows: 0,
        }
    }

    /// Appends one row; `None` values become nulls.
    pub fn append_row<'a, I>(&mut self, values: I) -> Result<(), FirmPanelError>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let values: Vec<Option<&str>> = values.into_iter().collect();
        if values.len() != self.builders.len() {
            return Err(FirmPanelError::RowWidthMismatch {
                expected: self.builders.len(),
                found: values.len(),
            });
        }

        for (b, v) in self.builders.iter_mut().zip(values) {
            b.append_option(v);
        }
        self.rows += 1;
        Ok(())
    }

    /// Number of rows appended since the last [`finish`](Self::finish).
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Returns `true` when no rows are pending.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Emits the pending rows as a batch and resets the builder.
    pub fn finish(&mut self) -> Result<RecordBatch, FirmPanelError> {
        let arrays: Vec<ArrayRef> = self
            .builders
            .iter_mut()
            .map(|b| Arc::new(b.finish()) as ArrayRef)
            .collect();
        self.rows = 0;
        Ok(RecordBatch::try_new(self.schema.clone(), arrays)?)
    }
}
