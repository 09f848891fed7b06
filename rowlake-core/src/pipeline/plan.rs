//! The lazy, replayable transformation pipeline.

use crate::data::dataset::{Dataset, DatasetKind};
use crate::data::record::Record;
use crate::data::schema::infer_schema;
use crate::error::LakeError;
use crate::pipeline::aggregate::Aggregation;
use crate::pipeline::condition::Condition;
use crate::pipeline::step::{SortDirection, Step};
use serde_json::Value;
use std::sync::Arc;

/// An ordered list of steps bound to one source dataset.
///
/// Chaining only records steps; nothing runs until [`execute`](Self::execute)
/// or [`preview`](Self::preview). The source is held through a shared
/// snapshot and never mutated, so running the same plan twice yields equal
/// results and later chaining cannot alter an earlier result.
#[derive(Debug, Clone)]
pub struct Pipeline {
    source: Arc<Dataset>,
    steps: Vec<Step>,
    output_name: Option<String>,
}

impl Pipeline {
    pub fn new(source: Arc<Dataset>) -> Self {
        Self {
            source,
            steps: Vec::new(),
            output_name: None,
        }
    }

    pub fn source(&self) -> &Dataset {
        &self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Append a prebuilt step.
    pub fn add_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Name given to the dataset produced by `execute()`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    pub fn filter<F>(self, pred: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.add_step(Step::Filter(Arc::new(
            move |row: &Record| -> anyhow::Result<bool> { Ok(pred(row)) },
        )))
    }

    /// Like [`filter`](Self::filter) for predicates that can fail.
    pub fn try_filter<F>(self, pred: F) -> Self
    where
        F: Fn(&Record) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.add_step(Step::Filter(Arc::new(pred)))
    }

    pub fn filter_where(self, condition: Condition) -> Self {
        self.add_step(Step::FilterWhere(condition))
    }

    pub fn map<F>(self, f: F) -> Self
    where
        F: Fn(&Record) -> Record + Send + Sync + 'static,
    {
        self.add_step(Step::Map(Arc::new(
            move |row: &Record| -> anyhow::Result<Record> { Ok(f(row)) },
        )))
    }

    pub fn try_map<F>(self, f: F) -> Self
    where
        F: Fn(&Record) -> anyhow::Result<Record> + Send + Sync + 'static,
    {
        self.add_step(Step::Map(Arc::new(f)))
    }

    pub fn select<S: AsRef<str>>(self, fields: &[S]) -> Self {
        self.add_step(Step::Select(to_owned(fields)))
    }

    pub fn exclude<S: AsRef<str>>(self, fields: &[S]) -> Self {
        self.add_step(Step::Exclude(to_owned(fields)))
    }

    pub fn rename<S: AsRef<str>>(self, mapping: &[(S, S)]) -> Self {
        let pairs = mapping
            .iter()
            .map(|(from, to)| (from.as_ref().to_string(), to.as_ref().to_string()))
            .collect();
        self.add_step(Step::Rename(pairs))
    }

    pub fn sort(self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.add_step(Step::Sort {
            field: field.into(),
            direction,
        })
    }

    pub fn distinct(self, field: Option<&str>) -> Self {
        self.add_step(Step::Distinct {
            field: field.map(str::to_string),
        })
    }

    pub fn limit(self, count: usize, offset: usize) -> Self {
        self.add_step(Step::Limit { count, offset })
    }

    pub fn aggregate<S: AsRef<str>>(self, aggregations: Vec<Aggregation>, group_by: &[S]) -> Self {
        self.add_step(Step::Aggregate {
            aggregations,
            group_by: to_owned(group_by),
        })
    }

    pub fn custom<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Vec<Record>) -> anyhow::Result<Vec<Record>> + Send + Sync + 'static,
    {
        self.add_step(Step::Custom {
            name: name.into(),
            func: Arc::new(func),
        })
    }

    /// Labels of every step, in execution order.
    pub fn describe(&self) -> Vec<String> {
        self.steps.iter().map(Step::label).collect()
    }

    fn run(&self, rows: Vec<Record>) -> Result<Vec<Record>, LakeError> {
        let mut rows = rows;
        for (index, step) in self.steps.iter().enumerate() {
            let before = rows.len();
            rows = step.apply(rows)?;
            tracing::debug!(
                index,
                step = %step.label(),
                rows_before = before,
                rows_after = rows.len(),
                "Applied pipeline step"
            );
        }
        Ok(rows)
    }

    /// Run every step over the full source and wrap the output as a new,
    /// independent `transformed` dataset with a freshly inferred schema.
    ///
    /// Any failing step aborts the whole execution; nothing partial is
    /// returned.
    pub fn execute(&self) -> Result<Dataset, LakeError> {
        let rows = self.run(self.source.rows.clone())?;
        let schema = infer_schema(&rows);
        let name = self
            .output_name
            .clone()
            .unwrap_or_else(|| format!("{} (transformed)", self.source.name));

        let mut dataset = Dataset::new(name, DatasetKind::Transformed, schema, rows);
        dataset
            .metadata
            .insert("source_id".into(), Value::String(self.source.id.clone()));
        dataset
            .metadata
            .insert("source_version".into(), Value::from(self.source.version));
        dataset.metadata.insert(
            "steps".into(),
            Value::Array(self.describe().into_iter().map(Value::String).collect()),
        );

        tracing::info!(
            source_id = %self.source.id,
            steps = self.steps.len(),
            rows = dataset.row_count(),
            "Pipeline executed"
        );
        Ok(dataset)
    }

    /// Run the steps over only the first `max_rows` source rows.
    pub fn preview(&self, max_rows: usize) -> Result<Vec<Record>, LakeError> {
        let head = self.source.rows.iter().take(max_rows).cloned().collect();
        self.run(head)
    }
}

fn to_owned<S: AsRef<str>>(fields: &[S]) -> Vec<String> {
    fields.iter().map(|f| f.as_ref().to_string()).collect()
}
