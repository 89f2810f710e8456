//! Lazy sampling protocol.
//!
//! A `Generator` is stepped explicitly: each call returns zero or more new
//! output tuples and the generator reports exhaustion through
//! `is_enumerated`. Context-aware generators additionally receive the
//! remainder of the candidate plan and may use it to sample values that are
//! compatible with sibling commitments.

use std::sync::Arc;

use crate::context::StreamContext;
use crate::error::SamplerError;
use crate::value::Value;

/// One tuple of output values, aligned with a stream's declared outputs.
pub type OutputValues = Vec<Value>;

/// Stepwise producer of output tuples.
pub trait Generator {
    /// Produce the next batch of output tuples.
    ///
    /// An empty batch is legal and does not imply exhaustion. A context step
    /// that finds no compatible value also returns an empty batch; the
    /// caller decides whether to retry.
    fn generate(&mut self, context: Option<&StreamContext>) -> Result<Vec<OutputValues>, SamplerError>;

    /// Returns true once no further tuples will ever be produced.
    fn is_enumerated(&self) -> bool;

    /// Returns true if `generate` makes use of a supplied context.
    fn uses_context(&self) -> bool {
        false
    }
}

/// Builds a generator for one input binding.
pub type GenFn = Arc<dyn Fn(&[Value]) -> Result<Box<dyn Generator>, SamplerError> + Send + Sync>;

/// Computes a scalar cost for one input binding.
pub type CostFn = Arc<dyn Fn(&[Value]) -> Result<f64, SamplerError> + Send + Sync>;

/// Evaluates a boolean test for one input binding.
pub type TestFn = Arc<dyn Fn(&[Value]) -> Result<bool, SamplerError> + Send + Sync>;

type Batches = Box<dyn Iterator<Item = Result<Vec<OutputValues>, SamplerError>>>;

/// Generator over an iterator of batches, optionally capped in calls.
pub struct ListGenerator {
    batches: Batches,
    max_calls: Option<usize>,
    calls: usize,
    enumerated: bool,
}

impl ListGenerator {
    /// Unbounded generator over `batches`.
    pub fn new(batches: impl Iterator<Item = Result<Vec<OutputValues>, SamplerError>> + 'static) -> Self {
        Self {
            batches: Box::new(batches),
            max_calls: None,
            calls: 0,
            enumerated: false,
        }
    }

    /// Generator that is exhausted after `max_calls` steps.
    pub fn with_max_calls(
        batches: impl Iterator<Item = Result<Vec<OutputValues>, SamplerError>> + 'static,
        max_calls: usize,
    ) -> Self {
        Self {
            batches: Box::new(batches),
            max_calls: Some(max_calls),
            calls: 0,
            enumerated: max_calls == 0,
        }
    }

    /// Number of steps taken so far.
    #[must_use]
    pub const fn calls(&self) -> usize {
        self.calls
    }
}

impl std::fmt::Debug for ListGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListGenerator")
            .field("max_calls", &self.max_calls)
            .field("calls", &self.calls)
            .field("enumerated", &self.enumerated)
            .finish_non_exhaustive()
    }
}

impl Generator for ListGenerator {
    fn generate(&mut self, _context: Option<&StreamContext>) -> Result<Vec<OutputValues>, SamplerError> {
        if self.enumerated {
            return Ok(Vec::new());
        }
        self.calls += 1;
        if self.max_calls.is_some_and(|max| self.calls >= max) {
            self.enumerated = true;
        }
        match self.batches.next() {
            Some(batch) => batch,
            None => {
                self.enumerated = true;
                Ok(Vec::new())
            }
        }
    }

    fn is_enumerated(&self) -> bool {
        self.enumerated
    }
}

/// Wrap a function returning any `Generator`.
pub fn from_generator_fn<F, G>(f: F) -> GenFn
where
    F: Fn(&[Value]) -> G + Send + Sync + 'static,
    G: Generator + 'static,
{
    Arc::new(move |inputs: &[Value]| Ok(Box::new(f(inputs)) as Box<dyn Generator>))
}

/// Wrap a function returning an iterator of output tuples, one tuple per step.
pub fn from_gen_fn<F, I>(f: F) -> GenFn
where
    F: Fn(&[Value]) -> I + Send + Sync + 'static,
    I: Iterator<Item = OutputValues> + 'static,
{
    Arc::new(move |inputs: &[Value]| {
        let batches = f(inputs).map(|tuple| Ok(vec![tuple]));
        Ok(Box::new(ListGenerator::new(batches)) as Box<dyn Generator>)
    })
}

/// Wrap a function returning an iterator of batches.
pub fn from_list_gen_fn<F, I>(f: F) -> GenFn
where
    F: Fn(&[Value]) -> I + Send + Sync + 'static,
    I: Iterator<Item = Vec<OutputValues>> + 'static,
{
    Arc::new(move |inputs: &[Value]| {
        let batches = f(inputs).map(Ok);
        Ok(Box::new(ListGenerator::new(batches)) as Box<dyn Generator>)
    })
}

/// Wrap a function producing a single batch; the generator is then exhausted.
pub fn from_list_fn<F>(f: F) -> GenFn
where
    F: Fn(&[Value]) -> Result<Vec<OutputValues>, SamplerError> + Send + Sync + 'static,
{
    Arc::new(move |inputs: &[Value]| {
        let batch = f(inputs);
        Ok(Box::new(ListGenerator::with_max_calls(std::iter::once(batch), 1)) as Box<dyn Generator>)
    })
}

/// Wrap a function producing at most one output tuple.
pub fn from_fn<F>(f: F) -> GenFn
where
    F: Fn(&[Value]) -> Result<Option<OutputValues>, SamplerError> + Send + Sync + 'static,
{
    from_list_fn(move |inputs| Ok(f(inputs)?.into_iter().collect()))
}

/// Wrap a boolean test: an empty tuple when it holds, nothing otherwise.
pub fn from_test<F>(f: F) -> GenFn
where
    F: Fn(&[Value]) -> Result<bool, SamplerError> + Send + Sync + 'static,
{
    from_fn(move |inputs| Ok(f(inputs)?.then(Vec::new)))
}

/// A test that always holds.
#[must_use]
pub fn from_rule() -> GenFn {
    from_test(|_| Ok(true))
}

pub(crate) fn cost_generator(cost_fn: &CostFn, inputs: &[Value]) -> Box<dyn Generator> {
    let cost = cost_fn(inputs).map(|c| vec![vec![Value::Float(c)]]);
    Box::new(ListGenerator::with_max_calls(std::iter::once(cost), 1))
}

pub(crate) fn test_generator(test_fn: &TestFn, inputs: &[Value]) -> Box<dyn Generator> {
    let holds = test_fn(inputs).map(|ok| if ok { vec![Vec::new()] } else { Vec::new() });
    Box::new(ListGenerator::with_max_calls(std::iter::once(holds), 1))
}
