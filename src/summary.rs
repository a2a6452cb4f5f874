//! Results of a finished sampling run.

use ndarray::prelude::*;

use crate::stats::ChainStats;

/// Acceptance statistics and final proposal of a run.
///
/// Percentages are relative to the full chain length `n`, so
/// `accepted + rejected == 100`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Chain length (`nsimu`).
    pub n: usize,
    pub accepted: f64,
    pub rejected: f64,
    /// Candidates rejected because they fell outside the bounds. Part of `rejected`.
    pub out_of_bounds: f64,
    /// Candidates rejected because the objective was not finite. Part of `rejected`.
    pub non_finite: f64,
    /// Proposal covariance at the end of the run.
    pub qcov: Array2<f64>,
    /// Last state of the chain, free parameters only.
    pub last: Array1<f64>,
    /// Free parameter names, in the order of `last` and `qcov`.
    pub names: Vec<String>,
}

impl RunSummary {
    pub(crate) fn from_counts(
        n: usize,
        rejected: usize,
        out_of_bounds: usize,
        non_finite: usize,
        qcov: Array2<f64>,
        last: Array1<f64>,
        names: Vec<String>,
    ) -> Self {
        let pct = |k: usize| k as f64 / n as f64 * 100.0;
        Self {
            n,
            accepted: pct(n - rejected),
            rejected: pct(rejected),
            out_of_bounds: pct(out_of_bounds),
            non_finite: pct(non_finite),
            qcov,
            last,
            names,
        }
    }
}

/// The chain keyed by parameter name. Fixed parameters appear as constant
/// columns.
///
/// Columns follow the order of the [`ParameterSet`](crate::parameters::ParameterSet),
/// with fixed parameters interleaved where they were declared rather than
/// appended after the sampled ones. Use [`ChainTable::column`] for access
/// that does not depend on the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTable {
    names: Vec<String>,
    values: Array2<f64>,
}

impl ChainTable {
    pub(crate) fn new(names: Vec<String>, values: Array2<f64>) -> Self {
        debug_assert_eq!(names.len(), values.ncols());
        Self { names, values }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `nrows × n_parameters` array of draws.
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        let j = self.names.iter().position(|n| n == name)?;
        Some(self.values.column(j))
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.values.row(i)
    }

    /// Moments of every column over rows `from..`, e.g. after discarding burn-in.
    pub fn stats(&self, from: usize) -> Option<ChainStats> {
        if from >= self.nrows() {
            return None;
        }
        ChainStats::from_rows(self.values.slice(s![from.., ..]))
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }
}

/// Everything a sampling run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutput {
    pub summary: RunSummary,
    pub chain: ChainTable,
    /// Objective value of every chain row.
    pub sschain: Array1<f64>,
}
