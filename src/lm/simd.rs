//! The lane-batched Levenberg-Marquardt solver.
//!
//! The active range is split into groups of `V::LANES` samples. Each group is
//! evaluated with one call of the model's lane function and one call of its
//! lane derivatives, and the products entering χ², `JᵀJ` and `Jᵀr` are
//! accumulated lane-wise. The lanes are reduced with [`LaneVector::sum`] once
//! per evaluation.
//!
//! A trailing group shorter than `V::LANES` is padded with copies of the last
//! time value, evaluated as a full vector, and reduced over its valid lanes
//! only.

use std::ops::Range;

use log::debug;

use crate::error::Result;
use crate::lanes::{Frozen, LaneVector, MAX_LANES};
use crate::model::LaneModel;
use crate::parameters::FixedColumns;

use super::config::LmConfig;
use super::normal::NormalEquations;
use super::solver::{LmSolver, ResidualKernel, SolverSetup};

/// The partial trailing group of the active range.
#[derive(Debug, Clone, Copy)]
struct Tail<V: LaneVector> {
    times: Frozen<V>,
    observed: V,
    len: usize,
}

/// Residuals and Jacobian of a [`LaneModel`], one lane group at a time.
pub struct SimdKernel<'m, M: ?Sized, V: LaneVector> {
    model: &'m M,
    times: Vec<Frozen<V>>,
    observed: Vec<V>,
    tail: Option<Tail<V>>,
    samples: usize,
    derivatives: Vec<V>,
    jtj: Vec<V>,
    jtr: Vec<V>,
    tail_columns: Vec<[f64; MAX_LANES]>,
}

impl<'m, M: ?Sized, V: LaneVector> std::fmt::Debug for SimdKernel<'m, M, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimdKernel")
            .field("lanes", &V::LANES)
            .field("groups", &self.times.len())
            .field("tail", &self.tail.map(|tail| tail.len))
            .finish()
    }
}

impl<'m, M, V> SimdKernel<'m, M, V>
where
    M: LaneModel<V> + ?Sized,
    V: LaneVector,
{
    /// Creates a kernel over `times`, which holds the active range only.
    pub fn new(model: &'m M, times: &[f64], free: usize) -> Self {
        let groups = times.chunks_exact(V::LANES);
        let remainder = groups.remainder();
        let tail = remainder.last().map(|&last| Tail {
            times: Frozen::new(V::from_partial(remainder, last)),
            observed: V::zero(),
            len: remainder.len(),
        });
        let times: Vec<Frozen<V>> = groups.map(Frozen::from_slice).collect();

        Self {
            model,
            observed: vec![V::zero(); times.len()],
            samples: times.len() * V::LANES + remainder.len(),
            times,
            tail,
            derivatives: vec![V::zero(); model.parameter_count()],
            jtj: vec![V::zero(); free * (free + 1) / 2],
            jtr: vec![V::zero(); free],
            tail_columns: vec![[0.0; MAX_LANES]; free],
        }
    }

    /// Number of full lane groups.
    pub fn group_count(&self) -> usize {
        self.times.len()
    }

    /// Number of samples in the partial trailing group.
    pub fn tail_len(&self) -> usize {
        self.tail.map_or(0, |tail| tail.len)
    }
}

impl<'m, M, V> ResidualKernel for SimdKernel<'m, M, V>
where
    M: LaneModel<V> + ?Sized,
    V: LaneVector,
{
    fn sample_count(&self) -> usize {
        self.samples
    }

    fn load_observed(&mut self, observed: &[f64]) {
        let groups = observed.chunks_exact(V::LANES);
        let remainder = groups.remainder();
        for (lane, group) in self.observed.iter_mut().zip(groups) {
            *lane = V::from_slice(group);
        }
        if let Some(tail) = self.tail.as_mut() {
            tail.observed = V::from_partial(remainder, 0.0);
        }
    }

    fn chi_square(&mut self, params: &[f64]) -> f64 {
        let f = self.model.lane_function(params);

        let mut acc = V::zero();
        let mut r = V::zero();
        for (t, &y) in self.times.iter().zip(&self.observed) {
            V::sub_into(y, f(t.get()), &mut r);
            acc = acc + r * r;
        }
        let mut chi_square = acc.sum();

        if let Some(tail) = &self.tail {
            V::sub_into(tail.observed, f(tail.times.get()), &mut r);
            let r = r.to_buffer();
            chi_square += r[..tail.len].iter().map(|v| v * v).sum::<f64>();
        }
        chi_square
    }

    fn normal_equations(&mut self, params: &[f64], free: &[usize], normal: &mut NormalEquations) {
        let model = self.model;
        let f = model.lane_function(params);
        let derivatives = model.lane_derivatives(params);

        self.jtj.fill(V::zero());
        self.jtr.fill(V::zero());

        let mut r = V::zero();
        for (t, &y) in self.times.iter().zip(&self.observed) {
            let t = t.get();
            V::sub_into(y, f(t), &mut r);
            derivatives(t, &mut self.derivatives);

            let mut idx = 0;
            for (a, &ja) in free.iter().enumerate() {
                let ga = self.derivatives[ja];
                self.jtr[a] = self.jtr[a] + ga * r;
                for &jb in &free[a..] {
                    self.jtj[idx] = self.jtj[idx] + ga * self.derivatives[jb];
                    idx += 1;
                }
            }
        }

        normal.clear();
        let mut idx = 0;
        for a in 0..free.len() {
            normal.jtr[a] = self.jtr[a].sum();
            for b in a..free.len() {
                normal.jtj[[a, b]] = self.jtj[idx].sum();
                idx += 1;
            }
        }

        if let Some(tail) = &self.tail {
            let t = tail.times.get();
            V::sub_into(tail.observed, f(t), &mut r);
            derivatives(t, &mut self.derivatives);

            let r = r.to_buffer();
            for (column, &j) in self.tail_columns.iter_mut().zip(free) {
                *column = self.derivatives[j].to_buffer();
            }
            let columns = &self.tail_columns;
            for lane in 0..tail.len {
                for a in 0..free.len() {
                    let ga = columns[a][lane];
                    normal.jtr[a] += ga * r[lane];
                    for b in a..free.len() {
                        normal.jtj[[a, b]] += ga * columns[b][lane];
                    }
                }
            }
        }

        normal.symmetrize();
    }
}

/// Levenberg-Marquardt solver evaluating the model `V::LANES` samples at a
/// time.
///
/// The caller picks a lane width the CPU supports, for example through
/// [`LaneWidth::detect`](crate::lanes::LaneWidth::detect).
pub type SimdSolver<'m, M, V> = LmSolver<SimdKernel<'m, M, V>>;

impl<'m, M, V> LmSolver<SimdKernel<'m, M, V>>
where
    M: LaneModel<V> + ?Sized,
    V: LaneVector,
{
    /// Creates a lane-batched solver.
    ///
    /// # Arguments
    ///
    /// * `model` - The model to fit
    /// * `times` - The full time axis
    /// * `range` - The active sample window within `times`
    /// * `fixed` - Parameter columns held at their starting values
    /// * `config` - Iteration settings
    ///
    /// # Errors
    ///
    /// See [`SolverSetup::new`].
    pub fn new(
        model: &'m M,
        times: &[f64],
        range: Range<usize>,
        fixed: &FixedColumns,
        config: LmConfig,
    ) -> Result<Self> {
        let setup = SolverSetup::new(
            model.name(),
            model.parameters(),
            times.len(),
            range.clone(),
            fixed,
        )?;
        let kernel = SimdKernel::new(model, &times[range], setup.free.len());
        debug!(
            "{}: lane solver with {} lanes, {} groups and a tail of {}",
            model.name(),
            V::LANES,
            kernel.group_count(),
            kernel.tail_len()
        );
        Self::from_kernel(kernel, setup, config)
    }
}
