//! Word-level decoding lattices
//!
//! A finalized segment from the engine arrives as a word lattice: a DAG whose
//! arcs carry a word id (0 is epsilon), a graph cost and an acoustic cost
//! (both negative natural-log probabilities) and the decoder-frame span of
//! the word. States are numbered in topological order, so every arc goes from
//! a lower to a higher state id.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Word id reserved for arcs that emit no word
pub const EPSILON: u32 = 0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LatticeError {
    #[error("lattice has no states")]
    Empty,

    #[error("start state {0} out of range")]
    BadStart(usize),

    #[error("arc {index} ({from} -> {to}) is out of range or not topologically ordered")]
    BadArc { index: usize, from: usize, to: usize },

    #[error("final state {0} out of range")]
    BadFinal(usize),

    #[error("no path reaches a final state")]
    NoSuccessfulPath,
}

/// One word hypothesis between two lattice states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeArc {
    pub from: usize,
    pub to: usize,
    pub word: u32,
    pub graph_cost: f32,
    pub acoustic_cost: f32,
    pub start_frame: u32,
    pub end_frame: u32,
}

impl LatticeArc {
    pub fn cost(&self) -> f64 {
        self.graph_cost as f64 + self.acoustic_cost as f64
    }

    pub fn is_epsilon(&self) -> bool {
        self.word == EPSILON
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    pub num_states: usize,
    pub start: usize,
    /// (state, final cost)
    pub finals: Vec<(usize, f32)>,
    pub arcs: Vec<LatticeArc>,
}

impl Lattice {
    pub fn is_empty(&self) -> bool {
        self.num_states == 0
    }

    /// Check structural invariants. Does not check reachability; that
    /// surfaces as [`LatticeError::NoSuccessfulPath`] from [`Lattice::posteriors`].
    pub fn validate(&self) -> Result<(), LatticeError> {
        if self.is_empty() {
            return Err(LatticeError::Empty);
        }
        if self.start >= self.num_states {
            return Err(LatticeError::BadStart(self.start));
        }
        for (index, arc) in self.arcs.iter().enumerate() {
            if arc.from >= arc.to || arc.to >= self.num_states {
                return Err(LatticeError::BadArc {
                    index,
                    from: arc.from,
                    to: arc.to,
                });
            }
        }
        if let Some(&(state, _)) = self.finals.iter().find(|(s, _)| *s >= self.num_states) {
            return Err(LatticeError::BadFinal(state));
        }
        Ok(())
    }

    /// Multiply every graph cost (arcs and final weights) by `scale`.
    pub fn scale_graph_costs(&mut self, scale: f32) {
        for arc in &mut self.arcs {
            arc.graph_cost *= scale;
        }
        for (_, cost) in &mut self.finals {
            *cost *= scale;
        }
    }

    /// Forward-backward over the lattice.
    ///
    /// Returns the posterior probability of every arc, indexed like
    /// `self.arcs`.
    pub fn posteriors(&self) -> Result<Vec<f64>, LatticeError> {
        self.validate()?;

        let n = self.num_states;
        let mut order: Vec<usize> = (0..self.arcs.len()).collect();
        order.sort_by_key(|&i| self.arcs[i].from);

        let mut alpha = vec![f64::NEG_INFINITY; n];
        alpha[self.start] = 0.0;
        for &i in &order {
            let arc = &self.arcs[i];
            if alpha[arc.from] == f64::NEG_INFINITY {
                continue;
            }
            alpha[arc.to] = log_add(alpha[arc.to], alpha[arc.from] - arc.cost());
        }

        let mut beta = vec![f64::NEG_INFINITY; n];
        for &(state, cost) in &self.finals {
            beta[state] = log_add(beta[state], -(cost as f64));
        }
        for &i in order.iter().rev() {
            let arc = &self.arcs[i];
            if beta[arc.to] == f64::NEG_INFINITY {
                continue;
            }
            beta[arc.from] = log_add(beta[arc.from], beta[arc.to] - arc.cost());
        }

        let total = beta[self.start];
        if !total.is_finite() {
            return Err(LatticeError::NoSuccessfulPath);
        }

        Ok(self
            .arcs
            .iter()
            .map(|arc| {
                let log_post = alpha[arc.from] - arc.cost() + beta[arc.to] - total;
                if log_post.is_finite() {
                    log_post.exp().min(1.0)
                } else {
                    0.0
                }
            })
            .collect())
    }
}

fn log_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}
