//! Polar-misalignment calibration by evolutionary search.
//!
//! Works like a Celestron-style all-star alignment: given pairs of catalog
//! coordinates and where the mount actually pointed when centered on them,
//! fit the three-parameter [`PoleModel`] whose transition matrix best maps
//! catalog unit vectors onto observed ones. A (1+lambda) evolution strategy
//! with Gaussian mutation and geometric step-size decay does the fitting;
//! the objective is smooth but an analytic solution is awkward because the
//! RA offset enters on the local side of the rotation.
//!
//! The search cannot fail: it always returns the best candidate found, even
//! when the precision threshold was not reached within the generation
//! budget.

use nalgebra::Vector3;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::coords::{EquatorialCoord, PoleModel};

/// Tuning for the evolutionary pole fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Generation budget
    pub generations: usize,
    /// Offspring per generation (lambda)
    pub population: usize,
    /// Initial mutation standard deviation, degrees
    pub sigma_initial_deg: f64,
    /// Geometric sigma shrink factor per generation
    pub sigma_decay: f64,
    /// Early-exit fitness threshold, fitness being `1 / (1 + residual)`
    pub precision: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            generations: 1500,
            population: 32,
            sigma_initial_deg: 20.0,
            sigma_decay: 0.996,
            precision: 0.999_999,
        }
    }
}

/// Candidate in parameter order `[pole_ra, pole_dec, ra_offset]`, degrees.
type Candidate = [f64; 3];

fn candidate_pole(candidate: &Candidate) -> PoleModel {
    PoleModel {
        dec_deg: candidate[1],
        ra_deg: candidate[0],
        ra_offset_deg: candidate[2],
    }
}

/// Sum of squared cartesian residuals of the candidate's transform.
fn residual(candidate: &Candidate, catalog: &[Vector3<f64>], observed: &[Vector3<f64>]) -> f64 {
    let transition = candidate_pole(candidate).transition();
    catalog
        .iter()
        .zip(observed)
        .map(|(x, y)| (transition * x - y).norm_squared())
        .sum()
}

fn fitness(candidate: &Candidate, catalog: &[Vector3<f64>], observed: &[Vector3<f64>]) -> f64 {
    1.0 / (1.0 + residual(candidate, catalog, observed))
}

/// Fit the pole model to catalog/observed coordinate pairs.
///
/// Both slices must be non-empty and of equal length; the caller validates
/// this. The returned pole is wrapped into its valid parameter ranges.
pub fn fit_pole<R: Rng + ?Sized>(
    catalog: &[EquatorialCoord],
    observed: &[EquatorialCoord],
    config: &AlignmentConfig,
    rng: &mut R,
) -> PoleModel {
    debug_assert!(!catalog.is_empty());
    debug_assert_eq!(catalog.len(), observed.len());

    let catalog: Vec<Vector3<f64>> = catalog.iter().map(|c| c.to_unit_vector()).collect();
    let observed: Vec<Vector3<f64>> = observed.iter().map(|c| c.to_unit_vector()).collect();

    let mut parent: Candidate = [
        rng.gen_range(0.0..360.0),
        rng.gen_range(-90.0..90.0),
        rng.gen_range(0.0..360.0),
    ];
    let mut parent_fitness = fitness(&parent, &catalog, &observed);

    let mut sigma = config.sigma_initial_deg;

    for generation in 0..config.generations {
        let Ok(mutation) = Normal::new(0.0, sigma) else {
            break;
        };

        for _ in 0..config.population {
            let offspring: Candidate = [
                parent[0] + mutation.sample(rng),
                parent[1] + mutation.sample(rng),
                parent[2] + mutation.sample(rng),
            ];
            let offspring_fitness = fitness(&offspring, &catalog, &observed);
            if offspring_fitness > parent_fitness {
                parent = offspring;
                parent_fitness = offspring_fitness;
            }
        }

        if parent_fitness > config.precision {
            log::debug!(
                "alignment converged after {} generations, fitness {:.9}",
                generation + 1,
                parent_fitness
            );
            break;
        }
        sigma *= config.sigma_decay;
    }

    log::debug!(
        "alignment finished: fitness {:.9}, pole ra {:.4} dec {:.4} offset {:.4}",
        parent_fitness,
        parent[0],
        parent[1],
        parent[2]
    );

    candidate_pole(&parent).normalized()
}
