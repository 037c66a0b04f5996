//! Projection onto the orthogonal complement of previously found states.

use nalgebra::{DMatrix, DVector};
use ndarray::Array3;
use num_complex::Complex64;
use nutcracker_core::{NutError, Result, ONE, ZERO};

use crate::boundary::OverlapBoundary;
use crate::connector::connect_dimensions;
use crate::contract::contract_vs_left;
use crate::gauge::{absorb_left_factor, qr_split};
use crate::site::{Normalization, OverlapSite, Side, StateSite};
use crate::state::State;

/// Relative threshold below which a pivot column counts as dependent.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// The three gauge renditions of one reference-state site, conjugated. Which
/// one enters a contraction depends on where the cursor stands relative to
/// the site.
#[derive(Debug, Clone)]
pub struct OverlapSiteTrio {
    pub left: OverlapSite,
    pub middle: OverlapSite,
    pub right: OverlapSite,
}

impl OverlapSiteTrio {
    pub fn get(&self, side: Side) -> &OverlapSite {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

/// Builds the overlap-site trio of every site of a reference state.
///
/// The state arrives in right-canonical form, which directly supplies the
/// right renditions; one QR sweep to the right supplies the left and middle
/// renditions.
pub fn compute_overlap_site_trios(state: &State) -> Result<Vec<OverlapSiteTrio>> {
    let number_of_sites = state.number_of_sites();
    let mut lefts = Vec::with_capacity(number_of_sites);
    let mut middles = Vec::with_capacity(number_of_sites);

    let mut middle = state.first_site().clone();
    for i in 0..number_of_sites {
        middles.push(middle.clone());
        if i + 1 < number_of_sites {
            let (left_site, rfac) = qr_split(&middle)?;
            lefts.push(left_site);
            middle = StateSite::from_array(
                Normalization::Middle,
                absorb_left_factor(&rfac, state.site(i + 1)),
            )?;
        } else {
            // the last site has a right bond of one, so unit norm already
            // makes it an isometry
            lefts.push(middle.clone().retagged(Normalization::Left));
        }
    }

    let trios = (0..number_of_sites)
        .map(|i| {
            let right = if i == 0 {
                OverlapSite::from_state_site_as(state.first_site(), Normalization::Right)
            } else {
                OverlapSite::from_state_site(state.site(i))
            };
            OverlapSiteTrio {
                left: OverlapSite::from_state_site(&lefts[i]),
                middle: OverlapSite::from_state_site(&middles[i]),
                right,
            }
        })
        .collect();
    Ok(trios)
}

/// The projector vector contributed by one reference state at the working
/// site: its middle overlap site weighted by the two overlap boundaries,
/// flattened and conjugated so that a vanishing inner product with the
/// working tensor means a vanishing physical overlap.
pub fn compute_projector_vector(
    left_boundary: &OverlapBoundary,
    overlap_site: &OverlapSite,
    right_boundary: &OverlapBoundary,
) -> Result<DVector<Complex64>> {
    let overlap_left = connect_dimensions(
        "left boundary overlap",
        left_boundary.overlap_dimension(),
        "overlap site left",
        overlap_site.left_dimension(),
    )?;
    let overlap_right = connect_dimensions(
        "overlap site right",
        overlap_site.right_dimension(),
        "right boundary overlap",
        right_boundary.overlap_dimension(),
    )?;
    let physical = overlap_site.physical_dimension();
    let state_left = left_boundary.state_dimension();
    let state_right = right_boundary.state_dimension();

    let left = left_boundary.data();
    let right = right_boundary.data();
    let site = overlap_site.data();

    let mut vector = DVector::from_element(physical * state_left * state_right, ZERO);
    for p in 0..physical {
        for l in 0..state_left {
            for r in 0..state_right {
                let mut sum = ZERO;
                for vl in 0..overlap_left {
                    for vr in 0..overlap_right {
                        sum += left[[vl, l]] * site[[p, vl, vr]] * right[[vr, r]];
                    }
                }
                vector[(p * state_left + l) * state_right + r] = sum.conj();
            }
        }
    }
    Ok(vector)
}

/// The inner product of two matrix product states, contracted left to right.
pub fn compute_state_overlap(bra: &State, ket: &State) -> Result<Complex64> {
    connect_dimensions(
        "bra number of sites",
        bra.number_of_sites(),
        "ket number of sites",
        ket.number_of_sites(),
    )?;
    let mut boundary = OverlapBoundary::trivial(Side::Left);
    for (bra_site, ket_site) in bra.sites().zip(ket.sites()) {
        let overlap_site = OverlapSite::from_state_site(bra_site);
        boundary = contract_vs_left(&boundary, &overlap_site, ket_site)?;
    }
    Ok(boundary.data()[[0, 0]])
}

/// An orthonormal basis for the span of the projector vectors, held in
/// compact form: Householder reflectors, their coefficients, and the column
/// pivot permutation of the factorization.
#[derive(Debug, Clone)]
pub struct ProjectorMatrix {
    number_of_projectors: usize,
    projector_length: usize,
    number_of_reflectors: usize,
    /// Column k holds the k-th reflector vector, zero above row k.
    reflectors: DMatrix<Complex64>,
    /// H_k = I - tau_k v_k v_k^H
    coefficients: Vec<f64>,
    /// 1-based origin of each pivoted column.
    swaps: Vec<u32>,
}

impl ProjectorMatrix {
    /// Factorizes the given projector columns with a column-pivoted
    /// Householder QR.
    pub fn new(projectors: Vec<DVector<Complex64>>) -> Result<Self> {
        let number_of_projectors = projectors.len();
        if number_of_projectors == 0 {
            return Err(NutError::invalid_tensor(
                "a projector matrix needs at least one projector",
            ));
        }
        let projector_length = projectors[0].len();
        for projector in &projectors[1..] {
            connect_dimensions(
                "projector length",
                projector_length,
                "projector length",
                projector.len(),
            )?;
        }

        let mut working =
            DMatrix::from_fn(projector_length, number_of_projectors, |i, j| projectors[j][i]);
        let mut reflectors =
            DMatrix::from_element(projector_length, number_of_projectors, ZERO);
        let mut coefficients = Vec::new();
        let mut swaps: Vec<u32> = (1..=number_of_projectors as u32).collect();

        let scale = (0..number_of_projectors)
            .map(|j| working.column(j).norm())
            .fold(0.0f64, f64::max);
        let cutoff = scale * PIVOT_TOLERANCE;

        let limit = projector_length.min(number_of_projectors);
        let mut number_of_reflectors = 0;
        for k in 0..limit {
            // pivot the column with the largest remaining tail
            let (best, best_norm) = (k..number_of_projectors)
                .map(|j| {
                    let tail: f64 = (k..projector_length)
                        .map(|i| working[(i, j)].norm_sqr())
                        .sum::<f64>()
                        .sqrt();
                    (j, tail)
                })
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .expect("the pivot range is never empty");
            if best_norm <= cutoff {
                break;
            }
            if best != k {
                working.swap_columns(k, best);
                swaps.swap(k, best);
            }

            let alpha = working[(k, k)];
            let phase = if alpha.norm() == 0.0 {
                ONE
            } else {
                alpha / alpha.norm()
            };
            let target = -phase * best_norm;

            // v = x + phase * |x| * e1, tau = 2 / |v|^2
            let mut v_norm_sqr = 0.0;
            for i in k..projector_length {
                let mut value = working[(i, k)];
                if i == k {
                    value -= target;
                }
                reflectors[(i, k)] = value;
                v_norm_sqr += value.norm_sqr();
            }
            let tau = 2.0 / v_norm_sqr;
            coefficients.push(tau);

            // apply the reflector to the trailing columns
            for j in k..number_of_projectors {
                let mut inner = ZERO;
                for i in k..projector_length {
                    inner += reflectors[(i, k)].conj() * working[(i, j)];
                }
                let weight = inner * tau;
                for i in k..projector_length {
                    let update = weight * reflectors[(i, k)];
                    working[(i, j)] -= update;
                }
            }
            working[(k, k)] = target;
            for i in k + 1..projector_length {
                working[(i, k)] = ZERO;
            }
            number_of_reflectors += 1;
        }

        Ok(Self {
            number_of_projectors,
            projector_length,
            number_of_reflectors,
            reflectors,
            coefficients,
            swaps,
        })
    }

    pub fn number_of_projectors(&self) -> usize {
        self.number_of_projectors
    }

    pub fn projector_length(&self) -> usize {
        self.projector_length
    }

    pub fn number_of_reflectors(&self) -> usize {
        self.number_of_reflectors
    }

    pub fn orthogonal_subspace_dimension(&self) -> usize {
        self.projector_length - self.number_of_reflectors
    }

    pub fn swaps(&self) -> &[u32] {
        &self.swaps
    }

    fn reflect_forward(&self, vector: &mut DVector<Complex64>) {
        for k in 0..self.number_of_reflectors {
            let mut inner = ZERO;
            for i in k..self.projector_length {
                inner += self.reflectors[(i, k)].conj() * vector[i];
            }
            let weight = inner * self.coefficients[k];
            for i in k..self.projector_length {
                let update = weight * self.reflectors[(i, k)];
                vector[i] -= update;
            }
        }
    }

    fn reflect_backward(&self, vector: &mut DVector<Complex64>) {
        for k in (0..self.number_of_reflectors).rev() {
            let mut inner = ZERO;
            for i in k..self.projector_length {
                inner += self.reflectors[(i, k)].conj() * vector[i];
            }
            let weight = inner * self.coefficients[k];
            for i in k..self.projector_length {
                let update = weight * self.reflectors[(i, k)];
                vector[i] -= update;
            }
        }
    }

    /// Removes the component of a vector inside the projector span.
    pub fn project_out(&self, vector: &DVector<Complex64>) -> DVector<Complex64> {
        let mut t = vector.clone();
        self.reflect_forward(&mut t);
        for i in 0..self.number_of_reflectors {
            t[i] = ZERO;
        }
        self.reflect_backward(&mut t);
        t
    }

    /// The norm of the component of a vector inside the projector span.
    pub fn overlap_with(&self, vector: &DVector<Complex64>) -> f64 {
        let mut t = vector.clone();
        self.reflect_forward(&mut t);
        (0..self.number_of_reflectors)
            .map(|i| t[i].norm_sqr())
            .sum::<f64>()
            .sqrt()
    }

    /// Coordinates of a vector in the orthogonal-complement basis.
    pub fn restrict(&self, vector: &DVector<Complex64>) -> DVector<Complex64> {
        let mut t = vector.clone();
        self.reflect_forward(&mut t);
        DVector::from_fn(self.orthogonal_subspace_dimension(), |i, _| {
            t[self.number_of_reflectors + i]
        })
    }

    /// Inverse of [`restrict`](Self::restrict): maps complement coordinates
    /// back to the full space.
    pub fn expand(&self, coordinates: &DVector<Complex64>) -> DVector<Complex64> {
        let mut t = DVector::from_element(self.projector_length, ZERO);
        for i in 0..coordinates.len() {
            t[self.number_of_reflectors + i] = coordinates[i];
        }
        self.reflect_backward(&mut t);
        t
    }
}

/// Flattens a middle site to the vector the projector machinery works on.
pub fn flatten_state_site(site: &StateSite) -> DVector<Complex64> {
    DVector::from_column_slice(
        site.data()
            .as_slice()
            .expect("site tensors are stored contiguously"),
    )
}

/// Rebuilds a middle site from a flattened vector.
pub fn unflatten_state_site(
    physical: usize,
    left: usize,
    right: usize,
    vector: &DVector<Complex64>,
) -> Result<StateSite> {
    let data = Array3::from_shape_vec(
        (physical, left, right),
        vector.iter().cloned().collect(),
    )
    .map_err(|_| NutError::WrongDataLength {
        length: vector.len(),
        correct_length: physical * left * right,
    })?;
    StateSite::from_array(Normalization::Middle, data)
}
