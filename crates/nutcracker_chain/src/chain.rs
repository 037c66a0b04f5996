//! The DMRG chain state machine.

use num_complex::Complex64;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, warn};

use nutcracker_core::{outside_tolerance, ChainOptions, NutError, Result};
use nutcracker_tensor::{
    compute_expectation_value_at_site, compute_overlap_site_trios, compute_projector_vector,
    connect_dimensions, contract_sos_left, contract_sos_right, contract_vs_left,
    contract_vs_right, increase_dimension_between, move_site_cursor_left, move_site_cursor_right,
    random_state_site_middle, random_state_site_right, ExpectationBoundary, Normalization,
    OperatorSite, OverlapBoundary, OverlapSiteTrio, ProjectorMatrix, Side, State, StateSite,
};

use crate::bandwidth::{compute_bandwidth_dimension_sequence, maximum_bandwidth_dimension};
use crate::optimizer::{optimize_state_site, OptimizerResult};

/// Where the chain stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    /// Just seeded, no optimization performed yet
    Fresh,
    /// At least one site solve has been applied
    Optimizing,
    /// The last sweep produced no significant energy change
    Converged,
    /// The bandwidth was just increased and the environments rebuilt
    Grown,
    /// An optimizer failure or a broken move left the chain unusable
    Failed,
}

/// Observer hooks fired as the chain makes progress. The engine is
/// single-threaded, so plain boxed closures suffice.
#[derive(Default)]
pub struct ChainCallbacks {
    pub on_sweep_performed: Option<Box<dyn FnMut(f64)>>,
    pub on_sweeps_converged: Option<Box<dyn FnMut(f64)>>,
    pub on_chain_optimized: Option<Box<dyn FnMut(f64)>>,
    pub on_optimize_site_success: Option<Box<dyn FnMut(usize)>>,
    pub on_optimize_site_failure: Option<Box<dyn FnMut(&NutError)>>,
}

/// One absorbed site waiting on a neighbor stack, together with the
/// environment that was live before the site was absorbed. Popping the
/// record undoes the absorption exactly.
struct Neighbor {
    state_site: StateSite,
    expectation_boundary: ExpectationBoundary,
    overlap_boundaries: Vec<OverlapBoundary>,
}

/// A previously found eigenstate the chain must stay orthogonal to.
struct ProjectorReference {
    trios: Vec<OverlapSiteTrio>,
}

/// The mutable state of one DMRG optimization run.
pub struct Chain {
    operator_sites: Vec<OperatorSite>,
    number_of_sites: usize,
    physical_dimensions: Vec<usize>,
    maximum_bandwidth_dimension: usize,
    bandwidth_dimension: usize,
    options: ChainOptions,
    status: ChainStatus,
    current_site_number: usize,
    energy: f64,
    state_site: StateSite,
    left_expectation_boundary: ExpectationBoundary,
    right_expectation_boundary: ExpectationBoundary,
    left_overlap_boundaries: Vec<OverlapBoundary>,
    right_overlap_boundaries: Vec<OverlapBoundary>,
    left_neighbors: Vec<Neighbor>,
    right_neighbors: Vec<Neighbor>,
    references: Vec<ProjectorReference>,
    projector_matrix: Option<ProjectorMatrix>,
    callbacks: ChainCallbacks,
    rng: StdRng,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("number_of_sites", &self.number_of_sites)
            .field("status", &self.status)
            .field("current_site_number", &self.current_site_number)
            .field("energy", &self.energy)
            .finish_non_exhaustive()
    }
}

impl Chain {
    /// Builds a chain over the given operator sites, seeds a random state at
    /// the requested bandwidth, and contracts the initial environments.
    pub fn new(
        operator_sites: Vec<OperatorSite>,
        initial_bandwidth_dimension: usize,
        options: ChainOptions,
    ) -> Result<Self> {
        Self::with_rng(
            operator_sites,
            initial_bandwidth_dimension,
            options,
            StdRng::from_entropy(),
        )
    }

    /// Like [`new`](Self::new) with a deterministic seed, for reproducible
    /// runs.
    pub fn with_seed(
        operator_sites: Vec<OperatorSite>,
        initial_bandwidth_dimension: usize,
        options: ChainOptions,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(
            operator_sites,
            initial_bandwidth_dimension,
            options,
            StdRng::seed_from_u64(seed),
        )
    }

    fn with_rng(
        operator_sites: Vec<OperatorSite>,
        initial_bandwidth_dimension: usize,
        options: ChainOptions,
        rng: StdRng,
    ) -> Result<Self> {
        if operator_sites.is_empty() {
            return Err(NutError::invalid_tensor(
                "a chain needs at least one operator site",
            ));
        }
        connect_dimensions(
            "first operator site left",
            operator_sites[0].left_dimension(),
            "chain boundary",
            1,
        )?;
        for pair in operator_sites.windows(2) {
            connect_dimensions(
                "operator site right",
                pair[0].right_dimension(),
                "next operator site left",
                pair[1].left_dimension(),
            )?;
        }
        connect_dimensions(
            "last operator site right",
            operator_sites[operator_sites.len() - 1].right_dimension(),
            "chain boundary",
            1,
        )?;

        let number_of_sites = operator_sites.len();
        let physical_dimensions: Vec<usize> = operator_sites
            .iter()
            .map(|site| site.physical_dimension())
            .collect();
        let maximum = maximum_bandwidth_dimension(&physical_dimensions);

        let mut chain = Chain {
            operator_sites,
            number_of_sites,
            physical_dimensions,
            maximum_bandwidth_dimension: maximum,
            bandwidth_dimension: initial_bandwidth_dimension,
            options,
            status: ChainStatus::Fresh,
            current_site_number: 0,
            energy: 0.0,
            state_site: StateSite::trivial(Normalization::Middle),
            left_expectation_boundary: ExpectationBoundary::trivial(Side::Left),
            right_expectation_boundary: ExpectationBoundary::trivial(Side::Right),
            left_overlap_boundaries: Vec::new(),
            right_overlap_boundaries: Vec::new(),
            left_neighbors: Vec::new(),
            right_neighbors: Vec::new(),
            references: Vec::new(),
            projector_matrix: None,
            callbacks: ChainCallbacks::default(),
            rng,
        };
        chain.reset(initial_bandwidth_dimension)?;
        Ok(chain)
    }

    // ============ Inspectors ============

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn bandwidth_dimension(&self) -> usize {
        self.bandwidth_dimension
    }

    pub fn maximum_bandwidth_dimension(&self) -> usize {
        self.maximum_bandwidth_dimension
    }

    pub fn site_number(&self) -> usize {
        self.current_site_number
    }

    pub fn number_of_sites(&self) -> usize {
        self.number_of_sites
    }

    pub fn status(&self) -> ChainStatus {
        self.status
    }

    pub fn options(&self) -> &ChainOptions {
        &self.options
    }

    pub fn number_of_projectors(&self) -> usize {
        self.references.len()
    }

    /// The expectation value of the operator in the current state.
    pub fn compute_expectation_value(&self) -> Result<Complex64> {
        compute_expectation_value_at_site(
            &self.left_expectation_boundary,
            &self.state_site,
            &self.operator_sites[self.current_site_number],
            &self.right_expectation_boundary,
        )
    }

    /// The norm of the current state, read off the working site.
    pub fn compute_state_norm(&self) -> f64 {
        self.state_site.norm()
    }

    // ============ Callbacks ============

    pub fn on_sweep_performed(&mut self, callback: impl FnMut(f64) + 'static) {
        self.callbacks.on_sweep_performed = Some(Box::new(callback));
    }

    pub fn on_sweeps_converged(&mut self, callback: impl FnMut(f64) + 'static) {
        self.callbacks.on_sweeps_converged = Some(Box::new(callback));
    }

    pub fn on_chain_optimized(&mut self, callback: impl FnMut(f64) + 'static) {
        self.callbacks.on_chain_optimized = Some(Box::new(callback));
    }

    pub fn on_optimize_site_success(&mut self, callback: impl FnMut(usize) + 'static) {
        self.callbacks.on_optimize_site_success = Some(Box::new(callback));
    }

    pub fn on_optimize_site_failure(&mut self, callback: impl FnMut(&NutError) + 'static) {
        self.callbacks.on_optimize_site_failure = Some(Box::new(callback));
    }

    // ============ Drivers ============

    /// Solves the local eigenproblem at the cursor and adopts the result.
    pub fn optimize_site(&mut self) -> Result<usize> {
        self.ensure_usable()?;
        let outcome = optimize_state_site(
            &self.left_expectation_boundary,
            &self.state_site,
            &self.operator_sites[self.current_site_number],
            &self.right_expectation_boundary,
            self.projector_matrix.as_ref(),
            self.options.site_convergence_threshold,
            self.options.sanity_check_threshold,
            self.options.maximum_number_of_iterations,
        );
        match outcome {
            Ok(OptimizerResult {
                number_of_iterations,
                eigenvalue,
                state_site,
            }) => {
                if eigenvalue > self.energy
                    && outside_tolerance(
                        eigenvalue,
                        self.energy,
                        self.options.site_convergence_threshold,
                    )
                {
                    let error = NutError::OptimizerObtainedGreaterEigenvalue {
                        old: self.energy,
                        new: eigenvalue,
                    };
                    return Err(self.fail_site(error));
                }
                self.energy = eigenvalue;
                self.state_site = state_site;
                self.status = ChainStatus::Optimizing;
                debug!(
                    site = self.current_site_number,
                    energy = self.energy,
                    iterations = number_of_iterations,
                    "optimized site"
                );
                if let Some(callback) = self.callbacks.on_optimize_site_success.as_mut() {
                    callback(number_of_iterations);
                }
                Ok(number_of_iterations)
            }
            Err(error) => Err(self.fail_site(error)),
        }
    }

    /// Transfers the gauge to the neighboring site in the given direction
    /// and swaps the environments accordingly.
    pub fn move_cursor(&mut self, direction: Side) -> Result<()> {
        self.ensure_usable()?;
        let result = self.move_cursor_inner(direction);
        if result.is_err() {
            self.status = ChainStatus::Failed;
        }
        result
    }

    fn move_cursor_inner(&mut self, direction: Side) -> Result<()> {
        match direction {
            Side::Right => {
                let neighbor = self.right_neighbors.pop().ok_or_else(|| {
                    NutError::invalid_tensor("cannot move the cursor past the right end")
                })?;
                let (left_site, new_middle) =
                    move_site_cursor_right(&self.state_site, &neighbor.state_site)?;
                let site_number = self.current_site_number;
                let new_boundary = contract_sos_left(
                    &self.left_expectation_boundary,
                    &left_site,
                    &self.operator_sites[site_number],
                )?;
                let mut new_overlaps = Vec::with_capacity(self.references.len());
                for (reference, boundary) in self
                    .references
                    .iter()
                    .zip(&self.left_overlap_boundaries)
                {
                    new_overlaps.push(contract_vs_left(
                        boundary,
                        &reference.trios[site_number].left,
                        &left_site,
                    )?);
                }
                let old_boundary =
                    std::mem::replace(&mut self.left_expectation_boundary, new_boundary);
                let old_overlaps =
                    std::mem::replace(&mut self.left_overlap_boundaries, new_overlaps);
                self.left_neighbors.push(Neighbor {
                    state_site: left_site,
                    expectation_boundary: old_boundary,
                    overlap_boundaries: old_overlaps,
                });
                self.right_expectation_boundary = neighbor.expectation_boundary;
                self.right_overlap_boundaries = neighbor.overlap_boundaries;
                self.state_site = new_middle;
                self.current_site_number += 1;
            }
            Side::Left => {
                let neighbor = self.left_neighbors.pop().ok_or_else(|| {
                    NutError::invalid_tensor("cannot move the cursor past the left end")
                })?;
                let (new_middle, right_site) =
                    move_site_cursor_left(&self.state_site, &neighbor.state_site)?;
                let site_number = self.current_site_number;
                let new_boundary = contract_sos_right(
                    &self.right_expectation_boundary,
                    &right_site,
                    &self.operator_sites[site_number],
                )?;
                let mut new_overlaps = Vec::with_capacity(self.references.len());
                for (reference, boundary) in self
                    .references
                    .iter()
                    .zip(&self.right_overlap_boundaries)
                {
                    new_overlaps.push(contract_vs_right(
                        boundary,
                        &reference.trios[site_number].right,
                        &right_site,
                    )?);
                }
                let old_boundary =
                    std::mem::replace(&mut self.right_expectation_boundary, new_boundary);
                let old_overlaps =
                    std::mem::replace(&mut self.right_overlap_boundaries, new_overlaps);
                self.right_neighbors.push(Neighbor {
                    state_site: right_site,
                    expectation_boundary: old_boundary,
                    overlap_boundaries: old_overlaps,
                });
                self.left_expectation_boundary = neighbor.expectation_boundary;
                self.left_overlap_boundaries = neighbor.overlap_boundaries;
                self.state_site = new_middle;
                self.current_site_number -= 1;
            }
        }
        self.projector_matrix = self.build_projector_matrix()?;
        Ok(())
    }

    /// Walks the cursor to the given site.
    pub fn move_to(&mut self, site_number: usize) -> Result<()> {
        if site_number >= self.number_of_sites {
            return Err(NutError::index_too_high(
                "site number",
                site_number + 1,
                self.number_of_sites,
            ));
        }
        while self.current_site_number > site_number {
            self.move_cursor(Side::Left)?;
        }
        while self.current_site_number < site_number {
            self.move_cursor(Side::Right)?;
        }
        Ok(())
    }

    /// One full sweep: optimize here, walk to the right end, walk to the
    /// left end, and return to the starting site, optimizing at every stop.
    pub fn perform_optimization_sweep(&mut self) -> Result<()> {
        let starting_site = self.current_site_number;
        self.optimize_site()?;
        while self.current_site_number + 1 < self.number_of_sites {
            self.move_cursor(Side::Right)?;
            self.optimize_site()?;
        }
        while self.current_site_number > 0 {
            self.move_cursor(Side::Left)?;
            self.optimize_site()?;
        }
        while self.current_site_number < starting_site {
            self.move_cursor(Side::Right)?;
            self.optimize_site()?;
        }
        info!(energy = self.energy, "sweep performed");
        if let Some(callback) = self.callbacks.on_sweep_performed.as_mut() {
            callback(self.energy);
        }
        Ok(())
    }

    /// Sweeps until the energy change between consecutive sweeps falls
    /// below the sweep convergence threshold.
    pub fn sweep_until_converged(&mut self) -> Result<()> {
        let mut previous_energy = self.energy;
        self.perform_optimization_sweep()?;
        while outside_tolerance(
            previous_energy,
            self.energy,
            self.options.sweep_convergence_threshold,
        ) {
            previous_energy = self.energy;
            self.perform_optimization_sweep()?;
        }
        self.status = ChainStatus::Converged;
        info!(energy = self.energy, "sweeps converged");
        if let Some(callback) = self.callbacks.on_sweeps_converged.as_mut() {
            callback(self.energy);
        }
        Ok(())
    }

    /// The full optimization: sweep to convergence, then keep growing the
    /// bandwidth while it still buys energy and the cap permits.
    pub fn optimize_chain(&mut self) -> Result<()> {
        let mut previous_energy = self.energy;
        self.sweep_until_converged()?;
        while outside_tolerance(
            previous_energy,
            self.energy,
            self.options.chain_convergence_threshold,
        ) && self.bandwidth_dimension < self.maximum_bandwidth_dimension
        {
            previous_energy = self.energy;
            let new_bandwidth = (self.options.bandwidth_growth_rule)(self.bandwidth_dimension)
                .min(self.maximum_bandwidth_dimension);
            self.increase_bandwidth_dimension(new_bandwidth)?;
            self.sweep_until_converged()?;
        }
        self.status = ChainStatus::Converged;
        info!(energy = self.energy, "chain optimized");
        if let Some(callback) = self.callbacks.on_chain_optimized.as_mut() {
            callback(self.energy);
        }
        Ok(())
    }

    /// Widens every bond to the dimension sequence of the new bandwidth.
    /// The represented state is unchanged; the new directions are seeded
    /// with orthonormalized random rows for the next sweep to explore.
    pub fn increase_bandwidth_dimension(&mut self, new_bandwidth_dimension: usize) -> Result<()> {
        self.ensure_usable()?;
        if new_bandwidth_dimension == self.bandwidth_dimension {
            return Ok(());
        }
        if new_bandwidth_dimension < self.bandwidth_dimension {
            return Err(NutError::invalid_tensor(
                "the bandwidth dimension can only be increased",
            ));
        }
        let sequence = compute_bandwidth_dimension_sequence(
            new_bandwidth_dimension,
            &self.physical_dimensions,
        )?;
        self.move_to(0)?;

        let mut sites: Vec<StateSite> = Vec::with_capacity(self.number_of_sites);
        sites.push(std::mem::replace(
            &mut self.state_site,
            StateSite::trivial(Normalization::Middle),
        ));
        while let Some(neighbor) = self.right_neighbors.pop() {
            sites.push(neighbor.state_site);
        }

        for bond in (1..self.number_of_sites).rev() {
            let (left_site, right_site) = increase_dimension_between(
                sequence[bond],
                &sites[bond - 1],
                &sites[bond],
                &mut self.rng,
            )?;
            sites[bond - 1] = left_site;
            sites[bond] = right_site;
        }

        self.left_expectation_boundary = ExpectationBoundary::trivial(Side::Left);
        self.right_expectation_boundary = ExpectationBoundary::trivial(Side::Right);
        self.left_overlap_boundaries = (0..self.references.len())
            .map(|_| OverlapBoundary::trivial(Side::Left))
            .collect();
        self.right_overlap_boundaries = (0..self.references.len())
            .map(|_| OverlapBoundary::trivial(Side::Right))
            .collect();
        for site_number in (1..self.number_of_sites).rev() {
            let site = sites.pop().expect("one padded site per chain position");
            self.absorb_right(site, site_number)?;
        }
        self.state_site = sites.pop().expect("the working site remains");
        self.bandwidth_dimension = new_bandwidth_dimension;
        self.projector_matrix = self.build_projector_matrix()?;
        self.status = ChainStatus::Grown;
        info!(
            bandwidth = new_bandwidth_dimension,
            "bandwidth dimension increased"
        );
        Ok(())
    }

    /// A deep copy of the current state in right-canonical form.
    pub fn make_copy_of_state(&mut self) -> Result<State> {
        self.ensure_usable()?;
        self.move_to(0)?;
        let first_site = self.state_site.clone();
        let rest_sites: Vec<StateSite> = self
            .right_neighbors
            .iter()
            .rev()
            .map(|neighbor| neighbor.state_site.clone())
            .collect();
        State::new(first_site, rest_sites)
    }

    /// Appends an orthogonality constraint against the given state and
    /// re-seeds the chain so the next optimization hunts in the orthogonal
    /// complement.
    pub fn add_projector(&mut self, state: State) -> Result<()> {
        self.ensure_usable()?;
        connect_dimensions(
            "chain number of sites",
            self.number_of_sites,
            "state number of sites",
            state.number_of_sites(),
        )?;
        for (site, state_site) in self.operator_sites.iter().zip(state.sites()) {
            connect_dimensions(
                "operator site physical",
                site.physical_dimension(),
                "state site physical",
                state_site.physical_dimension(),
            )?;
        }
        let trios = compute_overlap_site_trios(&state)?;
        self.references.push(ProjectorReference { trios });
        self.reset(self.bandwidth_dimension)
    }

    // ============ Internals ============

    fn ensure_usable(&self) -> Result<()> {
        if self.status == ChainStatus::Failed {
            Err(NutError::invalid_tensor("the chain is in the failed state"))
        } else {
            Ok(())
        }
    }

    fn fail_site(&mut self, error: NutError) -> NutError {
        warn!(site = self.current_site_number, %error, "site optimization failed");
        if let Some(callback) = self.callbacks.on_optimize_site_failure.as_mut() {
            callback(&error);
        }
        self.status = ChainStatus::Failed;
        error
    }

    /// Absorbs a right-normalized site into the right environment, pushing
    /// the pre-absorption boundaries onto the neighbor stack.
    fn absorb_right(&mut self, state_site: StateSite, site_number: usize) -> Result<()> {
        let new_boundary = contract_sos_right(
            &self.right_expectation_boundary,
            &state_site,
            &self.operator_sites[site_number],
        )?;
        let mut new_overlaps = Vec::with_capacity(self.references.len());
        for (reference, boundary) in self
            .references
            .iter()
            .zip(&self.right_overlap_boundaries)
        {
            new_overlaps.push(contract_vs_right(
                boundary,
                &reference.trios[site_number].right,
                &state_site,
            )?);
        }
        let old_boundary = std::mem::replace(&mut self.right_expectation_boundary, new_boundary);
        let old_overlaps = std::mem::replace(&mut self.right_overlap_boundaries, new_overlaps);
        self.right_neighbors.push(Neighbor {
            state_site,
            expectation_boundary: old_boundary,
            overlap_boundaries: old_overlaps,
        });
        Ok(())
    }

    /// Re-seeds the chain with a random state at the given bandwidth and
    /// rebuilds every boundary from scratch.
    fn reset(&mut self, bandwidth_dimension: usize) -> Result<()> {
        let sequence =
            compute_bandwidth_dimension_sequence(bandwidth_dimension, &self.physical_dimensions)?;
        self.current_site_number = 0;
        self.left_expectation_boundary = ExpectationBoundary::trivial(Side::Left);
        self.right_expectation_boundary = ExpectationBoundary::trivial(Side::Right);
        self.left_overlap_boundaries = (0..self.references.len())
            .map(|_| OverlapBoundary::trivial(Side::Left))
            .collect();
        self.right_overlap_boundaries = (0..self.references.len())
            .map(|_| OverlapBoundary::trivial(Side::Right))
            .collect();
        self.left_neighbors.clear();
        self.right_neighbors.clear();

        for site_number in (1..self.number_of_sites).rev() {
            let site = random_state_site_right(
                self.physical_dimensions[site_number],
                sequence[site_number],
                sequence[site_number + 1],
                &mut self.rng,
            )?;
            self.absorb_right(site, site_number)?;
        }
        self.state_site = random_state_site_middle(
            self.physical_dimensions[0],
            sequence[0],
            sequence[1],
            &mut self.rng,
        )?;
        self.bandwidth_dimension = bandwidth_dimension;
        self.projector_matrix = self.build_projector_matrix()?;

        let expectation_value = self.compute_expectation_value()?;
        if expectation_value.im.abs() > 1e-10 {
            return Err(NutError::InitialChainEnergyNotReal(expectation_value));
        }
        self.energy = expectation_value.re;
        self.status = ChainStatus::Fresh;
        Ok(())
    }

    fn build_projector_matrix(&self) -> Result<Option<ProjectorMatrix>> {
        if self.references.is_empty() {
            return Ok(None);
        }
        let site_number = self.current_site_number;
        let mut projectors = Vec::with_capacity(self.references.len());
        for (reference, (left, right)) in self.references.iter().zip(
            self.left_overlap_boundaries
                .iter()
                .zip(&self.right_overlap_boundaries),
        ) {
            projectors.push(compute_projector_vector(
                left,
                &reference.trios[site_number].middle,
                right,
            )?);
        }
        Ok(Some(ProjectorMatrix::new(projectors)?))
    }
}
