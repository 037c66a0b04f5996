//! Benchmark of one optimization sweep over a transverse-field Ising chain.

use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use num_complex::Complex64;
use nutcracker_chain::Chain;
use nutcracker_core::{c, ChainOptions, ONE, ZERO};
use nutcracker_tensor::OperatorSite;

fn identity2() -> Array2<Complex64> {
    Array2::from_shape_vec((2, 2), vec![ONE, ZERO, ZERO, ONE]).unwrap()
}

fn pauli_x() -> Array2<Complex64> {
    Array2::from_shape_vec((2, 2), vec![ZERO, ONE, ONE, ZERO]).unwrap()
}

fn pauli_z() -> Array2<Complex64> {
    Array2::from_shape_vec((2, 2), vec![ONE, ZERO, ZERO, -ONE]).unwrap()
}

fn ising_operator(number_of_sites: usize, coupling: f64, field: f64) -> Vec<OperatorSite> {
    let field_term = pauli_x().mapv(|z| z * c(-field, 0.0));
    let coupling_term = pauli_z().mapv(|z| z * c(-coupling, 0.0));
    let mut sites = Vec::with_capacity(number_of_sites);
    sites.push(
        OperatorSite::new(
            2,
            1,
            3,
            vec![
                (1, 1, field_term.clone()),
                (1, 2, coupling_term.clone()),
                (1, 3, identity2()),
            ],
        )
        .unwrap(),
    );
    for _ in 1..number_of_sites - 1 {
        sites.push(
            OperatorSite::new(
                2,
                3,
                3,
                vec![
                    (1, 1, identity2()),
                    (2, 1, pauli_z()),
                    (3, 1, field_term.clone()),
                    (3, 2, coupling_term.clone()),
                    (3, 3, identity2()),
                ],
            )
            .unwrap(),
        );
    }
    sites.push(
        OperatorSite::new(
            2,
            3,
            1,
            vec![(1, 1, identity2()), (2, 1, pauli_z()), (3, 1, field_term)],
        )
        .unwrap(),
    );
    sites
}

fn bench_sweep(criterion: &mut Criterion) {
    criterion.bench_function("ising_sweep_n10_b8", |bencher| {
        let operator = ising_operator(10, 1.0, 1.0);
        bencher.iter_batched(
            || Chain::with_seed(operator.clone(), 8, ChainOptions::default(), 0).unwrap(),
            |mut chain| chain.perform_optimization_sweep().unwrap(),
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_sweep);
criterion_main!(benches);
