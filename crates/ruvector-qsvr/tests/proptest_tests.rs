//! Property-based tests for the QSVR crate.
//!
//! These tests use proptest to verify kernel and solver invariants across
//! random inputs.

use ndarray::{Array1, Array2};
use proptest::prelude::*;
use ruvector_qsvr::{
    linalg, solve, Entanglement, ExecutionBackend, Qsvr, QsvrConfig, QuantumKernel,
    SolverParams, ZZFeatureMap, ZZFeatureMapConfig,
};

// Strategy for generating random feature vectors
fn vec_strategy(dim: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-4.0..4.0f64, dim)
}

// Strategy for generating random data sets (n rows, dim columns)
fn matrix_strategy(n: usize, dim: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(vec_strategy(dim), n)
}

fn to_array2(data: Vec<Vec<f64>>, dim: usize) -> Array2<f64> {
    let n = data.len();
    let flat: Vec<f64> = data.into_iter().flatten().collect();
    Array2::from_shape_vec((n, dim), flat).unwrap()
}

fn entanglement_strategy() -> impl Strategy<Value = Entanglement> {
    prop_oneof![
        Just(Entanglement::Full),
        Just(Entanglement::Linear),
        Just(Entanglement::Circular),
    ]
}

fn kernel(dim: usize, reps: usize, entanglement: Entanglement) -> QuantumKernel {
    let map = ZZFeatureMap::new(ZZFeatureMapConfig {
        feature_dimension: dim,
        reps,
        entanglement,
        ..Default::default()
    })
    .unwrap();
    QuantumKernel::exact(map)
}

proptest! {
    /// Property: the fidelity kernel is symmetric, k(x,y) = k(y,x)
    #[test]
    fn kernel_is_symmetric(
        x in vec_strategy(3),
        y in vec_strategy(3),
        reps in 1usize..4,
        entanglement in entanglement_strategy(),
    ) {
        let kernel = kernel(3, reps, entanglement);
        let x = Array1::from_vec(x);
        let y = Array1::from_vec(y);

        let k_xy = kernel.evaluate(x.view(), y.view()).unwrap();
        let k_yx = kernel.evaluate(y.view(), x.view()).unwrap();

        prop_assert!((k_xy - k_yx).abs() < 1e-10, "k(x,y)={} != k(y,x)={}", k_xy, k_yx);
    }

    /// Property: kernel values lie in [0, 1]
    #[test]
    fn kernel_values_bounded(
        x in vec_strategy(3),
        y in vec_strategy(3),
        entanglement in entanglement_strategy(),
    ) {
        let kernel = kernel(3, 2, entanglement);
        let k = kernel
            .evaluate(Array1::from_vec(x).view(), Array1::from_vec(y).view())
            .unwrap();
        prop_assert!((0.0..=1.0).contains(&k), "k = {} outside [0, 1]", k);
    }

    /// Property: self-kernel is 1
    #[test]
    fn self_kernel_is_one(x in vec_strategy(4)) {
        let kernel = kernel(4, 2, Entanglement::Full);
        let x = Array1::from_vec(x);
        let k_xx = kernel.evaluate(x.view(), x.view()).unwrap();
        prop_assert!((k_xx - 1.0).abs() < 1e-10, "k(x,x) = {} != 1.0", k_xx);
    }

    /// Property: encoded states are normalized
    #[test]
    fn encoded_state_is_normalized(x in vec_strategy(3)) {
        let map = ZZFeatureMap::with_dimension(3).unwrap();
        let state = map.encode(Array1::from_vec(x).view()).unwrap();
        let total: f64 = state.probabilities().iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-10);
    }

    /// Property: sampled estimates are symmetric, bounded and reproducible
    #[test]
    fn sampled_kernel_is_symmetric(
        x in vec_strategy(2),
        y in vec_strategy(2),
        seed in any::<u64>(),
    ) {
        let kernel = QuantumKernel::new(
            ZZFeatureMap::with_dimension(2).unwrap(),
            ExecutionBackend::sampled(128, seed),
        )
        .unwrap();
        let x = Array1::from_vec(x);
        let y = Array1::from_vec(y);

        let k_xy = kernel.evaluate(x.view(), y.view()).unwrap();
        let k_yx = kernel.evaluate(y.view(), x.view()).unwrap();

        prop_assert_eq!(k_xy, k_yx);
        prop_assert!((0.0..=1.0).contains(&k_xy));
    }

    /// Property: the training kernel matrix is symmetric with a unit diagonal and PSD
    #[test]
    fn kernel_matrix_is_symmetric_psd(data in matrix_strategy(6, 2)) {
        let data = to_array2(data, 2);
        let kernel = kernel(2, 2, Entanglement::Full);
        let k = kernel.kernel_matrix(data.view()).unwrap();

        for i in 0..k.nrows() {
            prop_assert!((k[[i, i]] - 1.0).abs() < 1e-8);
            for j in 0..k.ncols() {
                prop_assert!((k[[i, j]] - k[[j, i]]).abs() < 1e-12);
            }
        }
        prop_assert!(linalg::min_eigenvalue(k.view()).unwrap() > -1e-8);
    }

    /// Property: dual coefficients respect the box and equality constraints
    #[test]
    fn solver_respects_constraints(
        data in matrix_strategy(8, 2),
        targets in prop::collection::vec(-2.0..2.0f64, 8),
        c in 0.1..5.0f64,
        shrinking in any::<bool>(),
    ) {
        let data = to_array2(data, 2);
        let y = Array1::from_vec(targets);
        let k = kernel(2, 1, Entanglement::Full).kernel_matrix(data.view()).unwrap();

        let params = SolverParams { c, shrinking, ..Default::default() };
        let solution = solve(k.view(), y.view(), &params).unwrap();

        let mut total = 0.0;
        for &coef in &solution.dual_coef {
            prop_assert!(coef.abs() <= c + 1e-9, "|coef| = {} > C = {}", coef.abs(), c);
            prop_assert!(coef != 0.0);
            total += coef;
        }
        prop_assert!(total.abs() < 1e-8, "sum of coefficients = {}", total);
        prop_assert!(solution.intercept.is_finite());
        prop_assert_eq!(solution.support_indices.len(), solution.dual_coef.len());
    }

    /// Property: fitted predictions are finite and reproducible
    #[test]
    fn model_predictions_are_finite(
        data in matrix_strategy(5, 2),
        targets in prop::collection::vec(0.0..1.0f64, 5),
    ) {
        let data = to_array2(data, 2);
        let y = Array1::from_vec(targets);
        let mut model = Qsvr::with_kernel(kernel(2, 2, Entanglement::Full), QsvrConfig::default())
            .unwrap();
        model.fit(data.view(), y.view()).unwrap();

        let predictions = model.predict(data.view()).unwrap();
        prop_assert_eq!(predictions.len(), 5);
        for p in predictions.iter() {
            prop_assert!(p.is_finite());
        }
        prop_assert_eq!(model.predict(data.view()).unwrap(), predictions);
    }
}
