//! Quadrature rules for the reference domains of the supported elements.
//!
//! Quadrilaterals and hexahedra use the reference domain `[-1, 1]^d`. Triangles and tetrahedra
//! use the unit simplex with a vertex at the origin.
use crate::element::ElementType;
use std::f64::consts::PI;

/// A quadrature rule with points of dimension at most three.
///
/// Coordinates beyond the dimension of the rule are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule {
    dim: usize,
    weights: Vec<f64>,
    points: Vec<[f64; 3]>,
}

impl QuadratureRule {
    pub fn from_weights_and_points(dim: usize, weights: Vec<f64>, points: Vec<[f64; 3]>) -> Self {
        assert!(dim >= 1 && dim <= 3, "quadrature dimension must be 1, 2 or 3");
        assert_eq!(weights.len(), points.len(), "one weight per point is required");
        Self { dim, weights, points }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn number_of_points(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn weight(&self, i: usize) -> f64 {
        self.weights[i]
    }

    pub fn point(&self, i: usize) -> &[f64] {
        &self.points[i][..self.dim]
    }

    /// Integrates `f` over the reference domain.
    pub fn integrate(&self, mut f: impl FnMut(&[f64]) -> f64) -> f64 {
        (0..self.number_of_points())
            .map(|i| self.weight(i) * f(self.point(i)))
            .sum()
    }
}

/// Recurrence relation for Legendre polynomials.
///
/// The derivative is *not* defined at |x| == 1, so it is only suitable for evaluation in the
/// open interval (-1, 1).
#[derive(Debug, Default)]
struct LegendreRecurrence {
    n: usize,
    x: f64,
    // p_n(x)
    p1: f64,
    // p_{n - 1}(x)
    p2: f64,
}

impl LegendreRecurrence {
    fn evaluate(n: usize, x: f64) -> Self {
        //  m P_m(x) = (2m - 1) * x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p1 = 1.0;
        let mut p2 = 0.0;
        let mut p3;
        for m in 1..=n {
            let m = m as f64;
            p3 = p2;
            p2 = p1;
            p1 = ((2.0 * m - 1.0) * x * p2 - (m - 1.0) * p3) / m;
        }

        Self { n, x, p1, p2 }
    }

    fn value_and_derivative(&self) -> (f64, f64) {
        let Self { n, x, p1, p2 } = *self;
        let n = n as f64;
        (p1, n * (x * p1 - p2) / (x * x - 1.0))
    }
}

/// Gauss–Legendre points and weights on `[-1, 1]`.
///
/// Given `n` points, the rule integrates polynomials of order up to `2 n - 1` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss_legendre(num_points: usize) -> (Vec<f64>, Vec<f64>) {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    // Loosely based on Numerical Recipes, Third Edition (2007)
    let m = (n + 1) / 2;
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);

    // Only find the first m roots, the remaining ones follow by symmetry
    for i in 0..m {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let (mut p, mut dp) = LegendreRecurrence::evaluate(n, x).value_and_derivative();
        for _ in 0..100 {
            let dx = -p / dp;
            x += dx;
            (p, dp) = LegendreRecurrence::evaluate(n, x).value_and_derivative();
            if dx.abs() <= 1e-15 {
                break;
            }
        }
        weights.push(2.0 / ((1.0 - x * x) * dp * dp));
        points.push(x);
    }

    for i in m..n {
        let mirror_idx = n - i - 1;
        points.push(-points[mirror_idx]);
        weights.push(weights[mirror_idx]);
    }

    (weights, points)
}

/// Tensor product Gauss rule on `[-1, 1]^dim`.
pub fn tensor_gauss(dim: usize, num_points_per_dim: usize) -> QuadratureRule {
    let (w1d, x1d) = gauss_legendre(num_points_per_dim);
    let mut weights = vec![1.0];
    let mut points = vec![[0.0; 3]];
    for d in 0..dim {
        let mut next_weights = Vec::with_capacity(weights.len() * w1d.len());
        let mut next_points = Vec::with_capacity(points.len() * x1d.len());
        for (w, p) in weights.iter().zip(&points) {
            for (&wi, &xi) in w1d.iter().zip(&x1d) {
                let mut q = *p;
                q[d] = xi;
                next_weights.push(w * wi);
                next_points.push(q);
            }
        }
        weights = next_weights;
        points = next_points;
    }
    QuadratureRule::from_weights_and_points(dim, weights, points)
}

/// Symmetric rule on the reference triangle, exact for polynomials of degree `strength`.
///
/// Strength 1 gives the centroid rule, strength 2 the three-point interior rule.
pub fn triangle(strength: usize) -> QuadratureRule {
    match strength {
        0 | 1 => QuadratureRule::from_weights_and_points(2, vec![0.5], vec![[1.0 / 3.0, 1.0 / 3.0, 0.0]]),
        _ => QuadratureRule::from_weights_and_points(
            2,
            vec![1.0 / 6.0; 3],
            vec![
                [1.0 / 6.0, 1.0 / 6.0, 0.0],
                [2.0 / 3.0, 1.0 / 6.0, 0.0],
                [1.0 / 6.0, 2.0 / 3.0, 0.0],
            ],
        ),
    }
}

/// Symmetric rule on the reference tetrahedron, exact for polynomials of degree `strength`.
pub fn tetrahedron(strength: usize) -> QuadratureRule {
    match strength {
        0 | 1 => QuadratureRule::from_weights_and_points(3, vec![1.0 / 6.0], vec![[0.25, 0.25, 0.25]]),
        _ => {
            let a = 0.5854101966249685;
            let b = 0.1381966011250105;
            QuadratureRule::from_weights_and_points(
                3,
                vec![1.0 / 24.0; 4],
                vec![[b, b, b], [a, b, b], [b, a, b], [b, b, a]],
            )
        }
    }
}

/// The rule used when no other selector is given: exact for the stiffness matrix of an
/// undistorted linear element.
pub fn default_rule(element_type: ElementType) -> QuadratureRule {
    match element_type {
        ElementType::Tri3 => triangle(1),
        ElementType::Tet4 => tetrahedron(1),
        ElementType::Quad4 => tensor_gauss(2, 2),
        ElementType::Hex8 => tensor_gauss(3, 2),
    }
}
