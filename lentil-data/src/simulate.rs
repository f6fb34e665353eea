#![allow(dead_code)]

use nalgebra_sparse::{CooMatrix, CscMatrix};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson, Uniform};

pub struct SimArgs {
    pub rows: usize,
    pub cols: usize,
    pub depth: f32,
    pub rseed: u64,
}

pub struct SimOut {
    pub counts: CscMatrix<f32>,
    pub row_names: Vec<Box<str>>,
    pub column_names: Vec<Box<str>>,
}

/// Generate a random sparse count matrix with named rows and columns
///
/// ```text
/// Y(i,j) ~ Poisson( depth * U(i,j) ), U(i,j) ~ Uniform(0, 1)
/// ```
///
pub fn generate_poisson_counts(args: &SimArgs) -> anyhow::Result<SimOut> {
    let mut rng = StdRng::seed_from_u64(args.rseed);
    let runif = Uniform::new(0_f32, 1_f32)?;

    let mut coo = CooMatrix::<f32>::new(args.rows, args.cols);

    for jj in 0..args.cols {
        for ii in 0..args.rows {
            let rate = args.depth * runif.sample(&mut rng);
            if rate > 0_f32 {
                let y_ij = Poisson::new(rate)?.sample(&mut rng);
                if y_ij > 0_f32 {
                    coo.push(ii, jj, y_ij);
                }
            }
        }
    }

    let row_names = (0..args.rows)
        .map(|i| format!("gene_{}", i).into_boxed_str())
        .collect();
    let column_names = (0..args.cols)
        .map(|j| format!("cell_{}", j).into_boxed_str())
        .collect();

    Ok(SimOut {
        counts: CscMatrix::from(&coo),
        row_names,
        column_names,
    })
}
