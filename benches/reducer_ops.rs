use criterion::{criterion_group, criterion_main, Criterion};
use lowdisc::gf2::{GF2Matrix, ProgressiveRowReducer};
use lowdisc::net::{DigitalNet, Net, Sobol};
use lowdisc::tvalue::t_value;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_rows(rng: &mut StdRng, n: usize, cols: usize) -> Vec<GF2Matrix> {
    (0..n)
        .map(|_| GF2Matrix::from_row_ints(&[rng.gen::<u64>() & ((1 << cols) - 1)], cols))
        .collect()
}

fn criterion_benchmark(crit: &mut Criterion) {
    let sizes = vec![16usize, 32, 63];
    for cols in sizes {
        let mut rng = StdRng::seed_from_u64(1);
        let rows = random_rows(&mut rng, cols, cols);
        let replacements = random_rows(&mut rng, 4 * cols, cols);

        crit.bench_function(&format!("reducer add_row {}", cols), |b| {
            b.iter(|| {
                let mut red = ProgressiveRowReducer::new(cols);
                for row in &rows {
                    red.add_row(row);
                }
                red.rank()
            })
        });

        crit.bench_function(&format!("reducer replace_row {}", cols), |b| {
            let mut red = ProgressiveRowReducer::new(cols);
            for row in &rows {
                red.add_row(row);
            }
            let mut i = 0;
            b.iter(|| {
                let slot = i % cols;
                red.replace_row(slot, &replacements[i % replacements.len()]);
                i += 1;
                red.smallest_full_rank()
            })
        });
    }

    for m in [10usize, 14] {
        let net = DigitalNet::<Sobol>::new(
            m,
            vec![(0, vec![0]), (1, vec![1]), (2, vec![1, 1]), (3, vec![1, 3, 5])],
        )
        .unwrap();
        let mats: Vec<&GF2Matrix> = (0..net.dimension()).map(|c| net.matrix(c)).collect();
        crit.bench_function(&format!("t-value sobol dim 4 m {}", m), |b| {
            b.iter(|| t_value(&mats, 0, None).unwrap())
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
