use log::info;
use nalgebra::DVector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::{Rng, rng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use simplelog::*;

/// Real-coded genetic algorithm used to minimize a black-box fitness function
/// over a box-bounded parameter space. In this crate the fitness is the sum of
/// squared residuals between a simulated trajectory and noisy observations, so a
/// single evaluation wraps a full ODE integration; evaluations are therefore run
/// in parallel over the population.
///
/// Selection: k-tournament. Crossover: blend (BLX-alpha). Mutation: gaussian,
/// scaled to the bound width and clamped to the bounds. Elitism: the best
/// n_elite individuals survive each generation unchanged.
#[derive(Debug, Clone)]
pub struct GAOptimizer {
    pub pop_size: usize,
    pub n_generations: usize,
    pub tournament_size: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    // sigma of the gaussian mutation as a fraction of the bound width
    pub mutation_scale: f64,
    pub n_elite: usize,
    pub blx_alpha: f64,
    // fixed seed makes the whole run reproducible
    pub seed: Option<u64>,
    pub loglevel: Option<String>,
}

impl Default for GAOptimizer {
    fn default() -> Self {
        GAOptimizer {
            pop_size: 60,
            n_generations: 80,
            tournament_size: 3,
            crossover_rate: 0.9,
            mutation_rate: 0.15,
            mutation_scale: 0.1,
            n_elite: 2,
            blx_alpha: 0.5,
            seed: None,
            loglevel: Some("info".to_string()),
        }
    }
}

pub struct GAResult {
    pub best_params: DVector<f64>,
    pub best_fitness: f64,
    pub n_evaluations: usize,
    // best fitness per generation
    pub history: Vec<f64>,
}

impl GAOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pop_size(self, pop_size: usize) -> Self {
        assert!(pop_size > 1, "population must contain at least 2 individuals");
        Self { pop_size, ..self }
    }
    #[must_use]
    pub fn with_generations(self, n_generations: usize) -> Self {
        assert!(n_generations > 0, "number of generations must be positive");
        Self {
            n_generations,
            ..self
        }
    }
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }
    #[must_use]
    pub fn with_loglevel(self, loglevel: &str) -> Self {
        Self {
            loglevel: Some(loglevel.to_string()),
            ..self
        }
    }

    // wrapper around solver function to implement logging
    pub fn solve<F>(&self, fitness: F, lower: &DVector<f64>, upper: &DVector<f64>) -> GAResult
    where
        F: Fn(&DVector<f64>) -> f64 + Sync,
    {
        let is_logging_disabled = self
            .loglevel
            .as_ref()
            .map(|level| level == "off" || level == "none")
            .unwrap_or(false);

        if is_logging_disabled {
            self.solver(fitness, lower, upper)
        } else {
            let log_option = if let Some(level) = self.loglevel.clone() {
                match level.as_str() {
                    "debug" => LevelFilter::Debug,
                    "info" => LevelFilter::Info,
                    "warn" => LevelFilter::Warn,
                    "error" => LevelFilter::Error,
                    _ => panic!("loglevel must be debug, info, warn or error"),
                }
            } else {
                LevelFilter::Info
            };
            let _ = CombinedLogger::init(vec![TermLogger::new(
                log_option,
                Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )]);
            let res = self.solver(fitness, lower, upper);
            info!(
                "genetic search finished: best fitness {:.6e} after {} evaluations",
                res.best_fitness, res.n_evaluations
            );
            res
        }
    }

    fn solver<F>(&self, fitness: F, lower: &DVector<f64>, upper: &DVector<f64>) -> GAResult
    where
        F: Fn(&DVector<f64>) -> f64 + Sync,
    {
        let n = lower.len();
        assert_eq!(
            n,
            upper.len(),
            "lower and upper bounds must have the same length"
        );
        for j in 0..n {
            assert!(
                lower[j] < upper[j],
                "each lower bound must be below the corresponding upper bound"
            );
        }
        assert!(self.n_elite < self.pop_size);
        assert!(self.tournament_size > 0 && self.tournament_size <= self.pop_size);

        let mut rng: StdRng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rng()),
        };

        // initial population uniform inside the bounds
        let mut population: Vec<DVector<f64>> = (0..self.pop_size)
            .map(|_| {
                DVector::from_fn(n, |j, _| rng.random_range(lower[j]..upper[j]))
            })
            .collect();

        let mut n_evaluations = 0;
        let mut fitnesses = evaluate_population(&fitness, &population);
        n_evaluations += population.len();

        let mut history: Vec<f64> = Vec::with_capacity(self.n_generations);

        for generation in 0..self.n_generations {
            // rank current population, best first
            let mut order: Vec<usize> = (0..self.pop_size).collect();
            order.sort_by(|&i, &j| {
                fitnesses[i]
                    .partial_cmp(&fitnesses[j])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut next: Vec<DVector<f64>> = Vec::with_capacity(self.pop_size);
            for &i in order.iter().take(self.n_elite) {
                next.push(population[i].clone());
            }

            while next.len() < self.pop_size {
                let p1 = self.tournament(&population, &fitnesses, &mut rng);
                let p2 = self.tournament(&population, &fitnesses, &mut rng);

                let (mut c1, mut c2) = if rng.random::<f64>() < self.crossover_rate {
                    self.blend_crossover(&population[p1], &population[p2], &mut rng)
                } else {
                    (population[p1].clone(), population[p2].clone())
                };

                self.mutate(&mut c1, lower, upper, &mut rng);
                self.mutate(&mut c2, lower, upper, &mut rng);
                clamp_to_bounds(&mut c1, lower, upper);
                clamp_to_bounds(&mut c2, lower, upper);

                next.push(c1);
                if next.len() < self.pop_size {
                    next.push(c2);
                }
            }

            population = next;
            fitnesses = evaluate_population(&fitness, &population);
            n_evaluations += population.len();

            let (best_idx, best_fit) = argmin(&fitnesses);
            history.push(best_fit);
            if generation % 10 == 0 {
                info!(
                    "generation {}: best fitness {:.6e}, best individual {:?}",
                    generation,
                    best_fit,
                    population[best_idx].as_slice()
                );
            }
        }

        let (best_idx, best_fitness) = argmin(&fitnesses);
        GAResult {
            best_params: population[best_idx].clone(),
            best_fitness,
            n_evaluations,
            history,
        }
    }

    fn tournament(
        &self,
        population: &[DVector<f64>],
        fitnesses: &[f64],
        rng: &mut StdRng,
    ) -> usize {
        let mut best = rng.random_range(0..population.len());
        for _ in 1..self.tournament_size {
            let challenger = rng.random_range(0..population.len());
            if fitnesses[challenger] < fitnesses[best] {
                best = challenger;
            }
        }
        best
    }

    fn blend_crossover(
        &self,
        p1: &DVector<f64>,
        p2: &DVector<f64>,
        rng: &mut StdRng,
    ) -> (DVector<f64>, DVector<f64>) {
        let n = p1.len();
        let mut c1 = DVector::zeros(n);
        let mut c2 = DVector::zeros(n);
        for j in 0..n {
            let lo = p1[j].min(p2[j]);
            let hi = p1[j].max(p2[j]);
            let spread = (hi - lo) * self.blx_alpha;
            let a = lo - spread;
            let b = hi + spread;
            if b > a {
                c1[j] = rng.random_range(a..b);
                c2[j] = rng.random_range(a..b);
            } else {
                // identical parents on this gene
                c1[j] = p1[j];
                c2[j] = p2[j];
            }
        }
        (c1, c2)
    }

    fn mutate(
        &self,
        individual: &mut DVector<f64>,
        lower: &DVector<f64>,
        upper: &DVector<f64>,
        rng: &mut StdRng,
    ) {
        for j in 0..individual.len() {
            if rng.random::<f64>() < self.mutation_rate {
                let sigma = self.mutation_scale * (upper[j] - lower[j]);
                let z: f64 = StandardNormal.sample(rng);
                individual[j] += sigma * z;
            }
        }
    }
}

fn evaluate_population<F>(fitness: &F, population: &[DVector<f64>]) -> Vec<f64>
where
    F: Fn(&DVector<f64>) -> f64 + Sync,
{
    population
        .par_iter()
        .map(|individual| {
            let f = fitness(individual);
            // diverged integrations lose every comparison
            if f.is_finite() { f } else { f64::INFINITY }
        })
        .collect()
}

fn clamp_to_bounds(individual: &mut DVector<f64>, lower: &DVector<f64>, upper: &DVector<f64>) {
    for j in 0..individual.len() {
        individual[j] = individual[j].max(lower[j]).min(upper[j]);
    }
}

fn argmin(fitnesses: &[f64]) -> (usize, f64) {
    let mut best = 0;
    for i in 1..fitnesses.len() {
        if fitnesses[i] < fitnesses[best] {
            best = i;
        }
    }
    (best, fitnesses[best])
}
