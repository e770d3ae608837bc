use crate::numerical::GA::GAResult;
use crate::numerical::LM_fitting::FitResult;
use nalgebra::DVector;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
pub struct ParamRow {
    parameter: String,
    true_value: String,
    ga_estimate: String,
    ga_error_percent: String,
    lm_estimate: String,
    lm_error_percent: String,
}

fn rel_err_percent(estimate: f64, truth: f64) -> String {
    if truth.abs() < 1e-12 {
        "-".to_string()
    } else {
        format!("{:.3}", 100.0 * (estimate - truth).abs() / truth.abs())
    }
}

/// pretty-print the true vs estimated parameter comparison of one experiment
pub fn print_comparison(
    system: &str,
    names: &[&str],
    truth: &DVector<f64>,
    ga: Option<&GAResult>,
    lm: Option<&FitResult>,
) {
    let mut rows = Vec::new();
    for (j, name) in names.iter().enumerate() {
        let (ga_estimate, ga_error) = match ga {
            Some(result) => (
                format!("{:.6}", result.best_params[j]),
                rel_err_percent(result.best_params[j], truth[j]),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        let (lm_estimate, lm_error) = match lm {
            Some(result) => (
                format!("{:.6}", result.params[j]),
                rel_err_percent(result.params[j], truth[j]),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        rows.push(ParamRow {
            parameter: name.to_string(),
            true_value: format!("{:.6}", truth[j]),
            ga_estimate,
            ga_error_percent: ga_error,
            lm_estimate,
            lm_error_percent: lm_error,
        });
    }

    let mut table = Table::new(&rows);
    table.with(Style::modern_rounded());
    println!("\n Parameter estimation summary: {}", system);
    println!("{}", table);

    if let Some(result) = ga {
        println!(
            " GA: best fitness (SSE) {:.6e} after {} evaluations",
            result.best_fitness, result.n_evaluations
        );
    }
    if let Some(result) = lm {
        println!(
            " LM: reduced chi-square {:.6e}, R^2 {:.6}, converged: {}, {} function calls",
            result.red_chi2, result.r_squared, result.converged, result.func_calls
        );
        if let Some(sigma) = &result.sigma_params {
            let formatted: Vec<String> = names
                .iter()
                .zip(sigma.iter())
                .map(|(name, s)| format!("{} +/- {:.2e}", name, s))
                .collect();
            println!(" LM standard errors: {}", formatted.join(", "));
        }
    }
}
