#![allow(non_snake_case)]
use RustedDynFit::estimation::double_pendulum_fit::DoublePendulumEstimation;
use RustedDynFit::estimation::pendulum_fit::PendulumEstimation;
use RustedDynFit::estimation::sir_fit::SirEstimation;

fn main() {
    let example = 3;
    match example {
        0 => {
            // FORCED DAMPED PENDULUM
            // simulate theta'' = -(g/l)*sin(theta) - b*theta' + a*cos(omega_d*t) with the
            // true parameters, add gaussian noise to the angle, then recover
            // [b, a, omega_d] with a genetic algorithm and with L-M curve fitting
            let mut task = PendulumEstimation::new();
            task.run().expect("pendulum estimation failed");
        }
        1 => {
            // DOUBLE PENDULUM
            // both angles observed, rod lengths [l1, l2] recovered; small initial
            // angles keep the problem in the regular regime
            let mut task = DoublePendulumEstimation::new();
            task.run().expect("double pendulum estimation failed");
        }
        2 => {
            // SIR EPIDEMIC
            // infected fraction observed, rates [beta, gamma] recovered
            let mut task = SirEstimation::new();
            task.run().expect("SIR estimation failed");
        }
        3 => {
            // ALL THREE EXPERIMENTS IN SEQUENCE
            let mut pendulum = PendulumEstimation::new();
            pendulum.run().expect("pendulum estimation failed");

            let mut double_pendulum = DoublePendulumEstimation::new();
            double_pendulum
                .run()
                .expect("double pendulum estimation failed");

            let mut sir = SirEstimation::new();
            sir.run().expect("SIR estimation failed");
        }
        _ => panic!("Unknown example number"),
    }
}
