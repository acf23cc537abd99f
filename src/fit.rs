use nalgebra::{Matrix3, Vector3};

#[derive(thiserror::Error, Debug)]
pub enum FitError {
    #[error("The fit did not converge (stopped after {0} iterations)")]
    NonConvergence(usize),
    #[error("Need at least 3 samples to fit a 3-parameter model, got {0}")]
    TooFewSamples(usize),
}
type Result<T> = std::result::Result<T, FitError>;

const MAX_ITERS: usize = 200;
const STEP_TOL: f64 = 1e-10;

/// Gaussian bell `A exp(-(x - mu)^2 / 2 sigma^2)`
#[derive(Debug, Clone, Copy)]
pub struct Gaussian {
    pub amplitude: f64,
    pub center: f64,
    pub width: f64,
}
impl Gaussian {
    pub fn value(&self, x: f64) -> f64 {
        let z = (x - self.center) / self.width;
        self.amplitude * (-0.5 * z * z).exp()
    }
}

/// Exponential trend `a exp(b x) + c`
#[derive(Debug, Clone, Copy)]
pub struct Exponential {
    pub scale: f64,
    pub rate: f64,
    pub offset: f64,
}
impl Exponential {
    pub fn value(&self, x: f64) -> f64 {
        self.scale * (self.rate * x).exp() + self.offset
    }
}

/// Default starting point for [`gaussian_with`]: amplitude = the largest
/// sample (1 when no sample is positive), center = the midpoint,
/// width = 0.2 x the index range
pub fn gaussian_guess(samples: &[f64]) -> Gaussian {
    let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Gaussian {
        amplitude: if max > 0.0 { max } else { 1.0 },
        center: (samples.len().max(1) - 1) as f64 / 2.0,
        width: 0.2 * samples.len() as f64,
    }
}

/// Fits a Gaussian to samples taken at integer positions `0..n`, starting
/// from [`gaussian_guess`]
pub fn gaussian(samples: &[f64]) -> Result<Gaussian> {
    gaussian_with(samples, gaussian_guess(samples))
}

/// Same fit from a caller-supplied starting point. A flat input carries no
/// bell and is reported as non-convergence.
pub fn gaussian_with(samples: &[f64], guess: Gaussian) -> Result<Gaussian> {
    if samples.len() < 3 {
        return Err(FitError::TooFewSamples(samples.len()));
    }
    if samples.windows(2).all(|w| w[0] == w[1]) {
        return Err(FitError::NonConvergence(0));
    }
    let x: Vec<f64> = (0..samples.len()).map(|i| i as f64).collect();
    let guess = Vector3::new(guess.amplitude, guess.center, guess.width);
    let p = least_squares(&x, samples, guess, |p, xi| {
        let z = (xi - p[1]) / p[2];
        let e = (-0.5 * z * z).exp();
        (
            p[0] * e,
            Vector3::new(e, p[0] * e * z / p[2], p[0] * e * z * z / p[2]),
        )
    })?;
    Ok(Gaussian {
        amplitude: p[0],
        center: p[1],
        width: p[2],
    })
}

/// Fits `current = a exp(b voltage) + c`, the empirical source behavior,
/// with the documented initial guess (0.05, 0.1, 10)
pub fn exponential(x: &[f64], y: &[f64]) -> Result<Exponential> {
    if x.len() != y.len() || x.len() < 3 {
        return Err(FitError::TooFewSamples(x.len().min(y.len())));
    }
    let guess = Vector3::new(0.05, 0.1, 10.0);
    let p = least_squares(x, y, guess, |p, xi| {
        let e = (p[1] * xi).exp();
        (p[0] * e + p[2], Vector3::new(e, p[0] * xi * e, 1.0))
    })?;
    Ok(Exponential {
        scale: p[0],
        rate: p[1],
        offset: p[2],
    })
}

/// Damped least squares over a 3-parameter model: normal equations with an
/// adaptive Levenberg damping term, LU-solved steps, step-norm stop
fn least_squares<F>(x: &[f64], y: &[f64], guess: Vector3<f64>, model: F) -> Result<Vector3<f64>>
where
    F: Fn(&Vector3<f64>, f64) -> (f64, Vector3<f64>),
{
    let evaluate = |p: &Vector3<f64>| -> Option<(f64, Matrix3<f64>, Vector3<f64>)> {
        let mut cost = 0f64;
        let mut h = Matrix3::<f64>::zeros();
        let mut g = Vector3::<f64>::zeros();
        for (&xi, &yi) in x.iter().zip(y.iter()) {
            let (value, jacobian) = model(p, xi);
            if !value.is_finite() || jacobian.iter().any(|v| !v.is_finite()) {
                return None;
            }
            let r = value - yi;
            cost += r * r;
            h += jacobian * jacobian.transpose();
            g += jacobian * r;
        }
        Some((cost, h, g))
    };

    let mut p = guess;
    let (mut cost, mut h, mut g) = evaluate(&p).ok_or(FitError::NonConvergence(0))?;
    let mut lambda = 1e-3;
    for iter in 1..=MAX_ITERS {
        let damped = h + Matrix3::identity() * lambda;
        let step = match damped.lu().solve(&(-g)) {
            Some(step) if step.iter().all(|v| v.is_finite()) => step,
            _ => return Err(FitError::NonConvergence(iter)),
        };
        let trial = p + step;
        match evaluate(&trial) {
            Some((trial_cost, trial_h, trial_g)) if trial_cost <= cost => {
                let done = step.norm() < STEP_TOL * (1.0 + p.norm());
                p = trial;
                cost = trial_cost;
                h = trial_h;
                g = trial_g;
                lambda = (lambda * 0.25).max(1e-12);
                if done {
                    return Ok(p);
                }
            }
            _ => {
                lambda *= 10.0;
                if lambda > 1e12 {
                    return Err(FitError::NonConvergence(iter));
                }
            }
        }
    }
    Err(FitError::NonConvergence(MAX_ITERS))
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    #[test]
    fn gaussian_recovers_exact_parameters() {
        let truth = Gaussian {
            amplitude: 10.0,
            center: 25.0,
            width: 5.0,
        };
        let samples: Vec<f64> = (0..50).map(|i| truth.value(i as f64)).collect();
        let fitted = gaussian(&samples).unwrap();
        assert!((fitted.amplitude - truth.amplitude).abs() < 1e-6);
        assert!((fitted.center - truth.center).abs() < 1e-6);
        assert!((fitted.width.abs() - truth.width).abs() < 1e-6);
    }

    #[test]
    fn gaussian_tolerates_noise() {
        let truth = Gaussian {
            amplitude: 200.0,
            center: 30.0,
            width: 4.0,
        };
        let mut rng = StdRng::seed_from_u64(13);
        let samples: Vec<f64> = (0..64)
            .map(|i| truth.value(i as f64) + rng.gen_range(-1.0..1.0))
            .collect();
        let fitted = gaussian(&samples).unwrap();
        assert!((fitted.amplitude - truth.amplitude).abs() < 5.0);
        assert!((fitted.center - truth.center).abs() < 0.5);
        assert!((fitted.width.abs() - truth.width).abs() < 0.5);
    }

    #[test]
    fn flat_samples_do_not_fit() {
        assert!(matches!(
            gaussian(&[0.0; 32]),
            Err(FitError::NonConvergence(_))
        ));
        assert!(matches!(
            gaussian(&[7.5; 32]),
            Err(FitError::NonConvergence(_))
        ));
        assert!(matches!(gaussian(&[1.0, 2.0]), Err(FitError::TooFewSamples(2))));
    }

    #[test]
    fn exponential_recovers_the_source_trend() {
        let truth = Exponential {
            scale: 0.06,
            rate: 0.09,
            offset: 8.0,
        };
        let x: Vec<f64> = (25..=60).step_by(5).map(|v| v as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| truth.value(v)).collect();
        let fitted = exponential(&x, &y).unwrap();
        assert!((fitted.scale - truth.scale).abs() < 1e-4);
        assert!((fitted.rate - truth.rate).abs() < 1e-4);
        assert!((fitted.offset - truth.offset).abs() < 1e-2);
    }

    #[test]
    fn mismatched_series_are_rejected() {
        assert!(matches!(
            exponential(&[1.0, 2.0, 3.0], &[1.0, 2.0]),
            Err(FitError::TooFewSamples(2))
        ));
    }
}
