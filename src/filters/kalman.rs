use super::GazeFilter;
use crate::constants::KALMAN_INITIAL_COVARIANCE;
use nalgebra::{Matrix2, Matrix4, Vector2, Vector4};

type Matrix2x4<T> = nalgebra::Matrix<T, nalgebra::U2, nalgebra::U4, nalgebra::ArrayStorage<T, 2, 4>>;

/// Constant-velocity Kalman smoother for the gaze stream
pub struct KalmanSmoother {
    // State: [x, y, vx, vy]
    state: Vector4<f64>,
    // State covariance
    covariance: Matrix4<f64>,
    // Process noise
    process_noise: Matrix4<f64>,
    // Measurement noise
    measurement_noise: Matrix2<f64>,
    // State transition matrix
    transition: Matrix4<f64>,
    // Measurement matrix
    measurement: Matrix2x4<f64>,
}

impl KalmanSmoother {
    /// Create a smoother with a fixed step interval and noise magnitudes
    #[must_use]
    pub fn new(dt: f64, process_var: f64, measurement_var: f64) -> Self {
        // State transition matrix
        let transition = Matrix4::new(
            1.0, 0.0, dt, 0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        // Measurement matrix (we only measure position)
        let measurement = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );

        // Discrete white-noise acceleration model scaled by process_var
        let q = process_var;
        let process_noise = Matrix4::new(
            q * dt.powi(4) / 4.0, 0.0, q * dt.powi(3) / 2.0, 0.0,
            0.0, q * dt.powi(4) / 4.0, 0.0, q * dt.powi(3) / 2.0,
            q * dt.powi(3) / 2.0, 0.0, q * dt.powi(2), 0.0,
            0.0, q * dt.powi(3) / 2.0, 0.0, q * dt.powi(2),
        );

        let r = measurement_var;
        let measurement_noise = Matrix2::new(
            r, 0.0,
            0.0, r,
        );

        Self {
            state: Vector4::zeros(),
            covariance: Matrix4::identity() * KALMAN_INITIAL_COVARIANCE,
            process_noise,
            measurement_noise,
            transition,
            measurement,
        }
    }

    fn predict(&mut self) {
        self.state = self.transition * self.state;
        self.covariance =
            self.transition * self.covariance * self.transition.transpose() + self.process_noise;
    }

    fn update(&mut self, measurement: Vector2<f64>) {
        // Innovation
        let innovation = measurement - self.measurement * self.state;

        // Innovation covariance is positive definite (measurement noise > 0),
        // so the inverse exists; skip the update rather than panic otherwise
        let innovation_cov =
            self.measurement * self.covariance * self.measurement.transpose() + self.measurement_noise;
        let Some(innovation_cov_inv) = innovation_cov.try_inverse() else {
            return;
        };

        // Kalman gain
        let gain = self.covariance * self.measurement.transpose() * innovation_cov_inv;

        self.state += gain * innovation;

        let identity = Matrix4::identity();
        self.covariance = (identity - gain * self.measurement) * self.covariance;
    }
}

impl GazeFilter for KalmanSmoother {
    fn step(&mut self, x: f64, y: f64) -> (f64, f64) {
        self.predict();
        self.update(Vector2::new(x, y));
        (self.state[0], self.state[1])
    }

    fn reset(&mut self) {
        self.state = Vector4::zeros();
        self.covariance = Matrix4::identity() * KALMAN_INITIAL_COVARIANCE;
    }

    fn name(&self) -> &str {
        "KalmanSmoother"
    }
}
