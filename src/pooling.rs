use burn::config::Config;
use burn::module::{Content, DisplaySettings, Module, ModuleDisplay};
use burn::tensor::backend::Backend;
use burn::tensor::{DType, Tensor};

/// Time axis of `[batch, time, channels]` tensors.
pub const TIME_AXIS: usize = 1;

/// Lower bound applied to the variance before taking its square root.
pub const STDDEV_MIN_CLIP: f64 = 1e-10;

/// Configuration to create a [statistics pooling](StatsPooling) layer using the
/// [init function](StatsPoolingConfig::init).
#[derive(Config, Debug)]
pub struct StatsPoolingConfig {
    /// Floor of the clipped variance.
    #[config(default = "STDDEV_MIN_CLIP")]
    pub min_variance: f64,
}

/// Reduces the time axis to the concatenation of the per-channel mean and
/// standard deviation.
///
/// Should be created with [StatsPoolingConfig].
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct StatsPooling {
    /// Floor of the clipped variance.
    pub min_variance: f64,
}

impl ModuleDisplay for StatsPooling {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content.add("min_variance", &self.min_variance).optional()
    }
}

impl StatsPoolingConfig {
    /// Initialize a new [statistics pooling](StatsPooling) layer.
    pub fn init(&self) -> StatsPooling {
        StatsPooling {
            min_variance: self.min_variance,
        }
    }
}

impl Default for StatsPooling {
    fn default() -> Self {
        StatsPoolingConfig::new().init()
    }
}

impl StatsPooling {
    /// Applies the forward pass on the input tensor.
    ///
    /// The variance is the biased (population) estimator. It is clipped into
    /// `[min_variance, MAX]` where `MAX` is the largest finite value of the
    /// tensor's float type, so the square root never sees a negative value
    /// produced by cancellation.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, time, channels]`
    /// - output: `[batch_size, 2 * channels]`, means first then standard deviations
    pub fn forward<B: Backend>(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let max = float_max(input.dtype());

        let means = input.clone().mean_dim(TIME_AXIS);
        let centered = input - means.clone();
        let variances = (centered.clone() * centered)
            .mean_dim(TIME_AXIS)
            .squeeze::<2>(TIME_AXIS);
        let means = means.squeeze::<2>(TIME_AXIS);

        let stddevs = variances.clamp(self.min_variance, max).sqrt();

        Tensor::cat(vec![means, stddevs], 1)
    }
}

fn float_max(dtype: DType) -> f64 {
    match dtype {
        DType::F64 => f64::MAX,
        DType::F16 => 65504.0,
        DType::BF16 => 3.389_531_4e38,
        DType::F32 | DType::Flex32 => f32::MAX as f64,
        // Only float tensors reach the pooling.
        _ => f32::MAX as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TestAutodiffBackend, TestBackend};
    use burn::tensor::{Distribution, TensorData, Tolerance};

    #[test]
    fn single_step_hits_the_variance_floor() {
        let device = Default::default();
        let pooling = StatsPoolingConfig::new().init();
        let input = Tensor::<TestBackend, 3>::from_floats(
            [[[1.5, -2.0, 0.0]], [[3.0, 3.0, 7.25]]],
            &device,
        );

        let output = pooling.forward(input);

        assert_eq!(output.dims(), [2, 6]);
        let floor = (STDDEV_MIN_CLIP as f32).sqrt();
        let values = output.into_data().to_vec::<f32>().unwrap();
        for row in values.chunks(6) {
            for stddev in &row[3..] {
                assert_eq!(*stddev, floor);
            }
        }
        assert_eq!(&values[0..3], &[1.5, -2.0, 0.0]);
        assert_eq!(&values[6..9], &[3.0, 3.0, 7.25]);
    }

    #[test]
    fn mean_and_population_stddev() {
        let device = Default::default();
        let pooling = StatsPooling::default();
        let input = Tensor::<TestBackend, 3>::from_floats(
            [[[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [6.0, 10.0]]],
            &device,
        );

        let output = pooling.forward(input);

        // channel 0: mean 3, variance (4 + 1 + 0 + 9) / 4 = 3.5
        let floor = (STDDEV_MIN_CLIP as f32).sqrt();
        output.into_data().assert_approx_eq(
            &TensorData::from([[3.0, 10.0, 3.5_f32.sqrt(), floor]]), Tolerance::<f32>::absolute(1e-6));
    }

    #[test]
    fn mean_matches_arithmetic_mean_on_random_input() {
        TestBackend::seed(0);
        let device = Default::default();
        let pooling = StatsPooling::default();
        let input =
            Tensor::<TestBackend, 3>::random([3, 17, 5], Distribution::Normal(0.0, 2.0), &device);

        let output = pooling.forward(input.clone());

        let values = input.into_data().to_vec::<f32>().unwrap();
        let pooled = output.into_data().to_vec::<f32>().unwrap();
        for b in 0..3 {
            for c in 0..5 {
                let expected = (0..17)
                    .map(|t| values[b * 17 * 5 + t * 5 + c])
                    .sum::<f32>()
                    / 17.0;
                let actual = pooled[b * 10 + c];
                assert!((expected - actual).abs() < 1e-6, "{expected} != {actual}");
            }
        }
    }

    #[test]
    fn custom_floor_is_applied() {
        let device = Default::default();
        let pooling = StatsPoolingConfig::new().with_min_variance(4.0).init();
        let input = Tensor::<TestBackend, 3>::from_floats([[[0.0], [0.0]]], &device);

        let output = pooling.forward(input);

        output
            .into_data()
            .assert_approx_eq(&TensorData::from([[0.0, 2.0]]), Tolerance::<f32>::absolute(1e-6));
    }

    #[test]
    fn gradient_flows_only_through_unclipped_variance() {
        let device = Default::default();
        let pooling = StatsPooling::default();

        // Unclipped: mean 1, stddev 1, d(mean + stddev)/dx = [0.5 - 0.5, 0.5 + 0.5].
        let input = Tensor::<TestAutodiffBackend, 3>::from_floats([[[0.0], [2.0]]], &device)
            .require_grad();
        let grads = pooling.forward(input.clone()).sum().backward();
        input
            .grad(&grads)
            .unwrap()
            .into_data()
            .assert_approx_eq(&TensorData::from([[[0.0], [1.0]]]), Tolerance::<f32>::absolute(1e-5));

        // Clipped: constant input, only the mean contributes.
        let input = Tensor::<TestAutodiffBackend, 3>::from_floats([[[4.0], [4.0]]], &device)
            .require_grad();
        let grads = pooling.forward(input.clone()).sum().backward();
        input
            .grad(&grads)
            .unwrap()
            .into_data()
            .assert_approx_eq(&TensorData::from([[[0.5], [0.5]]]), Tolerance::<f32>::absolute(1e-5));
    }

    #[test]
    fn float_max_follows_dtype() {
        assert_eq!(float_max(DType::F64), f64::MAX);
        assert_eq!(float_max(DType::F32), f32::MAX as f64);
        assert_eq!(float_max(DType::Flex32), f32::MAX as f64);
        assert_eq!(float_max(DType::F16), 65504.0);
        assert_eq!(
            float_max(Tensor::<TestBackend, 1>::zeros([1], &Default::default()).dtype()),
            f32::MAX as f64
        );
    }

    #[test]
    fn has_no_parameters() {
        assert_eq!(Module::<TestBackend>::num_params(&StatsPooling::default()), 0);
    }

    #[test]
    fn display() {
        let layer = StatsPoolingConfig::new().with_min_variance(0.5).init();

        assert_eq!(format!("{}", layer), "StatsPooling {min_variance: 0.5}");
    }
}
