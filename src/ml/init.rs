use burn::nn::Initializer;

/// Kaiming-normal with fan-in scaling and ReLU gain (√2).
/// Applied to every Linear and Conv2d in the crate. burn draws the
/// bias from the same initializer, so biases are Kaiming-normal too.
pub fn kaiming_normal() -> Initializer {
    Initializer::KaimingNormal {
        gain:         2.0_f64.sqrt(),
        fan_out_only: false,
    }
}
