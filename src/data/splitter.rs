// ============================================================
// Layer 4 - Train/Validation Splitter
// ============================================================
// Used only when the data root has no validation/ directory:
// a seeded shuffle of the training samples, then the tail is
// held out for validation.
//
// The shuffle is seeded so the same --seed always holds out the
// same images, which keeps validation numbers comparable across
// runs.
//
// Reference: rand crate documentation (SeedableRng, SliceRandom)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// `train_fraction` is clamped to [0, 1].
pub fn split_train_val<T>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    seed:           u64,
) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = ((total as f64) * fraction).round() as usize;
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Held out {} of {} samples for validation (seed {})",
        val.len(),
        total,
        seed
    );

    (samples, val)
}
