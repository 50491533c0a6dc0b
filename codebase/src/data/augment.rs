use ndarray::Axis;
use rand::Rng;
use crate::utils::Array3F;

/// Flip the image left-right and up-down, each with probability 0.5
pub fn random_flips(mut image: Array3F, rng: &mut impl Rng) -> Array3F {
    if rng.gen_bool(0.5) {
        image.invert_axis(Axis(2));
    }
    if rng.gen_bool(0.5) {
        image.invert_axis(Axis(1));
    }
    image
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use super::*;

    #[test]
    fn test_flips_preserve_pixels() {
        let image = Array3F::from_shape_fn((2, 3, 4), |(c, h, w)| (c * 100 + h * 10 + w) as f32);
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen_changed = false;

        for _ in 0..20 {
            let flipped = random_flips(image.clone(), &mut rng);
            assert_eq!(flipped.shape(), image.shape());
            assert_eq!(flipped.sum(), image.sum());
            // Corners stay corners
            let corner = flipped[(1, 0, 0)];
            assert!([100.0, 103.0, 120.0, 123.0].contains(&corner));
            seen_changed |= flipped != image;
        }
        assert!(seen_changed);
    }
}
