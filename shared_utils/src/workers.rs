//! Worker-count heuristic for the frame pipeline.
//!
//! Each worker feeds one external upscaler process at a time. The point is to
//! keep a GPU-bound tool continuously busy without oversubscribing it, so the
//! count shrinks when accelerators are present: the GPU is the bottleneck and
//! more processes just contend for it.

/// Pick the worker pool size from core and accelerator counts.
///
/// - no accelerator: 75% of cores (CPU-bound upscaling scales wide)
/// - one accelerator: min(cores / 2, 4)
/// - multiple accelerators: min(accelerators, cores)
/// - floor of 2 whenever an accelerator exists, ceiling of 8 always,
///   and never more workers than cores
pub fn worker_count(cores: usize, accelerators: usize) -> usize {
    let cores = cores.max(1);

    let base = match accelerators {
        0 => cores * 3 / 4,
        1 => (cores / 2).min(4),
        n => n.min(cores),
    };

    let base = if accelerators > 0 { base.max(2) } else { base };

    base.clamp(1, 8).min(cores)
}

/// Default worker count for the current machine.
pub fn default_worker_count(accelerators: usize) -> usize {
    worker_count(num_cpus::get(), accelerators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_accelerators_eight_cores() {
        assert_eq!(worker_count(8, 2), 2);
    }

    #[test]
    fn test_no_accelerator_uses_three_quarters() {
        assert_eq!(worker_count(8, 0), 6);
        assert_eq!(worker_count(4, 0), 3);
        assert_eq!(worker_count(16, 0), 8); // global ceiling
    }

    #[test]
    fn test_single_accelerator_capped_at_four() {
        assert_eq!(worker_count(16, 1), 4);
        assert_eq!(worker_count(8, 1), 4);
        assert_eq!(worker_count(4, 1), 2);
    }

    #[test]
    fn test_accelerator_floor_of_two() {
        assert_eq!(worker_count(2, 1), 2);
        assert_eq!(worker_count(3, 1), 2);
    }

    #[test]
    fn test_never_exceeds_core_count() {
        assert_eq!(worker_count(1, 1), 1);
        assert_eq!(worker_count(1, 0), 1);
        assert_eq!(worker_count(2, 6), 2);
    }

    #[test]
    fn test_many_accelerators() {
        assert_eq!(worker_count(16, 6), 6);
        assert_eq!(worker_count(32, 12), 8); // global ceiling
    }

    proptest! {
        /// For all inputs the result stays within 1..=8 and never exceeds
        /// the core count.
        #[test]
        fn prop_worker_count_bounds(cores in 1usize..256, accels in 0usize..32) {
            let n = worker_count(cores, accels);
            prop_assert!(n >= 1);
            prop_assert!(n <= 8);
            prop_assert!(n <= cores);
        }

        /// An accelerator never drops the pool below 2 unless the machine
        /// itself has fewer cores.
        #[test]
        fn prop_accelerator_floor(cores in 2usize..256, accels in 1usize..32) {
            prop_assert!(worker_count(cores, accels) >= 2);
        }
    }
}
