//! Parallelism configuration for batch entry points.
//!
//! Inference components never manage thread pools themselves; they receive a
//! [`Parallelism`] flag and respect it. The pool is set up once at the API
//! boundary via [`run_with_threads`].

use rayon::prelude::*;

/// Whether parallel execution is allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if the rayon pool has multiple threads)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Map over an iterator, in parallel when allowed.
    #[inline]
    pub fn maybe_par_map<T, B, I, F>(self, iter: I, f: F) -> Vec<B>
    where
        T: Send,
        B: Send,
        I: IntoIterator<Item = T> + IntoParallelIterator<Item = T>,
        F: Fn(T) -> B + Sync + Send,
    {
        if self.is_parallel() {
            iter.into_par_iter().map(f).collect()
        } else {
            iter.into_iter().map(f).collect()
        }
    }
}

/// Run a closure with the appropriate thread pool.
///
/// Thread count semantics:
/// - `0` = auto (use all available cores)
/// - `1` = sequential (no thread pool)
/// - `n > 1` = use exactly `n` threads
#[inline]
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce(Parallelism) -> T + Send) -> T {
    let parallelism = Parallelism::from_threads(n_threads);

    match parallelism {
        Parallelism::Sequential => f(Parallelism::Sequential),
        Parallelism::Parallel => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()
                .expect("Failed to create thread pool");
            pool.install(|| f(Parallelism::Parallel))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_threads_semantics() {
        assert_eq!(Parallelism::from_threads(1), Parallelism::Sequential);
        assert_eq!(Parallelism::from_threads(2), Parallelism::Parallel);
        assert_eq!(Parallelism::from_threads(8), Parallelism::Parallel);
    }

    #[test]
    fn maybe_par_map_preserves_order() {
        let input: Vec<usize> = (0..100).collect();
        let seq = Parallelism::Sequential.maybe_par_map(input.clone(), |x| x * 2);
        let par = Parallelism::Parallel.maybe_par_map(input, |x| x * 2);
        assert_eq!(seq, par);
        assert_eq!(seq[3], 6);
    }

    #[test]
    fn run_with_threads_returns_closure_result() {
        let sum = run_with_threads(2, |p| {
            assert!(p.is_parallel());
            (0..10).sum::<i32>()
        });
        assert_eq!(sum, 45);
    }
}
