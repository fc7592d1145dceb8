use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot claim flag.
///
/// Exactly one caller of [`Claim::try_claim`] ever observes `true`.
#[derive(Debug, Default)]
pub struct Claim {
    taken: AtomicBool,
}

impl Claim {
    /// Creates an unclaimed flag.
    pub const fn new() -> Self {
        Self {
            taken: AtomicBool::new(false),
        }
    }

    /// Attempts to take the claim; returns `true` for the single winner.
    #[inline]
    pub fn try_claim(&self) -> bool {
        self.taken
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the claim has been taken.
    #[inline]
    pub fn is_claimed(&self) -> bool {
        self.taken.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn only_one_thread_wins() {
        let claim = Arc::new(Claim::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let threads: Vec<_> = (0..16)
            .map(|_| {
                let claim = Arc::clone(&claim);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if claim.try_claim() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(claim.is_claimed());
    }
}
