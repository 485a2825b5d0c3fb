//! Cross-process reduction abstraction.
//!
//! Distributed runs accumulate tallies independently on every cooperating
//! process and combine them once per batch through a [`Communicator`]. The
//! reductions are collective, blocking operations: every rank must call
//! them, in the same order, with buffers of the same length. After a
//! reduction only the root rank holds the aggregate; every other rank's
//! buffer is reset to zero by design.
//!
//! The wire transport is an external concern. [`SerialCommunicator`] covers
//! single-process runs and [`SharedMemoryCommunicator`] emulates a group of
//! cooperating ranks in-process, which is how the reduction semantics are
//! exercised in tests.

use crate::error::CommunicatorError;
use std::sync::{Arc, Barrier, Mutex};

/// A group of cooperating processes that can sum tallies onto a root rank.
pub trait Communicator: Send + Sync {
    /// This process's rank within the group.
    fn rank(&self) -> usize;

    /// Number of cooperating processes.
    fn size(&self) -> usize;

    /// Blocks until every rank has reached the barrier.
    fn barrier(&self);

    /// Element-wise sums `data` across all ranks into the root's buffer.
    ///
    /// Non-root buffers are zeroed. Collective: every rank must call with a
    /// buffer of the same length.
    fn reduce_sum_f64(&self, data: &mut [f64], root: usize) -> Result<(), CommunicatorError>;

    /// Element-wise sums `data` across all ranks into the root's buffer.
    ///
    /// Non-root buffers are zeroed. Collective: every rank must call with a
    /// buffer of the same length.
    fn reduce_sum_u64(&self, data: &mut [u64], root: usize) -> Result<(), CommunicatorError>;
}

/// The single-process communicator.
///
/// Rank 0 of a group of one; every reduction is the identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    #[inline]
    fn rank(&self) -> usize {
        0
    }

    #[inline]
    fn size(&self) -> usize {
        1
    }

    #[inline]
    fn barrier(&self) {}

    fn reduce_sum_f64(&self, data: &mut [f64], root: usize) -> Result<(), CommunicatorError> {
        let _ = data;
        if root != 0 {
            return Err(CommunicatorError::InvalidRoot { root, size: 1 });
        }
        Ok(())
    }

    fn reduce_sum_u64(&self, data: &mut [u64], root: usize) -> Result<(), CommunicatorError> {
        let _ = data;
        if root != 0 {
            return Err(CommunicatorError::InvalidRoot { root, size: 1 });
        }
        Ok(())
    }
}

/// Shared state for one in-process communicator group.
#[derive(Debug, Default)]
struct CollectiveState {
    acc_f64: Vec<f64>,
    acc_u64: Vec<u64>,
    initialized: bool,
    participants: usize,
    poison: Option<(usize, usize)>,
}

#[derive(Debug)]
struct SharedGroup {
    size: usize,
    barrier: Barrier,
    state: Mutex<CollectiveState>,
}

/// An in-process communicator over a group of threads.
///
/// [`SharedMemoryCommunicator::split`] produces one handle per rank; each
/// handle is moved onto its own thread. Reductions are implemented with a
/// shared accumulation buffer and a reusable barrier, giving the same
/// collective semantics as a message-passing transport without one.
#[derive(Clone, Debug)]
pub struct SharedMemoryCommunicator {
    rank: usize,
    group: Arc<SharedGroup>,
}

impl SharedMemoryCommunicator {
    /// Creates a group of `size` cooperating ranks.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn split(size: usize) -> Vec<SharedMemoryCommunicator> {
        assert!(size > 0, "communicator group must have at least one rank");

        let group = Arc::new(SharedGroup {
            size,
            barrier: Barrier::new(size),
            state: Mutex::new(CollectiveState::default()),
        });

        (0..size)
            .map(|rank| SharedMemoryCommunicator {
                rank,
                group: Arc::clone(&group),
            })
            .collect()
    }
}

macro_rules! shared_reduce_impl {
    ($self:ident, $data:ident, $root:ident, $acc:ident, $zero:expr) => {{
        if $root >= $self.group.size {
            return Err(CommunicatorError::InvalidRoot {
                root: $root,
                size: $self.group.size,
            });
        }

        // Line every rank up before touching the shared accumulator so a
        // fast rank cannot race into the next collective.
        $self.group.barrier.wait();

        {
            let mut state = $self.group.state.lock().unwrap();
            if !state.initialized {
                state.$acc = vec![$zero; $data.len()];
                state.initialized = true;
            }

            if state.$acc.len() != $data.len() {
                state.poison = Some(($data.len(), state.$acc.len()));
            } else {
                for (sum, value) in state.$acc.iter_mut().zip($data.iter()) {
                    *sum += *value;
                }
            }
            state.participants += 1;
        }

        // All contributions are in.
        $self.group.barrier.wait();

        let poison = {
            let mut state = $self.group.state.lock().unwrap();
            let poison = state.poison;

            if poison.is_none() {
                if $self.rank == $root {
                    $data.copy_from_slice(&state.$acc);
                } else {
                    for value in $data.iter_mut() {
                        *value = $zero;
                    }
                }
            }

            state.participants -= 1;
            if state.participants == 0 {
                state.$acc.clear();
                state.initialized = false;
                state.poison = None;
            }
            poison
        };

        $self.group.barrier.wait();

        match poison {
            None => Ok(()),
            Some((local, expected)) => Err(CommunicatorError::LengthMismatch { local, expected }),
        }
    }};
}

impl Communicator for SharedMemoryCommunicator {
    #[inline]
    fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    fn size(&self) -> usize {
        self.group.size
    }

    fn barrier(&self) {
        self.group.barrier.wait();
    }

    fn reduce_sum_f64(&self, data: &mut [f64], root: usize) -> Result<(), CommunicatorError> {
        shared_reduce_impl!(self, data, root, acc_f64, 0.0_f64)
    }

    fn reduce_sum_u64(&self, data: &mut [u64], root: usize) -> Result<(), CommunicatorError> {
        shared_reduce_impl!(self, data, root, acc_u64, 0_u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_serial_reduce_is_identity() {
        let comm = SerialCommunicator;
        let mut data = vec![1.0, 2.0, 3.0];

        comm.reduce_sum_f64(&mut data, 0).unwrap();

        assert_eq!(data, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_serial_rejects_nonzero_root() {
        let comm = SerialCommunicator;
        let mut data = vec![0_u64];

        let err = comm.reduce_sum_u64(&mut data, 1).unwrap_err();
        assert_eq!(err, CommunicatorError::InvalidRoot { root: 1, size: 1 });
    }

    #[test]
    fn test_shared_reduce_sums_onto_root_and_resets_others() {
        let comms = SharedMemoryCommunicator::split(4);

        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let rank = comm.rank();
                    let mut data = vec![1.0, 2.0, rank as f64];
                    comm.reduce_sum_f64(&mut data, 0).unwrap();
                    (rank, data)
                })
            })
            .collect();

        for handle in handles {
            let (rank, data) = handle.join().unwrap();
            if rank == 0 {
                // 0+1+2+3 = 6 in the rank-dependent slot.
                assert_eq!(data, vec![4.0, 8.0, 6.0]);
            } else {
                assert_eq!(data, vec![0.0, 0.0, 0.0]);
            }
        }
    }

    #[test]
    fn test_shared_reduce_repeated_collectives() {
        let comms = SharedMemoryCommunicator::split(2);

        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let mut a = vec![1_u64; 4];
                    comm.reduce_sum_u64(&mut a, 0).unwrap();

                    let mut b = vec![2.0_f64; 2];
                    comm.reduce_sum_f64(&mut b, 1).unwrap();

                    (comm.rank(), a, b)
                })
            })
            .collect();

        for handle in handles {
            let (rank, a, b) = handle.join().unwrap();
            match rank {
                0 => {
                    assert_eq!(a, vec![2, 2, 2, 2]);
                    assert_eq!(b, vec![0.0, 0.0]);
                }
                _ => {
                    assert_eq!(a, vec![0, 0, 0, 0]);
                    assert_eq!(b, vec![4.0, 4.0]);
                }
            }
        }
    }
}
