//! A table of 16 bottom-k MinHash sub-sketches used for locality-sensitive
//! similarity estimation during hierarchical layout rearrangement.

/// Low bits of a hash used to route it to one of [`NUM_SKETCHES`] sub-sketches.
const REGISTER_ID_MASK: u64 = 15;
/// Number of independent sub-sketches in a table.
pub const NUM_SKETCHES: usize = 16;
/// Bottom-k capacity of each sub-sketch.
pub const SKETCH_SIZE: usize = 40;

/// A table of `NUM_SKETCHES` bottom-`SKETCH_SIZE` sub-sketches, built from
/// the globally smallest hashes of a user bin's k-mer set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MinHashes {
    table: Vec<Vec<u64>>,
}

impl MinHashes {
    /// Builds a table from `smallest_values`, which must already be sorted
    /// ascending (the globally smallest hashes of the set this sketches).
    /// Each hash is routed to sub-sketch `hash & 15`; a sub-sketch stops
    /// accepting once it holds `SKETCH_SIZE` values.
    #[must_use]
    pub fn from_sorted_hashes(smallest_values: &[u64]) -> Self {
        debug_assert!(
            smallest_values.windows(2).all(|w| w[0] <= w[1]),
            "smallest_values must be sorted ascending"
        );

        let mut table = vec![Vec::with_capacity(SKETCH_SIZE); NUM_SKETCHES];
        for &hash in smallest_values {
            let bucket = &mut table[(hash & REGISTER_ID_MASK) as usize];
            if bucket.len() < SKETCH_SIZE {
                bucket.push(hash >> 4);
            }
        }
        Self { table }
    }

    /// The 16 sub-sketches, in bucket order.
    #[must_use]
    pub fn table(&self) -> &[Vec<u64>] {
        &self.table
    }

    /// True once every sub-sketch holds exactly `SKETCH_SIZE` values.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.table.len() == NUM_SKETCHES && self.table.iter().all(|s| s.len() == SKETCH_SIZE)
    }

    /// Extends sub-sketches that are still below capacity with more
    /// globally-smallest hashes, which must also be sorted ascending and
    /// disjoint from the values already present.
    pub fn fill_incomplete_sketches(&mut self, more_sorted_values: &[u64]) {
        debug_assert!(
            more_sorted_values.windows(2).all(|w| w[0] <= w[1]),
            "more_sorted_values must be sorted ascending"
        );

        for &hash in more_sorted_values {
            let bucket = &mut self.table[(hash & REGISTER_ID_MASK) as usize];
            if bucket.len() < SKETCH_SIZE {
                bucket.push(hash >> 4);
            }
        }
    }

    /// Pushes `value` into `heap`, a max-heap over a fixed-capacity array,
    /// only if it is smaller than the current largest element — the
    /// standard "maintain the k smallest seen so far" primitive used while
    /// streaming a user bin's k-mers.
    pub fn push_to_heap_if_smaller(value: u64, heap: &mut [u64]) {
        if heap.is_empty() || value >= heap[0] {
            return;
        }
        heap[0] = value;
        sift_down(heap, 0);
    }
}

fn sift_down(heap: &mut [u64], mut index: usize) {
    let len = heap.len();
    loop {
        let left = 2 * index + 1;
        let right = 2 * index + 2;
        let mut largest = index;
        if left < len && heap[left] > heap[largest] {
            largest = left;
        }
        if right < len && heap[right] > heap[largest] {
            largest = right;
        }
        if largest == index {
            break;
        }
        heap.swap(index, largest);
        index = largest;
    }
}
