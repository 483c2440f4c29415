use crate::error::LookaheadError;
use rand::Rng;

/// Regions smaller than this are never split further.
pub const MIN_SPLIT: usize = 20;

/// Position-stratified partition of a set of sample coordinates.
///
/// `indices` is a permutation of the input positions; `splits` holds
/// strictly increasing boundaries into it, so region `i` is
/// `indices[splits[i]..splits[i + 1]]`.
#[derive(Clone, Debug, Default)]
pub struct Sampler {
    indices: Vec<usize>,
    splits: Vec<usize>,
}

fn median_unique(mut values: Vec<i32>) -> i32 {
    values.sort_unstable();
    values.dedup();
    values[(values.len() - 1) / 2]
}

/// Reorders `slice` so that every entry satisfying `pred` comes first,
/// keeping relative order, and returns the length of that prefix.
fn stable_partition(slice: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let (left, right): (Vec<usize>, Vec<usize>) = slice.iter().partition(|&&i| pred(i));
    let split = left.len();
    for (dst, src) in slice.iter_mut().zip(left.into_iter().chain(right)) {
        *dst = src;
    }
    split
}

fn partition_x(slice: &mut [usize], samples: &[(i32, i32)]) -> usize {
    if slice.is_empty() {
        return 0;
    }
    let x_div = median_unique(slice.iter().map(|&i| samples[i].0).collect());
    stable_partition(slice, |i| samples[i].0 <= x_div)
}

fn partition_y(slice: &mut [usize], samples: &[(i32, i32)]) -> usize {
    if slice.is_empty() {
        return 0;
    }
    let y_div = median_unique(slice.iter().map(|&i| samples[i].1).collect());
    stable_partition(slice, |i| samples[i].1 <= y_div)
}

fn add_split(splits: &mut Vec<usize>, split: usize) {
    let last = splits.last().copied().unwrap_or(0);
    assert!(split >= last, "split {} precedes {}", split, last);
    if split > last || splits.is_empty() {
        splits.push(split);
    }
}

impl Sampler {
    /// Partitions `samples` by alternating x/y medians. The number of passes
    /// is `ceil(sqrt(target_sample_count) / 2)`; each pass turns every region
    /// of at least `MIN_SPLIT` entries into up to four.
    pub fn divide_samples(target_sample_count: usize, samples: &[(i32, i32)]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self::default();
        }

        let mut sampler = Self {
            indices: (0..n).collect(),
            splits: vec![0, n],
        };

        let divisions = ((target_sample_count.max(1) as f64).sqrt() / 2.0).ceil() as usize;
        if divisions > n {
            return sampler;
        }

        let mut new_splits = Vec::with_capacity(sampler.splits.len() * 4);
        for _ in 0..divisions {
            new_splits.clear();
            new_splits.push(0);
            for w in 0..sampler.splits.len() - 1 {
                let begin = sampler.splits[w];
                let end = sampler.splits[w + 1];
                debug_assert!(begin < end && end <= n);

                if end - begin < MIN_SPLIT {
                    add_split(&mut new_splits, begin);
                    continue;
                }

                let region = &mut sampler.indices[begin..end];
                let split = partition_x(region, samples);
                let (left, right) = region.split_at_mut(split);
                let split_y1 = partition_y(left, samples);
                let split_y2 = split + partition_y(right, samples);

                add_split(&mut new_splits, begin);
                add_split(&mut new_splits, begin + split_y1);
                add_split(&mut new_splits, begin + split);
                add_split(&mut new_splits, begin + split_y2);
            }
            add_split(&mut new_splits, n);
            std::mem::swap(&mut sampler.splits, &mut new_splits);
        }

        sampler
    }

    pub fn number_of_regions(&self) -> usize {
        self.splits.len().saturating_sub(1)
    }

    pub fn region(&self, region: usize) -> &[usize] {
        &self.indices[self.splits[region]..self.splits[region + 1]]
    }

    /// Draws one entry of `region` uniformly at random.
    pub fn get_sample_from_region<R: Rng>(
        &self,
        region: usize,
        rng: &mut R,
    ) -> Result<usize, LookaheadError> {
        if region >= self.number_of_regions() {
            return Err(LookaheadError::RegionOutOfRange {
                region,
                count: self.number_of_regions(),
            });
        }
        let begin = self.splits[region];
        let end = self.splits[region + 1];
        Ok(self.indices[rng.gen_range(begin..end)])
    }

    /// Replaces every position index `i` with `ids[i]`.
    pub fn remap(&mut self, ids: &[usize]) {
        for index in &mut self.indices {
            *index = ids[*index];
        }
    }
}
