use std::collections::VecDeque;
use std::path::PathBuf;
use anyhow::{anyhow, bail, Context};
use log::debug;
use ndarray::{stack, Axis};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use crate::data::augment::random_flips;
use crate::data::normalization::{prepare_example, PrepareOptions, PreparedExample};
use crate::data::shard::read_shard;
use crate::utils::{Array1F, Array2F, Array4F, GenericResult};

pub const DEFAULT_SHUFFLE_BUFFER: usize = 1000;

/// Shards handed to each decoding thread at once
const SHARDS_PER_THREAD: usize = 4;
/// Examples replayed from the cache at once
const CACHE_CHUNK: usize = 256;

#[derive(Clone, Debug)]
pub struct BatcherOptions {
    pub prepare: PrepareOptions,
    pub batch_size: usize,
    /// Passes over the shards before the batcher is exhausted
    pub epochs: usize,
    pub shuffle: bool,
    pub augment: bool,
    /// Keep the decoded examples in memory after the first full pass
    pub cache: bool,
    pub num_threads: usize,
    pub shuffle_buffer: usize,
    pub seed: u64,
}

#[derive(Clone, Debug)]
pub struct Batch {
    /// (Batch, Channels, Height, Width)
    pub images: Array4F,
    pub years: Vec<i32>,
    pub labels: Array1F,
    /// (Batch, 2) with lat and lon
    pub locs: Array2F,
}

impl Batch {
    fn from_examples(examples: Vec<PreparedExample>) -> GenericResult<Self> {
        let views: Vec<_> = examples.iter().map(|o| o.image.view()).collect();
        let images = stack(Axis(0), &views).context("examples of a batch have different shapes")?;
        let years = examples.iter().map(|o| o.year).collect();
        let labels = examples.iter().map(|o| o.label).collect();
        let locs = Array2F::from_shape_vec(
            (examples.len(), 2),
            examples.iter().flat_map(|o| o.loc).collect(),
        )?;
        Ok(Self { images, years, labels, locs })
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

enum Source {
    Shards(VecDeque<PathBuf>),
    Cache(usize),
}

struct EpochState {
    source: Source,
    decoded: VecDeque<PreparedExample>,
    buffer: Vec<PreparedExample>,
}

/// Pull-based pipeline: shards -> decoded and prepared examples -> shuffle buffer -> augmentation
/// -> batches. Epochs are chained before batching, so a batch can span two epochs and only the very
/// last one can be short.
pub struct Batcher {
    files: Vec<PathBuf>,
    options: BatcherOptions,
    pool: ThreadPool,
    rng: StdRng,
    epoch: usize,
    state: Option<EpochState>,
    cache: Option<Vec<PreparedExample>>,
    cache_fill: Option<Vec<PreparedExample>>,
}

impl Batcher {
    pub fn new(files: Vec<PathBuf>, options: BatcherOptions) -> GenericResult<Self> {
        if options.batch_size == 0 {
            bail!("batch size must be positive");
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.num_threads.max(1))
            .thread_name(|index| format!("batcher-{}", index))
            .build()?;
        let rng = StdRng::seed_from_u64(options.seed);

        Ok(Self {
            files,
            options,
            pool,
            rng,
            epoch: 0,
            state: None,
            cache: None,
            cache_fill: None,
        })
    }

    pub fn options(&self) -> &BatcherOptions {
        &self.options
    }

    /// Rewind to the first epoch. Must be called before pulling batches.
    pub fn init(&mut self) {
        self.epoch = 0;
        self.cache_fill = if self.options.cache && self.cache.is_none() { Some(Vec::new()) } else { None };
        self.state = Some(self.start_epoch());
    }

    /// Returns None once every epoch was consumed
    pub fn next_batch(&mut self) -> GenericResult<Option<Batch>> {
        let mut examples = Vec::with_capacity(self.options.batch_size);
        while examples.len() < self.options.batch_size {
            match self.next_example()? {
                Some(v) => examples.push(v),
                None => break,
            }
        }

        if examples.is_empty() {
            return Ok(None);
        }
        Batch::from_examples(examples).map(Some)
    }

    fn start_epoch(&mut self) -> EpochState {
        let source = if self.cache.is_some() {
            Source::Cache(0)
        } else {
            let mut files = self.files.clone();
            if self.options.shuffle {
                files.shuffle(&mut self.rng);
            }
            Source::Shards(files.into())
        };

        EpochState { source, decoded: VecDeque::new(), buffer: Vec::new() }
    }

    fn next_example(&mut self) -> GenericResult<Option<PreparedExample>> {
        let mut state = self.state.take().ok_or_else(|| anyhow!("batcher used before init"))?;
        let result = self.next_example_from(&mut state);
        self.state = Some(state);
        result
    }

    fn next_example_from(&mut self, state: &mut EpochState) -> GenericResult<Option<PreparedExample>> {
        let buffer_size = if self.options.shuffle { self.options.shuffle_buffer.max(1) } else { 1 };

        loop {
            if self.epoch >= self.options.epochs {
                return Ok(None);
            }

            while state.buffer.len() < buffer_size {
                if let Some(example) = state.decoded.pop_front() {
                    state.buffer.push(example);
                } else if !self.decode_more(state)? {
                    break;
                }
            }

            if state.buffer.is_empty() {
                self.epoch += 1;
                if self.epoch < self.options.epochs {
                    *state = self.start_epoch();
                }
                continue;
            }

            let mut example = if self.options.shuffle {
                let index = self.rng.gen_range(0..state.buffer.len());
                state.buffer.swap_remove(index)
            } else {
                state.buffer.remove(0)
            };

            if self.options.augment {
                example.image = random_flips(example.image, &mut self.rng);
            }
            return Ok(Some(example));
        }
    }

    /// Moves the next chunk of examples into `state.decoded`. False when the epoch has no more.
    fn decode_more(&mut self, state: &mut EpochState) -> GenericResult<bool> {
        match &mut state.source {
            Source::Cache(next) => {
                let cache = self.cache.as_ref().ok_or_else(|| anyhow!("cache replay without a cache"))?;
                if *next >= cache.len() {
                    return Ok(false);
                }
                let end = (*next + CACHE_CHUNK).min(cache.len());
                state.decoded.extend(cache[*next..end].iter().cloned());
                *next = end;
                Ok(true)
            }
            Source::Shards(queue) => {
                if queue.is_empty() {
                    return Ok(false);
                }
                let count = (self.options.num_threads.max(1) * SHARDS_PER_THREAD).min(queue.len());
                let chunk: Vec<PathBuf> = queue.drain(..count).collect();

                let prepare = &self.options.prepare;
                let decoded: Vec<GenericResult<Vec<PreparedExample>>> = self.pool.install(|| {
                    chunk.par_iter()
                        .map(|path| {
                            let examples = read_shard(path)?;
                            examples.into_iter()
                                .map(|o| prepare_example(o, prepare))
                                .collect::<GenericResult<Vec<_>>>()
                                .with_context(|| format!("can't prepare examples of {}", path.display()))
                        })
                        .collect()
                });

                for examples in decoded {
                    let examples = examples?;
                    if let Some(fill) = self.cache_fill.as_mut() {
                        fill.extend(examples.iter().cloned());
                    }
                    state.decoded.extend(examples);
                }

                if queue.is_empty() {
                    if let Some(fill) = self.cache_fill.take() {
                        debug!("cached {} examples from {} shards", fill.len(), self.files.len());
                        self.cache = Some(fill);
                    }
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use crate::data::bands::LsBands;
    use crate::data::normalization::tests::{example, options};
    use crate::data::shard::{write_shard, Example};
    use super::*;

    /// Shard i holds `per_shard` examples with years 2000 + 10 * i + j
    fn write_shards(dir: &Path, shards: usize, per_shard: usize) -> Vec<PathBuf> {
        (0..shards).map(|i| {
            let path = dir.join(format!("{:02}.nlrec.gz", i));
            let examples: Vec<Example> = (0..per_shard)
                .map(|j| example(2000 + (10 * i + j) as i32))
                .collect();
            write_shard(&path, &examples).unwrap();
            path
        }).collect()
    }

    fn batcher_options(batch_size: usize, epochs: usize, shuffle: bool, cache: bool) -> BatcherOptions {
        BatcherOptions {
            prepare: options(Some(LsBands::Rgb), None),
            batch_size,
            epochs,
            shuffle,
            augment: shuffle,
            cache,
            num_threads: 2,
            shuffle_buffer: DEFAULT_SHUFFLE_BUFFER,
            seed: 123,
        }
    }

    fn drain(batcher: &mut Batcher) -> Vec<Batch> {
        let mut result = Vec::new();
        while let Some(batch) = batcher.next_batch().unwrap() {
            result.push(batch);
        }
        result
    }

    #[test]
    fn test_batch_count_spans_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_shards(dir.path(), 3, 3);
        let mut batcher = Batcher::new(files, batcher_options(4, 2, true, false)).unwrap();
        batcher.init();

        let batches = drain(&mut batcher);
        // 18 examples in batches of 4
        assert_eq!(batches.len(), 5);
        assert!(batches[..4].iter().all(|o| o.len() == 4));
        assert_eq!(batches[4].len(), 2);
        assert_eq!(batches[0].images.shape(), &[4, 3, 3, 3]);
        assert_eq!(batches[0].locs.shape(), &[4, 2]);
        assert!(batcher.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_no_shuffle_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_shards(dir.path(), 2, 2);
        let mut batcher = Batcher::new(files, batcher_options(3, 1, false, false)).unwrap();
        batcher.init();

        let years: Vec<i32> = drain(&mut batcher).into_iter().flat_map(|o| o.years).collect();
        assert_eq!(years, vec![2000, 2001, 2010, 2011]);
    }

    #[test]
    fn test_shuffle_visits_everything() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_shards(dir.path(), 4, 3);
        let mut batcher = Batcher::new(files, batcher_options(5, 1, true, false)).unwrap();
        batcher.init();

        let mut years: Vec<i32> = drain(&mut batcher).into_iter().flat_map(|o| o.years).collect();
        years.sort();
        let expected: Vec<i32> = (0..4).flat_map(|i| (0..3).map(move |j| 2000 + 10 * i + j)).collect();
        assert_eq!(years, expected);
    }

    #[test]
    fn test_cache_replays_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_shards(dir.path(), 2, 2);
        let mut batcher = Batcher::new(files.clone(), batcher_options(4, 1, false, true)).unwrap();

        batcher.init();
        let first = drain(&mut batcher);
        for file in files {
            std::fs::remove_file(file).unwrap();
        }

        batcher.init();
        let second = drain(&mut batcher);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].years, second[0].years);
        assert_eq!(first[0].images, second[0].images);
    }

    #[test]
    fn test_pull_before_init_is_error() {
        let mut batcher = Batcher::new(vec![], batcher_options(4, 1, false, false)).unwrap();
        assert!(batcher.next_batch().is_err());
    }

    #[test]
    fn test_broken_shard_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.nlrec.gz");
        std::fs::write(&path, b"not a shard").unwrap();
        let mut batcher = Batcher::new(vec![path], batcher_options(4, 1, false, false)).unwrap();
        batcher.init();
        assert!(batcher.next_batch().is_err());
    }
}
