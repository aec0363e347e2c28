//! Dataset partitioning and batch loading.

use crate::{common::*, config::DatasetConfig};

/// One collated batch of samples.
#[derive(Debug)]
pub struct Batch {
    pub images: Tensor,
    pub labels: Tensor,
}

impl Batch {
    pub fn batch_size(&self) -> i64 {
        self.labels.size()[0]
    }

    pub fn to_device(&self, device: Device) -> Self {
        Self {
            images: self.images.to_device(device),
            labels: self.labels.to_device(device),
        }
    }
}

/// Batch iterator options.
#[derive(Debug, Clone)]
pub struct DataLoaderInit {
    pub batch_size: usize,
    pub shuffle: bool,
    pub drop_last: bool,
    pub num_workers: usize,
}

impl DataLoaderInit {
    pub fn build(self, dataset: Arc<dyn RandomAccessDataset>) -> DataLoader {
        let Self {
            batch_size,
            shuffle,
            drop_last,
            num_workers,
        } = self;

        DataLoader {
            dataset,
            batch_size,
            shuffle,
            drop_last,
            num_workers: num_workers.max(1),
        }
    }
}

/// Batch iterator factory over one dataset partition. Each epoch a
/// fixed pool of worker threads prefetches and collates batches; batch
/// order follows the (possibly shuffled) index order.
#[derive(Debug)]
pub struct DataLoader {
    dataset: Arc<dyn RandomAccessDataset>,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    num_workers: usize,
}

impl DataLoader {
    /// Start one pass over the partition.
    pub fn batches(&self) -> BatchIter {
        let mut indices: Vec<usize> = (0..self.dataset.num_records()).collect();
        if self.shuffle {
            indices.shuffle(&mut rand::thread_rng());
        }

        let chunks: Vec<Vec<usize>> = indices
            .chunks(self.batch_size)
            .filter(|chunk| !self.drop_last || chunk.len() == self.batch_size)
            .map(<[usize]>::to_vec)
            .collect();
        let num_batches = chunks.len();

        let (chunk_tx, chunk_rx) = flume::unbounded();
        let (batch_tx, batch_rx) = flume::bounded(self.num_workers * 2);

        for task in chunks.into_iter().enumerate() {
            let _ = chunk_tx.send(task);
        }
        drop(chunk_tx);

        for _ in 0..self.num_workers {
            let chunk_rx = chunk_rx.clone();
            let batch_tx = batch_tx.clone();
            let dataset = self.dataset.clone();

            thread::spawn(move || {
                while let Ok((seq, chunk)) = chunk_rx.recv() {
                    let batch = collate(&*dataset, &chunk);
                    if batch_tx.send((seq, batch)).is_err() {
                        break;
                    }
                }
            });
        }

        BatchIter {
            rx: batch_rx,
            pending: BTreeMap::new(),
            next_seq: 0,
            num_batches,
        }
    }
}

fn collate(dataset: &dyn RandomAccessDataset, indices: &[usize]) -> Result<Batch> {
    let samples: Vec<(Tensor, i64)> = indices
        .iter()
        .map(|&index| dataset.nth(index))
        .try_collect()?;
    let (images, labels): (Vec<_>, Vec<_>) = samples.into_iter().unzip();

    Ok(Batch {
        images: Tensor::stack(&images, 0),
        labels: Tensor::of_slice(&labels),
    })
}

/// Ordered stream of prefetched batches for one epoch.
#[derive(Debug)]
pub struct BatchIter {
    rx: flume::Receiver<(usize, Result<Batch>)>,
    // reorder buffer; the bounded channel caps how far workers run
    // ahead of the training loop
    pending: BTreeMap<usize, Result<Batch>>,
    next_seq: usize,
    num_batches: usize,
}

impl Iterator for BatchIter {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_seq == self.num_batches {
            return None;
        }

        loop {
            if let Some(batch) = self.pending.remove(&self.next_seq) {
                self.next_seq += 1;
                return Some(batch);
            }

            match self.rx.recv() {
                Ok((seq, batch)) => {
                    self.pending.insert(seq, batch);
                }
                Err(_) => {
                    self.next_seq = self.num_batches;
                    return Some(Err(format_err!(
                        "batch loading workers terminated unexpectedly"
                    )));
                }
            }
        }
    }
}

/// Owns the partitioned dataset views and their loader factories.
#[derive(Debug)]
pub struct DataModule {
    config: DatasetConfig,
    batch_size: usize,
    train_transform: Option<Transform>,
    test_transform: Option<Transform>,
    train: Option<Arc<Subset>>,
    valid: Option<Arc<Subset>>,
    test: Option<Arc<GtsrbDataset>>,
}

impl DataModule {
    pub fn new(config: DatasetConfig, batch_size: usize) -> Self {
        Self {
            config,
            batch_size,
            train_transform: None,
            test_transform: None,
            train: None,
            valid: None,
            test: None,
        }
    }

    /// Build the transform pipelines. The train partition currently
    /// uses the same pipeline as test; no train-specific augmentation
    /// is configured.
    pub fn prepare(&mut self) {
        let image_size = self.config.image_size.get() as u32;
        let transform = TransformInit {
            resize: (image_size, image_size),
            ..Default::default()
        }
        .build();

        self.train_transform = Some(transform.clone());
        self.test_transform = Some(transform);
    }

    /// Construct the datasets and perform the fixed-size random split
    /// into train/validation partitions.
    pub fn setup(&mut self, rng: &mut impl Rng) -> Result<()> {
        let DatasetConfig {
            ref dataset_dir,
            ref train_index,
            ref test_index,
            train_split,
            valid_split,
            ..
        } = self.config;

        let train_full: Arc<dyn RandomAccessDataset> = Arc::new(GtsrbDataset::load(
            dataset_dir,
            dataset_dir.join(train_index),
            self.train_transform.clone(),
        )?);
        let test = GtsrbDataset::load(
            dataset_dir,
            dataset_dir.join(test_index),
            self.test_transform.clone(),
        )?;

        let splits = random_split(train_full, &[train_split, valid_split], rng)?;
        let [train, valid]: [Subset; 2] = splits
            .try_into()
            .map_err(|_| format_err!("expect exactly two partitions"))?;

        self.train = Some(Arc::new(train));
        self.valid = Some(Arc::new(valid));
        self.test = Some(Arc::new(test));

        Ok(())
    }

    /// Shuffles every epoch and drops an incomplete final batch.
    pub fn train_loader(&self) -> Result<DataLoader> {
        let dataset = self
            .train
            .clone()
            .ok_or_else(|| format_err!("setup() must be called before train_loader()"))?;
        Ok(self.loader(dataset, true, true))
    }

    /// Preserves index order and keeps an incomplete final batch.
    pub fn val_loader(&self) -> Result<DataLoader> {
        let dataset = self
            .valid
            .clone()
            .ok_or_else(|| format_err!("setup() must be called before val_loader()"))?;
        Ok(self.loader(dataset, false, false))
    }

    /// Preserves index order and keeps an incomplete final batch.
    pub fn test_loader(&self) -> Result<DataLoader> {
        let dataset = self
            .test
            .clone()
            .ok_or_else(|| format_err!("setup() must be called before test_loader()"))?;
        Ok(self.loader(dataset, false, false))
    }

    fn loader(
        &self,
        dataset: Arc<dyn RandomAccessDataset>,
        shuffle: bool,
        drop_last: bool,
    ) -> DataLoader {
        DataLoaderInit {
            batch_size: self.batch_size,
            shuffle,
            drop_last,
            num_workers: self.config.num_workers,
        }
        .build(dataset)
    }
}
