use super::training::TrainingAnnotation;

/// How many participating workload statements make up one training chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkSize {
    Every(usize),
    /// No periodic retraining.
    #[default]
    Never,
}

impl ChunkSize {
    /// Map a `--retrain` interval; any negative value disables retraining.
    pub fn from_retrain_interval(interval: i64) -> Self {
        usize::try_from(interval)
            .map(ChunkSize::Every)
            .unwrap_or(ChunkSize::Never)
    }

    fn is_reached(&self, count: usize) -> bool {
        matches!(self, ChunkSize::Every(size) if *size == count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Execute(TrainingAnnotation),
    Retrain,
}

impl Action {
    pub fn is_retrain(&self) -> bool {
        matches!(self, Action::Retrain)
    }
}

/// Insert a `Retrain` in front of the first statement that follows a full
/// chunk. Statements keep their relative order and are never dropped; meta
/// statements and non-participating statements do not count toward a chunk.
pub fn schedule(annotations: Vec<TrainingAnnotation>, chunk_size: ChunkSize) -> Vec<Action> {
    let mut actions = Vec::with_capacity(annotations.len());
    let mut chunk = 0usize;

    for annotation in annotations {
        if chunk_size.is_reached(chunk) {
            actions.push(Action::Retrain);
            chunk = 0;
        }

        if annotation.statement.is_workload() && annotation.participates {
            chunk += 1;
        }
        actions.push(Action::Execute(annotation));
    }

    actions
}
