#[derive(Debug, Clone, Default)]
pub enum BarColor {
    #[default]
    CYAN,
    GREEN,
    RED,
}

/// What a worker thread is doing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Task {
    #[default]
    Decode,
    Encode,
}

impl Task {
    pub fn color(&self) -> BarColor {
        match self {
            Self::Decode => BarColor::CYAN,
            Self::Encode => BarColor::GREEN,
        }
    }
}

/// Progress report sent from a worker to the UI thread
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub events: u64,
    pub task: Task,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, events: u64, task: Task) -> Self {
        Self {
            progress,
            events,
            task,
            color: task.color(),
        }
    }
}
