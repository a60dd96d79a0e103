/// Notifications sent by the genetic driver while it runs.
pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, generation: usize);
    fn on_generation_complete(&mut self, generation: usize, best_fitness: Option<f64>, tested_solutions: usize);
    fn on_solution_evaluated(&mut self, evaluated: usize, total: usize);
}

pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        log::info!("Generation {} starting...", generation + 1);
    }

    fn on_generation_complete(&mut self, generation: usize, best_fitness: Option<f64>, tested: usize) {
        match best_fitness {
            Some(best) => log::info!(
                "Generation {} complete. Best fitness: {:.4}, tested solutions: {}",
                generation + 1,
                best,
                tested
            ),
            None => log::info!("Generation {} complete. No solution tested yet", generation + 1),
        }
    }

    fn on_solution_evaluated(&mut self, evaluated: usize, total: usize) {
        if evaluated % 10 == 0 || evaluated == total {
            log::info!("  Evaluated {}/{} solutions", evaluated, total);
        }
    }
}

/// Ignores every notification.
pub struct SilentProgress;

impl ProgressCallback for SilentProgress {
    fn on_generation_start(&mut self, _generation: usize) {}

    fn on_generation_complete(&mut self, _generation: usize, _best: Option<f64>, _tested: usize) {}

    fn on_solution_evaluated(&mut self, _evaluated: usize, _total: usize) {}
}

/// Forwards notifications over a channel, for a caller running the
/// exploration on another thread.
pub struct ChannelProgressCallback {
    sender: std::sync::mpsc::Sender<ProgressMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    GenerationStart(usize),
    GenerationComplete {
        generation: usize,
        best_fitness: Option<f64>,
        tested_solutions: usize,
    },
    SolutionEvaluated { current: usize, total: usize },
}

impl ChannelProgressCallback {
    pub fn new(sender: std::sync::mpsc::Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationStart(generation));
    }

    fn on_generation_complete(&mut self, generation: usize, best_fitness: Option<f64>, tested: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationComplete {
            generation,
            best_fitness,
            tested_solutions: tested,
        });
    }

    fn on_solution_evaluated(&mut self, evaluated: usize, total: usize) {
        let _ = self.sender.send(ProgressMessage::SolutionEvaluated {
            current: evaluated,
            total,
        });
    }
}
