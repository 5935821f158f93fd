//! Train [`Agent`] on a stream of tasks.
mod config;
use crate::{
    avg_accuracy, avg_forgetting,
    record::{Record, RecordValue, Recorder},
    Agent, Evaluator, TaskStream,
};
use anyhow::Result;
use chrono::Local;
pub use config::TrainerConfig;
use log::info;
use std::time::Instant;

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the outer training loop over tasks.
///
/// # Training loop
///
/// 1. For each task `t` of the training stream:
///     1. Set the agent to training mode.
///     2. For each minibatch of the task, tag it with `t` and hand it to
///        [`Agent::observe`]. The record returned by the agent is written to
///        the recorder. Feeding stops early once more than `samples_per_task`
///        examples were seen, if that limit is positive.
///     3. Every `eval_interval` minibatches and after the last one, evaluate
///        the agent on tasks `0..=t` of the evaluation stream. The accuracies
///        after the last minibatch form row `t` of the accuracy matrix.
/// 2. Compute the average accuracy and the average forgetting from the
///    accuracy matrix and return them in a record.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[TaskStream]-->|IncomingBatch|B[Agent]
///     B -->|push|C[ReservoirBuffer]
///     C -->|ExampleBatch|B
///     B -->|predict|D[Evaluator]
///     D -->|Record|E[Recorder]
/// ```
pub struct Trainer {
    /// Maximum number of examples fed per task, 0 for no limit.
    samples_per_task: usize,

    /// Interval of evaluation in minibatches.
    eval_interval: usize,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Self {
        Self {
            samples_per_task: config.samples_per_task,
            eval_interval: config.eval_interval.max(1),
        }
    }

    fn evaluate<A, V>(
        agent: &mut A,
        evaluator: &mut Evaluator<V>,
        task: usize,
        recorder: &mut dyn Recorder,
    ) -> Result<Vec<f32>>
    where
        A: Agent,
        V: TaskStream<Input = A::Input>,
    {
        agent.eval();
        let accs = evaluator.evaluate(agent, task)?;
        agent.train();

        let seen = &accs[..(task + 1).min(accs.len())];
        let avg_seen = seen.iter().sum::<f32>() / seen.len().max(1) as f32;
        info!(
            "{}\tAvg Acc: {:.2}",
            accs.iter()
                .map(|a| format!("{}", *a as i32))
                .collect::<Vec<_>>()
                .join("\t"),
            avg_seen
        );

        let mut record = Record::empty();
        record.insert("task", RecordValue::Scalar(task as f32));
        record.insert(
            "anytime_last_acc",
            RecordValue::Scalar(seen.last().copied().unwrap_or(0.)),
        );
        record.insert("anytime_acc_avg_seen", RecordValue::Scalar(avg_seen));
        record.insert("accs", RecordValue::Array1(accs.clone()));
        record.insert(
            "anytime_acc_avg_all",
            RecordValue::Scalar(accs.iter().sum::<f32>() / accs.len().max(1) as f32),
        );
        recorder.write(record);

        Ok(accs)
    }

    /// Trains the agent on every task of `stream`.
    ///
    /// Returns a record with the accuracy matrix (`acc_matrix`, one row per
    /// trained task), `avg_acc`, `avg_fgt`, the number of examples fed on the
    /// last task (`n_samples`) and the sizes of the model and the buffer in bits.
    pub fn train<A, S, V>(
        &mut self,
        agent: &mut A,
        stream: &mut S,
        evaluator: &mut Evaluator<V>,
        recorder: &mut dyn Recorder,
    ) -> Result<Record>
    where
        A: Agent,
        S: TaskStream<Input = A::Input>,
        V: TaskStream<Input = A::Input>,
    {
        let mut acc_matrix: Vec<Vec<f32>> = vec![];
        let mut n_seen = 0;

        for task in 0..stream.n_tasks() {
            let batches = stream.batches(task)?;
            let n_batches = batches.len();
            let timer = Instant::now();
            let mut final_accs = None;
            n_seen = 0;
            agent.train();

            info!("Task #{} --> Train Classifier", task);
            for (i, batch) in batches.into_iter().enumerate() {
                if self.samples_per_task > 0 && n_seen > self.samples_per_task {
                    break;
                }
                n_seen += batch.y.len();

                let mut record = agent.observe(batch.with_task(task))?;
                record.insert("task", RecordValue::Scalar(task as f32));
                recorder.write(record);

                let last_iter = i + 1 == n_batches;
                if (i + 1) % self.eval_interval == 0 || last_iter {
                    info!("Task {}. Time {:.2}", task, timer.elapsed().as_secs_f32());
                    let accs = Self::evaluate(agent, evaluator, task, recorder)?;
                    if last_iter {
                        final_accs = Some(accs);
                    }
                }
            }

            let accs = match final_accs {
                Some(accs) => accs,
                None => Self::evaluate(agent, evaluator, task, recorder)?,
            };
            acc_matrix.push(accs);
        }

        let avg_acc = avg_accuracy(&acc_matrix);
        let avg_fgt = avg_forgetting(&acc_matrix);
        info!("Final Results: avg_acc {:.2}, avg_fgt {:.2}", avg_acc, avg_fgt);

        let shape = [acc_matrix.len(), evaluator.n_tasks()];
        let mut record = Record::empty();
        record.insert(
            "acc_matrix",
            RecordValue::Array2(acc_matrix.into_iter().flatten().collect(), shape),
        );
        record.insert("avg_acc", RecordValue::Scalar(avg_acc));
        record.insert("avg_fgt", RecordValue::Scalar(avg_fgt));
        record.insert("n_samples", RecordValue::Scalar(n_seen as f32));
        record.insert("model_n_bits", RecordValue::Scalar(agent.model_n_bits() as f32));
        record.insert("buffer_n_bits", RecordValue::Scalar(agent.buffer_n_bits() as f32));
        record.insert("datetime", RecordValue::DateTime(Local::now()));
        recorder.write(record.clone());

        Ok(record)
    }
}
