//! Evaluate [`Agent`] on the tasks of a stream.
use crate::{Agent, TaskStream};
use anyhow::Result;

/// Computes per-task accuracies of an agent on a held-out [`TaskStream`].
///
/// The caller of [`Evaluator::evaluate`] needs to handle the internal state
/// of the agent, like training/evaluation mode.
///
/// # Examples
///
/// ```ignore
/// let mut evaluator = Evaluator::new(valid_stream);
/// agent.eval();
/// let accs = evaluator.evaluate(&mut agent, task)?;
/// agent.train();
/// ```
pub struct Evaluator<S: TaskStream> {
    stream: S,
}

impl<S: TaskStream> Evaluator<S> {
    /// Constructs an evaluator on the given stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Returns the number of tasks of the underlying stream.
    pub fn n_tasks(&self) -> usize {
        self.stream.n_tasks()
    }

    /// Returns the accuracy in percent on every task of the stream.
    ///
    /// Only tasks `0..=task` are evaluated; the entries of later tasks are 0.
    /// A task without any example also has accuracy 0.
    pub fn evaluate<A>(&mut self, agent: &A, task: usize) -> Result<Vec<f32>>
    where
        A: Agent<Input = S::Input>,
    {
        let mut accs = vec![0f32; self.stream.n_tasks()];

        for (task_t, acc) in accs.iter_mut().enumerate().take(task + 1) {
            let (mut n_ok, mut n_total) = (0usize, 0usize);

            for batch in self.stream.batches(task_t)? {
                let pred = agent.predict_labels(&batch.x)?;
                n_ok += pred.iter().zip(batch.y.iter()).filter(|(p, y)| p == y).count();
                n_total += batch.y.len();
            }

            if n_total > 0 {
                *acc = 100. * n_ok as f32 / n_total as f32;
            }
        }

        Ok(accs)
    }
}

/// Mean accuracy over all tasks after training on the last task.
///
/// `acc_matrix[j][i]` is the accuracy on task `i` after training on task `j`.
pub fn avg_accuracy(acc_matrix: &[Vec<f32>]) -> f32 {
    match acc_matrix.last() {
        Some(last) if !last.is_empty() => last.iter().sum::<f32>() / last.len() as f32,
        _ => 0.,
    }
}

/// Mean forgetting over all tasks but the last one.
///
/// The forgetting of task `i` is the best accuracy ever observed on it minus
/// its accuracy after training on the last task. With fewer than two rows
/// there is nothing to forget and 0 is returned.
pub fn avg_forgetting(acc_matrix: &[Vec<f32>]) -> f32 {
    let last = match acc_matrix.last() {
        Some(last) => last,
        None => return 0.,
    };
    let n = last.len().min(acc_matrix.len()).saturating_sub(1);
    if n == 0 {
        return 0.;
    }

    let total = (0..n)
        .map(|i| {
            let best = acc_matrix
                .iter()
                .map(|row| row[i])
                .fold(f32::NEG_INFINITY, f32::max);
            best - last[i]
        })
        .sum::<f32>();
    total / n as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avg_accuracy_and_forgetting() {
        let acc_matrix = vec![
            vec![90., 0., 0.],
            vec![70., 80., 0.],
            vec![60., 75., 95.],
        ];
        assert_eq!(avg_accuracy(&acc_matrix), (60. + 75. + 95.) / 3.);
        assert_eq!(avg_forgetting(&acc_matrix), ((90. - 60.) + (80. - 75.)) / 2.);
    }

    #[test]
    fn test_single_task_has_no_forgetting() {
        let acc_matrix = vec![vec![88.]];
        assert_eq!(avg_accuracy(&acc_matrix), 88.);
        assert_eq!(avg_forgetting(&acc_matrix), 0.);
        assert_eq!(avg_forgetting(&[]), 0.);
    }
}
