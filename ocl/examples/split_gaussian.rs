use anyhow::Result;
use clap::Parser;
use ocl::stream::{SplitGaussian, SplitGaussianConfig};
use ocl_candle_agent::{
    classifier::ClassifierConfig,
    method::{ContinualAgent, Method},
    mlp::{Mlp, MlpConfig},
    opt::OptimizerConfig,
    AgentConfig,
};
use ocl_core::{
    record::{LogRecorder, Record},
    Agent, Evaluator, ReservoirBufferConfig, Trainer, TrainerConfig,
};
use std::path::Path;

const N_TASKS: usize = 5;
const CLASSES_PER_TASK: usize = 2;
const DIM: usize = 16;
const N_PER_CLASS: usize = 200;
const N_PER_CLASS_EVAL: usize = 50;
const BATCH_SIZE: usize = 10;
const UNITS: [usize; 2] = [64, 64];
const EVAL_INTERVAL: usize = 20;

/// Train a continual learning agent on a class-incremental stream of Gaussian blobs
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Method, one of er, agem, agem++
    #[arg(short, long, default_value = "agem")]
    method: Method,

    /// Replay from the first task
    #[arg(long, default_value_t = false)]
    task_free: bool,

    /// Number of buffer slots per class
    #[arg(long, default_value_t = 20)]
    per_class_budget: usize,

    /// Number of replayed examples per iteration
    #[arg(long, default_value_t = 10)]
    buffer_batch_size: usize,

    /// Number of iterations on each incoming batch
    #[arg(long, default_value_t = 1)]
    n_iters: usize,

    /// Learning rate of SGD
    #[arg(long, default_value_t = 0.1)]
    lr: f64,

    /// Maximum number of examples per task, 0 for all
    #[arg(long, default_value_t = 0)]
    samples_per_task: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Directory where configurations and parameters are saved
    #[arg(long)]
    model_dir: Option<String>,
}

fn create_stream_config(args: &Args) -> SplitGaussianConfig {
    SplitGaussianConfig::default()
        .n_tasks(N_TASKS)
        .classes_per_task(CLASSES_PER_TASK)
        .dim(DIM)
        .n_per_class(N_PER_CLASS)
        .batch_size(BATCH_SIZE)
        .seed(args.seed)
        .sample_seed(args.seed)
}

fn create_agent_config(args: &Args, n_classes: usize) -> AgentConfig<Mlp> {
    let device = candle_core::Device::cuda_if_available(0).unwrap_or(candle_core::Device::Cpu);
    let classifier_config = ClassifierConfig::default()
        .model_config(MlpConfig::new(DIM, UNITS.to_vec(), n_classes))
        .opt_config(OptimizerConfig::default().learning_rate(args.lr));
    let buffer_config = ReservoirBufferConfig::default()
        .per_class_budget(args.per_class_budget)
        .n_classes(n_classes)
        .seed(args.seed);

    AgentConfig::default()
        .method(args.method)
        .classifier_config(classifier_config)
        .buffer_config(buffer_config)
        .buffer_batch_size(args.buffer_batch_size)
        .task_free(args.task_free)
        .n_iters(args.n_iters)
        .device(&device)
}

fn train(args: &Args) -> Result<Record> {
    let stream_config = create_stream_config(args);
    let agent_config = create_agent_config(args, stream_config.n_classes());
    let trainer_config = TrainerConfig::default()
        .samples_per_task(args.samples_per_task)
        .eval_interval(EVAL_INTERVAL);

    if let Some(model_dir) = &args.model_dir {
        let model_dir = Path::new(model_dir);
        std::fs::create_dir_all(model_dir)?;
        stream_config.save(model_dir.join("stream.yaml"))?;
        agent_config.save(model_dir.join("agent.yaml"))?;
        trainer_config.save(model_dir.join("trainer.yaml"))?;
    }

    let mut stream = SplitGaussian::build(stream_config.clone())?;
    let mut evaluator = Evaluator::new(SplitGaussian::build(
        stream_config
            .n_per_class(N_PER_CLASS_EVAL)
            .sample_seed(args.seed.wrapping_add(1_000)),
    )?);
    let mut agent = ContinualAgent::build(agent_config)?;
    let mut recorder = LogRecorder::default();
    let mut trainer = Trainer::build(trainer_config);

    let record = trainer.train(&mut agent, &mut stream, &mut evaluator, &mut recorder)?;

    if let Some(model_dir) = &args.model_dir {
        agent.save_params(Path::new(model_dir))?;
    }

    Ok(record)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let record = train(&args)?;
    println!(
        "avg_acc = {:.2}, avg_fgt = {:.2}",
        record.get_scalar("avg_acc")?,
        record.get_scalar("avg_fgt")?
    );

    Ok(())
}
