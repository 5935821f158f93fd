use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use ocl_candle_agent::{
    agem::{Agem, AgemVariant},
    classifier::{Classifier, ClassifierConfig},
    er::Er,
    grad::{dot, project},
    method::{ContinualAgent, Method},
    mlp::{Mlp, MlpConfig},
    opt::OptimizerConfig,
    AgentConfig, TensorBatch,
};
use ocl_core::{error::OclError, Agent, IncomingBatch, ReservoirBufferConfig};
use std::collections::HashMap;
use tempdir::TempDir;

/// Linear classifier from 2 inputs to 2 classes.
fn config(method: Method, per_class_budget: usize, lr: f64) -> AgentConfig<Mlp> {
    AgentConfig::default()
        .method(method)
        .classifier_config(
            ClassifierConfig::default()
                .model_config(MlpConfig::new(2, vec![], 2))
                .opt_config(OptimizerConfig::Sgd { lr }),
        )
        .buffer_config(
            ReservoirBufferConfig::default()
                .per_class_budget(per_class_budget)
                .n_classes(2)
                .seed(0),
        )
        .buffer_batch_size(2)
}

/// A batch of `n` copies of the example `(x, y)`.
fn batch(x: [f32; 2], y: u32, n: usize, task: usize) -> IncomingBatch<TensorBatch> {
    let data = (0..n).flat_map(|_| x.iter().copied()).collect::<Vec<_>>();
    let x = Tensor::from_vec(data, (n, 2), &Device::Cpu).unwrap();
    IncomingBatch::new(TensorBatch::from_tensor(x), vec![y; n], task)
}

fn zero_params(varmap: &VarMap) {
    for var in varmap.all_vars() {
        var.set(&var.zeros_like().unwrap()).unwrap();
    }
}

fn params(varmap: &VarMap) -> HashMap<String, Vec<f32>> {
    varmap
        .data()
        .lock()
        .unwrap()
        .iter()
        .map(|(k, v)| (k.clone(), v.flatten_all().unwrap().to_vec1().unwrap()))
        .collect()
}

fn copy_params(dest: &VarMap, src: &VarMap) {
    let src = src.data().lock().unwrap();
    for (k, v) in dest.data().lock().unwrap().iter() {
        v.set(src.get(k).unwrap().as_tensor()).unwrap();
    }
}

fn assert_close(a: &[f32], b: &[f32]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert!((x - y).abs() < 1e-6, "{:?} != {:?}", a, b);
    }
}

/// Task 0 fills the buffer of capacity 4 with copies of `([1, 0], 0)`.
fn agem_after_first_task(method: Method) -> Result<Agem<Mlp>> {
    let mut agent = Agem::build(config(method, 2, 0.))?;
    zero_params(agent.base().classifier().varmap());

    for _ in 0..2 {
        let record = agent.observe(batch([1., 0.], 0, 2, 0))?;
        assert!(record.get("dot_p").is_none());
    }
    assert_eq!(agent.buffer_len(), 4);
    assert_eq!(agent.base().buffer().n_seen(), 4);
    assert_eq!(agent.base().buffer().labels(), &[0, 0, 0, 0]);
    assert!(agent.grad_inc().is_none());

    Ok(agent)
}

#[test]
fn test_agem_projects_conflicting_gradient() -> Result<()> {
    let mut agent = agem_after_first_task(Method::Agem)?;

    // The gradients of ([1, 1], 1) and ([1, 0], 0) conflict.
    let record = agent.observe(batch([1., 1.], 1, 2, 1))?;
    assert_eq!(record.get_scalar("projected")?, 1.);
    assert!((record.get_scalar("dot_p")? + 1.).abs() < 1e-6);

    let grad_re = agent.grad_re().unwrap();
    let installed = agent.installed_grad().unwrap();
    assert!(dot(installed, grad_re)?.abs() < 1e-6);
    assert_close(
        &installed.to_vec1()?,
        &project(agent.grad_inc().unwrap(), grad_re)?.to_vec1()?,
    );

    // ([0, -3], 0) agrees with every example in the buffer.
    let record = agent.observe(batch([0., -3.], 0, 2, 1))?;
    assert_eq!(record.get_scalar("projected")?, 0.);
    assert!(record.get_scalar("dot_p")? > 0.);

    let grad_inc = agent.grad_inc().unwrap().to_vec1::<f32>()?;
    let installed = agent.installed_grad().unwrap().to_vec1::<f32>()?;
    assert_eq!(grad_inc, installed);
    // bias, then weight in row-major order
    assert_close(&grad_inc, &[-0.5, 0.5, 0., 1.5, 0., -1.5]);
    Ok(())
}

#[test]
fn test_agem_pp_adds_replay_gradient() -> Result<()> {
    let mut agent = agem_after_first_task(Method::AgemPp)?;
    assert_eq!(agent.variant(), AgemVariant::AgemPp);
    let record = agent.observe(batch([1., 1.], 1, 2, 1))?;
    assert_eq!(record.get_scalar("projected")?, 1.);

    let grad_inc = agent.grad_inc().unwrap();
    let grad_re = agent.grad_re().unwrap();
    let installed = agent.installed_grad().unwrap();
    let expected = (project(grad_inc, grad_re)? + grad_re)?;
    assert_close(&installed.to_vec1()?, &expected.to_vec1()?);

    // Unlike AGEM, the installed gradient keeps the full replay component.
    assert!((dot(installed, grad_re)? - dot(grad_re, grad_re)?).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_agem_without_buffer_equals_er() -> Result<()> {
    let mut er = Er::build(config(Method::Er, 0, 0.1))?;
    let mut agem = Agem::build(config(Method::Agem, 0, 0.1))?;
    copy_params(
        agem.base().classifier().varmap(),
        er.classifier().varmap(),
    );

    let examples = [([1., 0.], 0, 0), ([0., 1.], 1, 0), ([1., 1.], 0, 1), ([-1., 2.], 1, 2)];
    for (x, y, task) in examples.iter() {
        let r1 = er.observe(batch(*x, *y, 3, *task))?;
        let r2 = agem.observe(batch(*x, *y, 3, *task))?;
        assert_eq!(r1.get_scalar("loss_inc")?, r2.get_scalar("loss_inc")?);
        assert!(r2.get("dot_p").is_none());
    }

    assert_eq!(agem.buffer_len(), 0);
    assert_eq!(agem.base().buffer().n_seen(), 12);
    assert!(agem.grad_inc().is_none());

    let p1 = params(er.classifier().varmap());
    let p2 = params(agem.base().classifier().varmap());
    for (k, v) in p1.iter() {
        assert_close(v, &p2[k]);
    }
    Ok(())
}

#[test]
fn test_er_trains_on_joint_batch() -> Result<()> {
    let lr = 0.5;
    let mut config = config(Method::Er, 2, lr);
    config.buffer_batch_size = 4;
    let mut agent = Er::build(config.clone())?;

    for _ in 0..2 {
        let record = agent.observe(batch([1., 0.], 0, 2, 0))?;
        assert!(record.get("loss_re").is_none());
    }
    assert_eq!(agent.buffer_len(), 4);

    let mut reference: Classifier<Mlp> =
        Classifier::build(config.classifier_config.clone(), Device::Cpu)?;
    copy_params(reference.varmap(), agent.classifier().varmap());

    let record = agent.observe(batch([1., 1.], 1, 2, 1))?;
    assert!(record.get_scalar("loss_re")? > 0.);
    assert_eq!(record.get_scalar("n_seen")?, 6.);

    let x = Tensor::from_slice(
        &[1f32, 1., 1., 1., 1., 0., 1., 0., 1., 0., 1., 0.],
        (6, 2),
        &Device::Cpu,
    )?;
    let loss = reference.loss(&x, &[1, 1, 0, 0, 0, 0])?;
    assert!((record.get_scalar("loss")? - loss.to_scalar::<f32>()?).abs() < 1e-6);
    let grads = reference.backward(&loss)?;
    reference.step(&grads)?;

    let p1 = params(agent.classifier().varmap());
    let p2 = params(reference.varmap());
    for (k, v) in p1.iter() {
        assert_close(v, &p2[k]);
    }
    Ok(())
}

#[test]
fn test_task_free_replays_from_first_task() -> Result<()> {
    let mut agent = Er::build(config(Method::Er, 2, 0.1).task_free(true))?;
    let record = agent.observe(batch([1., 0.], 0, 2, 0))?;
    assert!(record.get("loss_re").is_none());
    let record = agent.observe(batch([0., 1.], 1, 2, 0))?;
    assert!(record.get("loss_re").is_some());
    Ok(())
}

#[test]
fn test_task_id_must_not_decrease() -> Result<()> {
    let mut agent = ContinualAgent::build(config(Method::AgemPp, 2, 0.1))?;
    assert_eq!(agent.method(), Method::AgemPp);

    agent.observe(batch([1., 0.], 0, 2, 3))?;
    agent.observe(batch([1., 0.], 0, 2, 3))?;
    let err = agent.observe(batch([1., 0.], 0, 2, 2)).err().unwrap();
    assert_eq!(
        err.downcast_ref::<OclError>(),
        Some(&OclError::TaskIdDecreased {
            current: 3,
            given: 2
        })
    );
    Ok(())
}

#[test]
fn test_record_verbose_level() -> Result<()> {
    let mut agent = Er::build(config(Method::Er, 2, 0.1).record_verbose_level(2))?;
    let record = agent.observe(batch([1., 0.], 0, 2, 0))?;
    assert!(record.get("mlp.ln0.weight_mean").is_some());
    assert!(record.get("mlp.ln0.bias_std").is_some());
    Ok(())
}

#[test]
fn test_n_iters_push_once() -> Result<()> {
    let mut agent = Agem::build(config(Method::Agem, 2, 0.1).n_iters(3))?;
    agent.observe(batch([1., 0.], 0, 2, 0))?;
    assert_eq!(agent.base().buffer().n_seen(), 2);
    Ok(())
}

#[test]
fn test_bit_accounting() -> Result<()> {
    let mut agent = ContinualAgent::build(config(Method::Er, 2, 0.1))?;
    assert_eq!(agent.model_n_bits(), 6 * 32);
    assert_eq!(agent.buffer_n_bits(), 0);
    agent.observe(batch([1., 0.], 0, 3, 0))?;
    assert_eq!(agent.buffer_n_bits(), 3 * (2 * 32 + 64));
    Ok(())
}

#[test]
fn test_save_and_load_params() -> Result<()> {
    let dir = TempDir::new("ocl_candle_agent")?;
    let mut agent1 = ContinualAgent::build(config(Method::Agem, 2, 0.1))?;
    agent1.observe(batch([1., 0.], 0, 2, 0))?;
    agent1.save_params(dir.path())?;
    assert!(dir.path().join("classifier.safetensors").exists());

    let mut agent2 = ContinualAgent::build(config(Method::Agem, 2, 0.1))?;
    agent2.load_params(dir.path())?;

    let x = batch([0.3, -0.7], 0, 1, 0).x;
    let y1 = agent1.predict(&x)?.flatten_all()?.to_vec1::<f32>()?;
    let y2 = agent2.predict(&x)?.flatten_all()?.to_vec1::<f32>()?;
    assert_eq!(y1, y2);
    assert_eq!(agent1.predict_labels(&x)?, agent2.predict_labels(&x)?);
    Ok(())
}

#[test]
fn test_predict_leaves_agent_unchanged() -> Result<()> {
    let mut agent = Agem::build(config(Method::Agem, 2, 0.1))?;
    agent.observe(batch([1., 0.], 0, 3, 0))?;
    agent.observe(batch([0., 1.], 1, 3, 1))?;

    let n_seen = agent.base().buffer().n_seen();
    let len = agent.buffer_len();
    let labels = agent.base().buffer().labels().to_vec();
    let before = params(agent.base().classifier().varmap());

    let x = batch([0.5, -0.5], 0, 4, 0).x;
    let y1 = agent.predict(&x)?.flatten_all()?.to_vec1::<f32>()?;
    let y2 = agent.predict(&x)?.flatten_all()?.to_vec1::<f32>()?;
    assert_eq!(y1, y2);

    assert_eq!(agent.base().buffer().n_seen(), n_seen);
    assert_eq!(agent.buffer_len(), len);
    assert_eq!(agent.base().buffer().labels(), labels.as_slice());
    assert_eq!(params(agent.base().classifier().varmap()), before);
    assert_eq!(agent.base().task(), Some(1));
    assert!(agent.is_train());
    Ok(())
}
