//! Full episodes through the public API on 32x32 inputs

use leoseg::autograd::Context;
use leoseg::config::{LeoConfig, ValidationSchedule};
use leoseg::data::{nhwc_to_nchw, EpisodeBatch};
use leoseg::meta::{InnerLoopAdapter, MetaLearner, MetaOptimizer, Mode, OuterLoopFinetuner};
use leoseg::model::{Encoded, FeatureEncoder, MetaParameters};
use ndarray::Array4;

const SIZE: usize = 32;

fn config(seed: u64, dropout_rate: f32) -> LeoConfig {
    let mut config = LeoConfig {
        seed,
        ..LeoConfig::default()
    };
    config.hyperparameters.num_adaptation_steps = 1;
    config.hyperparameters.num_finetuning_steps = 2;
    config.hyperparameters.dropout_rate = dropout_rate;
    config
}

fn images(n: usize, offset: f32) -> Array4<f32> {
    Array4::from_shape_fn((n, SIZE, SIZE, 3), |(i, y, x, c)| {
        ((i + y * 3 + x * 5 + c * 7) as f32 * 0.13 + offset).sin()
    })
}

/// Square foreground in the top-left quadrant
fn masks(n: usize) -> Array4<f32> {
    Array4::from_shape_fn((n, SIZE, SIZE, 1), |(_, y, x, _)| {
        if y < SIZE / 2 && x < SIZE / 2 {
            1.0
        } else {
            0.0
        }
    })
}

fn batch(classes: &[&str]) -> EpisodeBatch {
    let n = classes.len();
    let train_images: Vec<_> = (0..n).map(|t| images(2, t as f32)).collect();
    let val_images: Vec<_> = (0..n).map(|t| images(2, t as f32 + 0.5)).collect();
    let train_masks: Vec<_> = (0..n).map(|_| masks(2)).collect();
    let val_masks: Vec<_> = (0..n).map(|_| masks(2)).collect();
    let classes: Vec<String> = classes.iter().map(|c| c.to_string()).collect();
    EpisodeBatch::from_nhwc(&train_images, &train_masks, &val_images, &val_masks, &classes).unwrap()
}

#[test]
fn meta_train_episode_updates_parameters_and_stats() {
    let mut learner = MetaLearner::new(config(0, 0.3)).unwrap();
    let head_before = learner.parameters().head_weight.data().clone();
    let decoder_before = learner.parameters().decoder.parameters()[0].data().clone();

    let loss = learner.compute_loss(&batch(&["cat", "dog"]), Mode::MetaTrain).unwrap();

    assert!(loss.is_finite());
    assert!(loss > 0.0);
    assert_ne!(learner.parameters().head_weight.data(), &head_before);
    assert_ne!(learner.parameters().decoder.parameters()[0].data(), &decoder_before);
    assert_eq!(learner.optimizer().step_count(), 1);

    let stats = learner.stats();
    assert_eq!(stats.episode, 1);
    assert_eq!(stats.mode, Mode::MetaTrain);
    assert_eq!(stats.total_val_loss, Some(loss));
    assert_eq!(stats.mean_iou.keys().collect::<Vec<_>>(), vec!["cat", "dog"]);
    for iou in stats.mean_iou.values() {
        assert!((0.0..=1.0).contains(iou));
    }
}

#[test]
fn meta_update_averages_tasks_against_unmodified_parameters() {
    let cfg = config(5, 0.0);
    let hyper = cfg.hyperparameters.clone();
    let batch = batch(&["cat", "dog", "bird"]);

    let mut learner = MetaLearner::new(cfg.clone()).unwrap();
    learner.compute_loss(&batch, Mode::MetaTrain).unwrap();

    // Every task sees the initial meta-parameters; one averaged step follows.
    let encoder = FeatureEncoder::new(cfg.seed);
    let mut expected = MetaParameters::new(cfg.seed);
    let mut ctx = Context::with_seed(cfg.seed);
    ctx.train();
    let task_grads: Vec<_> = {
        let adapter = InnerLoopAdapter::new(&encoder, &expected, hyper.dropout_rate);
        let finetuner = OuterLoopFinetuner::new(&encoder, &expected, &hyper);
        batch
            .tasks()
            .iter()
            .map(|task| {
                let adapted = adapter
                    .adapt_latent(
                        task.train_images(),
                        task.train_masks(),
                        hyper.num_adaptation_steps,
                        hyper.inner_loop_lr,
                        &mut ctx,
                    )
                    .unwrap();
                finetuner
                    .finetune(
                        task,
                        &adapted.features,
                        &adapted.head_gradient,
                        Mode::MetaTrain,
                        &mut ctx,
                    )
                    .unwrap()
                    .gradients
                    .unwrap()
            })
            .collect()
    };
    let mut optimizer = MetaOptimizer::new(hyper.outer_loop_lr);
    optimizer.accumulate_and_apply(&mut expected, &task_grads).unwrap();

    assert_eq!(learner.optimizer().step_count(), 1);
    assert_eq!(
        learner.parameters().head_weight.data(),
        expected.head_weight.data()
    );
    for ((name, actual), (_, want)) in learner
        .parameters()
        .named_parameters()
        .into_iter()
        .zip(expected.named_parameters())
    {
        assert_eq!(actual.data(), want.data(), "{name} differs from the averaged update");
    }
}

#[test]
fn evaluation_modes_leave_parameters_untouched() {
    for mode in [Mode::MetaVal, Mode::MetaTest] {
        let mut learner = MetaLearner::new(config(1, 0.3)).unwrap();
        let named_before: Vec<_> = learner
            .parameters()
            .named_parameters()
            .into_iter()
            .map(|(name, t)| (name, t.data().clone()))
            .collect();

        let loss = learner.compute_loss(&batch(&["boat"]), mode).unwrap();
        assert!(loss.is_finite());

        for ((name, before), (_, after)) in named_before
            .iter()
            .zip(learner.parameters().named_parameters())
        {
            assert_eq!(before, after.data(), "{name} changed in {mode}");
        }
        assert_eq!(learner.optimizer().step_count(), 0);
        assert_eq!(learner.stats().mode, mode);
        assert_eq!(learner.stats().episode, 1);
    }
}

#[test]
fn episodes_are_deterministic_for_a_seed() {
    let mut a = MetaLearner::new(config(7, 0.3)).unwrap();
    let mut b = MetaLearner::new(config(7, 0.3)).unwrap();
    let batch = batch(&["bird", "car"]);

    for _ in 0..2 {
        let la = a.compute_loss(&batch, Mode::MetaTrain).unwrap();
        let lb = b.compute_loss(&batch, Mode::MetaTrain).unwrap();
        assert_eq!(la, lb);
    }
    assert_eq!(
        a.parameters().head_weight.data(),
        b.parameters().head_weight.data()
    );
}

#[test]
fn both_validation_schedules_run() {
    for schedule in [ValidationSchedule::AfterAllSteps, ValidationSchedule::AfterFirstStep] {
        let mut cfg = config(2, 0.0);
        cfg.hyperparameters.num_finetuning_steps = 3;
        cfg.hyperparameters.validation_schedule = schedule;
        let mut learner = MetaLearner::new(cfg).unwrap();
        let loss = learner.compute_loss(&batch(&["cow"]), Mode::MetaTrain).unwrap();
        assert!(loss.is_finite());
    }
}

#[test]
fn prediction_matches_mask_geometry() {
    let learner = MetaLearner::new(config(3, 0.0)).unwrap();
    let image = nhwc_to_nchw(&images(2, 0.0)).unwrap();
    let Encoded { latent, skips } = learner.encoder().encode(&image).unwrap();
    assert_eq!(latent.shape(), &[2, 1280, 1, 1]);

    let mut ctx = Context::with_seed(0);
    ctx.eval();
    let params = learner.parameters();
    let (features, logits) = params
        .forward(&latent, &skips, &image, &params.head_weight, 0.0, &mut ctx)
        .unwrap();
    assert_eq!(features.shape(), &[2, 48, SIZE, SIZE]);
    assert_eq!(logits.shape(), &[2, 2, SIZE, SIZE]);
}

#[test]
fn mismatched_batch_is_rejected() {
    let imgs = vec![images(2, 0.0)];
    let msks = vec![masks(2)];
    let err = EpisodeBatch::from_nhwc(&imgs, &msks, &imgs, &[], &["a".to_string()]);
    assert!(err.is_err());
}

#[test]
fn image_size_must_be_a_multiple_of_the_downsampling() {
    let learner = MetaLearner::new(config(0, 0.0)).unwrap();
    let odd = nhwc_to_nchw(&Array4::zeros((1, 40, 32, 3))).unwrap();
    assert!(learner.encoder().encode(&odd).is_err());
}
