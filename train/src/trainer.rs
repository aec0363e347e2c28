//! The training orchestrator.

use crate::{
    common::*,
    config::Config,
    data::{Batch, DataModule},
    logging::{self, MetricsLogger},
    utils::{self, EarlyStopping},
};

/// The metric the early-stopping policy monitors; it must name a metric
/// the trainer actually logs.
pub const EARLY_STOP_MONITOR: &str = logging::VALID_ACC;

/// The entry of the training program: fit for the configured number of
/// epochs, then evaluate on the test partition.
pub fn run(config: Arc<Config>) -> Result<()> {
    let start_time = Local::now();

    // create run dirs and save the resolved config
    let run_dir = config
        .logging
        .dir
        .join(format!("{}", start_time.format(utils::FILE_STRFTIME)));
    let checkpoint_dir = run_dir.join("checkpoints");
    fs::create_dir_all(&run_dir)?;
    fs::create_dir_all(&checkpoint_dir)?;
    fs::write(
        run_dir.join("config.json5"),
        serde_json::to_string_pretty(&*config)?,
    )?;

    // data module
    info!("loading dataset");
    let mut datamodule = DataModule::new(
        config.dataset.clone(),
        config.training.batch_size.get(),
    );
    datamodule.prepare();
    datamodule.setup(&mut StdRng::from_entropy())?;

    // model
    let device = Device::cuda_if_available();
    info!("use device {:?}", device);

    let mut vs = nn::VarStore::new(device);
    let backbone = MobileNetV2Init {
        num_classes: config.dataset.num_classes.get(),
        ..Default::default()
    }
    .build(&vs.root());
    utils::try_load_checkpoint(&mut vs, &config.logging.dir, &config.training.load_checkpoint)?;

    let mut model = Classifier::new(backbone, config.training.learning_rate.raw());
    let mut optimizer = model.configure_optimizer(&vs)?;

    let mut logger = MetricsLogger::new(&run_dir)?;
    let mut early_stopping = EarlyStopping::max(
        EARLY_STOP_MONITOR,
        config.training.early_stopping.patience,
        config.training.early_stopping.min_delta.raw(),
    );

    // fit loop
    info!("start training");
    let log_every_n_steps = config.logging.log_every_n_steps.max(1);
    let mut global_step = 0;
    let mut final_epoch = 0;

    for epoch in 0..config.training.max_epochs {
        final_epoch = epoch;

        // train phase
        model.train_acc.reset();
        for batch in datamodule.train_loader()?.batches() {
            let Batch { images, labels } = batch?.to_device(device);
            let loss = model.training_step(&images, &labels);
            optimizer.backward_step(&loss);

            if global_step % log_every_n_steps == 0 {
                let loss = f64::from(&loss);
                info!(
                    "epoch: {}\tstep: {}\ttrain_loss: {:.5}",
                    epoch, global_step, loss
                );
                logger.log(epoch, global_step, logging::TRAIN_LOSS, loss)?;
            }
            global_step += 1;
        }
        logger.log(
            epoch,
            global_step,
            logging::TRAIN_ACC,
            model.train_acc.compute(),
        )?;

        // validation phase
        model.valid_acc.reset();
        let mut valid_loss_sum = 0.0;
        let mut valid_batches = 0;
        for batch in datamodule.val_loader()?.batches() {
            let Batch { images, labels } = batch?.to_device(device);
            let loss = tch::no_grad(|| model.validation_step(&images, &labels));
            valid_loss_sum += f64::from(&loss);
            valid_batches += 1;
        }
        let valid_loss = valid_loss_sum / valid_batches.max(1) as f64;
        let valid_acc = model.valid_acc.compute();
        logger.log(epoch, global_step, logging::VALID_LOSS, valid_loss)?;
        logger.log(epoch, global_step, logging::VALID_ACC, valid_acc)?;
        info!(
            "epoch: {}\tvalid_loss: {:.5}\tvalid_acc: {:.5}",
            epoch, valid_loss, valid_acc
        );

        utils::save_checkpoint(&vs, &checkpoint_dir, epoch, valid_acc)?;

        if early_stopping.update(valid_acc) {
            info!(
                "early stopping: {} did not improve for {} epochs",
                early_stopping.monitor(),
                config.training.early_stopping.patience
            );
            break;
        }
    }

    // test phase
    model.test_acc.reset();
    for batch in datamodule.test_loader()?.batches() {
        let Batch { images, labels } = batch?.to_device(device);
        tch::no_grad(|| model.test_step(&images, &labels));
    }
    let test_acc = model.test_acc.compute();
    logger.log(final_epoch, global_step, logging::TEST_ACC, test_acc)?;
    info!("test_acc: {:.5}", test_acc);

    let elapsed = (Local::now() - start_time).num_milliseconds() as f64 / 60_000.0;
    println!("Took {:.3} min", elapsed);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A monitored metric name that is never logged silently disables
    /// early stopping; pin the names together.
    #[test]
    fn early_stop_monitor_is_a_logged_metric() {
        assert!(logging::LOGGED_METRICS.contains(&EARLY_STOP_MONITOR));
    }
}
