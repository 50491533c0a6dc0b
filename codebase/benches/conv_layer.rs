use std::time::Duration;
use criterion::*;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use nl_codebase::nn::batch_config::ForwardMode;
use nl_codebase::nn::controller::NNController;
use nl_codebase::nn::layers::filtering::convolution::{ConvolutionConfig, ConvolutionInitMode};
use nl_codebase::nn::layers::nn_layers::Layer;
use nl_codebase::nn::layers::sequential_layer::SequentialConfig;
use nl_codebase::nn::loss::loss_func::LossFunc;
use nl_codebase::nn::lr_calculators::adam_lr::AdamConfig;
use nl_codebase::nn::lr_calculators::lr_calculator::LrCalc;
use nl_codebase::utils::{Array2F, Array4F};

fn conv(in_channels: usize, out_channels: usize, stride: usize, dilation: usize) -> Layer {
    Layer::Convolution(ConvolutionConfig {
        in_channels,
        out_channels,
        kernel_size: 3,
        stride,
        padding: dilation,
        dilation,
        init_mode: ConvolutionInitMode::HeNormal(),
        lr_calc: LrCalc::Adam(AdamConfig::default()),
        l2_reg: 1e-3,
    })
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolution");
    group.measurement_time(Duration::from_secs(20));

    let inputs = Array4F::random((16, 8, 32, 32), Normal::new(0.0, 1.0).unwrap()).into_dyn();
    let expected = Array2F::zeros((16, 16)).into_dyn();

    for (name, dilation) in [("plain", 1), ("dilated", 2)] {
        let mut controller = NNController::new(Layer::Sequential(SequentialConfig {
            layers: vec![conv(8, 16, 1, dilation), Layer::Relu, conv(16, 16, 2, 1), Layer::GlobalAvgPool],
        }), LossFunc::Mse).unwrap();

        group.bench_function(format!("forward_{}", name), |b| b.iter(|| {
            controller.forward(black_box(inputs.clone()), ForwardMode::Eval).unwrap()
        }));
        group.bench_function(format!("train_{}", name), |b| b.iter(|| {
            controller.train_batch(black_box(inputs.clone()), &expected).unwrap()
        }));
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
