use burn::tensor::{backend::Backend, Distribution, Tensor};
use log::LevelFilter;
use xvector::{as_embedding_extractor, build, logger, InputShape};

const INPUT_CHANNELS: usize = 40;
const NUM_OUTPUTS: usize = 10;
const BATCH_SIZE: usize = 4;
const TIME: usize = 200;

fn run<B: Backend>(device: B::Device) -> xvector::Result<()> {
    let mut model = build::<B>(
        InputShape::dynamic(INPUT_CHANNELS),
        NUM_OUTPUTS,
        0.0,
        "x-vector",
        &device,
    )?;
    println!("{model}");

    let features = Tensor::<B, 3>::random(
        [BATCH_SIZE, TIME, INPUT_CHANNELS],
        Distribution::Normal(0.0, 1.0),
        &device,
    );

    let predicted = model.forward(features.clone()).argmax(1).flatten::<1>(0, 1);
    println!("Predicted classes {}", predicted);

    let extractor = as_embedding_extractor(&mut model)?;
    let embeddings = extractor.forward(features);
    println!("Embeddings of shape {:?}", embeddings.dims());

    Ok(())
}

#[allow(unreachable_code)]
fn main() -> xvector::Result<()> {
    logger::init_log(LevelFilter::Info)?;

    #[cfg(feature = "wgpu")]
    return run::<burn::backend::Wgpu>(Default::default());

    #[cfg(feature = "tch-gpu")]
    return run::<burn::backend::LibTorch>(burn::backend::libtorch::LibTorchDevice::Cuda(0));

    #[cfg(feature = "tch-cpu")]
    return run::<burn::backend::LibTorch>(burn::backend::libtorch::LibTorchDevice::Cpu);

    #[cfg(feature = "ndarray")]
    return run::<burn::backend::NdArray>(Default::default());

    unreachable!("At least one backend will be selected.")
}
