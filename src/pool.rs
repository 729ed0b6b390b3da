use burn::{
    module::Module,
    nn::pool::{MaxPool2d, MaxPool2dConfig},
    tensor::{backend::Backend, Tensor},
};

/// 2x2 stride-2 max pooling that rounds output sizes up.
///
/// [`MaxPool2d`] drops a trailing odd row/column; the FCN stack needs the
/// boundary handled with a partial window instead. Replicating the last
/// row/column before pooling is equivalent: the partial window only ever sees
/// the edge value.
#[derive(Module, Clone, Debug)]
pub struct MaxPool2dCeil {
    pool: MaxPool2d,
}

impl Default for MaxPool2dCeil {
    fn default() -> Self {
        Self::new()
    }
}

impl MaxPool2dCeil {
    pub fn new() -> Self {
        Self {
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, channels, height, width] = x.dims();

        let x = if height % 2 == 1 {
            let edge = x
                .clone()
                .slice([0..batch, 0..channels, height - 1..height, 0..width]);
            Tensor::cat(vec![x, edge], 2)
        } else {
            x
        };

        let [_, _, height, _] = x.dims();
        let x = if width % 2 == 1 {
            let edge = x
                .clone()
                .slice([0..batch, 0..channels, 0..height, width - 1..width]);
            Tensor::cat(vec![x, edge], 3)
        } else {
            x
        };

        self.pool.forward(x)
    }
}
