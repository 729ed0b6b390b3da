use super::Vgg16Config;

/// VGG16 structure metadata.
pub struct Vgg16Structure {
    pub(super) url: Option<&'static str>,
    pub(super) num_classes: usize,
}

impl Vgg16Structure {
    pub fn to_config(&self) -> Vgg16Config {
        Vgg16Config::new().with_num_classes(self.num_classes)
    }
}

pub trait WeightsMeta {
    fn weights(&self) -> Vgg16Structure;
}

/// VGG-16 pre-trained weights.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub enum Vgg16Weights {
    Random {
        num_classes: usize,
    },
    /// These weights were trained from scratch by using a simplified training recipe.
    /// Top-1 accuracy: 71.592%.
    /// Top-5 accuracy: 90.382%.
    ImageNet1kV1,
}
impl WeightsMeta for Vgg16Weights {
    fn weights(&self) -> Vgg16Structure {
        let url = match *self {
            Vgg16Weights::Random { num_classes } => {
                return Vgg16Structure {
                    url: None,
                    num_classes,
                }
            }
            Vgg16Weights::ImageNet1kV1 => "https://download.pytorch.org/models/vgg16-397923af.pth",
        };
        Vgg16Structure {
            url: Some(url),
            num_classes: 1000,
        }
    }
}
