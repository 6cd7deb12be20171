//! wgpu implementations of the pipeline stages.
//!
//! | stage      | reads                           | does                              |
//! |------------|---------------------------------|-----------------------------------|
//! | `scene`    | scene graph                     | forward shading into the G-buffer |
//! | `ssr`      | color, depth, normals, velocity | screen-space reflections          |
//! | `bloom`    | color                           | threshold glow                    |
//! | `vignette` | color                           | edge darkening                    |
//! | `fxaa`     | color                           | anti-aliasing                     |

mod bloom;
pub(crate) mod fullscreen;
mod fxaa;
mod scene_pass;
mod ssr;
mod vignette;

pub use bloom::BloomStage;
pub use fxaa::FxaaStage;
pub use scene_pass::ScenePass;
pub use ssr::SsrStage;
pub use vignette::VignetteStage;

use crate::gpu::{GpuContext, RenderTarget};
use crate::pipeline::{EffectChain, RenderError, Stage, StageIo};
use crate::viewer::StageFactory;

/// The color an effect reads, or an error naming the stage that lacked it.
pub(crate) fn color_input<'a>(
    stage: &'static str,
    io: &StageIo<'a, RenderTarget>,
) -> Result<&'a RenderTarget, RenderError> {
    io.color_in.ok_or_else(|| RenderError::Stage {
        stage,
        reason: "no color input".into(),
    })
}

/// Builds wgpu stages for the viewer.
#[derive(Clone, Debug)]
pub struct GpuStageFactory {
    clear_color: [f64; 4],
}

impl GpuStageFactory {
    pub fn new(clear_color: [f64; 4]) -> Self {
        Self { clear_color }
    }
}

impl StageFactory<GpuContext> for GpuStageFactory {
    fn base(&self, gpu: &GpuContext) -> Vec<Box<dyn Stage<GpuContext>>> {
        vec![Box::new(ScenePass::new(gpu, self.clear_color))]
    }

    fn full(&self, gpu: &GpuContext, chain: EffectChain) -> Vec<Box<dyn Stage<GpuContext>>> {
        let mut stages = self.base(gpu);
        if chain.ssr {
            stages.push(Box::new(SsrStage::new(gpu)));
        }
        if let Some(kernel) = chain.bloom {
            stages.push(Box::new(BloomStage::new(gpu, kernel)));
        }
        if chain.vignette {
            stages.push(Box::new(VignetteStage::new(gpu)));
        }
        if chain.fxaa {
            stages.push(Box::new(FxaaStage::new(gpu)));
        }
        stages
    }
}
