// CONTROLLER: Input, per-tick behavior and the frame loop
pub mod frame_loop;
pub mod input;
pub mod light_animator;
pub mod media;
pub mod navigator;
pub mod video_mapper;

pub use frame_loop::{FrameClock, FrameLoop, LoopState};
pub use input::{Action, InputEvent, InputState, KeyBindings};
pub use light_animator::LightAnimator;
pub use media::{MediaController, PlaybackState};
pub use navigator::{Displacement, Navigator};
pub use video_mapper::VideoSurfaceMapper;
